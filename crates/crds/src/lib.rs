//! Hostport allocator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the hostport allocator:
//! - PortClass: named policy grouping pools
//! - PortPool: contiguous range of host ports owned by a class
//! - PortClaim: namespaced request for one port from a class
//! - Port: the record of one allocated port bound to a claim
//!
//! Status conditions and finalizer-backed protection tokens shared by all
//! four kinds live alongside them.

pub mod condition;
pub mod port;
pub mod port_claim;
pub mod port_class;
pub mod port_pool;
pub mod protection;
pub mod references;

pub use condition::*;
pub use port::*;
pub use port_claim::*;
pub use port_class::*;
pub use port_pool::*;
pub use protection::*;
pub use references::*;

/// API group shared by every hostport resource
pub const API_GROUP: &str = "hostport.microscaler.io";

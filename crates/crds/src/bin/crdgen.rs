//! Prints the CustomResourceDefinition manifests for all hostport kinds.
//!
//! ```text
//! cargo run -p crds --bin crdgen > config/crds.yaml
//! ```

use crds::{Port, PortClaim, PortClass, PortPool};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    for crd in [PortClass::crd(), PortPool::crd(), PortClaim::crd(), Port::crd()] {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}

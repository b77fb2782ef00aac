//! Port allocator
//!
//! Pure selection of a free port from a class's pools. Callers supply the
//! occupancy snapshot and must hold the allocation lock from snapshot to
//! status write (see `allocation.rs`).

use crds::{PortPool, PortPoolPhase};
use kube::ResourceExt;
use std::collections::BTreeSet;
use thiserror::Error;

/// Result of a successful allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub port: u16,
    pub pool: String,
}

/// Why no port could be allocated. Both cases are transient: they clear when
/// an administrator adds or enables pools, or when ports are released.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("class {class} has no enabled, ready pools")]
    NoEligiblePools { class: String },

    #[error("all ports in class {class} are in use")]
    Exhausted { class: String },
}

/// A pool range considered by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRange<'a> {
    pub name: &'a str,
    pub start: u16,
    pub end: u16,
}

impl<'a> From<&'a PortPool> for PoolRange<'a> {
    fn from(pool: &'a PortPool) -> Self {
        Self {
            name: pool.metadata.name.as_deref().unwrap_or_default(),
            start: pool.spec.start,
            end: pool.spec.end,
        }
    }
}

/// Pools of `class` that may be allocated from: enabled, `Ready`, not being
/// deleted. Sorted by name, which is the allocator's tie-break order.
pub fn eligible_pools<'a>(pools: &'a [PortPool], class: &str) -> Vec<PoolRange<'a>> {
    let mut eligible: Vec<PoolRange<'a>> = pools
        .iter()
        .filter(|p| p.spec.class_ref == class)
        .filter(|p| p.spec.enabled)
        .filter(|p| p.phase() == Some(PortPoolPhase::Ready))
        .filter(|p| p.metadata.deletion_timestamp.is_none())
        .filter(|p| !p.name_any().is_empty())
        .map(PoolRange::from)
        .collect();
    eligible.sort_by(|a, b| a.name.cmp(b.name));
    eligible
}

/// Pick the lowest free port across the union of `pools`.
///
/// `pools` must already be in tie-break order; when two pools share the lowest
/// free port the earlier one wins.
pub fn allocate(
    class: &str,
    pools: &[PoolRange<'_>],
    occupied: &BTreeSet<u16>,
) -> Result<Allocation, AllocationError> {
    if pools.is_empty() {
        return Err(AllocationError::NoEligiblePools {
            class: class.to_string(),
        });
    }

    let mut best: Option<(u16, &str)> = None;
    for pool in pools {
        if pool.start == 0 || pool.start > pool.end {
            continue;
        }
        let Some(candidate) = (pool.start..=pool.end).find(|p| !occupied.contains(p)) else {
            continue;
        };
        if best.is_none_or(|(port, _)| candidate < port) {
            best = Some((candidate, pool.name));
        }
    }

    best.map(|(port, pool)| Allocation {
        port,
        pool: pool.to_string(),
    })
    .ok_or_else(|| AllocationError::Exhausted {
        class: class.to_string(),
    })
}

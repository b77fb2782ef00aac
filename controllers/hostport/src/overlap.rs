//! Pool range overlap detection
//!
//! Port numbers are unique cluster-wide, so a pool is checked against every
//! other pool regardless of class.

use crds::PortPool;

/// Inclusive interval intersection: `[s1, e1]` and `[s2, e2]` share a port.
pub fn ranges_overlap(a: (u16, u16), b: (u16, u16)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// First pool in `others` whose range intersects `pool`. The pool itself
/// (same name) is skipped, so `others` may be a full listing.
pub fn find_overlap<'a>(pool: &PortPool, others: &'a [PortPool]) -> Option<&'a PortPool> {
    let range = (pool.spec.start, pool.spec.end);
    others
        .iter()
        .filter(|other| other.metadata.name != pool.metadata.name)
        .find(|other| ranges_overlap(range, (other.spec.start, other.spec.end)))
}

//! Deletion ordering shared by all reconcilers.
//!
//! Once deletion is requested an object moves through:
//! mark phase `Deleting` -> wait for dependents -> release protection token.
//! Each step is its own write so every write has a single precondition.

/// Next step for an object whose deletion has been requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStep {
    /// Phase is not `Deleting` yet: write it and stop
    MarkDeleting,
    /// Token already released; the store will purge the object
    Converged,
    /// Look for dependents; release the token only if there are none
    CheckDependents,
}

pub fn plan_deletion(phase_is_deleting: bool, holds_token: bool) -> DeletionStep {
    if !phase_is_deleting {
        DeletionStep::MarkDeleting
    } else if !holds_token {
        DeletionStep::Converged
    } else {
        DeletionStep::CheckDependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_deletion() {
        assert_eq!(plan_deletion(false, true), DeletionStep::MarkDeleting);
        assert_eq!(plan_deletion(false, false), DeletionStep::MarkDeleting);
        assert_eq!(plan_deletion(true, false), DeletionStep::Converged);
        assert_eq!(plan_deletion(true, true), DeletionStep::CheckDependents);
    }
}

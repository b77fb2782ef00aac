//! Unit tests for PortPool reconciler

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use crds::{
        ConditionStatus, OVERLAP_REASON_NO_OVERLAP, OVERLAP_REASON_NOT_CHECKED, OVERLAP_REASON_OVERLAP,
        PortPhase, PortPoolPhase, Protected,
    };
    use resource_store::{MockResourceStore, ResourceStore};

    #[tokio::test]
    async fn test_reconcile_port_pool_to_ready() {
        let store = MockResourceStore::new();
        store.insert_pool(&protected(create_test_pool("a", "default", 5000, 5010, true, None)));
        let reconciler = create_test_reconciler(&store);

        reconciler.reconcile_port_pool("a").await.unwrap();
        let pool = store.get_pool("a").await.unwrap();
        assert_eq!(pool.phase(), Some(PortPoolPhase::Pending));
        assert!(pool.overlap_condition().is_none());

        reconciler.reconcile_port_pool("a").await.unwrap();
        let pool = store.get_pool("a").await.unwrap();
        let condition = pool.overlap_condition().unwrap();
        assert_eq!(condition.status, ConditionStatus::Unknown);
        assert_eq!(condition.reason, OVERLAP_REASON_NOT_CHECKED);

        reconciler.reconcile_port_pool("a").await.unwrap();
        let pool = store.get_pool("a").await.unwrap();
        assert_eq!(pool.phase(), Some(PortPoolPhase::Ready));
        let condition = pool.overlap_condition().unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, OVERLAP_REASON_NO_OVERLAP);

        let writes = store.write_count();
        reconciler.reconcile_port_pool("a").await.unwrap();
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_overlapping_pool_is_stuck() {
        let store = MockResourceStore::new();
        store.insert_pool(&create_test_pool("a", "default", 5000, 5010, true, Some(PortPoolPhase::Ready)));
        store.insert_pool(&protected(create_test_pool("b", "other", 5010, 5020, true, None)));
        let reconciler = create_test_reconciler(&store);

        for _ in 0..3 {
            reconciler.reconcile_port_pool("b").await.unwrap();
        }
        let pool = store.get_pool("b").await.unwrap();
        assert_eq!(pool.phase(), Some(PortPoolPhase::Pending));
        let condition = pool.overlap_condition().unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, OVERLAP_REASON_OVERLAP);
        assert!(condition.message.contains("pool a"));

        // No retry once denied, even after the other pool goes away
        store.delete_pool("a").unwrap();
        let writes = store.write_count();
        reconciler.reconcile_port_pool("b").await.unwrap();
        assert_eq!(store.write_count(), writes);
        assert_eq!(store.get_pool("b").await.unwrap().phase(), Some(PortPoolPhase::Pending));
    }

    #[tokio::test]
    async fn test_disabled_pool_becomes_ready() {
        let store = MockResourceStore::new();
        store.insert_pool(&create_test_pool("a", "default", 5000, 5010, false, None));
        let reconciler = create_test_reconciler(&store);

        for _ in 0..3 {
            reconciler.reconcile_port_pool("a").await.unwrap();
        }
        assert_eq!(store.get_pool("a").await.unwrap().phase(), Some(PortPoolPhase::Ready));
    }

    #[tokio::test]
    async fn test_pool_deletion_blocked_by_allocated_port() {
        let store = MockResourceStore::new();
        store.insert_pool(&protected(create_test_pool("a", "default", 5000, 5010, true, Some(PortPoolPhase::Ready))));
        let mut port = create_test_port("claim-1", "default", None);
        set_port_allocated(&mut port, 5000, "a", PortPhase::Allocated);
        store.insert_port(&port);
        let reconciler = create_test_reconciler(&store);

        store.delete_pool("a").unwrap();
        reconciler.reconcile_port_pool("a").await.unwrap();
        assert_eq!(store.get_pool("a").await.unwrap().phase(), Some(PortPoolPhase::Deleting));

        reconciler.reconcile_port_pool("a").await.unwrap();
        assert!(store.get_pool("a").await.unwrap().is_protected());

        store.delete_port_as_user("claim-1").unwrap();
        reconciler.reconcile_port_pool("a").await.unwrap();
        assert!(!store.has_pool("a"));
    }
}

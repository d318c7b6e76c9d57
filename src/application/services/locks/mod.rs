use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Serializes work on a single (site, artifact) pair within this process.
///
/// Cross-process writers are handled by the revision compare-and-swap in the store.
#[derive(Default, Clone)]
pub struct AssociationLocks {
    inner: Arc<DashMap<(Uuid, Uuid), Arc<Mutex<()>>>>,
}

impl AssociationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, site_id: Uuid, artifact_id: Uuid) -> OwnedMutexGuard<()> {
        let cell = self
            .inner
            .entry((site_id, artifact_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        cell.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.inner.retain(|_, cell| Arc::strong_count(cell) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_pair_is_exclusive() {
        let locks = AssociationLocks::new();
        let (site, artifact) = (Uuid::new_v4(), Uuid::new_v4());
        let guard = locks.lock(site, artifact).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(site, artifact)).await;
        assert!(second.is_err());
        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.lock(site, artifact)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn distinct_pairs_do_not_block() {
        let locks = AssociationLocks::new();
        let site = Uuid::new_v4();
        let _a = locks.lock(site, Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(site, Uuid::new_v4())).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn prune_keeps_held_entries() {
        let locks = AssociationLocks::new();
        let held = locks.lock(Uuid::new_v4(), Uuid::new_v4()).await;
        {
            let _released = locks.lock(Uuid::new_v4(), Uuid::new_v4()).await;
        }
        locks.prune_idle();
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.prune_idle();
        assert!(locks.is_empty());
    }
}

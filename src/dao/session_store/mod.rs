pub mod memory;

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// Encoded snapshot as held by the shared fast store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    /// Revision the payload was written at. Legacy blobs without one read as 0.
    pub revision: u64,
    /// Versioned JSON payload.
    pub payload: String,
}

/// Shared fast store holding the single session snapshot.
///
/// Writers never get-then-set: every mutation is a compare-and-swap against
/// the revision the caller last observed.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<StoredSnapshot>>>;

    /// Replace the snapshot when its current revision equals `expected`
    /// (`None` meaning "no snapshot stored"). Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        expected: Option<u64>,
        next: StoredSnapshot,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Remove the snapshot when it is still at `expected`.
    fn delete(&self, expected: u64) -> BoxFuture<'static, StorageResult<bool>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

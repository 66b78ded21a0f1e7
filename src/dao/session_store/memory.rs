use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use super::{SessionStore, StoredSnapshot};
use crate::dao::storage::StorageResult;

/// Process-local [`SessionStore`]. Only suitable for a single server process.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<StoredSnapshot>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw payload unconditionally, used to load legacy blobs.
    pub async fn put_raw(&self, snapshot: StoredSnapshot) {
        *self.slot.lock().await = Some(snapshot);
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<StoredSnapshot>>> {
        let slot = self.slot.clone();
        Box::pin(async move { Ok(slot.lock().await.clone()) })
    }

    fn compare_and_swap(
        &self,
        expected: Option<u64>,
        next: StoredSnapshot,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let slot = self.slot.clone();
        Box::pin(async move {
            let mut guard = slot.lock().await;
            let current = guard.as_ref().map(|stored| stored.revision);
            if current != expected {
                return Ok(false);
            }
            *guard = Some(next);
            Ok(true)
        })
    }

    fn delete(&self, expected: u64) -> BoxFuture<'static, StorageResult<bool>> {
        let slot = self.slot.clone();
        Box::pin(async move {
            let mut guard = slot.lock().await;
            match guard.as_ref() {
                Some(stored) if stored.revision == expected => {
                    *guard = None;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

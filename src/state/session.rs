use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::dao::{
    session_store::{SessionStore, StoredSnapshot},
    storage::StorageError,
};
use crate::state::snapshot::{SCHEMA_VERSION, SessionSnapshot, SnapshotError};

/// Failures of the snapshot accessor.
#[derive(Debug, Error)]
pub enum SessionStateError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("snapshot still contended after {attempts} attempts")]
    Contention { attempts: u32 },
}

/// Outcome chosen by an update closure.
pub enum Mutation<T> {
    /// Store the snapshot, then return the value.
    Write(SessionSnapshot, T),
    /// Remove the snapshot, then return the value.
    Delete(T),
    /// Leave the store untouched.
    Keep(T),
}

/// Typed access to the single session snapshot.
///
/// Every read-modify-write goes through [`SessionStateStore::update`], which
/// retries the closure against a fresh read until its compare-and-swap lands.
#[derive(Clone)]
pub struct SessionStateStore {
    store: Arc<dyn SessionStore>,
    max_attempts: u32,
}

impl SessionStateStore {
    pub fn new(store: Arc<dyn SessionStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Ping the underlying store.
    pub async fn health_check(&self) -> Result<(), SessionStateError> {
        Ok(self.store.health_check().await?)
    }

    /// Current snapshot, migrated to the current layout.
    pub async fn get(&self) -> Result<Option<SessionSnapshot>, SessionStateError> {
        let Some(stored) = self.store.load().await? else {
            return Ok(None);
        };
        Ok(Some(SessionSnapshot::decode(&stored.payload, stored.revision)?))
    }

    /// Replace whatever is stored with `snapshot`.
    pub async fn set(&self, snapshot: SessionSnapshot) -> Result<SessionSnapshot, SessionStateError> {
        let (_, stored) = self
            .update(|_| Ok::<_, SessionStateError>(Mutation::Write(snapshot.clone(), ())))
            .await?;
        stored.ok_or(SessionStateError::Contention { attempts: 0 })
    }

    /// Remove the snapshot if one is stored.
    pub async fn delete(&self) -> Result<(), SessionStateError> {
        self.update(|current| {
            Ok::<_, SessionStateError>(match current {
                Some(_) => Mutation::Delete(()),
                None => Mutation::Keep(()),
            })
        })
        .await
        .map(|_| ())
    }

    /// Read-modify-write the snapshot as one compare-and-swap.
    ///
    /// `mutate` may run several times and must not have side effects beyond
    /// computing its result. Returns its value together with the snapshot as
    /// stored afterwards.
    pub async fn update<T, E, F>(&self, mut mutate: F) -> Result<(T, Option<SessionSnapshot>), E>
    where
        F: FnMut(Option<&SessionSnapshot>) -> Result<Mutation<T>, E>,
        E: From<SessionStateError>,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.get().await?;
            let expected = current.as_ref().map(|snapshot| snapshot.revision);

            match mutate(current.as_ref())? {
                Mutation::Keep(value) => return Ok((value, current)),
                Mutation::Write(mut next, value) => {
                    next.schema_version = SCHEMA_VERSION;
                    next.revision = expected.map_or(1, |revision| revision + 1);
                    let stored = StoredSnapshot {
                        revision: next.revision,
                        payload: next.encode().map_err(SessionStateError::from)?,
                    };
                    let swapped = self
                        .store
                        .compare_and_swap(expected, stored)
                        .await
                        .map_err(SessionStateError::from)?;
                    if swapped {
                        return Ok((value, Some(next)));
                    }
                }
                Mutation::Delete(value) => {
                    let Some(revision) = expected else {
                        return Ok((value, None));
                    };
                    let deleted = self
                        .store
                        .delete(revision)
                        .await
                        .map_err(SessionStateError::from)?;
                    if deleted {
                        return Ok((value, None));
                    }
                }
            }
            debug!(attempt, "session snapshot changed concurrently; retrying");
        }

        Err(SessionStateError::Contention {
            attempts: self.max_attempts,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::dao::session_store::memory::MemorySessionStore;
    use crate::state::state_machine::SessionPhase;

    fn accessor(store: &MemorySessionStore) -> SessionStateStore {
        SessionStateStore::new(Arc::new(store.clone()), 8)
    }

    #[tokio::test]
    async fn writes_bump_the_revision() {
        let store = MemorySessionStore::new();
        let sessions = accessor(&store);

        let first = sessions.set(SessionSnapshot::opened(1, 3, 10)).await.unwrap();
        assert_eq!(first.revision, 1);

        let (_, second) = sessions
            .update(|current| {
                let mut next = current.cloned().unwrap();
                next.attendee_count += 1;
                Ok::<_, SessionStateError>(Mutation::Write(next, ()))
            })
            .await
            .unwrap();
        let second = second.unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(sessions.get().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = MemorySessionStore::new();
        let sessions = SessionStateStore::new(Arc::new(store.clone()), 64);
        sessions.set(SessionSnapshot::opened(1, 3, 10)).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let sessions = sessions.clone();
            tasks.push(tokio::spawn(async move {
                sessions
                    .update(|current| {
                        let mut next = current.cloned().unwrap();
                        next.attendee_count += 1;
                        Ok::<_, SessionStateError>(Mutation::Write(next, ()))
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = sessions.get().await.unwrap().unwrap();
        assert_eq!(snapshot.attendee_count, 20);
        assert_eq!(snapshot.revision, 21);
    }

    #[tokio::test]
    async fn keep_leaves_the_store_alone() {
        let store = MemorySessionStore::new();
        let sessions = accessor(&store);
        sessions.set(SessionSnapshot::opened(1, 3, 10)).await.unwrap();

        let calls = AtomicU32::new(0);
        let (phase, current) = sessions
            .update(|current| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SessionStateError>(Mutation::Keep(current.map(|s| s.phase)))
            })
            .await
            .unwrap();
        assert_eq!(phase, Some(SessionPhase::Starting));
        assert_eq!(current.unwrap().revision, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn legacy_payload_is_upgraded_on_first_write() {
        let store = MemorySessionStore::new();
        store
            .put_raw(StoredSnapshot {
                revision: 0,
                payload: r#"{"gameId": 5, "state": "Starting", "numberOfAttendees": 2}"#.into(),
            })
            .await;
        let sessions = accessor(&store);

        let (_, stored) = sessions
            .update(|current| {
                let mut next = current.cloned().unwrap();
                next.attendee_count += 1;
                Ok::<_, SessionStateError>(Mutation::Write(next, ()))
            })
            .await
            .unwrap();
        let stored = stored.unwrap();
        assert_eq!(stored.attendee_count, 3);
        assert_eq!(stored.revision, 1);

        let raw = store.load().await.unwrap().unwrap();
        assert!(raw.payload.contains("\"schemaVersion\":2"));
    }

    #[tokio::test]
    async fn delete_removes_the_snapshot() {
        let store = MemorySessionStore::new();
        let sessions = accessor(&store);
        sessions.set(SessionSnapshot::opened(1, 3, 10)).await.unwrap();
        sessions.delete().await.unwrap();
        assert_eq!(sessions.get().await.unwrap(), None);
        sessions.delete().await.unwrap();
    }
}

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::{Document, doc},
};

use super::{
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::MongoSnapshotDocument,
};
use crate::dao::{
    session_store::{SessionStore, StoredSnapshot},
    storage::StorageResult,
};

const SNAPSHOT_COLLECTION_NAME: &str = "session_snapshots";
const SNAPSHOT_ID: &str = "current";

/// [`SessionStore`] keeping the snapshot in a single MongoDB document.
///
/// Compare-and-swap is a `replace_one` filtered on the observed revision.
#[derive(Clone)]
pub struct MongoSessionStore {
    collection: Collection<MongoSnapshotDocument>,
}

impl MongoSessionStore {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(SNAPSHOT_COLLECTION_NAME),
        }
    }

    async fn load(&self) -> MongoResult<Option<StoredSnapshot>> {
        let document = self
            .collection
            .find_one(doc! {"_id": SNAPSHOT_ID})
            .await
            .map_err(MongoDaoError::snapshot("load snapshot"))?;
        Ok(document.map(|document| StoredSnapshot {
            revision: u64::try_from(document.revision).unwrap_or(0),
            payload: document.payload,
        }))
    }

    async fn compare_and_swap(
        &self,
        expected: Option<u64>,
        next: StoredSnapshot,
    ) -> MongoResult<bool> {
        let document = MongoSnapshotDocument {
            id: SNAPSHOT_ID.to_owned(),
            revision: i64::try_from(next.revision).unwrap_or(i64::MAX),
            payload: next.payload,
        };

        match expected {
            None => match self.collection.insert_one(&document).await {
                Ok(_) => Ok(true),
                Err(err) if is_duplicate_key(&err) => Ok(false),
                Err(source) => Err(MongoDaoError::Snapshot {
                    operation: "create snapshot",
                    source,
                }),
            },
            Some(revision) => {
                let result = self
                    .collection
                    .replace_one(revision_filter(revision), &document)
                    .await
                    .map_err(MongoDaoError::snapshot("swap snapshot"))?;
                Ok(result.matched_count == 1)
            }
        }
    }

    async fn delete(&self, expected: u64) -> MongoResult<bool> {
        let result = self
            .collection
            .delete_one(revision_filter(expected))
            .await
            .map_err(MongoDaoError::snapshot("delete snapshot"))?;
        Ok(result.deleted_count == 1)
    }
}

fn revision_filter(revision: u64) -> Document {
    let revision = i64::try_from(revision).unwrap_or(i64::MAX);
    if revision == 0 {
        // legacy blobs were written without a revision field
        doc! {
            "_id": SNAPSHOT_ID,
            "$or": [{"revision": 0_i64}, {"revision": {"$exists": false}}],
        }
    } else {
        doc! {"_id": SNAPSHOT_ID, "revision": revision}
    }
}

impl SessionStore for MongoSessionStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<StoredSnapshot>>> {
        let store = self.clone();
        Box::pin(async move { store.load().await.map_err(Into::into) })
    }

    fn compare_and_swap(
        &self,
        expected: Option<u64>,
        next: StoredSnapshot,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap(expected, next)
                .await
                .map_err(Into::into)
        })
    }

    fn delete(&self, expected: u64) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete(expected).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .collection
                .estimated_document_count()
                .await
                .map(|_| ())
                .map_err(MongoDaoError::snapshot("health check"))
                .map_err(Into::into)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_zero_also_matches_legacy_documents() {
        let filter = revision_filter(0);
        assert!(filter.contains_key("$or"));
        assert!(!filter.contains_key("revision"));

        let filter = revision_filter(7);
        assert_eq!(filter.get_i64("revision").ok(), Some(7));
    }
}

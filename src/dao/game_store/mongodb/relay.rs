use std::time::{Duration, SystemTime};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use uuid::Uuid;

use super::{
    error::{MongoDaoError, MongoResult},
    models::MongoEventDocument,
};
use crate::dao::{
    relay::{FanoutRelay, RelayedEvent},
    storage::StorageResult,
};

const EVENT_COLLECTION_NAME: &str = "session_events";
const EVENT_RETENTION: Duration = Duration::from_secs(3600);

/// [`FanoutRelay`] writing events into a collection and tailing it with a change stream.
///
/// Change streams need a replica set or a sharded cluster.
#[derive(Clone)]
pub struct MongoEventRelay {
    collection: Collection<MongoEventDocument>,
}

impl MongoEventRelay {
    /// Build the relay and make sure old events expire.
    pub async fn new(database: &Database) -> MongoResult<Self> {
        let collection = database.collection::<MongoEventDocument>(EVENT_COLLECTION_NAME);
        let ttl = IndexModel::builder()
            .keys(doc! {"created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_event_ttl_idx".to_owned()))
                    .expire_after(Some(EVENT_RETENTION))
                    .build(),
            )
            .build();
        collection
            .create_index(ttl)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: EVENT_COLLECTION_NAME,
                index: "created_at",
                source,
            })?;

        Ok(Self { collection })
    }

    async fn publish(&self, event: RelayedEvent) -> MongoResult<()> {
        let document = MongoEventDocument {
            origin: event.origin.to_string(),
            payload: event.payload,
            created_at: DateTime::from_system_time(SystemTime::now()),
        };
        self.collection
            .insert_one(&document)
            .await
            .map_err(MongoDaoError::relay("publish event"))?;
        Ok(())
    }

    async fn subscribe(&self) -> MongoResult<BoxStream<'static, RelayedEvent>> {
        let stream = self
            .collection
            .watch()
            .pipeline([doc! {"$match": {"operationType": "insert"}}])
            .await
            .map_err(MongoDaoError::relay("watch events"))?;

        let events = stream.filter_map(|change| async move {
            let change = match change {
                Ok(change) => change,
                Err(err) => {
                    tracing::warn!(error = %err, "event relay change stream error");
                    return None;
                }
            };
            let document = change.full_document?;
            let origin = Uuid::parse_str(&document.origin).ok()?;
            Some(RelayedEvent {
                origin,
                payload: document.payload,
            })
        });
        Ok(events.boxed())
    }
}

impl FanoutRelay for MongoEventRelay {
    fn publish(&self, event: RelayedEvent) -> BoxFuture<'static, StorageResult<()>> {
        let relay = self.clone();
        Box::pin(async move { relay.publish(event).await.map_err(Into::into) })
    }

    fn subscribe(&self) -> BoxFuture<'static, StorageResult<BoxStream<'static, RelayedEvent>>> {
        let relay = self.clone();
        Box::pin(async move { relay.subscribe().await.map_err(Into::into) })
    }
}

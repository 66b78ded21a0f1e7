use futures::{future::BoxFuture, stream::BoxStream};
use uuid::Uuid;

use crate::dao::storage::StorageResult;

/// Event envelope exchanged between server processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedEvent {
    /// Process that published the event.
    pub origin: Uuid,
    /// Serialized outbound event.
    pub payload: String,
}

/// Transport carrying broadcast events to the other server processes.
pub trait FanoutRelay: Send + Sync {
    /// Hand an event over to every other process.
    fn publish(&self, event: RelayedEvent) -> BoxFuture<'static, StorageResult<()>>;

    /// Stream of events published from now on by any process, including this one.
    fn subscribe(&self) -> BoxFuture<'static, StorageResult<BoxStream<'static, RelayedEvent>>>;
}

use std::sync::Arc;

use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::relay::{FanoutRelay, RelayedEvent},
    dto::ws::OutboundEvent,
};

/// Fan-out of outbound events to every socket of this process and, through an
/// optional relay, to the sockets of every other process.
pub struct BroadcastHub {
    origin: Uuid,
    sender: broadcast::Sender<OutboundEvent>,
    relay: Option<Arc<dyn FanoutRelay>>,
}

impl BroadcastHub {
    /// Construct a hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize, origin: Uuid, relay: Option<Arc<dyn FanoutRelay>>) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            origin,
            sender,
            relay,
        }
    }

    /// Identifier this process stamps on relayed events.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.sender.subscribe()
    }

    /// Deliver to local subscribers only, ignoring the absence of receivers.
    pub fn publish_local(&self, event: OutboundEvent) {
        let _ = self.sender.send(event);
    }

    /// Deliver everywhere. Relay failures are logged; local delivery always happens.
    pub async fn publish(&self, event: OutboundEvent) {
        let name = event.name();
        if let Some(relay) = self.relay.as_ref().filter(|_| event.is_shared()) {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    let relayed = RelayedEvent {
                        origin: self.origin,
                        payload,
                    };
                    if let Err(err) = relay.publish(relayed).await {
                        warn!(event = name, error = %err, "failed to relay event");
                    }
                }
                Err(err) => warn!(event = name, error = %err, "failed to encode event for relay"),
            }
        }
        debug!(event = name, "broadcasting event");
        self.publish_local(event);
    }

    /// Re-emit locally every event other processes publish. Returns `None` without a relay.
    pub async fn spawn_relay_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let relay = self.relay.clone()?;
        let mut events = match relay.subscribe().await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "event relay unavailable; broadcasting locally only");
                return None;
            }
        };

        let hub = Arc::clone(self);
        info!(origin = %hub.origin, "listening for relayed events");
        Some(tokio::spawn(async move {
            while let Some(relayed) = events.next().await {
                if let Some(event) = hub.accept_relayed(relayed) {
                    hub.publish_local(event);
                }
            }
            warn!("event relay stream ended");
        }))
    }

    fn accept_relayed(&self, relayed: RelayedEvent) -> Option<OutboundEvent> {
        if relayed.origin == self.origin {
            return None;
        }
        match serde_json::from_str::<OutboundEvent>(&relayed.payload) {
            Ok(event) if event.is_shared() => Some(event),
            Ok(_) => None,
            Err(err) => {
                warn!(origin = %relayed.origin, error = %err, "dropping undecodable relayed event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::{
        future::BoxFuture,
        stream::{self, BoxStream},
    };

    use super::*;
    use crate::dao::storage::StorageResult;
    use crate::dto::ws::{GameRefPayload, GameStatsPayload, TimerPayload};

    #[derive(Default)]
    struct RecordingRelay {
        published: Mutex<Vec<RelayedEvent>>,
        incoming: Mutex<Vec<RelayedEvent>>,
    }

    impl FanoutRelay for RecordingRelay {
        fn publish(&self, event: RelayedEvent) -> BoxFuture<'static, StorageResult<()>> {
            self.published.lock().unwrap().push(event);
            Box::pin(async { Ok(()) })
        }

        fn subscribe(
            &self,
        ) -> BoxFuture<'static, StorageResult<BoxStream<'static, RelayedEvent>>> {
            let incoming = std::mem::take(&mut *self.incoming.lock().unwrap());
            Box::pin(async move { Ok(stream::iter(incoming).boxed()) })
        }
    }

    #[tokio::test]
    async fn shared_events_go_through_the_relay() {
        let relay = Arc::new(RecordingRelay::default());
        let hub = BroadcastHub::new(8, Uuid::new_v4(), Some(relay.clone()));
        let mut rx = hub.subscribe();

        hub.publish(OutboundEvent::Leave(GameRefPayload { game_id: 1 }))
            .await;
        hub.publish(OutboundEvent::GameStats(GameStatsPayload { connected_count: 2 }))
            .await;

        assert_eq!(rx.recv().await.unwrap().name(), "leave");
        assert_eq!(rx.recv().await.unwrap().name(), "game_stats");
        let published = relay.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].origin, hub.origin());
    }

    #[tokio::test]
    async fn only_foreign_events_are_reemitted() {
        let origin = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let encode = |event: &OutboundEvent| serde_json::to_string(event).unwrap();
        let relay = Arc::new(RecordingRelay::default());
        *relay.incoming.lock().unwrap() = vec![
            RelayedEvent {
                origin,
                payload: encode(&OutboundEvent::Timer(TimerPayload { counter: 9 })),
            },
            RelayedEvent {
                origin: foreign,
                payload: "not json".into(),
            },
            RelayedEvent {
                origin: foreign,
                payload: encode(&OutboundEvent::Timer(TimerPayload { counter: 8 })),
            },
        ];

        let hub = Arc::new(BroadcastHub::new(8, origin, Some(relay)));
        let mut rx = hub.subscribe();
        hub.spawn_relay_listener().await.unwrap().await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            OutboundEvent::Timer(TimerPayload { counter: 8 })
        );
        assert!(rx.try_recv().is_err());
    }
}

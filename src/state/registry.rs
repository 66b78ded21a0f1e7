use std::time::Instant;

use dashmap::DashMap;
use uuid::Uuid;

use crate::dao::models::UserId;

#[derive(Debug, Clone)]
/// Participant socket open on this process.
pub struct ParticipantConnection {
    pub user_id: UserId,
    pub connected_at: Instant,
}

/// Sockets open on this process, keyed by connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ParticipantConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new socket and return its connection id.
    pub fn register(&self, user_id: UserId) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            ParticipantConnection {
                user_id,
                connected_at: Instant::now(),
            },
        );
        id
    }

    pub fn unregister(&self, id: Uuid) -> Option<ParticipantConnection> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    /// Number of open sockets, reported as `connectedCount`.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Open sockets of one user.
    pub fn connections_of(&self, user_id: UserId) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_follows_registrations() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(1);
        registry.register(1);
        registry.register(2);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.connections_of(1), 2);

        assert_eq!(registry.unregister(first).map(|c| c.user_id), Some(1));
        assert!(registry.unregister(first).is_none());
        assert_eq!(registry.len(), 2);
    }
}

use crate::fingerprint::Fingerprint;
use crate::statement::StatementKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 1_024;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// A database session was established (initial connect or reconnect)
    Connected { target: String },
    /// A statement failed because the connection went away
    ConnectionLost { reason: String },
    Hit {
        fingerprint: Fingerprint,
        statement: String,
    },
    Miss {
        fingerprint: Fingerprint,
        statement: String,
    },
    /// A statement went to the database
    Query {
        kind: StatementKind,
        statement: String,
    },
    CacheFlushed { provider: &'static str },
    CacheEntryRemoved { fingerprint: Fingerprint },
    ProviderSwitched {
        from: &'static str,
        to: &'static str,
    },
    TargetChanged { target: String },
    PoolClosed,
}

impl EventKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::Hit { .. } => "hit",
            Self::Miss { .. } => "miss",
            Self::Query { .. } => "query",
            Self::CacheFlushed { .. } => "cache_flushed",
            Self::CacheEntryRemoved { .. } => "cache_entry_removed",
            Self::ProviderSwitched { .. } => "provider_switched",
            Self::TargetChanged { .. } => "target_changed",
            Self::PoolClosed => "pool_closed",
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone, Serialize)]
pub struct QueryEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Broadcast publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<QueryEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers that received it
    pub fn publish(&self, kind: EventKind) -> usize {
        let event = QueryEvent {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
        };

        // send() only fails when there are no receivers, which is fine here
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let publisher = EventPublisher::new(8);
        assert_eq!(publisher.publish(EventKind::PoolClosed), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(EventKind::CacheFlushed { provider: "lru" });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::CacheFlushed { provider: "lru" });
        assert_eq!(event.kind.name(), "cache_flushed");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = QueryEvent {
            id: Uuid::nil(),
            occurred_at: Utc::now(),
            kind: EventKind::TargetChanged {
                target: "db:3306/app".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "target_changed");
        assert_eq!(json["target"], "db:3306/app");
    }
}

//! # Event Surface
//!
//! Notification hooks for query and connection lifecycle. Subscribers get a
//! `tokio::sync::broadcast` receiver; publishing with nobody listening is
//! not an error.
//!
//! ```rust
//! use sqlcache::events::{EventKind, EventPublisher};
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut events = publisher.subscribe();
//!
//! publisher.publish(EventKind::PoolClosed);
//! let event = events.recv().await.unwrap();
//! assert_eq!(event.kind.name(), "pool_closed");
//! # });
//! ```

pub mod publisher;

pub use publisher::{EventKind, EventPublisher, QueryEvent};

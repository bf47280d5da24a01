//! Server-Sent Events (SSE) push of notifications to connected users.
//!
//! # Architecture
//!
//! - **Single session per user**: each instance holds at most one stream per
//!   user. Opening a new one sends `session-expired` to the old stream and
//!   closes it.
//! - **Bounded queues**: every stream drains its own bounded queue. Pushes never
//!   wait; a queue that is full or closed gets its connection evicted.
//! - **Heartbeats**: a periodic sweep writes `heartbeat` to every stream, which
//!   is how connections to clients that vanished silently get reclaimed.
//! - **Prompt cleanup**: a stream unregisters itself as soon as it is dropped.
//!
//! # Message Flow
//!
//! 1. Client opens `GET /notifications/stream` with a bearer token
//! 2. `Manager::subscribe` registers the connection and queues `connected`
//! 3. Any instance publishes a `DomainEvent` to the fanout channel
//! 4. Every instance's subscriber hands it to [`SseDomainEventHandler`]
//! 5. The handler pushes it as a `notification` to the recipient's stream if
//!    it is held here, or to every local stream for broadcast events
//!
//! # Modules
//!
//! - `connection`: `ConnectionRegistry`, the per-user map and its send-or-evict rules
//! - `manager`: `Manager`, subscriptions, streams and the heartbeat task
//! - `message`: the named messages a stream carries

pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod manager;
pub mod message;

pub use connection::Delivery;
pub use domain_event_handler::SseDomainEventHandler;
pub use error::Error;
pub use manager::{Manager, Subscription};
pub use message::Message;

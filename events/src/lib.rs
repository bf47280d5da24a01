//! Event system infrastructure for the Blind notification pipeline.
//!
//! This crate provides the event system that decouples business services (profile
//! review, board, comments) from notification delivery (persistence, fanout, SSE).
//!
//! # Architecture
//!
//! - **DomainEvent**: Closed enum of every notification-worthy business event. It is
//!   also the fanout wire format, internally tagged by `type`.
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//! - **PendingEvents**: Buffer that business code stages events into while a database
//!   transaction is open. The buffer is only drained after the commit succeeds.
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

pub mod event;
pub mod pending;
pub mod publisher;

pub use event::{DomainEvent, EventKind, NoRecipient, PostCategory, Recipient};
pub use pending::PendingEvents;
pub use publisher::{EventHandler, EventPublisher};

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = uuid::Uuid;

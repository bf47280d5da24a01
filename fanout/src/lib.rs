//! Cross-instance fanout of domain events.
//!
//! Every application instance publishes the events it produces to one shared
//! topic and subscribes to that same topic. Each instance then delivers only to
//! the clients it holds a connection for and drops the rest.
//!
//! Messages on the wire are the JSON form of [`events::DomainEvent`], tagged by
//! `type`, so a subscriber can decode any kind without out-of-band metadata.

use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod error;
pub mod in_memory;
pub mod redis_fanout;

pub use error::Error;
pub use in_memory::InMemoryFanout;
pub use redis_fanout::RedisFanout;

#[async_trait]
pub trait FanoutChannel: Send + Sync {
    /// Publishes `event` to every subscriber of `topic` on every instance.
    async fn publish(&self, topic: &str, event: &DomainEvent) -> Result<(), Error>;

    /// Starts a background task that hands every event received on `topic` to
    /// `handler`, one at a time and in arrival order. The task runs until the
    /// returned handle is aborted.
    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> JoinHandle<()>;
}

pub fn encode(event: &DomainEvent) -> Result<String, Error> {
    Ok(serde_json::to_string(event)?)
}

pub fn decode(payload: &str) -> Result<DomainEvent, Error> {
    Ok(serde_json::from_str(payload)?)
}

/// Decodes one received payload and passes it on. A payload that doesn't decode
/// is logged and dropped so the messages behind it still get through.
pub(crate) async fn deliver(topic: &str, payload: &str, handler: &dyn EventHandler) {
    match decode(payload) {
        Ok(event) => {
            trace!("Received {} event on {topic}", event.kind());
            handler.handle(&event).await;
        }
        Err(err) => {
            warn!("Discarding undecodable message on {topic}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::{EventKind, Id};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl EventHandler for Collect {
        async fn handle(&self, event: &DomainEvent) {
            self.0.lock().await.push(event.kind());
        }
    }

    #[test]
    fn encoded_events_carry_their_kind() {
        let payload = encode(&DomainEvent::review_approved(Id::new_v4())).unwrap();
        assert!(payload.contains("\"type\":\"REVIEW_APPROVED\""));
    }

    #[tokio::test]
    async fn deliver_skips_garbage_and_keeps_going() {
        let handler = Collect::default();

        deliver("t", "{not json", &handler).await;
        deliver("t", r#"{"type":"NOT_A_KIND"}"#, &handler).await;
        let valid = encode(&DomainEvent::comment_added(Id::new_v4(), Id::new_v4())).unwrap();
        deliver("t", &valid, &handler).await;

        assert_eq!(*handler.0.lock().await, vec![EventKind::CommentAdded]);
    }
}

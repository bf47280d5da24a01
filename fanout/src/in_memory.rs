use crate::{deliver, encode, Error, FanoutChannel};
use async_trait::async_trait;
use dashmap::DashMap;
use events::{DomainEvent, EventHandler};
use log::*;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

const TOPIC_CAPACITY: usize = 1024;
/// How many published events are remembered before the oldest are forgotten.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Process-local fanout on tokio broadcast channels.
///
/// Behaves like the Redis channel for a single instance: payloads go through the
/// same JSON encoding, each subscription sees messages in publish order, and a
/// publish with no subscribers is not an error. It also remembers the most
/// recent publishes, up to a fixed limit, so callers can inspect them.
#[derive(Clone)]
pub struct InMemoryFanout {
    topics: Arc<DashMap<String, broadcast::Sender<String>>>,
    published: Arc<Mutex<VecDeque<(String, DomainEvent)>>>,
    history_limit: usize,
}

impl InMemoryFanout {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            published: Arc::new(Mutex::new(VecDeque::new())),
            history_limit,
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// The remembered events, oldest first, regardless of topic.
    pub async fn published(&self) -> Vec<DomainEvent> {
        self.published
            .lock()
            .await
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub async fn published_to(&self, topic: &str) -> Vec<DomainEvent> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for InMemoryFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FanoutChannel for InMemoryFanout {
    async fn publish(&self, topic: &str, event: &DomainEvent) -> Result<(), Error> {
        let payload = encode(event)?;
        {
            let mut published = self.published.lock().await;
            if self.history_limit > 0 {
                if published.len() == self.history_limit {
                    published.pop_front();
                }
                published.push_back((topic.to_string(), event.clone()));
            }
        }

        // Err only means nobody is subscribed yet
        let receivers = self.sender(topic).send(payload).unwrap_or(0);
        debug!(
            "Published {} event to {topic} ({receivers} subscriber(s))",
            event.kind()
        );
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        let mut receiver = self.sender(topic).subscribe();
        let topic = topic.to_string();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => deliver(&topic, &payload, handler.as_ref()).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscriber on {topic} lagged, {skipped} message(s) skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

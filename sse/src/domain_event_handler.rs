use crate::connection::Delivery;
use crate::message::Message;
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler, Recipient};
use log::*;
use std::sync::Arc;

/// Delivers events arriving from the fanout channel to the streams held by this
/// instance. Events for users connected elsewhere are dropped here; the instance
/// holding their stream delivers them.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let message = Message::Notification(event.clone());

        match event.recipient() {
            Recipient::User(user_id) => match self.sse_manager.send(&user_id, message) {
                Delivery::Sent => debug!("Pushed {} event to user {user_id}", event.kind()),
                Delivery::NotConnected => {
                    trace!("User {user_id} has no stream here, skipping {}", event.kind())
                }
                Delivery::Evicted => warn!(
                    "Dropped {} event for user {user_id}: connection evicted",
                    event.kind()
                ),
            },
            Recipient::Broadcast => {
                let delivered = self.sse_manager.broadcast(message);
                debug!("Broadcast {} event to {delivered} stream(s)", event.kind());
            }
        }
    }
}

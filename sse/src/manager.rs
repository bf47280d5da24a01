use crate::connection::{ConnectionId, ConnectionRegistry, Delivery, UserId};
use crate::error::Error;
use crate::message::Message;
use async_stream::stream;
use axum::response::sse::Event;
use futures::Stream;
use log::*;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    buffer_capacity: usize,
}

impl Manager {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            buffer_capacity: buffer_capacity.max(1),
        }
    }

    /// Opens a stream for `user_id`, replacing any stream they already have on
    /// this instance.
    pub fn subscribe(&self, user_id: UserId) -> Result<Subscription, Error> {
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        let connection_id = self.registry.register(user_id, tx)?;

        Ok(Subscription {
            receiver: rx,
            guard: ConnectionGuard {
                registry: Arc::clone(&self.registry),
                user_id,
                connection_id,
            },
        })
    }

    pub fn send(&self, user_id: &UserId, message: Message) -> Delivery {
        let delivery = self.registry.send(user_id, message);
        if delivery == Delivery::Sent {
            debug!("Delivered SSE message to user {user_id}");
        }
        delivery
    }

    pub fn broadcast(&self, message: Message) -> usize {
        let delivered = self.registry.broadcast(message);
        debug!("Broadcast SSE message to {delivered} connection(s)");
        delivered
    }

    /// Writes a heartbeat to every connection, evicting those that can't take
    /// it. Returns how many are still live.
    pub fn sweep(&self) -> usize {
        let before = self.registry.len();
        let live = self.registry.broadcast(Message::Heartbeat);
        if live < before {
            info!(
                "Heartbeat sweep evicted {} of {before} connection(s)",
                before - live
            );
        } else {
            trace!("Heartbeat sweep: {live} connection(s) live");
        }
        live
    }

    /// Runs [`Manager::sweep`] every `period` until the handle is aborted.
    pub fn spawn_heartbeat(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep();
            }
        })
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.registry.is_connected(user_id)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// Removes its connection from the registry when dropped, unless the entry has
/// since been taken over by a newer connection.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    user_id: UserId,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.unregister(&self.user_id, &self.connection_id) {
            debug!("SSE stream for user {} closed", self.user_id);
        }
    }
}

/// The receiving end of one registered connection.
///
/// Dropping it, directly or by dropping the stream made from it, unregisters
/// the connection right away rather than on the next failed write.
pub struct Subscription {
    receiver: Receiver<Message>,
    guard: ConnectionGuard,
}

impl Subscription {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.guard.connection_id
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Server-sent events for this connection. The stream ends once the
    /// connection is evicted or superseded and its queue has drained.
    pub fn into_stream(self) -> impl Stream<Item = Result<Event, Infallible>> + Send {
        let Subscription {
            mut receiver,
            guard,
        } = self;

        stream! {
            while let Some(message) = receiver.recv().await {
                yield Ok(message.into_event());
            }
            debug!("SSE connection {} ended", guard.connection_id);
        }
    }
}

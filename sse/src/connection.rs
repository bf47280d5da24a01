use crate::error::Error;
use crate::message::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::fmt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

pub type UserId = events::Id;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live connection: the sending half of the queue its stream drains.
/// Dropping the last sender ends the stream.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: Sender<Message>,
}

/// Result of pushing one message at one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the user's stream
    Sent,
    /// The user has no stream on this instance
    NotConnected,
    /// The write failed and the connection was removed
    Evicted,
}

/// Per-instance map from user to their one live stream.
///
/// Every mutation of a user's entry happens inside that key's shard lock, so a
/// registration never interleaves with another registration or an eviction for
/// the same user. Evictions compare the connection id before removing, which
/// keeps a failed write on an old connection from taking out its replacement.
/// Writes never wait: a queue that is full or closed counts as a failed write.
pub struct ConnectionRegistry {
    connections: DashMap<UserId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Installs `sender` as the user's only connection.
    ///
    /// An existing connection is told its session expired (best effort) and is
    /// dropped before the new one goes live; the `connected` handshake is then
    /// queued on the new connection. All of it happens without releasing the
    /// user's entry. If the handshake fails the user ends up with no connection
    /// at all.
    pub fn register(&self, user_id: UserId, sender: Sender<Message>) -> Result<ConnectionId, Error> {
        let connection = Connection {
            id: ConnectionId::new(),
            sender,
        };
        let connection_id = connection.id.clone();

        match self.connections.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                let superseded_id = occupied.get().id.clone();
                if occupied
                    .get()
                    .sender
                    .try_send(Message::SessionExpired)
                    .is_err()
                {
                    debug!("Could not notify superseded connection {superseded_id}");
                }

                if let Err(err) = handshake(&connection) {
                    occupied.remove();
                    info!("Connection {superseded_id} for user {user_id} expired, replacement failed");
                    return Err(err);
                }
                occupied.insert(connection);
                info!(
                    "Connection {superseded_id} for user {user_id} superseded by {connection_id}"
                );
            }
            Entry::Vacant(vacant) => {
                handshake(&connection)?;
                vacant.insert(connection);
                info!("Registered connection {connection_id} for user {user_id}");
            }
        }

        Ok(connection_id)
    }

    /// Removes the user's entry only if it is still `connection_id`.
    pub fn unregister(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, connection| &connection.id == connection_id)
            .is_some();
        if removed {
            info!("Unregistered connection {connection_id} for user {user_id}");
        }
        removed
    }

    /// Queues `message` on the user's connection, evicting it if the queue
    /// won't take it. A user without a connection here is a no-op.
    pub fn send(&self, user_id: &UserId, message: Message) -> Delivery {
        let Some(connection) = self.connections.get(user_id) else {
            trace!("User {user_id} not connected to this instance");
            return Delivery::NotConnected;
        };
        let result = connection.sender.try_send(message);
        let connection_id = connection.id.clone();
        // Release the shard before evicting
        drop(connection);

        self.settle(user_id, &connection_id, result)
    }

    /// Applies send-or-evict to a point-in-time snapshot of every connection.
    /// Returns how many connections took the message.
    pub fn broadcast(&self, message: Message) -> usize {
        let snapshot: Vec<(UserId, Connection)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (user_id, connection) in snapshot {
            let result = connection.sender.try_send(message.clone());
            if self.settle(&user_id, &connection.id, result) == Delivery::Sent {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn connection_id(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.connections.get(user_id).map(|c| c.id.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn settle(
        &self,
        user_id: &UserId,
        connection_id: &ConnectionId,
        result: Result<(), TrySendError<Message>>,
    ) -> Delivery {
        let reason = match result {
            Ok(()) => return Delivery::Sent,
            Err(TrySendError::Full(_)) => "stalled, queue full",
            Err(TrySendError::Closed(_)) => "stream closed",
        };

        if self
            .connections
            .remove_if(user_id, |_, connection| &connection.id == connection_id)
            .is_some()
        {
            info!("Evicted connection {connection_id} for user {user_id}: {reason}");
        }
        Delivery::Evicted
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn handshake(connection: &Connection) -> Result<(), Error> {
    connection
        .sender
        .try_send(Message::Connected {
            connection_id: connection.id.to_string(),
        })
        .map_err(|_| {
            warn!("Handshake failed for connection {}", connection.id);
            Error::HandshakeFailed(connection.id.clone())
        })
}

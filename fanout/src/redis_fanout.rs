use crate::{deliver, encode, Error, FanoutChannel};
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use futures::StreamExt;
use log::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Fanout over Redis pub/sub.
///
/// Publishing shares one `ConnectionManager`, opened on first use, which
/// replaces its connection when the server goes away. A publish that runs into
/// a dropped connection is retried once on the replacement. Each subscription
/// holds its own dedicated connection, as Redis requires, and reconnects with
/// backoff when it drops. Messages published while a subscription is
/// reconnecting are missed; clients recover them from their stored
/// notification history.
#[derive(Clone)]
pub struct RedisFanout {
    client: Client,
    publisher: Arc<OnceCell<ConnectionManager>>,
}

impl RedisFanout {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            publisher: Arc::new(OnceCell::new()),
        }
    }

    async fn publisher(&self) -> Result<ConnectionManager, Error> {
        let conn = self
            .publisher
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|err| Error::Connection(err.to_string()))
            })
            .await?;
        Ok(conn.clone())
    }
}

fn is_disconnect(err: &RedisError) -> bool {
    err.is_connection_dropped() || err.is_io_error()
}

#[async_trait]
impl FanoutChannel for RedisFanout {
    async fn publish(&self, topic: &str, event: &DomainEvent) -> Result<(), Error> {
        let payload = encode(event)?;
        let mut conn = self.publisher().await?;

        let receivers: i64 = match conn.publish(topic, payload.as_str()).await {
            Ok(receivers) => receivers,
            Err(err) if is_disconnect(&err) => {
                warn!("Lost Redis connection publishing to {topic}: {err}, retrying");
                conn.publish(topic, payload.as_str())
                    .await
                    .map_err(|err| Error::Publish(err.to_string()))?
            }
            Err(err) => return Err(Error::Publish(err.to_string())),
        };

        debug!(
            "Published {} event to {topic} ({receivers} subscriber(s))",
            event.kind()
        );
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        let client = self.client.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            let mut delay = INITIAL_RECONNECT_DELAY;
            loop {
                match listen(&client, &topic, handler.as_ref()).await {
                    Ok(()) => {
                        warn!("Subscription to {topic} ended, reconnecting");
                        delay = INITIAL_RECONNECT_DELAY;
                    }
                    Err(err) => {
                        error!("Subscription to {topic} failed: {err}, retrying in {delay:?}");
                    }
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
            }
        })
    }
}

/// Runs one subscription until the server closes the stream. Returns an error
/// only if the subscription could not be set up.
async fn listen(client: &Client, topic: &str, handler: &dyn EventHandler) -> Result<(), Error> {
    let mut pubsub = client
        .get_async_connection()
        .await
        .map_err(|err| Error::Connection(err.to_string()))?
        .into_pubsub();

    pubsub
        .subscribe(topic)
        .await
        .map_err(|err| Error::Subscribe(err.to_string()))?;

    info!("Subscribed to {topic}");

    let mut messages = pubsub.into_on_message();
    while let Some(msg) = messages.next().await {
        match msg.get_payload::<String>() {
            Ok(payload) => deliver(topic, &payload, handler).await,
            Err(err) => warn!("Discarding non-text message on {topic}: {err}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::Id;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::broadcast;

    /// Reads one RESP command (an array of bulk strings).
    async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<Vec<String>> {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            line.clear();
            reader.read_line(&mut line).await.ok()?;
            let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
            let mut buf = vec![0; len + 2];
            reader.read_exact(&mut buf).await.ok()?;
            buf.truncate(len);
            args.push(String::from_utf8_lossy(&buf).into_owned());
        }
        Some(args)
    }

    /// Answers PUBLISH with one receiver and anything else with OK, until the
    /// connection closes or `restart` fires.
    async fn serve(mut socket: TcpStream, mut restart: broadcast::Receiver<()>) {
        let (reader, mut writer) = socket.split();
        let mut reader = BufReader::new(reader);
        loop {
            tokio::select! {
                _ = restart.recv() => return,
                command = read_command(&mut reader) => {
                    let Some(command) = command else { return };
                    let is_publish = command
                        .first()
                        .is_some_and(|name| name.eq_ignore_ascii_case("PUBLISH"));
                    let reply: &[u8] = if is_publish { b":1\r\n" } else { b"+OK\r\n" };
                    if writer.write_all(reply).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// A minimal Redis stand-in. Sending on the returned channel drops every
    /// open connection while the listener keeps accepting new ones.
    async fn fake_redis() -> (String, broadcast::Sender<()>, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("redis://{}", listener.local_addr().unwrap());
        let (restart, _) = broadcast::channel(4);
        let accepted = Arc::new(AtomicUsize::new(0));

        let restart_tx = restart.clone();
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, restart_tx.subscribe()));
            }
        });

        (url, restart, accepted)
    }

    #[tokio::test]
    async fn publishing_recovers_after_the_server_drops_its_connections() {
        let (url, restart, accepted) = fake_redis().await;
        let fanout = RedisFanout::new(Client::open(url).unwrap());
        let event = DomainEvent::review_approved(Id::new_v4());

        fanout.publish("notifications", &event).await.unwrap();

        restart.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut recovered = false;
        for _ in 0..3 {
            if fanout.publish("notifications", &event).await.is_ok() {
                recovered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(recovered, "publishing never recovered after the restart");
        assert!(accepted.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn publishing_without_a_server_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("redis://{}", listener.local_addr().unwrap());
        drop(listener);

        let fanout = RedisFanout::new(Client::open(url).unwrap());
        let result = fanout
            .publish("notifications", &DomainEvent::review_approved(Id::new_v4()))
            .await;

        assert!(matches!(result, Err(Error::Connection(_))));
    }
}

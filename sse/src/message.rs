use axum::response::sse::Event;
use events::DomainEvent;
use log::*;
use serde::Serialize;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

pub const SESSION_EXPIRED_REASON: &str = "Signed in on another device";

/// Everything a notification stream can carry. The stream writes each message as
/// a named server-sent event whose `data` is JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// First message on every stream; its delivery is what makes a connection live
    Connected { connection_id: String },
    /// Liveness ping written by the sweeper
    Heartbeat,
    Notification(DomainEvent),
    /// Last message to a stream replaced by a newer one for the same user
    SessionExpired,
}

#[derive(Serialize)]
struct ConnectedData<'a> {
    connection_id: &'a str,
}

#[derive(Serialize)]
struct SessionExpiredData {
    reason: &'static str,
}

impl EventType for Message {
    fn event_type(&self) -> &'static str {
        match self {
            Message::Connected { .. } => "connected",
            Message::Heartbeat => "heartbeat",
            Message::Notification(_) => "notification",
            Message::SessionExpired => "session-expired",
        }
    }
}

impl Message {
    pub fn data(&self) -> Result<String, serde_json::Error> {
        match self {
            Message::Connected { connection_id } => serde_json::to_string(&ConnectedData {
                connection_id: connection_id.as_str(),
            }),
            Message::Heartbeat => Ok("\"ping\"".to_string()),
            Message::Notification(event) => serde_json::to_string(event),
            Message::SessionExpired => serde_json::to_string(&SessionExpiredData {
                reason: SESSION_EXPIRED_REASON,
            }),
        }
    }

    pub fn into_event(self) -> Event {
        let event = Event::default().event(self.event_type());
        match self.data() {
            Ok(data) => event.data(data),
            Err(e) => {
                error!("Failed to serialize SSE {} message: {e}", self.event_type());
                event.data("null")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::Id;

    #[test]
    fn event_names_match_the_client_contract() {
        assert_eq!(
            Message::Connected {
                connection_id: "c".to_string()
            }
            .event_type(),
            "connected"
        );
        assert_eq!(Message::Heartbeat.event_type(), "heartbeat");
        assert_eq!(
            Message::Notification(DomainEvent::review_approved(Id::new_v4())).event_type(),
            "notification"
        );
        assert_eq!(Message::SessionExpired.event_type(), "session-expired");
    }

    #[test]
    fn notification_data_is_the_tagged_domain_event() {
        let event = DomainEvent::post_deleted(Id::new_v4(), events::PostCategory::FreeTalk);
        let data = Message::Notification(event.clone()).data().unwrap();

        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["type"], "POST_DELETED");
        assert_eq!(serde_json::from_value::<DomainEvent>(value).unwrap(), event);
    }

    #[test]
    fn connected_data_names_the_connection() {
        let data = Message::Connected {
            connection_id: "abc".to_string(),
        }
        .data()
        .unwrap();
        assert_eq!(data, r#"{"connection_id":"abc"}"#);
    }
}

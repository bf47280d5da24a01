use crate::Id;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Discriminator for every [`DomainEvent`] variant. Its string form is the `type`
/// tag used on the fanout wire and in the `notifications.notification_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ReviewApproved,
    ReviewRejected,
    PostCreated,
    PostDeleted,
    CommentCreated,
    ReplyCreated,
    CommentAdded,
    CommentDeleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ReviewApproved => "REVIEW_APPROVED",
            EventKind::ReviewRejected => "REVIEW_REJECTED",
            EventKind::PostCreated => "POST_CREATED",
            EventKind::PostDeleted => "POST_DELETED",
            EventKind::CommentCreated => "COMMENT_CREATED",
            EventKind::ReplyCreated => "REPLY_CREATED",
            EventKind::CommentAdded => "COMMENT_ADDED",
            EventKind::CommentDeleted => "COMMENT_DELETED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anonymous board categories. Carried on post events so clients can filter
/// live list refreshes by the board they are looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostCategory {
    FreeTalk,
    SelfIntro,
    Meetup,
    Gentlemen,
    Ladies,
}

/// Who an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Exactly one user, identified by their user id.
    User(Id),
    /// Every currently connected client.
    Broadcast,
}

/// The `recipient` of a broadcast event. Always `null` on the wire; a missing
/// key is accepted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRecipient;

impl Serialize for NoRecipient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_none()
    }
}

impl<'de> Deserialize<'de> for NoRecipient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<Id>::deserialize(deserializer)? {
            None => Ok(NoRecipient),
            Some(_) => Err(D::Error::custom("broadcast events carry no recipient")),
        }
    }
}

/// Domain events that represent committed, notification-worthy changes.
///
/// Targeted variants carry a `recipient`; broadcast variants carry a `null` one
/// and are delivered to every connected client. The serialized form is tagged with `type`
/// so that any instance receiving it from the fanout channel can decode it back
/// into the right variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    /// An administrator approved the recipient's profile.
    ReviewApproved {
        recipient: Id,
        occurred_at: DateTime<Utc>,
    },
    /// An administrator rejected the recipient's profile.
    ReviewRejected {
        recipient: Id,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    /// A new post was published. Broadcast so open board lists can refresh.
    PostCreated {
        #[serde(default)]
        recipient: NoRecipient,
        post_id: Id,
        category: PostCategory,
        title: String,
        occurred_at: DateTime<Utc>,
    },
    /// A post was soft-deleted. Broadcast so open board lists can drop it.
    PostDeleted {
        #[serde(default)]
        recipient: NoRecipient,
        post_id: Id,
        category: PostCategory,
        occurred_at: DateTime<Utc>,
    },
    /// Someone commented on the recipient's post.
    CommentCreated {
        recipient: Id,
        comment_id: Id,
        post_id: Id,
        post_title: String,
        content: String,
        occurred_at: DateTime<Utc>,
    },
    /// Someone replied to a comment and mentioned the recipient.
    ReplyCreated {
        recipient: Id,
        reply_id: Id,
        post_id: Id,
        post_title: String,
        content: String,
        occurred_at: DateTime<Utc>,
    },
    /// A comment or reply was added. Broadcast for live comment list refresh.
    CommentAdded {
        #[serde(default)]
        recipient: NoRecipient,
        post_id: Id,
        comment_id: Id,
        occurred_at: DateTime<Utc>,
    },
    /// A comment or reply was soft-deleted. Broadcast so clients can mask it.
    CommentDeleted {
        #[serde(default)]
        recipient: NoRecipient,
        post_id: Id,
        comment_id: Id,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn review_approved(recipient: Id) -> Self {
        DomainEvent::ReviewApproved {
            recipient,
            occurred_at: Utc::now(),
        }
    }

    pub fn review_rejected(recipient: Id, reason: impl Into<String>) -> Self {
        DomainEvent::ReviewRejected {
            recipient,
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn post_created(post_id: Id, category: PostCategory, title: impl Into<String>) -> Self {
        DomainEvent::PostCreated {
            recipient: NoRecipient,
            post_id,
            category,
            title: title.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn post_deleted(post_id: Id, category: PostCategory) -> Self {
        DomainEvent::PostDeleted {
            recipient: NoRecipient,
            post_id,
            category,
            occurred_at: Utc::now(),
        }
    }

    pub fn comment_created(
        recipient: Id,
        comment_id: Id,
        post_id: Id,
        post_title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        DomainEvent::CommentCreated {
            recipient,
            comment_id,
            post_id,
            post_title: post_title.into(),
            content: content.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn reply_created(
        recipient: Id,
        reply_id: Id,
        post_id: Id,
        post_title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        DomainEvent::ReplyCreated {
            recipient,
            reply_id,
            post_id,
            post_title: post_title.into(),
            content: content.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn comment_added(post_id: Id, comment_id: Id) -> Self {
        DomainEvent::CommentAdded {
            recipient: NoRecipient,
            post_id,
            comment_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn comment_deleted(post_id: Id, comment_id: Id) -> Self {
        DomainEvent::CommentDeleted {
            recipient: NoRecipient,
            post_id,
            comment_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::ReviewApproved { .. } => EventKind::ReviewApproved,
            DomainEvent::ReviewRejected { .. } => EventKind::ReviewRejected,
            DomainEvent::PostCreated { .. } => EventKind::PostCreated,
            DomainEvent::PostDeleted { .. } => EventKind::PostDeleted,
            DomainEvent::CommentCreated { .. } => EventKind::CommentCreated,
            DomainEvent::ReplyCreated { .. } => EventKind::ReplyCreated,
            DomainEvent::CommentAdded { .. } => EventKind::CommentAdded,
            DomainEvent::CommentDeleted { .. } => EventKind::CommentDeleted,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self {
            DomainEvent::ReviewApproved { recipient, .. }
            | DomainEvent::ReviewRejected { recipient, .. }
            | DomainEvent::CommentCreated { recipient, .. }
            | DomainEvent::ReplyCreated { recipient, .. } => Recipient::User(*recipient),
            DomainEvent::PostCreated { .. }
            | DomainEvent::PostDeleted { .. }
            | DomainEvent::CommentAdded { .. }
            | DomainEvent::CommentDeleted { .. } => Recipient::Broadcast,
        }
    }

    /// The recipient's user id, or `None` for broadcast events.
    pub fn recipient_id(&self) -> Option<Id> {
        match self.recipient() {
            Recipient::User(id) => Some(id),
            Recipient::Broadcast => None,
        }
    }

    /// Whether this event is recorded in the durable notification history before
    /// it is pushed. Broadcast events never are: there is no recipient to index by.
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            DomainEvent::ReviewApproved { .. }
                | DomainEvent::ReviewRejected { .. }
                | DomainEvent::CommentCreated { .. }
                | DomainEvent::ReplyCreated { .. }
        )
    }

    /// Identity of the content that triggered a targeted notification. Together with
    /// the recipient this is the deduplication key of the notification history.
    pub fn content_id(&self) -> Option<Id> {
        match self {
            DomainEvent::CommentCreated { comment_id, .. } => Some(*comment_id),
            DomainEvent::ReplyCreated { reply_id, .. } => Some(*reply_id),
            _ => None,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::ReviewApproved { occurred_at, .. }
            | DomainEvent::ReviewRejected { occurred_at, .. }
            | DomainEvent::PostCreated { occurred_at, .. }
            | DomainEvent::PostDeleted { occurred_at, .. }
            | DomainEvent::CommentCreated { occurred_at, .. }
            | DomainEvent::ReplyCreated { occurred_at, .. }
            | DomainEvent::CommentAdded { occurred_at, .. }
            | DomainEvent::CommentDeleted { occurred_at, .. } => *occurred_at,
        }
    }
}

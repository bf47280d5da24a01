//! Recording and dispatching notifications, and the read side of a user's
//! notification history.

use crate::error::Error;
use async_trait::async_trait;
use entity::notification_type::NotificationType;
use entity::{notifications, Id};
use entity_api::{notification, user};
use events::{DomainEvent, EventHandler};
use fanout::FanoutChannel;
use log::*;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use entity_api::notification::{NewNotification, Page};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// What dispatching one event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the fanout channel
    Published,
    /// Already recorded earlier, so neither stored nor published again
    Duplicate,
    /// Stored if applicable, but the fanout publish failed; the recipient sees it
    /// on their next history fetch
    PublishFailed,
}

/// Turns committed domain events into stored notifications and fanout messages.
///
/// Registered with the [`events::EventPublisher`], so it only ever sees events
/// whose transaction has already committed. Events with a single recipient that
/// belong in their history are recorded first and published only if this call
/// recorded them. Everything else goes straight to the fanout channel.
pub struct NotificationDispatcher {
    db: Arc<DatabaseConnection>,
    fanout: Arc<dyn FanoutChannel>,
    topic: String,
}

impl NotificationDispatcher {
    pub fn new(
        db: Arc<DatabaseConnection>,
        fanout: Arc<dyn FanoutChannel>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            db,
            fanout,
            topic: topic.into(),
        }
    }

    pub async fn dispatch(&self, event: &DomainEvent) -> Result<Outcome, Error> {
        if let Some(new_notification) = to_new_notification(event) {
            // An unknown recipient aborts this notification entirely
            user::find_by_id(self.db.as_ref(), new_notification.user_id).await?;

            if !notification::record_if_absent(self.db.as_ref(), new_notification).await? {
                info!(
                    "Skipping duplicate {} notification for content {:?}",
                    event.kind(),
                    event.content_id()
                );
                return Ok(Outcome::Duplicate);
            }
        }

        match self.fanout.publish(&self.topic, event).await {
            Ok(()) => Ok(Outcome::Published),
            Err(err) => {
                warn!("Failed to publish {} event: {err}", event.kind());
                Ok(Outcome::PublishFailed)
            }
        }
    }
}

#[async_trait]
impl EventHandler for NotificationDispatcher {
    async fn handle(&self, event: &DomainEvent) {
        match self.dispatch(event).await {
            Ok(outcome) => debug!("Dispatched {} event: {outcome:?}", event.kind()),
            Err(err) => error!("Failed to dispatch {} event: {err}", event.kind()),
        }
    }
}

/// The history row an event produces, if it produces one at all.
pub fn to_new_notification(event: &DomainEvent) -> Option<NewNotification> {
    match event {
        DomainEvent::ReviewApproved { recipient, .. } => Some(NewNotification::new(
            *recipient,
            NotificationType::ReviewApproved,
        )),
        DomainEvent::ReviewRejected {
            recipient, reason, ..
        } => Some(NewNotification {
            reason: Some(reason.clone()),
            ..NewNotification::new(*recipient, NotificationType::ReviewRejected)
        }),
        DomainEvent::CommentCreated {
            recipient,
            comment_id,
            post_id,
            post_title,
            content,
            ..
        } => Some(NewNotification {
            post_id: Some(*post_id),
            post_title: Some(post_title.clone()),
            comment_content: Some(content.clone()),
            content_id: Some(*comment_id),
            ..NewNotification::new(*recipient, NotificationType::CommentCreated)
        }),
        DomainEvent::ReplyCreated {
            recipient,
            reply_id,
            post_id,
            post_title,
            content,
            ..
        } => Some(NewNotification {
            post_id: Some(*post_id),
            post_title: Some(post_title.clone()),
            comment_content: Some(content.clone()),
            content_id: Some(*reply_id),
            ..NewNotification::new(*recipient, NotificationType::ReplyCreated)
        }),
        DomainEvent::PostCreated { .. }
        | DomainEvent::PostDeleted { .. }
        | DomainEvent::CommentAdded { .. }
        | DomainEvent::CommentDeleted { .. } => None,
    }
}

/// A page of `user_id`'s notifications, newest first. `page` is zero based;
/// `size` defaults to [`DEFAULT_PAGE_SIZE`] and is clamped to `1..=MAX_PAGE_SIZE`.
pub async fn list(
    db: &DatabaseConnection,
    user_id: Id,
    page: Option<u64>,
    size: Option<u64>,
) -> Result<Page, Error> {
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    Ok(notification::find_by_user_paged(db, user_id, page.unwrap_or(0), size).await?)
}

pub async fn unread_count(db: &DatabaseConnection, user_id: Id) -> Result<u64, Error> {
    Ok(notification::count_unread(db, user_id).await?)
}

pub async fn mark_read(
    db: &DatabaseConnection,
    user_id: Id,
    notification_id: Id,
) -> Result<notifications::Model, Error> {
    Ok(notification::mark_read(db, user_id, notification_id).await?)
}

pub async fn mark_all_read(db: &DatabaseConnection, user_id: Id) -> Result<u64, Error> {
    Ok(notification::mark_all_read(db, user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::PostCategory;

    #[test]
    fn comment_and_reply_notifications_are_keyed_by_their_content() {
        let (recipient, comment_id, post_id) = (Id::new_v4(), Id::new_v4(), Id::new_v4());
        let event = DomainEvent::comment_created(recipient, comment_id, post_id, "t", "hi");

        let new = to_new_notification(&event).unwrap();

        assert_eq!(new.user_id, recipient);
        assert_eq!(new.notification_type, NotificationType::CommentCreated);
        assert_eq!(new.content_id, Some(comment_id));
        assert_eq!(new.post_id, Some(post_id));
        assert_eq!(new.comment_content.as_deref(), Some("hi"));

        let reply_id = Id::new_v4();
        let reply = DomainEvent::reply_created(recipient, reply_id, post_id, "t", "@you");
        assert_eq!(to_new_notification(&reply).unwrap().content_id, Some(reply_id));
    }

    #[test]
    fn review_notifications_carry_the_reason_but_no_content_key() {
        let recipient = Id::new_v4();
        let new =
            to_new_notification(&DomainEvent::review_rejected(recipient, "blurry photo")).unwrap();

        assert_eq!(new.notification_type, NotificationType::ReviewRejected);
        assert_eq!(new.reason.as_deref(), Some("blurry photo"));
        assert_eq!(new.content_id, None);
    }

    #[test]
    fn broadcast_events_are_never_recorded() {
        let (post, comment) = (Id::new_v4(), Id::new_v4());
        for event in [
            DomainEvent::post_created(post, PostCategory::Gentlemen, "hi"),
            DomainEvent::post_deleted(post, PostCategory::Gentlemen),
            DomainEvent::comment_added(post, comment),
            DomainEvent::comment_deleted(post, comment),
        ] {
            assert!(to_new_notification(&event).is_none());
            assert!(!event.is_persisted());
        }
    }

    #[cfg(feature = "mock")]
    mod dispatch {
        use super::*;
        use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
        use crate::unit_of_work::transact;
        use chrono::Utc;
        use entity::users;
        use events::EventPublisher;
        use fanout::InMemoryFanout;
        use futures::future::join_all;
        use sea_orm::{
            ConnectionTrait, DatabaseBackend, MockDatabase, MockExecResult, Statement, Value,
        };
        use sse::{Manager, Message, SseDomainEventHandler};
        use std::collections::BTreeMap;
        use std::time::Duration;
        use tokio::time::timeout;

        const TOPIC: &str = "blind-notifications";

        struct FailingFanout;

        #[async_trait]
        impl FanoutChannel for FailingFanout {
            async fn publish(&self, _topic: &str, _event: &DomainEvent) -> Result<(), fanout::Error> {
                Err(fanout::Error::Connection("connection refused".to_string()))
            }

            fn subscribe(
                &self,
                _topic: &str,
                _handler: Arc<dyn EventHandler>,
            ) -> tokio::task::JoinHandle<()> {
                tokio::spawn(async {})
            }
        }

        fn user(id: Id) -> users::Model {
            let now = Utc::now();
            users::Model {
                id,
                nickname: "moonlight".to_string(),
                created_at: now.into(),
                updated_at: now.into(),
            }
        }

        fn stored(user_id: Id, content_id: Id) -> notifications::Model {
            notifications::Model {
                id: Id::new_v4(),
                user_id,
                notification_type: NotificationType::CommentCreated,
                is_read: false,
                post_id: Some(Id::new_v4()),
                post_title: Some("t".to_string()),
                comment_content: Some("hi".to_string()),
                content_id: Some(content_id),
                reason: None,
                created_at: Utc::now().into(),
            }
        }

        fn inserted(rows_affected: u64) -> MockExecResult {
            MockExecResult {
                last_insert_id: 0,
                rows_affected,
            }
        }

        fn dispatcher(db: DatabaseConnection, fanout: Arc<dyn FanoutChannel>) -> NotificationDispatcher {
            NotificationDispatcher::new(Arc::new(db), fanout, TOPIC)
        }

        #[tokio::test]
        async fn new_comment_is_recorded_then_published() {
            let recipient = Id::new_v4();
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(vec![vec![user(recipient)]])
                .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                .append_exec_results(vec![inserted(1)])
                .into_connection();
            let fanout = Arc::new(InMemoryFanout::new());
            let event =
                DomainEvent::comment_created(recipient, Id::new_v4(), Id::new_v4(), "t", "hi");

            let outcome = dispatcher(db, fanout.clone()).dispatch(&event).await.unwrap();

            assert_eq!(outcome, Outcome::Published);
            assert_eq!(fanout.published_to(TOPIC).await, vec![event]);
        }

        #[tokio::test]
        async fn repeated_comment_is_neither_recorded_nor_published_again() {
            let recipient = Id::new_v4();
            let comment_id = Id::new_v4();
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                // first dispatch
                .append_query_results(vec![vec![user(recipient)]])
                .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                .append_exec_results(vec![inserted(1)])
                // second dispatch finds the row
                .append_query_results(vec![vec![user(recipient)]])
                .append_query_results(vec![vec![stored(recipient, comment_id)]])
                .into_connection();
            let fanout = Arc::new(InMemoryFanout::new());
            let dispatcher = dispatcher(db, fanout.clone());
            let event = DomainEvent::comment_created(recipient, comment_id, Id::new_v4(), "t", "hi");

            assert_eq!(dispatcher.dispatch(&event).await.unwrap(), Outcome::Published);
            assert_eq!(dispatcher.dispatch(&event).await.unwrap(), Outcome::Duplicate);

            assert_eq!(fanout.published().await.len(), 1);
        }

        #[tokio::test]
        async fn losing_the_insert_race_is_a_silent_duplicate() {
            let recipient = Id::new_v4();
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(vec![vec![user(recipient)]])
                .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                .append_exec_results(vec![inserted(0)])
                .into_connection();
            let fanout = Arc::new(InMemoryFanout::new());
            let event =
                DomainEvent::reply_created(recipient, Id::new_v4(), Id::new_v4(), "t", "@you");

            let outcome = dispatcher(db, fanout.clone()).dispatch(&event).await.unwrap();

            assert_eq!(outcome, Outcome::Duplicate);
            assert!(fanout.published().await.is_empty());
        }

        #[tokio::test]
        async fn unknown_recipient_aborts_recording_and_publishing() {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results::<users::Model, Vec<_>, _>(vec![vec![]])
                .into_connection();
            let fanout = Arc::new(InMemoryFanout::new());

            let err = dispatcher(db, fanout.clone())
                .dispatch(&DomainEvent::review_approved(Id::new_v4()))
                .await
                .unwrap_err();

            assert_eq!(
                err.error_kind,
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
            );
            assert!(fanout.published().await.is_empty());
        }

        #[tokio::test]
        async fn broadcast_is_published_without_touching_the_database() {
            let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
            let fanout = Arc::new(InMemoryFanout::new());
            let dispatcher = dispatcher(db, fanout.clone());
            let event = DomainEvent::post_created(Id::new_v4(), PostCategory::Meetup, "picnic");

            assert_eq!(dispatcher.dispatch(&event).await.unwrap(), Outcome::Published);
            assert_eq!(fanout.published().await, vec![event]);
        }

        #[tokio::test]
        async fn publish_failure_is_swallowed_after_recording() {
            let recipient = Id::new_v4();
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(vec![vec![user(recipient)]])
                .append_exec_results(vec![inserted(1)])
                .into_connection();

            let outcome = dispatcher(db, Arc::new(FailingFanout))
                .dispatch(&DomainEvent::review_approved(recipient))
                .await
                .unwrap();

            assert_eq!(outcome, Outcome::PublishFailed);
        }

        async fn commit_comment(
            db: &DatabaseConnection,
            publisher: &EventPublisher,
            event: DomainEvent,
        ) -> Result<(), Error> {
            transact(db, publisher, move |txn, pending| {
                Box::pin(async move {
                    txn.execute(Statement::from_string(
                        DatabaseBackend::Postgres,
                        "INSERT INTO blind.comments DEFAULT VALUES",
                    ))
                    .await?;
                    pending.stage(event);
                    Ok::<_, Error>(())
                })
            })
            .await
        }

        #[tokio::test]
        async fn racing_dispatches_of_one_comment_publish_it_once() {
            const INSTANCES: usize = 8;
            let recipient = Id::new_v4();
            let fanout = Arc::new(InMemoryFanout::new());
            // Every racer gets past the existence check; the unique constraint
            // lets exactly one insert through.
            let dispatchers: Vec<NotificationDispatcher> = (0..INSTANCES)
                .map(|i| {
                    let db = MockDatabase::new(DatabaseBackend::Postgres)
                        .append_query_results(vec![vec![user(recipient)]])
                        .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                        .append_exec_results(vec![inserted(u64::from(i == 0))])
                        .into_connection();
                    dispatcher(db, fanout.clone())
                })
                .collect();
            let event =
                DomainEvent::comment_created(recipient, Id::new_v4(), Id::new_v4(), "t", "hi");

            let outcomes = join_all(dispatchers.iter().map(|d| d.dispatch(&event))).await;

            let outcomes: Vec<Outcome> = outcomes.into_iter().map(Result::unwrap).collect();
            let published = outcomes.iter().filter(|o| **o == Outcome::Published).count();
            let duplicates = outcomes.iter().filter(|o| **o == Outcome::Duplicate).count();
            assert_eq!(published, 1);
            assert_eq!(duplicates, INSTANCES - 1);
            assert_eq!(fanout.published().await, vec![event]);
        }

        #[tokio::test]
        async fn committed_comment_reaches_the_recipients_stream_exactly_once() {
            let recipient = Id::new_v4();
            let comment_id = Id::new_v4();
            let post_id = Id::new_v4();

            let notifications_db = MockDatabase::new(DatabaseBackend::Postgres)
                // first commit
                .append_query_results(vec![vec![user(recipient)]])
                .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                .append_exec_results(vec![inserted(1)])
                // the same comment committed again
                .append_query_results(vec![vec![user(recipient)]])
                .append_query_results(vec![vec![stored(recipient, comment_id)]])
                .into_connection();
            let fanout = Arc::new(InMemoryFanout::new());
            let manager = Arc::new(Manager::default());
            let _subscriber =
                fanout.subscribe(TOPIC, Arc::new(SseDomainEventHandler::new(manager.clone())));
            let publisher = EventPublisher::new()
                .with_handler(Arc::new(dispatcher(notifications_db, fanout.clone())));

            let mut stream = manager.subscribe(recipient).unwrap();
            assert!(matches!(stream.recv().await, Some(Message::Connected { .. })));

            let business_db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results(vec![inserted(1), inserted(1)])
                .into_connection();
            let event = DomainEvent::comment_created(recipient, comment_id, post_id, "t", "hi");

            commit_comment(&business_db, &publisher, event.clone()).await.unwrap();
            let delivered = timeout(Duration::from_secs(1), stream.recv()).await.unwrap();
            assert_eq!(delivered, Some(Message::Notification(event.clone())));

            commit_comment(&business_db, &publisher, event.clone()).await.unwrap();
            assert!(timeout(Duration::from_millis(200), stream.recv()).await.is_err());
            assert_eq!(fanout.published().await.len(), 1);
        }

        #[tokio::test]
        async fn list_clamps_the_page_size() {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(vec![vec![BTreeMap::from([(
                    "num_items",
                    Value::BigInt(Some(0)),
                )])]])
                .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                .into_connection();

            let page = list(&db, Id::new_v4(), None, Some(1000)).await.unwrap();

            assert_eq!(page.size, MAX_PAGE_SIZE);
            assert_eq!(page.page, 0);
            assert!(page.items.is_empty());
        }

        #[tokio::test]
        async fn mark_read_of_someone_elses_notification_is_not_found() {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results::<notifications::Model, Vec<_>, _>(vec![vec![]])
                .into_connection();

            let err = mark_read(&db, Id::new_v4(), Id::new_v4()).await.unwrap_err();

            assert!(err.is_not_found());
        }
    }
}

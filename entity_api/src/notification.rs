use super::error::{EntityApiErrorKind, Error};
use chrono::Utc;
use entity::notification_type::NotificationType;
use entity::notifications::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, OnConflict},
    ActiveValue::{Set, Unchanged},
    ConnectionTrait, QueryOrder, TryIntoModel,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Fields of a notification about to be recorded. Id, read flag and timestamp are
/// assigned on insert.
#[derive(Clone, Debug, PartialEq)]
pub struct NewNotification {
    pub user_id: Id,
    pub notification_type: NotificationType,
    pub post_id: Option<Id>,
    pub post_title: Option<String>,
    pub comment_content: Option<String>,
    pub content_id: Option<Id>,
    pub reason: Option<String>,
}

impl NewNotification {
    pub fn new(user_id: Id, notification_type: NotificationType) -> Self {
        Self {
            user_id,
            notification_type,
            post_id: None,
            post_title: None,
            comment_content: None,
            content_id: None,
            reason: None,
        }
    }
}

/// One page of a user's notification history, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Page {
    pub items: Vec<Model>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

/// Records `notification` unless one already exists for the same user and
/// triggering content. Returns `true` only when this call inserted the row.
///
/// The existence check is only a fast path. Two concurrent callers can both get
/// past it, so the insert itself is `ON CONFLICT DO NOTHING` against the
/// `(user_id, content_id)` unique constraint, and a unique violation that still
/// surfaces is read as "already recorded" as well.
///
/// Notifications without a `content_id` are always recorded.
pub async fn record_if_absent(
    db: &impl ConnectionTrait,
    notification: NewNotification,
) -> Result<bool, Error> {
    if let Some(content_id) = notification.content_id {
        if exists_by_user_and_content(db, notification.user_id, content_id).await? {
            debug!(
                "Notification for user {} and content {content_id} already recorded",
                notification.user_id
            );
            return Ok(false);
        }
    }

    let user_id = notification.user_id;
    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        user_id: Set(notification.user_id),
        notification_type: Set(notification.notification_type),
        is_read: Set(false),
        post_id: Set(notification.post_id),
        post_title: Set(notification.post_title),
        comment_content: Set(notification.comment_content),
        content_id: Set(notification.content_id),
        reason: Set(notification.reason),
        created_at: Set(Utc::now().into()),
    };

    let result = Entity::insert(active_model)
        .on_conflict(
            OnConflict::columns([Column::UserId, Column::ContentId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(0) => {
            debug!("Concurrent insert already recorded notification for user {user_id}");
            Ok(false)
        }
        Ok(_) => Ok(true),
        Err(err) => {
            let err: Error = err.into();
            if err.error_kind == EntityApiErrorKind::DuplicateRecord {
                debug!("Unique constraint rejected duplicate notification for user {user_id}");
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

pub async fn exists_by_user_and_content(
    db: &impl ConnectionTrait,
    user_id: Id,
    content_id: Id,
) -> Result<bool, Error> {
    Ok(Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ContentId.eq(content_id))
        .one(db)
        .await?
        .is_some())
}

/// `page` is zero based.
pub async fn find_by_user_paged(
    db: &impl ConnectionTrait,
    user_id: Id,
    page: u64,
    size: u64,
) -> Result<Page, Error> {
    let paginator = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .paginate(db, size);

    let total = paginator.num_items().await?;
    // Pages past the end are empty without querying for them
    let items = match page.checked_mul(size) {
        Some(offset) if offset < total => paginator.fetch_page(page).await?,
        _ => Vec::new(),
    };

    Ok(Page {
        items,
        page,
        size,
        total,
    })
}

pub async fn count_unread(db: &impl ConnectionTrait, user_id: Id) -> Result<u64, Error> {
    Ok(Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::IsRead.eq(false))
        .count(db)
        .await?)
}

/// Marks a single notification read. A notification owned by someone else is
/// reported as not found.
pub async fn mark_read(db: &impl ConnectionTrait, user_id: Id, id: Id) -> Result<Model, Error> {
    let existing = Entity::find_by_id(id)
        .filter(Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(Error::not_found)?;

    if existing.is_read {
        return Ok(existing);
    }

    debug!("Marking notification {id} read for user {user_id}");

    let active_model = ActiveModel {
        id: Unchanged(existing.id),
        user_id: Unchanged(existing.user_id),
        notification_type: Unchanged(existing.notification_type),
        is_read: Set(true),
        post_id: Unchanged(existing.post_id),
        post_title: Unchanged(existing.post_title),
        comment_content: Unchanged(existing.comment_content),
        content_id: Unchanged(existing.content_id),
        reason: Unchanged(existing.reason),
        created_at: Unchanged(existing.created_at),
    };

    Ok(active_model.update(db).await?.try_into_model()?)
}

/// Returns how many notifications flipped from unread to read.
pub async fn mark_all_read(db: &impl ConnectionTrait, user_id: Id) -> Result<u64, Error> {
    let result = Entity::update_many()
        .col_expr(Column::IsRead, Expr::value(true))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::IsRead.eq(false))
        .exec(db)
        .await?;

    debug!(
        "Marked {} notification(s) read for user {user_id}",
        result.rows_affected
    );

    Ok(result.rows_affected)
}

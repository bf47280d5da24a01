use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Discriminator column of the single `notifications` table. Only targeted
/// events that are kept in the recipient's history have a value here.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Serialize, DeriveActiveEnum, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "notification_type"
)]
pub enum NotificationType {
    /// The recipient's profile passed review
    #[sea_orm(string_value = "REVIEW_APPROVED")]
    ReviewApproved,
    /// The recipient's profile was rejected, see `reason`
    #[sea_orm(string_value = "REVIEW_REJECTED")]
    ReviewRejected,
    /// Someone commented on the recipient's post
    #[sea_orm(string_value = "COMMENT_CREATED")]
    CommentCreated,
    /// Someone mentioned the recipient in a reply
    #[sea_orm(string_value = "REPLY_CREATED")]
    ReplyCreated,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::ReviewApproved => write!(fmt, "REVIEW_APPROVED"),
            NotificationType::ReviewRejected => write!(fmt, "REVIEW_REJECTED"),
            NotificationType::CommentCreated => write!(fmt, "COMMENT_CREATED"),
            NotificationType::ReplyCreated => write!(fmt, "REPLY_CREATED"),
        }
    }
}

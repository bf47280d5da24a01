use crate::notification_type::NotificationType;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row of a user's notification history.
///
/// Every notification kind shares this table; `notification_type` tells them apart
/// and the display fields that don't apply to a kind stay `NULL`.
/// `(user_id, content_id)` is unique, which is what makes recording a comment or
/// reply notification idempotent.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(schema_name = "blind", table_name = "notifications")]
#[schema(as = notifications::Model)]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub user_id: Id,
    pub notification_type: NotificationType,
    pub is_read: bool,
    #[schema(value_type = Option<Uuid>)]
    pub post_id: Option<Id>,
    pub post_title: Option<String>,
    pub comment_content: Option<String>,
    /// The comment or reply that triggered this notification.
    #[schema(value_type = Option<Uuid>)]
    pub content_id: Option<Id>,
    pub reason: Option<String>,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

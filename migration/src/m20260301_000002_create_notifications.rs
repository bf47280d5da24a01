use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE TYPE blind.notification_type AS ENUM \
                 ('REVIEW_APPROVED', 'REVIEW_REJECTED', 'COMMENT_CREATED', 'REPLY_CREATED')",
            )
            .await?;

        // One table for every kind; columns a kind doesn't use stay NULL.
        // UNIQUE(user_id, content_id) is the last line of defence against two
        // dispatchers recording the same comment or reply concurrently. Review
        // notifications have no content_id and NULLs never collide.
        let create_table_sql = r#"
            CREATE TABLE IF NOT EXISTS blind.notifications (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES blind.users(id) ON DELETE CASCADE,
                notification_type blind.notification_type NOT NULL,
                is_read BOOLEAN NOT NULL DEFAULT FALSE,

                post_id UUID,
                post_title VARCHAR(255),
                comment_content TEXT,
                content_id UUID,
                reason TEXT,

                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                UNIQUE(user_id, content_id)
            )
        "#;

        manager
            .get_connection()
            .execute_unprepared(create_table_sql)
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_notifications_user_created_at
                 ON blind.notifications(user_id, created_at DESC)",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_notifications_user_unread
                 ON blind.notifications(user_id) WHERE is_read = FALSE",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS blind.notifications")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS blind.notification_type")
            .await?;

        Ok(())
    }
}

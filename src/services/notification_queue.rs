use log::info;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

const PASSWORD_RESET_TEMPLATE: &str = "password_reset";

/// Outbox for user-facing notifications. Rows are picked up and delivered by
/// an external worker; this service only enqueues.
#[derive(Clone)]
pub struct NotificationQueue {
    db_pool: PgPool,
}

impl NotificationQueue {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn queue_password_reset(
        &self,
        user_id: &Uuid,
        email: &str,
        code: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_notifications (id, recipient, template, payload, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(PASSWORD_RESET_TEMPLATE)
        .bind(serde_json::json!({ "code": code, "userId": user_id }))
        .execute(&self.db_pool)
        .await?;

        info!("Queued password reset notification for user {}", user_id);
        Ok(())
    }
}

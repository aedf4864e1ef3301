use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Stores notifications and emits the delivery event that the push/email
/// workers pick up. Dispatch is fire and forget: a failed notification is
/// logged and never affects the caller's flow.
#[derive(Clone)]
pub struct Notifier {
    pool: DbPool,
}

impl Notifier {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn dispatch(
        &self,
        user_id: Option<Uuid>,
        title: impl Into<String>,
        body: impl Into<String>,
        data: Option<Value>,
    ) {
        let pool = self.pool.clone();
        let title = title.into();
        let body = body.into();
        tokio::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO notifications (id, user_id, title, body, data)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&title)
            .bind(&body)
            .bind(data)
            .execute(&pool)
            .await;

            match result {
                Ok(_) => tracing::info!(user_id = ?user_id, title = %title, "notification queued"),
                Err(err) => {
                    tracing::warn!(error = %err, title = %title, "notification insert failed")
                }
            }
        });
    }
}

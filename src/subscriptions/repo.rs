use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::SubscriptionEntry;
use crate::db::DbResult;
use crate::users::repo_types::profile_columns;

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Insert the pair unless it exists; `Some(id)` only when a row was created.
    async fn insert_if_absent(&self, subscriber: Uuid, channel: Uuid) -> DbResult<Option<Uuid>>;

    /// `true` when a row was removed.
    async fn delete(&self, subscriber: Uuid, channel: Uuid) -> DbResult<bool>;

    /// Subscribers of `channel`, oldest subscription first.
    async fn channel_subscribers(&self, channel: Uuid) -> DbResult<Vec<SubscriptionEntry>>;

    /// Channels `subscriber` follows, oldest subscription first.
    async fn subscribed_channels(&self, subscriber: Uuid) -> DbResult<Vec<SubscriptionEntry>>;
}

#[derive(Clone)]
pub struct PgSubscriptionRepo {
    db: PgPool,
}

impl PgSubscriptionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionRepo for PgSubscriptionRepo {
    async fn insert_if_absent(&self, subscriber: Uuid, channel: Uuid) -> DbResult<Option<Uuid>> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO subscriptions (id, subscriber_id, channel_id, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (subscriber_id, channel_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(subscriber)
        .bind(channel)
        .fetch_optional(&self.db)
        .await?;
        Ok(inserted.map(|(id,)| id))
    }

    async fn delete(&self, subscriber: Uuid, channel: Uuid) -> DbResult<bool> {
        let affected = sqlx::query(
            "DELETE FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2",
        )
        .bind(subscriber)
        .bind(channel)
        .execute(&self.db)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn channel_subscribers(&self, channel: Uuid) -> DbResult<Vec<SubscriptionEntry>> {
        let rows = sqlx::query_as::<_, SubscriptionEntry>(&format!(
            r#"
            SELECT {}, s.created_at AS subscribed_at
            FROM subscriptions s
            JOIN users u ON u.id = s.subscriber_id
            WHERE s.channel_id = $1
            ORDER BY s.created_at ASC, s.id ASC
            "#,
            profile_columns("u")
        ))
        .bind(channel)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn subscribed_channels(&self, subscriber: Uuid) -> DbResult<Vec<SubscriptionEntry>> {
        let rows = sqlx::query_as::<_, SubscriptionEntry>(&format!(
            r#"
            SELECT {}, s.created_at AS subscribed_at
            FROM subscriptions s
            JOIN users u ON u.id = s.channel_id
            WHERE s.subscriber_id = $1
            ORDER BY s.created_at ASC, s.id ASC
            "#,
            profile_columns("u")
        ))
        .bind(subscriber)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

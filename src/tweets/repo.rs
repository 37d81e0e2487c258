use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Tweet, TweetWithOwner, TWEET_COLUMNS};
use crate::db::DbResult;
use crate::users::repo_types::profile_columns;

#[async_trait]
pub trait TweetRepo: Send + Sync {
    async fn create(&self, owner: Uuid, content: &str) -> DbResult<Tweet>;

    async fn update_content(&self, id: Uuid, content: &str) -> DbResult<Option<Tweet>>;

    /// Tweets of `owner`, newest first.
    async fn list_by_owner(&self, owner: Uuid) -> DbResult<Vec<TweetWithOwner>>;
}

#[derive(Clone)]
pub struct PgTweetRepo {
    db: PgPool,
}

impl PgTweetRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TweetRepo for PgTweetRepo {
    async fn create(&self, owner: Uuid, content: &str) -> DbResult<Tweet> {
        let tweet = sqlx::query_as::<_, Tweet>(&format!(
            "INSERT INTO tweets AS t (content, owner_id) VALUES ($1, $2) RETURNING {}",
            TWEET_COLUMNS
        ))
        .bind(content)
        .bind(owner)
        .fetch_one(&self.db)
        .await?;
        Ok(tweet)
    }

    async fn update_content(&self, id: Uuid, content: &str) -> DbResult<Option<Tweet>> {
        let tweet = sqlx::query_as::<_, Tweet>(&format!(
            r#"
            UPDATE tweets AS t
               SET content = $2, updated_at = now()
             WHERE t.id = $1
            RETURNING {}
            "#,
            TWEET_COLUMNS
        ))
        .bind(id)
        .bind(content)
        .fetch_optional(&self.db)
        .await?;
        Ok(tweet)
    }

    async fn list_by_owner(&self, owner: Uuid) -> DbResult<Vec<TweetWithOwner>> {
        let rows = sqlx::query_as::<_, TweetWithOwner>(&format!(
            r#"
            SELECT {}, {}
            FROM tweets t
            JOIN users o ON o.id = t.owner_id
            WHERE t.owner_id = $1
            ORDER BY t.created_at DESC, t.id DESC
            "#,
            TWEET_COLUMNS,
            profile_columns("o")
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

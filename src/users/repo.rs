use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{profile_columns, ChannelProfile, NewUser, User};
use crate::db::DbResult;
use crate::videos::repo_types::{VideoWithOwner, VIDEO_COLUMNS};

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, avatar_url, \
     avatar_public_id, cover_image_url, cover_image_public_id, watch_history, refresh_token, \
     created_at, updated_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>>;

    /// First user whose username or email matches, preferring the username.
    async fn find_by_username_or_email(&self, username: &str, email: &str)
        -> DbResult<Option<User>>;

    async fn create(&self, new: NewUser) -> DbResult<User>;

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> DbResult<()>;

    /// Swap the stored refresh token only if it still equals `expected`.
    async fn rotate_refresh_token(&self, id: Uuid, expected: &str, next: &str) -> DbResult<bool>;

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> DbResult<()>;

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<Option<User>>;

    async fn set_avatar(&self, id: Uuid, url: &str, public_id: &str) -> DbResult<Option<User>>;

    async fn set_cover_image(&self, id: Uuid, url: &str, public_id: &str)
        -> DbResult<Option<User>>;

    async fn channel_profile(&self, username: &str, viewer: Uuid)
        -> DbResult<Option<ChannelProfile>>;

    /// Watched videos in watch order, each with its owner's public fields.
    async fn watch_history(&self, id: Uuid) -> DbResult<Vec<VideoWithOwner>>;

    /// Append to the watch history, moving an already watched video to the end.
    async fn record_watch(&self, id: Uuid, video_id: Uuid) -> DbResult<()>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE username = $1 OR email = $2
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#,
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, full_name, password_hash,
                               avatar_url, avatar_public_id, cover_image_url, cover_image_public_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new.id)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.password_hash)
        .bind(&new.avatar_url)
        .bind(&new.avatar_public_id)
        .bind(&new.cover_image_url)
        .bind(&new.cover_image_public_id)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn rotate_refresh_token(&self, id: Uuid, expected: &str, next: &str) -> DbResult<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token = $3, updated_at = now()
             WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(&self.db)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET full_name = COALESCE($2, full_name),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_avatar(&self, id: Uuid, url: &str, public_id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET avatar_url = $2, avatar_public_id = $3, updated_at = now()
             WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(url)
        .bind(public_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_cover_image(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET cover_image_url = $2, cover_image_public_id = $3, updated_at = now()
             WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(url)
        .bind(public_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> DbResult<Option<ChannelProfile>> {
        let profile = sqlx::query_as::<_, ChannelProfile>(
            r#"
            SELECT u.id, u.username, u.email, u.full_name,
                   u.avatar_url AS avatar, u.cover_image_url AS cover_image,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                       AS subscribers_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                       AS channels_subscribed_to_count,
                   EXISTS (SELECT 1 FROM subscriptions s
                            WHERE s.channel_id = u.id AND s.subscriber_id = $2)
                       AS is_subscribed
            FROM users u
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .bind(viewer)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn watch_history(&self, id: Uuid) -> DbResult<Vec<VideoWithOwner>> {
        let rows = sqlx::query_as::<_, VideoWithOwner>(&format!(
            r#"
            SELECT {}, {}
            FROM users u
            CROSS JOIN LATERAL unnest(u.watch_history) WITH ORDINALITY AS h(video_id, pos)
            JOIN videos v ON v.id = h.video_id
            JOIN users o ON o.id = v.owner_id
            WHERE u.id = $1
            ORDER BY h.pos
            "#,
            VIDEO_COLUMNS,
            profile_columns("o")
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn record_watch(&self, id: Uuid, video_id: Uuid) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET watch_history = array_append(array_remove(watch_history, $2), $2)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(video_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String, // Argon2 hash, never serialized
    pub avatar_url: String,
    pub avatar_public_id: String,
    pub cover_image_url: Option<String>,
    pub cover_image_public_id: Option<String>,
    pub watch_history: Vec<Uuid>,
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// What the API may show of a user: no password hash, no refresh token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub watch_history: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            avatar: u.avatar_url,
            cover_image: u.cover_image_url,
            watch_history: u.watch_history,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub avatar_public_id: String,
    pub cover_image_url: Option<String>,
    pub cover_image_public_id: Option<String>,
}

/// Public fields of a user joined onto another record. Columns are read
/// with a `profile_` prefix, see [`profile_columns`].
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    #[sqlx(rename = "profile_id")]
    pub id: Uuid,
    #[sqlx(rename = "profile_username")]
    pub username: String,
    #[sqlx(rename = "profile_email")]
    pub email: String,
    #[sqlx(rename = "profile_full_name")]
    pub full_name: String,
    #[sqlx(rename = "profile_avatar")]
    pub avatar: String,
    #[sqlx(rename = "profile_cover_image")]
    pub cover_image: Option<String>,
}

impl From<&User> for PublicProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            avatar: u.avatar_url.clone(),
            cover_image: u.cover_image_url.clone(),
        }
    }
}

/// SELECT list for a [`PublicProfile`] read from the users table aliased `alias`.
pub fn profile_columns(alias: &str) -> String {
    format!(
        "{a}.id AS profile_id, {a}.username AS profile_username, {a}.email AS profile_email, \
         {a}.full_name AS profile_full_name, {a}.avatar_url AS profile_avatar, \
         {a}.cover_image_url AS profile_cover_image",
        a = alias
    )
}

/// A user seen as a channel by some viewer.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::PublicProfile;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: Uuid,
    pub content: String,
    #[serde(rename = "owner")]
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub const TWEET_COLUMNS: &str = "t.id, t.content, t.owner_id, t.created_at, t.updated_at";

/// A tweet with its author's public fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TweetWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tweet: Tweet,
    #[sqlx(flatten)]
    #[serde(rename = "ownerDetails")]
    pub owner: PublicProfile,
}

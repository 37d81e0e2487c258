use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::PublicProfile;

/// Video record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "videoFile")]
    pub video_url: String,
    pub video_public_id: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    pub thumbnail_public_id: String,
    pub duration: f64, // seconds, two decimals
    pub is_published: bool,
    #[serde(rename = "owner")]
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub const VIDEO_COLUMNS: &str = "v.id, v.title, v.description, v.video_url, v.video_public_id, \
     v.thumbnail_url, v.thumbnail_public_id, v.duration, v.is_published, v.owner_id, \
     v.created_at, v.updated_at";

/// A video with its owner's public fields attached.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VideoWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub video: Video,
    #[sqlx(flatten)]
    #[serde(rename = "ownerDetails")]
    pub owner: PublicProfile,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub video_public_id: String,
    pub thumbnail_url: String,
    pub thumbnail_public_id: String,
    pub duration: f64,
    pub owner_id: Uuid,
}

/// Fields of a video that an update may change; `None` leaves a column as is.
#[derive(Debug, Clone, Default)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_public_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Duration,
}

impl SortField {
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "duration" => Some(SortField::Duration),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "v.created_at",
            SortField::UpdatedAt => "v.updated_at",
            SortField::Title => "v.title",
            SortField::Duration => "v.duration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" | "1" => Some(SortOrder::Asc),
            "desc" | "-1" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A validated listing request.
#[derive(Debug, Clone)]
pub struct VideoListQuery {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub owner: Option<Uuid>,
}

impl VideoListQuery {
    /// Rows to skip; `None` when the page lies beyond any addressable row.
    pub fn offset(&self) -> Option<i64> {
        self.page
            .checked_sub(1)
            .and_then(|p| p.checked_mul(self.limit))
            .filter(|o| *o >= 0)
    }

    /// `ILIKE` pattern matching the search text literally anywhere.
    pub fn like_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }

    pub fn order_by(&self) -> String {
        let dir = self.sort_order.sql();
        format!("{} {}, v.id {}", self.sort_by.column(), dir, dir)
    }
}

//! Keeps spooled uploads and remote objects in lock-step.

mod probe;
pub mod services;
pub mod temp;

use thiserror::Error;

pub use services::MediaOrchestrator;
pub use temp::{MultipartForm, TempUpload};

#[derive(Debug, Error)]
pub enum MediaError {
    /// The client sent something that cannot be stored (empty, wrong type).
    #[error("{0}")]
    InvalidFile(String),

    #[error("remote store failure: {0}")]
    Remote(anyhow::Error),

    #[error("temp file i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// Thumbnail content types accepted by publish and update.
pub const THUMBNAIL_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

pub fn is_accepted_thumbnail(content_type: &str) -> bool {
    THUMBNAIL_TYPES.contains(&content_type)
}

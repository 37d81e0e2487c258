use serde::Deserialize;
use validator::Validate;

use crate::validation::not_blank;

/// Body of both create and update.
#[derive(Debug, Deserialize, Validate)]
pub struct TweetRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "content is required"))]
    pub content: String,
}

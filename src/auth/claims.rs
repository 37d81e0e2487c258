use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two session tokens a JWT is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    /// Random per token, so two pairs issued in the same second still differ.
    pub jti: Uuid,
    pub kind: TokenKind,
}

//! Request contracts: decoding plus `validator` rules, failing with one
//! InvalidArgument that lists every bad field.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid(e.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::invalid(e.body_text()))?;
        value.validate()?;
        Ok(ValidQuery(value))
    }
}

/// Parse a path identifier, naming the entity in the error.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::invalid(format!("{} id is invalid", what)))
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

pub fn valid_email(value: &str) -> Result<(), ValidationError> {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

pub fn valid_username(value: &str) -> Result<(), ValidationError> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.]{3,32}$").unwrap();
    }
    if USERNAME_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("username"))
    }
}

/// Trimmed, non-empty text or `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_malformed() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "video").unwrap(), id);
        let err = parse_id("64f1c2e9a1b2c3d4e5f60718", "channel").unwrap_err();
        assert_eq!(err.to_string(), "channel id is invalid");
    }

    #[test]
    fn rule_helpers() {
        assert!(not_blank("  x ").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(valid_email("a@b.io").is_ok());
        assert!(valid_email("no-at-sign").is_err());
        assert!(valid_username("cat_lover.9").is_ok());
        assert!(valid_username("ab").is_err());
        assert!(valid_username("has space").is_err());
        assert_eq!(non_blank(Some("  hi ".into())).as_deref(), Some("hi"));
        assert_eq!(non_blank(Some("   ".into())), None);
    }
}

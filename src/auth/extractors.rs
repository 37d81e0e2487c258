use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use super::{jwt::JwtKeys, ACCESS_COOKIE};
use crate::error::ApiError;

/// Authenticated caller, taken from the `accessToken` cookie or a bearer header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = access_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired access token");
            ApiError::unauthorized("Invalid or expired access token")
        })?;

        Ok(AuthUser(claims.sub))
    }
}

fn access_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(c) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(c.value().to_string());
    }

    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::db::DbError;
use crate::media::MediaError;

/// One failing input field of a request contract.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Flatten `validator` output into a stable, field-sorted list.
    pub fn collect(result: Result<(), validator::ValidationErrors>) -> Vec<FieldError> {
        let Err(errors) = result else {
            return Vec::new();
        };
        let mut out: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = wire_name(field);
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field));
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        out.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
        out
    }
}

/// `validator` reports Rust field names; clients send camelCase.
fn wire_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
    success: bool,
    errors: Vec<FieldError>,
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::InvalidArgument(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match self {
            ApiError::Validation(errors) => ("Validation failed".to_string(), errors),
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                ("Internal server error".to_string(), Vec::new())
            }
            other => (other.to_string(), Vec::new()),
        };

        let body = ErrorBody {
            status_code: status.as_u16(),
            message,
            success: false,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(FieldError::collect(Err(errors)))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conflict(what) => ApiError::Conflict(format!("{} already exists", what)),
            DbError::Other(e) => ApiError::Internal(e),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidFile(msg) => ApiError::InvalidArgument(msg),
            MediaError::Remote(e) => ApiError::Internal(e.context("remote object store")),
            MediaError::Io(e) => ApiError::Internal(anyhow::Error::new(e).context("temp file")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_envelope_mirrors_status() {
        let resp = ApiError::not_found("video not found").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert_eq!(json["statusCode"], 404);
        assert_eq!(json["message"], "video not found");
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_cause() {
        let resp = ApiError::from(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let err = ApiError::Validation(vec![
            FieldError::new("email", "email is required"),
            FieldError::new("avatar", "avatar file is required"),
        ]);
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["errors"][0]["field"], "email");
        assert_eq!(json["errors"][1]["message"], "avatar file is required");
    }

    #[test]
    fn field_names_follow_the_wire() {
        assert_eq!(wire_name("full_name"), "fullName");
        assert_eq!(wire_name("new_password"), "newPassword");
        assert_eq!(wire_name("email"), "email");
    }

    #[test]
    fn conflict_maps_from_db_error() {
        let err = ApiError::from(DbError::Conflict("username or email"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "username or email already exists");
    }
}

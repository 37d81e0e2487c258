use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo_types::{SortField, SortOrder};
use crate::error::{ApiError, FieldError};
use crate::validation::not_blank;

pub const DEFAULT_PAGE_SIZE: i64 = 3;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset still fits an `i64` at the largest page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Query string of `GET /videos`.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosParams {
    #[validate(range(min = 1, max = MAX_PAGE, message = "page is out of range"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

impl ListVideosParams {
    pub fn sort(&self) -> Result<(SortField, SortOrder), ApiError> {
        let mut errors = Vec::new();
        let field = match self.sort_by.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Some(SortField::UpdatedAt),
            Some(raw) => SortField::from_param(raw),
        };
        if field.is_none() {
            errors.push(FieldError::new(
                "sortBy",
                "sortBy must be one of createdAt, updatedAt, title, duration",
            ));
        }
        let order = match self.sort_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Some(SortOrder::Asc),
            Some(raw) => SortOrder::from_param(raw),
        };
        if order.is_none() {
            errors.push(FieldError::new("sortType", "sortType must be asc or desc"));
        }
        match (field, order) {
            (Some(f), Some(o)) => Ok((f, o)),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// Text part of the publish form.
#[derive(Debug, Default, Validate)]
pub struct PublishForm {
    #[validate(custom(function = "not_blank", message = "title is required"))]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "description is required"))]
    pub description: String,
}

/// Paginated listing in the shape clients of the old API expect.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
}

impl<T: Serialize> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, page: i64, limit: i64) -> Self {
        let total_pages = if total_docs == 0 {
            0
        } else {
            (total_docs + limit - 1) / limit
        };
        let has_prev_page = page > 1;
        let has_next_page = page < total_pages;
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
        }
    }
}

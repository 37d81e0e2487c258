use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo_types::PublicUser;
use crate::validation::{not_blank, valid_email, valid_username};

/// Text part of the registration form.
#[derive(Debug, Default, Validate)]
pub struct RegisterForm {
    #[validate(custom(function = "not_blank", message = "fullName is required"))]
    pub full_name: String,
    #[validate(custom(function = "valid_email", message = "a valid email is required"))]
    pub email: String,
    #[validate(custom(
        function = "valid_username",
        message = "username must be 3-32 letters, digits, '_' or '.'"
    ))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "oldPassword is required"))]
    pub old_password: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "newPassword must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(custom(function = "not_blank", message = "fullName must not be empty"))]
    pub full_name: Option<String>,
    #[validate(custom(function = "valid_email", message = "email is invalid"))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
}

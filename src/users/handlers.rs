use axum::{
    extract::{Multipart, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::instrument;

use super::dto::{
    ChangePasswordRequest, LoginData, LoginRequest, RefreshRequest, RegisterForm, TokenData,
    UpdateAccountRequest,
};
use super::repo_types::{ChannelProfile, PublicUser};
use super::services::{self, ProfileImage, RegisterInput};
use crate::{
    auth::{jwt::TokenPair, AuthUser, ACCESS_COOKIE, REFRESH_COOKIE},
    error::ApiResult,
    media::MultipartForm,
    response::{ApiResponse, Empty},
    state::AppState,
    validation::ValidJson,
    videos::repo_types::VideoWithOwner,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh_token))
}

pub fn secured_routes() -> Router<AppState> {
    Router::new()
        .route("/users/logout", post(logout))
        .route("/users/change-password", post(change_password))
        .route("/users/current-user", get(current_user))
        .route("/users/update-account", patch(update_account))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/cover-image", patch(update_cover_image))
        .route("/users/c/:username", get(channel_profile))
        .route("/users/history", get(watch_history))
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

fn with_tokens(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), secure))
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut form = MultipartForm::read(mp, &state.config.upload.tmp_dir).await?;
    let input = RegisterInput {
        form: RegisterForm {
            full_name: form.take_text("fullName").unwrap_or_default(),
            email: form.take_text("email").unwrap_or_default(),
            username: form.take_text("username").unwrap_or_default(),
            password: form.take_text("password").unwrap_or_default(),
        },
        avatar: form.take_file("avatar"),
        cover_image: form.take_file("coverImage"),
    };
    form.discard().await;

    let user = services::register(&state, input).await?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

#[instrument(skip(state, jar, req))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<LoginData>)> {
    let (user, pair) = services::login(&state, req).await?;
    let jar = with_tokens(jar, &pair, state.config.cookie_secure);
    let data = LoginData {
        user,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, ApiResponse::ok(data, "User logged in successfully")))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<Empty>)> {
    services::logout(&state, user_id).await?;
    let jar = jar
        .remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"));
    Ok((jar, ApiResponse::ok(Empty {}, "User logged out")))
}

/// The refresh token comes from the cookie, falling back to the JSON body.
#[instrument(skip(state, jar, body))]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<TokenData>)> {
    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token));

    let pair = services::refresh_access_token(&state, incoming).await?;
    let jar = with_tokens(jar, &pair, state.config.cookie_secure);
    let data = TokenData {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, ApiResponse::ok(data, "Access token refreshed")))
}

#[instrument(skip(state, req))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<Empty>> {
    services::change_password(&state, user_id, req).await?;
    Ok(ApiResponse::ok(Empty {}, "Password changed successfully"))
}

#[instrument(skip(state))]
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = services::current_user(&state, user_id).await?;
    Ok(ApiResponse::ok(user, "Current user fetched successfully"))
}

#[instrument(skip(state, req))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(req): ValidJson<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = services::update_account(&state, user_id, req).await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn update_image(
    state: AppState,
    user_id: uuid::Uuid,
    mp: Multipart,
    which: ProfileImage,
    field: &str,
) -> ApiResult<PublicUser> {
    let mut form = MultipartForm::read(mp, &state.config.upload.tmp_dir).await?;
    let upload = form.take_file(field);
    form.discard().await;
    services::update_profile_image(&state, user_id, which, upload).await
}

#[instrument(skip(state, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = update_image(state, user_id, mp, ProfileImage::Avatar, "avatar").await?;
    Ok(ApiResponse::ok(user, "Avatar updated successfully"))
}

#[instrument(skip(state, mp))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = update_image(state, user_id, mp, ProfileImage::CoverImage, "coverImage").await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

#[instrument(skip(state))]
pub async fn channel_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let profile = services::channel_profile(&state, &username, user_id).await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

#[instrument(skip(state))]
pub async fn watch_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<Vec<VideoWithOwner>>> {
    let history = services::watch_history(&state, user_id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}

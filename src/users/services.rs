use axum::extract::FromRef;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::dto::{ChangePasswordRequest, LoginRequest, RegisterForm, UpdateAccountRequest};
use super::repo_types::{ChannelProfile, NewUser, PublicUser, User};
use crate::{
    auth::{
        jwt::TokenPair,
        password::{hash_password_async, verify_password_async},
        JwtKeys,
    },
    error::{ApiError, ApiResult, FieldError},
    media::{temp::discard_all, MediaKind, TempUpload},
    state::AppState,
    validation::non_blank,
    videos::repo_types::VideoWithOwner,
};

pub struct RegisterInput {
    pub form: RegisterForm,
    pub avatar: Option<TempUpload>,
    pub cover_image: Option<TempUpload>,
}

fn is_image(upload: &TempUpload) -> bool {
    upload.content_type.starts_with("image/")
}

#[instrument(skip(st, input), fields(username = %input.form.username))]
pub async fn register(st: &AppState, input: RegisterInput) -> ApiResult<PublicUser> {
    let RegisterInput {
        form,
        avatar,
        cover_image,
    } = input;

    let mut errors = FieldError::collect(form.validate());
    match &avatar {
        None => errors.push(FieldError::new("avatar", "avatar file is required")),
        Some(a) if !is_image(a) => errors.push(FieldError::new("avatar", "avatar must be an image")),
        Some(_) => {}
    }
    if cover_image.as_ref().is_some_and(|c| !is_image(c)) {
        errors.push(FieldError::new("coverImage", "coverImage must be an image"));
    }
    if !errors.is_empty() {
        discard_all([avatar, cover_image]).await;
        return Err(ApiError::Validation(errors));
    }

    let username = form.username.trim().to_lowercase();
    let email = form.email.trim().to_lowercase();
    let full_name = form.full_name.trim().to_string();

    let existing = match st.users.find_by_username_or_email(&username, &email).await {
        Ok(found) => found,
        Err(e) => {
            discard_all([avatar, cover_image]).await;
            return Err(e.into());
        }
    };
    if existing.is_some() {
        warn!(%username, %email, "registration collides with existing user");
        discard_all([avatar, cover_image]).await;
        return Err(ApiError::Conflict(
            "User with email or username already exists".into(),
        ));
    }

    let password_hash = match hash_password_async(form.password).await {
        Ok(h) => h,
        Err(e) => {
            discard_all([avatar, cover_image]).await;
            return Err(e.into());
        }
    };

    let Some(avatar) = avatar else {
        discard_all([cover_image]).await;
        return Err(ApiError::invalid("avatar file is required"));
    };

    let id = Uuid::new_v4();
    let namespace = id.to_string();
    let avatar = match st.media.upload(avatar, &namespace, MediaKind::Image).await {
        Ok(a) => a,
        Err(e) => {
            discard_all([cover_image]).await;
            return Err(e.into());
        }
    };
    let cover = match cover_image {
        Some(c) => match st.media.upload(c, &namespace, MediaKind::Image).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                st.media.compensate(&[&avatar]).await;
                return Err(e.into());
            }
        },
        None => None,
    };

    let new = NewUser {
        id,
        username,
        email,
        full_name,
        password_hash,
        avatar_url: avatar.url.clone(),
        avatar_public_id: avatar.public_id.clone(),
        cover_image_url: cover.as_ref().map(|c| c.url.clone()),
        cover_image_public_id: cover.as_ref().map(|c| c.public_id.clone()),
    };
    let user = match st.users.create(new).await {
        Ok(u) => u,
        Err(e) => {
            let mut uploaded = vec![&avatar];
            uploaded.extend(cover.as_ref());
            st.media.compensate(&uploaded).await;
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, "user registered");
    Ok(user.into())
}

async fn issue_tokens(st: &AppState, user_id: Uuid) -> ApiResult<TokenPair> {
    let keys = JwtKeys::from_ref(st);
    let pair = keys.sign_pair(user_id)?;
    st.users
        .set_refresh_token(user_id, Some(&pair.refresh_token))
        .await?;
    Ok(pair)
}

#[instrument(skip(st, req), fields(username = %req.username))]
pub async fn login(st: &AppState, req: LoginRequest) -> ApiResult<(PublicUser, TokenPair)> {
    let username = req.username.trim().to_lowercase();
    let email = req.email.trim().to_lowercase();

    let user = st
        .users
        .find_by_username_or_email(&username, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password_async(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let pair = issue_tokens(st, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user.into(), pair))
}

#[instrument(skip(st))]
pub async fn logout(st: &AppState, user_id: Uuid) -> ApiResult<()> {
    st.users.set_refresh_token(user_id, None).await?;
    info!(%user_id, "user logged out");
    Ok(())
}

#[instrument(skip(st, incoming))]
pub async fn refresh_access_token(st: &AppState, incoming: Option<String>) -> ApiResult<TokenPair> {
    let incoming = non_blank(incoming).ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let keys = JwtKeys::from_ref(st);
    let claims = keys.verify_refresh(&incoming).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::unauthorized("Invalid refresh token")
    })?;

    let user = st
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        warn!(user_id = %user.id, "refresh token is expired or already used");
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    let pair = keys.sign_pair(user.id)?;
    if !st
        .users
        .rotate_refresh_token(user.id, &incoming, &pair.refresh_token)
        .await?
    {
        // A concurrent refresh consumed the same token first.
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }
    Ok(pair)
}

async fn load_user(st: &AppState, user_id: Uuid) -> ApiResult<User> {
    st.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))
}

#[instrument(skip(st))]
pub async fn current_user(st: &AppState, user_id: Uuid) -> ApiResult<PublicUser> {
    Ok(load_user(st, user_id).await?.into())
}

#[instrument(skip(st, req))]
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> ApiResult<()> {
    let user = load_user(st, user_id).await?;
    if !verify_password_async(req.old_password, user.password_hash).await? {
        return Err(ApiError::unauthorized("Old password is incorrect"));
    }
    let hash = hash_password_async(req.new_password).await?;
    st.users.set_password_hash(user_id, &hash).await?;
    info!(%user_id, "password changed");
    Ok(())
}

#[instrument(skip(st, req))]
pub async fn update_account(
    st: &AppState,
    user_id: Uuid,
    req: UpdateAccountRequest,
) -> ApiResult<PublicUser> {
    let full_name = non_blank(req.full_name);
    let email = non_blank(req.email).map(|e| e.to_lowercase());
    if full_name.is_none() && email.is_none() {
        return Err(ApiError::invalid("fullName or email is required"));
    }

    let user = st
        .users
        .update_account(user_id, full_name.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;
    Ok(user.into())
}

#[derive(Debug, Clone, Copy)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn field(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "coverImage",
        }
    }
}

/// Swap the avatar or cover image; the previous remote object is removed
/// only after the user row points at the new one.
#[instrument(skip(st, upload))]
pub async fn update_profile_image(
    st: &AppState,
    user_id: Uuid,
    which: ProfileImage,
    upload: Option<TempUpload>,
) -> ApiResult<PublicUser> {
    let upload = upload
        .ok_or_else(|| ApiError::invalid(format!("{} file is missing", which.field())))?;
    if !is_image(&upload) {
        upload.discard().await;
        return Err(ApiError::invalid(format!("{} must be an image", which.field())));
    }

    let user = match load_user(st, user_id).await {
        Ok(u) => u,
        Err(e) => {
            upload.discard().await;
            return Err(e);
        }
    };
    let old = match which {
        ProfileImage::Avatar => Some(user.avatar_public_id.clone()),
        ProfileImage::CoverImage => user.cover_image_public_id.clone(),
    };

    let users = st.users.clone();
    let updated = st
        .media
        .replace(
            old.as_deref(),
            upload,
            &user_id.to_string(),
            MediaKind::Image,
            |asset| async move {
                let updated = match which {
                    ProfileImage::Avatar => {
                        users.set_avatar(user_id, &asset.url, &asset.public_id).await?
                    }
                    ProfileImage::CoverImage => {
                        users
                            .set_cover_image(user_id, &asset.url, &asset.public_id)
                            .await?
                    }
                };
                updated.ok_or_else(|| ApiError::unauthorized("Invalid access token"))
            },
        )
        .await?;

    info!(%user_id, image = which.field(), "profile image updated");
    Ok(updated.into())
}

#[instrument(skip(st))]
pub async fn channel_profile(
    st: &AppState,
    username: &str,
    viewer: Uuid,
) -> ApiResult<ChannelProfile> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::invalid("username is required"));
    }
    st.users
        .channel_profile(&username, viewer)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))
}

#[instrument(skip(st))]
pub async fn watch_history(st: &AppState, user_id: Uuid) -> ApiResult<Vec<VideoWithOwner>> {
    Ok(st.users.watch_history(user_id).await?)
}

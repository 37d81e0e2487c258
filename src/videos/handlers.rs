use axum::{
    extract::{Multipart, Path, State},
    routing::{get, patch, post},
    Router,
};
use tracing::instrument;

use super::dto::{ListVideosParams, Page, PublishForm};
use super::repo_types::{Video, VideoWithOwner};
use super::services::{self, PublishInput, UpdateInput};
use crate::{
    auth::AuthUser,
    error::ApiResult,
    media::MultipartForm,
    response::{ApiResponse, Empty},
    state::AppState,
    validation::{parse_id, ValidQuery},
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/u/:user_id", get(user_videos))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/videos", post(publish_video))
        .route(
            "/videos/:video_id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/videos/toggle/publish/:video_id", patch(toggle_publish))
}

#[instrument(skip(state))]
pub async fn list_videos(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ValidQuery(params): ValidQuery<ListVideosParams>,
) -> ApiResult<ApiResponse<Page<VideoWithOwner>>> {
    let page = services::list_all(&state, params).await?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

#[instrument(skip(state))]
pub async fn user_videos(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<VideoWithOwner>>> {
    let user_id = parse_id(&user_id, "user")?;
    let videos = services::user_videos(&state, user_id).await?;
    Ok(ApiResponse::ok(videos, "User videos fetched successfully"))
}

#[instrument(skip(state, mp))]
pub async fn publish_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<Video>> {
    let mut form = MultipartForm::read(mp, &state.config.upload.tmp_dir).await?;
    let input = PublishInput {
        form: PublishForm {
            title: form.take_text("title").unwrap_or_default(),
            description: form.take_text("description").unwrap_or_default(),
        },
        video: form.take_file("videoFile"),
        thumbnail: form.take_file("thumbnail"),
    };
    form.discard().await;

    let video = services::publish(&state, user_id, input).await?;
    Ok(ApiResponse::created(video, "Video published successfully"))
}

#[instrument(skip(state))]
pub async fn get_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<ApiResponse<VideoWithOwner>> {
    let video_id = parse_id(&video_id, "video")?;
    let video = services::get_by_id(&state, video_id, user_id).await?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

#[instrument(skip(state, mp))]
pub async fn update_video(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(video_id): Path<String>,
    mp: Multipart,
) -> ApiResult<ApiResponse<Video>> {
    let video_id = parse_id(&video_id, "video")?;
    let mut form = MultipartForm::read(mp, &state.config.upload.tmp_dir).await?;
    let input = UpdateInput {
        title: form.take_text("title"),
        description: form.take_text("description"),
        thumbnail: form.take_file("thumbnail"),
    };
    form.discard().await;

    let video = services::update(&state, video_id, input).await?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_video(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<ApiResponse<Empty>> {
    let video_id = parse_id(&video_id, "video")?;
    services::delete(&state, video_id).await?;
    Ok(ApiResponse::ok(Empty {}, "Video deleted successfully"))
}

#[instrument(skip(state))]
pub async fn toggle_publish(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<ApiResponse<Video>> {
    let video_id = parse_id(&video_id, "video")?;
    let video = services::toggle_publish(&state, video_id).await?;
    Ok(ApiResponse::ok(video, "Publish status toggled"))
}

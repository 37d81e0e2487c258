use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::dto::{ListVideosParams, Page, PublishForm, DEFAULT_PAGE_SIZE};
use super::repo_types::{NewVideo, Video, VideoChanges, VideoListQuery, VideoWithOwner};
use crate::{
    error::{ApiError, ApiResult, FieldError},
    media::{is_accepted_thumbnail, temp::discard_all, MediaKind, TempUpload},
    state::AppState,
    validation::{non_blank, parse_id},
};

pub struct PublishInput {
    pub form: PublishForm,
    pub video: Option<TempUpload>,
    pub thumbnail: Option<TempUpload>,
}

pub struct UpdateInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<TempUpload>,
}

#[instrument(skip(st, input), fields(title = %input.form.title))]
pub async fn publish(st: &AppState, owner: Uuid, input: PublishInput) -> ApiResult<Video> {
    let PublishInput {
        form,
        video,
        thumbnail,
    } = input;

    let mut errors = FieldError::collect(form.validate());
    match &video {
        None => errors.push(FieldError::new("videoFile", "videoFile is required")),
        Some(v) if !v.content_type.starts_with("video/") => {
            errors.push(FieldError::new("videoFile", "videoFile must be a video"))
        }
        Some(_) => {}
    }
    match &thumbnail {
        None => errors.push(FieldError::new("thumbnail", "thumbnail is required")),
        Some(t) if !is_accepted_thumbnail(&t.content_type) => errors.push(FieldError::new(
            "thumbnail",
            "thumbnail must be a jpeg, png or gif image",
        )),
        Some(_) => {}
    }
    let (video, thumbnail) = match (video, thumbnail) {
        (Some(v), Some(t)) if errors.is_empty() => (v, t),
        (video, thumbnail) => {
            discard_all([video, thumbnail]).await;
            return Err(ApiError::Validation(errors));
        }
    };

    let namespace = owner.to_string();
    let video_asset = match st.media.upload(video, &namespace, MediaKind::Video).await {
        Ok(a) => a,
        Err(e) => {
            thumbnail.discard().await;
            return Err(e.into());
        }
    };
    let thumb_asset = match st.media.upload(thumbnail, &namespace, MediaKind::Image).await {
        Ok(a) => a,
        Err(e) => {
            st.media.compensate(&[&video_asset]).await;
            return Err(e.into());
        }
    };

    let new = NewVideo {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        video_url: video_asset.url.clone(),
        video_public_id: video_asset.public_id.clone(),
        thumbnail_url: thumb_asset.url.clone(),
        thumbnail_public_id: thumb_asset.public_id.clone(),
        duration: video_asset.duration.unwrap_or(0.0),
        owner_id: owner,
    };
    match st.videos.create(new).await {
        Ok(v) => {
            info!(video_id = %v.id, %owner, "video published");
            Ok(v)
        }
        Err(e) => {
            error!(error = %e, %owner, "video insert failed; rolling back uploads");
            st.media.compensate(&[&video_asset, &thumb_asset]).await;
            Err(e.into())
        }
    }
}

#[instrument(skip(st))]
pub async fn get_by_id(st: &AppState, video_id: Uuid, viewer: Uuid) -> ApiResult<VideoWithOwner> {
    let video = st
        .videos
        .find_by_id(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    st.users.record_watch(viewer, video_id).await?;
    Ok(video)
}

#[instrument(skip(st, input))]
pub async fn update(st: &AppState, video_id: Uuid, input: UpdateInput) -> ApiResult<Video> {
    let mut errors = Vec::new();
    for (field, value) in [("title", &input.title), ("description", &input.description)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(FieldError::new(field, format!("{} must not be empty", field)));
        }
    }
    if !errors.is_empty() {
        if let Some(thumbnail) = input.thumbnail {
            thumbnail.discard().await;
        }
        return Err(ApiError::Validation(errors));
    }
    let title = non_blank(input.title);
    let description = non_blank(input.description);

    let Some(thumbnail) = input.thumbnail else {
        if title.is_none() && description.is_none() {
            return Err(ApiError::invalid(
                "title, description or thumbnail is required",
            ));
        }
        let changes = VideoChanges {
            title,
            description,
            ..Default::default()
        };
        return st
            .videos
            .update(video_id, changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Video not found"));
    };

    if !is_accepted_thumbnail(&thumbnail.content_type) {
        thumbnail.discard().await;
        return Err(ApiError::invalid("thumbnail must be a jpeg, png or gif image"));
    }
    let existing = match st.videos.find_by_id(video_id).await {
        Ok(Some(v)) => v.video,
        Ok(None) => {
            thumbnail.discard().await;
            return Err(ApiError::not_found("Video not found"));
        }
        Err(e) => {
            thumbnail.discard().await;
            return Err(e.into());
        }
    };

    let videos = st.videos.clone();
    st.media
        .replace(
            Some(&existing.thumbnail_public_id),
            thumbnail,
            &existing.owner_id.to_string(),
            MediaKind::Image,
            |asset| async move {
                let changes = VideoChanges {
                    title,
                    description,
                    thumbnail_url: Some(asset.url),
                    thumbnail_public_id: Some(asset.public_id),
                };
                videos
                    .update(video_id, changes)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Video not found"))
            },
        )
        .await
}

/// Remote assets go first; the record is removed only when both are gone.
#[instrument(skip(st))]
pub async fn delete(st: &AppState, video_id: Uuid) -> ApiResult<()> {
    let video = st
        .videos
        .find_by_id(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?
        .video;

    if !st.media.delete(&video.video_public_id, MediaKind::Video).await {
        error!(%video_id, "video asset delete failed; keeping record");
        return Err(anyhow::anyhow!("failed to delete video file from remote store").into());
    }
    if !st
        .media
        .delete(&video.thumbnail_public_id, MediaKind::Image)
        .await
    {
        error!(%video_id, "thumbnail delete failed; keeping record");
        return Err(anyhow::anyhow!("failed to delete thumbnail from remote store").into());
    }

    if !st.videos.delete(video_id).await? {
        warn!(%video_id, "video vanished before delete");
        return Err(ApiError::not_found("Video not found"));
    }
    info!(%video_id, "video deleted");
    Ok(())
}

#[instrument(skip(st))]
pub async fn toggle_publish(st: &AppState, video_id: Uuid) -> ApiResult<Video> {
    let video = st
        .videos
        .toggle_published(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    info!(%video_id, is_published = video.is_published, "publish status toggled");
    Ok(video)
}

#[instrument(skip(st))]
pub async fn list_all(st: &AppState, params: ListVideosParams) -> ApiResult<Page<VideoWithOwner>> {
    let (sort_by, sort_order) = params.sort()?;
    let owner = match non_blank(params.user_id) {
        Some(raw) => Some(parse_id(&raw, "user")?),
        None => None,
    };
    let query = VideoListQuery {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        search: non_blank(params.query),
        sort_by,
        sort_order,
        owner,
    };
    if query.offset().is_none() {
        return Err(ApiError::invalid("page is out of range"));
    }

    let (docs, total) = st.videos.list(&query).await?;
    Ok(Page::new(docs, total, query.page, query.limit))
}

#[instrument(skip(st))]
pub async fn user_videos(st: &AppState, user_id: Uuid) -> ApiResult<Vec<VideoWithOwner>> {
    if st.users.find_by_id(user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(st.videos.list_by_owner(user_id).await?)
}

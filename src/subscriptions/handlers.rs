use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::instrument;

use super::repo_types::{ChannelSubscribers, SubscribedChannels, ToggleOutcome};
use super::services;
use crate::{
    auth::AuthUser,
    error::ApiResult,
    response::ApiResponse,
    state::AppState,
    validation::parse_id,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions/c/:channel_id",
            get(channel_subscribers).post(toggle_subscription),
        )
        .route("/subscriptions/u/:subscriber_id", get(subscribed_channels))
}

#[instrument(skip(state))]
pub async fn toggle_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(channel_id): Path<String>,
) -> ApiResult<ApiResponse<ToggleOutcome>> {
    let channel_id = parse_id(&channel_id, "channel")?;
    let outcome = services::toggle_subscription(&state, user_id, channel_id).await?;
    let message = if outcome.subscribed {
        "Subscribed to channel"
    } else {
        "Unsubscribed from channel"
    };
    Ok(ApiResponse::ok(outcome, message))
}

#[instrument(skip(state))]
pub async fn channel_subscribers(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(channel_id): Path<String>,
) -> ApiResult<ApiResponse<ChannelSubscribers>> {
    let channel_id = parse_id(&channel_id, "channel")?;
    let view = services::channel_subscribers(&state, channel_id, user_id).await?;
    Ok(ApiResponse::ok(view, "Subscribers list fetched successfully"))
}

#[instrument(skip(state))]
pub async fn subscribed_channels(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    Path(subscriber_id): Path<String>,
) -> ApiResult<ApiResponse<SubscribedChannels>> {
    let subscriber_id = parse_id(&subscriber_id, "subscriber")?;
    let view = services::subscribed_channels(&state, subscriber_id).await?;
    Ok(ApiResponse::ok(view, "Subscribed channels fetched successfully"))
}

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::dto::TweetRequest;
use super::repo_types::{Tweet, TweetWithOwner};
use super::services;
use crate::{
    auth::AuthUser,
    error::ApiResult,
    response::ApiResponse,
    state::AppState,
    validation::{parse_id, ValidJson},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tweets", post(create_tweet))
        // GET takes a user id, PATCH a tweet id.
        .route("/tweets/:id", get(user_tweets).patch(update_tweet))
}

#[instrument(skip(state, req))]
pub async fn create_tweet(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(req): ValidJson<TweetRequest>,
) -> ApiResult<ApiResponse<Tweet>> {
    let tweet = services::create(&state, user_id, &req.content).await?;
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

#[instrument(skip(state))]
pub async fn user_tweets(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<TweetWithOwner>>> {
    let user_id = parse_id(&user_id, "user")?;
    let tweets = services::user_tweets(&state, user_id).await?;
    Ok(ApiResponse::ok(tweets, "User tweets fetched successfully"))
}

#[instrument(skip(state, req))]
pub async fn update_tweet(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(tweet_id): Path<String>,
    ValidJson(req): ValidJson<TweetRequest>,
) -> ApiResult<ApiResponse<Tweet>> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let tweet = services::update(&state, tweet_id, &req.content).await?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

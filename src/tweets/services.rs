use tracing::{info, instrument};
use uuid::Uuid;

use super::repo_types::{Tweet, TweetWithOwner};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[instrument(skip(st, content))]
pub async fn create(st: &AppState, owner: Uuid, content: &str) -> ApiResult<Tweet> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::invalid("content is required"));
    }
    let tweet = st.tweets.create(owner, content).await?;
    info!(tweet_id = %tweet.id, %owner, "tweet created");
    Ok(tweet)
}

#[instrument(skip(st))]
pub async fn user_tweets(st: &AppState, user_id: Uuid) -> ApiResult<Vec<TweetWithOwner>> {
    if st.users.find_by_id(user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(st.tweets.list_by_owner(user_id).await?)
}

#[instrument(skip(st, content))]
pub async fn update(st: &AppState, tweet_id: Uuid, content: &str) -> ApiResult<Tweet> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::invalid("content is required"));
    }
    st.tweets
        .update_content(tweet_id, content)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))
}

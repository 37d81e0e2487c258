use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{ChannelSubscribers, SubscribedChannels, ToggleOutcome};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

async fn ensure_user(st: &AppState, id: Uuid, what: &str) -> ApiResult<()> {
    match st.users.find_by_id(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found(format!("{} not found", what))),
    }
}

/// Subscribe when no row exists, unsubscribe otherwise. The unique pair
/// constraint decides; a delete that finds nothing means a concurrent
/// toggle removed the row, so the insert is tried once more.
#[instrument(skip(st))]
pub async fn toggle_subscription(
    st: &AppState,
    subscriber: Uuid,
    channel: Uuid,
) -> ApiResult<ToggleOutcome> {
    ensure_user(st, channel, "Channel").await?;

    for attempt in 0..2 {
        if let Some(id) = st.subscriptions.insert_if_absent(subscriber, channel).await? {
            info!(subscription_id = %id, %subscriber, %channel, "subscribed");
            return Ok(ToggleOutcome { subscribed: true });
        }
        if st.subscriptions.delete(subscriber, channel).await? {
            info!(%subscriber, %channel, "unsubscribed");
            return Ok(ToggleOutcome { subscribed: false });
        }
        warn!(%subscriber, %channel, attempt, "subscription changed underneath toggle; retrying");
    }

    Err(anyhow::anyhow!("subscription toggle kept racing").into())
}

#[instrument(skip(st))]
pub async fn channel_subscribers(
    st: &AppState,
    channel: Uuid,
    viewer: Uuid,
) -> ApiResult<ChannelSubscribers> {
    ensure_user(st, channel, "Channel").await?;
    let subscribers = st.subscriptions.channel_subscribers(channel).await?;
    let is_subscribed = subscribers.iter().any(|s| s.profile.id == viewer);
    Ok(ChannelSubscribers {
        channel_id: channel,
        subscriber_count: subscribers.len(),
        subscribers,
        is_subscribed,
    })
}

#[instrument(skip(st))]
pub async fn subscribed_channels(st: &AppState, subscriber: Uuid) -> ApiResult<SubscribedChannels> {
    ensure_user(st, subscriber, "Subscriber").await?;
    let channels = st.subscriptions.subscribed_channels(subscriber).await?;
    Ok(SubscribedChannels {
        subscriber_id: subscriber,
        channels_count: channels.len(),
        channels,
    })
}

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::PublicProfile;

/// A user, as listed on the other side of a subscription.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: PublicProfile,
    #[serde(with = "time::serde::rfc3339")]
    pub subscribed_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscribers {
    pub channel_id: Uuid,
    pub subscribers: Vec<SubscriptionEntry>,
    pub subscriber_count: usize,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedChannels {
    pub subscriber_id: Uuid,
    pub channels: Vec<SubscriptionEntry>,
    pub channels_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToggleOutcome {
    pub subscribed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_flattens_profile() {
        let entry = SubscriptionEntry {
            profile: PublicProfile {
                id: Uuid::nil(),
                username: "fan".into(),
                email: "fan@example.com".into(),
                full_name: "Big Fan".into(),
                avatar: "https://cdn/fan.png".into(),
                cover_image: None,
            },
            subscribed_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["username"], "fan");
        assert_eq!(json["fullName"], "Big Fan");
        assert_eq!(json["subscribedAt"], "1970-01-01T00:00:00Z");
    }
}

use std::sync::Arc;

use crate::config::AppConfig;
use crate::media::MediaOrchestrator;
use crate::storage::{S3MediaStore, StorageClient};
use crate::subscriptions::{PgSubscriptionRepo, SubscriptionRepo};
use crate::tweets::{PgTweetRepo, TweetRepo};
use crate::users::{PgUserRepo, UserRepo};
use crate::videos::{PgVideoRepo, VideoRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub media: MediaOrchestrator,
    pub users: Arc<dyn UserRepo>,
    pub videos: Arc<dyn VideoRepo>,
    pub tweets: Arc<dyn TweetRepo>,
    pub subscriptions: Arc<dyn SubscriptionRepo>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = crate::db::connect(&config).await?;

        // Schema lives in ./migrations, embedded at build time.
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let storage = Arc::new(S3MediaStore::connect(&config.storage).await?) as Arc<dyn StorageClient>;

        Ok(Self {
            media: MediaOrchestrator::new(storage),
            users: Arc::new(PgUserRepo::new(db.clone())),
            videos: Arc::new(PgVideoRepo::new(db.clone())),
            tweets: Arc::new(PgTweetRepo::new(db.clone())),
            subscriptions: Arc::new(PgSubscriptionRepo::new(db)),
            config,
        })
    }

    /// State over in-memory repositories and a fake object store.
    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::TestContext::new().state
    }
}

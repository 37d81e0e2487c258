use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::StorageConfig;

/// Remote object store holding uploaded media, addressed by object key.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// URL under which clients fetch the object.
    fn public_url(&self, key: &str) -> String;
}

/// S3 or MinIO bucket serving media straight from `public_base`.
#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3MediaStore {
    pub async fn connect(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            cfg.access_key.as_str(),
            cfg.secret_key.as_str(),
            None,
            None,
            "vidtube-env",
        );
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        // MinIO and most self-hosted endpoints only speak path-style.
        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        if cfg.bucket.trim().is_empty() {
            anyhow::bail!("S3_BUCKET is empty");
        }

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_base: cfg.public_url.clone(),
        })
    }
}

fn join_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

#[async_trait]
impl StorageClient for S3MediaStore {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .cache_control("public, max-age=31536000, immutable")
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        debug!(%key, size, "object stored");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {}", key))?;
        debug!(%key, "object deleted");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base, key)
    }
}

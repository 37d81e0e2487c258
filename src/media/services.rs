use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::probe::{probe_duration, round_duration};
use super::temp::{remove_quiet, TempUpload};
use super::{MediaError, MediaKind};
use crate::error::ApiError;
use crate::storage::StorageClient;

/// A remote object that now exists in the store.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedAsset {
    pub url: String,
    pub public_id: String,
    pub duration: Option<f64>,
    #[serde(skip)]
    pub kind: MediaKind,
}

#[derive(Clone)]
pub struct MediaOrchestrator {
    storage: Arc<dyn StorageClient>,
}

impl MediaOrchestrator {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }

    /// Push a spooled file under `namespace`. The temp file is removed
    /// whether or not the push succeeds.
    #[instrument(skip(self, upload), fields(file = %upload.file_name, kind = kind.as_str()))]
    pub async fn upload(
        &self,
        upload: TempUpload,
        namespace: &str,
        kind: MediaKind,
    ) -> Result<UploadedAsset, MediaError> {
        let result = self.push(&upload, namespace, kind).await;
        remove_quiet(&upload.path).await;
        if let Ok(asset) = &result {
            info!(public_id = %asset.public_id, "media uploaded");
        }
        result
    }

    async fn push(
        &self,
        upload: &TempUpload,
        namespace: &str,
        kind: MediaKind,
    ) -> Result<UploadedAsset, MediaError> {
        if upload.size == 0 {
            return Err(MediaError::InvalidFile(format!(
                "{} file is empty",
                kind.as_str()
            )));
        }

        let duration = match kind {
            MediaKind::Video => match probe_duration(&upload.path).await {
                Ok(d) => Some(round_duration(d)),
                Err(e) => {
                    warn!(error = %e, "could not probe video duration; recording 0");
                    Some(0.0)
                }
            },
            MediaKind::Image => None,
        };

        let body = tokio::fs::read(&upload.path).await?;
        let key = object_key(namespace, &upload.file_name, &upload.content_type);
        self.storage
            .put_object(&key, Bytes::from(body), &upload.content_type)
            .await
            .map_err(MediaError::Remote)?;

        Ok(UploadedAsset {
            url: self.storage.public_url(&key),
            public_id: key,
            duration,
            kind,
        })
    }

    /// Ask the store to drop an object; `false` on any failure.
    #[instrument(skip(self), fields(kind = kind.as_str()))]
    pub async fn delete(&self, public_id: &str, kind: MediaKind) -> bool {
        match self.storage.delete_object(public_id).await {
            Ok(()) => {
                info!("remote object deleted");
                true
            }
            Err(e) => {
                warn!(error = %e, "remote delete failed");
                false
            }
        }
    }

    /// Undo uploads of a flow that failed further along.
    pub async fn compensate(&self, assets: &[&UploadedAsset]) {
        for asset in assets {
            if !self.delete(&asset.public_id, asset.kind).await {
                warn!(public_id = %asset.public_id, "orphaned remote object after rollback");
            }
        }
    }

    /// Upload a replacement, let `commit` persist it, then retire the old
    /// object. A failed commit removes the new object instead and keeps the
    /// old one untouched.
    pub async fn replace<T, F, Fut>(
        &self,
        old_public_id: Option<&str>,
        upload: TempUpload,
        namespace: &str,
        kind: MediaKind,
        commit: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce(UploadedAsset) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let asset = self.upload(upload, namespace, kind).await?;
        let new_id = asset.public_id.clone();

        match commit(asset).await {
            Ok(value) => {
                if let Some(old) = old_public_id.filter(|old| *old != new_id) {
                    if !self.delete(old, kind).await {
                        warn!(public_id = %old, "replaced object left behind in remote store");
                    }
                }
                Ok(value)
            }
            Err(e) => {
                if !self.delete(&new_id, kind).await {
                    warn!(public_id = %new_id, "orphaned remote object after rollback");
                }
                Err(e)
            }
        }
    }
}

fn object_key(namespace: &str, file_name: &str, content_type: &str) -> String {
    let ext = ext_from_file_name(file_name)
        .or_else(|| ext_from_mime(content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", namespace, Uuid::new_v4(), ext)
}

fn ext_from_file_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ok = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then(|| ext.to_ascii_lowercase())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}

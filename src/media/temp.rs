use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::{multipart::Field, Multipart};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::MediaError;
use crate::error::{ApiError, ApiResult};

/// A multipart file spooled to the local temp directory.
#[derive(Debug)]
pub struct TempUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

impl TempUpload {
    pub async fn discard(self) {
        remove_quiet(&self.path).await;
    }
}

pub async fn remove_quiet(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "temp file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "failed to remove temp file"),
    }
}

pub async fn discard_all(uploads: impl IntoIterator<Item = Option<TempUpload>>) {
    for upload in uploads.into_iter().flatten() {
        upload.discard().await;
    }
}

/// Text fields and spooled files of one multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, TempUpload>,
}

impl MultipartForm {
    /// Drain the body, writing every non-empty file part into `tmp_dir`.
    /// On any failure the files spooled so far are removed.
    pub async fn read(mut mp: Multipart, tmp_dir: &Path) -> ApiResult<Self> {
        tokio::fs::create_dir_all(tmp_dir)
            .await
            .map_err(MediaError::Io)?;

        let mut form = Self::default();
        loop {
            let field = match mp.next_field().await {
                Ok(Some(f)) => f,
                Ok(None) => break,
                Err(e) => {
                    form.discard().await;
                    return Err(ApiError::invalid(format!(
                        "malformed multipart body: {}",
                        e.body_text()
                    )));
                }
            };
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if field.file_name().is_some() {
                match spool(field, tmp_dir).await {
                    Ok(Some(upload)) => {
                        if let Some(previous) = form.files.insert(name, upload) {
                            previous.discard().await;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        form.discard().await;
                        return Err(e);
                    }
                }
            } else {
                match field.text().await {
                    Ok(text) => {
                        form.fields.insert(name, text);
                    }
                    Err(e) => {
                        form.discard().await;
                        return Err(ApiError::invalid(format!(
                            "malformed multipart field: {}",
                            e.body_text()
                        )));
                    }
                }
            }
        }
        Ok(form)
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn take_file(&mut self, name: &str) -> Option<TempUpload> {
        self.files.remove(name)
    }

    /// Remove any file nobody claimed.
    pub async fn discard(self) {
        for (_, upload) in self.files {
            upload.discard().await;
        }
    }
}

async fn spool(mut field: Field<'_>, dir: &Path) -> ApiResult<Option<TempUpload>> {
    let file_name = sanitize_file_name(field.file_name().unwrap_or_default());
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let path = dir.join(format!("{}-{}", Uuid::new_v4(), file_name));

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(MediaError::Io)?;
    let mut size: u64 = 0;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                size += chunk.len() as u64;
                if let Err(e) = file.write_all(&chunk).await {
                    drop(file);
                    remove_quiet(&path).await;
                    return Err(MediaError::Io(e).into());
                }
            }
            Ok(None) => break,
            Err(e) => {
                drop(file);
                remove_quiet(&path).await;
                return Err(ApiError::invalid(format!(
                    "upload interrupted: {}",
                    e.body_text()
                )));
            }
        }
    }
    if let Err(e) = file.flush().await {
        drop(file);
        remove_quiet(&path).await;
        return Err(MediaError::Io(e).into());
    }
    drop(file);

    // Browsers send an empty part for an unselected file input.
    if size == 0 {
        remove_quiet(&path).await;
        return Ok(None);
    }

    Ok(Some(TempUpload {
        path,
        file_name,
        content_type,
        size,
    }))
}

pub(crate) fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

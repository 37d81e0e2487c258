use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket holding videos, thumbnails, avatars and cover images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base that object keys are appended to when building public URLs.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub tmp_dir: PathBuf,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let database_max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "vidtube".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "vidtube-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let endpoint = std::env::var("S3_ENDPOINT")?;
        let bucket = std::env::var("S3_BUCKET")?;
        let public_url = std::env::var("S3_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
        });
        let storage = StorageConfig {
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            bucket,
            public_url,
        };

        let upload = UploadConfig {
            tmp_dir: std::env::var("UPLOAD_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./public/temp")),
            max_body_bytes: env_parse::<usize>("MAX_UPLOAD_MB", 200) * 1024 * 1024,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            jwt,
            storage,
            upload,
            cookie_secure: env_parse("COOKIE_SECURE", true),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

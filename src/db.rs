use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum DbError {
    /// A unique constraint rejected the write; the payload names what collided.
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let what = match db.constraint() {
                    Some("users_username_key") => "username",
                    Some("users_email_key") => "email",
                    Some("subscriptions_subscriber_id_channel_id_key") => "subscription",
                    _ => "record",
                };
                return DbError::Conflict(what);
            }
        }
        DbError::Other(anyhow::Error::new(e))
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

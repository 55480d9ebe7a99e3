use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;

/// Open the legacy database. It must already exist.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.db.path, false).await
}

/// Open the legacy database, creating an empty file when missing.
pub async fn connect_or_create(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.db.path, true).await
}

pub async fn connect_path(db_path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to {}", db_path.display()))?;

    Ok(pool)
}

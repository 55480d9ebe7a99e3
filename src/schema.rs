use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file (if needed) and the legacy wiki tables.
pub async fn run_schema(config: &Config) -> Result<()> {
    let pool = db::connect_or_create(config).await?;
    create_legacy_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the tables the migration reads from. Safe to run repeatedly.
pub async fn create_legacy_schema(pool: &SqlitePool) -> Result<()> {
    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_user (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wiki_document (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            locale TEXT NOT NULL,
            is_redirect INTEGER NOT NULL DEFAULT 0,
            html TEXT NOT NULL DEFAULT '',
            modified DATETIME NOT NULL,
            parent_id INTEGER,
            current_revision_id INTEGER,
            deleted INTEGER NOT NULL DEFAULT 0,
            UNIQUE(locale, slug),
            FOREIGN KEY (parent_id) REFERENCES wiki_document(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create revisions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wiki_revision (
            id INTEGER PRIMARY KEY,
            document_id INTEGER NOT NULL,
            creator_id INTEGER NOT NULL,
            created DATETIME NOT NULL,
            FOREIGN KEY (document_id) REFERENCES wiki_document(id),
            FOREIGN KEY (creator_id) REFERENCES auth_user(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_wiki_document_parent ON wiki_document(parent_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_wiki_revision_document ON wiki_revision(document_id, created)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

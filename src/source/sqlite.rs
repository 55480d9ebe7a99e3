//! [`DocumentSource`] backed by the legacy SQLite database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::TryStreamExt;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use super::{DocumentSource, LocaleCount, RowStream, SourceFilter};
use crate::contributors::ContributorIndex;
use crate::models::{DocumentRow, ParentRef, RedirectRow, RevisionRow};

/// SQL `WHERE` clause plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub sql: String,
    pub args: Vec<String>,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Build the constraints shared by every document query.
///
/// Documents without a current revision or with an empty body are always
/// excluded; deleted documents are excluded unless `include_deleted`.
pub fn constraints(
    filter: &SourceFilter,
    alias: &str,
    parent_alias: Option<&str>,
    include_deleted: bool,
) -> Constraints {
    let a = format!("{}.", alias);
    let mut extra = vec![
        format!("{}current_revision_id IS NOT NULL", a),
        format!("{}html <> ''", a),
    ];
    let mut args = Vec::new();

    if !include_deleted {
        extra.push(format!("{}deleted = 0", a));
    }
    if !filter.locales.is_empty() {
        extra.push(format!(
            "{}locale IN ({})",
            a,
            placeholders(filter.locales.len())
        ));
        args.extend(filter.locales.iter().cloned());
    }
    if !filter.exclude_prefixes.is_empty() {
        let likes = |prefix: &str| {
            filter
                .exclude_prefixes
                .iter()
                .map(|_| format!("{}slug LIKE ?", prefix))
                .collect::<Vec<_>>()
                .join(" OR ")
        };
        let patterns = filter.exclude_prefixes.iter().map(|s| format!("{}%", s));
        extra.push(format!("NOT ({})", likes(&a)));
        args.extend(patterns.clone());
        if let Some(p) = parent_alias {
            let pa = format!("{}.", p);
            extra.push(format!("(({}slug IS NULL) OR NOT ({}))", pa, likes(&pa)));
            args.extend(patterns);
        }
    }

    Constraints {
        sql: format!(" WHERE {}", extra.join(" AND ")),
        args,
    }
}

pub struct SqliteSource {
    pool: SqlitePool,
    filter: SourceFilter,
    buffer: usize,
}

impl SqliteSource {
    /// `buffer` bounds how many rows a stream reads ahead of its consumer.
    pub fn new(pool: SqlitePool, filter: SourceFilter, buffer: usize) -> Self {
        Self {
            pool,
            filter,
            buffer,
        }
    }

    fn document_constraints(&self) -> Constraints {
        constraints(&self.filter, "w", Some("p"), false)
    }

    fn spawn_stream<T, F>(&self, label: &'static str, sql: String, args: Vec<String>, decode: F) -> RowStream<T>
    where
        T: Send + 'static,
        F: Fn(&SqliteRow) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let (tx, stream) = RowStream::channel(self.buffer);
        tokio::spawn(async move {
            let mut query = sqlx::query(&sql);
            for arg in &args {
                query = query.bind(arg.as_str());
            }
            let mut rows = query.fetch(&pool);
            let mut sent = 0u64;
            loop {
                let item = match rows.try_next().await {
                    Ok(Some(row)) => decode(&row),
                    Ok(None) => break,
                    Err(e) => Err(anyhow::Error::new(e).context(format!("Querying {} failed", label))),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
                sent += 1;
            }
            debug!(stream = label, rows = sent, "row stream finished");
        });
        stream
    }
}

fn decode_redirect(row: &SqliteRow) -> Result<RedirectRow> {
    Ok(RedirectRow {
        locale: row.try_get("locale")?,
        slug: row.try_get("slug")?,
        html: row.try_get("html")?,
    })
}

fn decode_document(row: &SqliteRow) -> Result<DocumentRow> {
    let parent = match row.try_get::<Option<String>, _>("parent_slug")? {
        Some(slug) => Some(ParentRef {
            slug,
            locale: row
                .try_get::<Option<String>, _>("parent_locale")?
                .unwrap_or_default(),
            is_redirect: row
                .try_get::<Option<bool>, _>("parent_is_redirect")?
                .unwrap_or(false),
            modified: row
                .try_get::<Option<NaiveDateTime>, _>("parent_modified")?
                .map(|m| m.and_utc())
                .unwrap_or_default(),
        }),
        None => None,
    };

    Ok(DocumentRow {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        locale: row.try_get("locale")?,
        is_redirect: row.try_get("is_redirect")?,
        html: row.try_get("html")?,
        modified: row.try_get::<NaiveDateTime, _>("modified")?.and_utc(),
        parent,
    })
}

fn decode_revision(row: &SqliteRow) -> Result<RevisionRow> {
    Ok(RevisionRow {
        locale: row.try_get("locale")?,
        slug: row.try_get("slug")?,
        username: row.try_get("username")?,
        created: row.try_get::<NaiveDateTime, _>("created")?.and_utc(),
    })
}

#[async_trait]
impl DocumentSource for SqliteSource {
    async fn localized_archive_slugs(&self, english_roots: &[String]) -> Result<Vec<String>> {
        if english_roots.is_empty() {
            return Ok(Vec::new());
        }
        let c = self.document_constraints();
        let sql = format!(
            r#"
            SELECT DISTINCT w.slug
            FROM wiki_document w
            INNER JOIN wiki_document p ON w.parent_id = p.id
            {} AND p.slug IN ({})
            "#,
            c.sql,
            placeholders(english_roots.len())
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for arg in c.args.iter().chain(english_roots) {
            query = query.bind(arg.as_str());
        }
        let slugs = query
            .fetch_all(&self.pool)
            .await
            .context("Querying localized archive slugs failed")?;
        Ok(slugs)
    }

    fn redirects(&self) -> RowStream<RedirectRow> {
        let c = self.document_constraints();
        let sql = format!(
            r#"
            SELECT w.html, w.slug, w.locale
            FROM wiki_document w
            LEFT OUTER JOIN wiki_document p ON w.parent_id = p.id
            {} AND w.is_redirect = 1
            "#,
            c.sql
        );
        self.spawn_stream("redirect documents", sql, c.args, decode_redirect)
    }

    fn documents(&self) -> RowStream<DocumentRow> {
        let c = self.document_constraints();
        let sql = format!(
            r#"
            SELECT
                w.id,
                w.title,
                w.slug,
                w.locale,
                w.is_redirect,
                w.html,
                w.modified,
                p.slug AS parent_slug,
                p.locale AS parent_locale,
                p.modified AS parent_modified,
                p.is_redirect AS parent_is_redirect
            FROM wiki_document w
            LEFT OUTER JOIN wiki_document p ON w.parent_id = p.id
            {}
            "#,
            c.sql
        );
        self.spawn_stream("documents", sql, c.args, decode_document)
    }

    async fn contributors(&self, ignored: &[String]) -> Result<ContributorIndex> {
        let c = constraints(&self.filter, "d", None, true);
        let revisions_sql = format!(
            r#"
            SELECT r.document_id, r.creator_id
            FROM wiki_revision r
            INNER JOIN wiki_document d ON r.document_id = d.id
            {}
            ORDER BY r.created DESC, r.id DESC
            "#,
            c.sql
        );

        info!("fetching all contributor mappings and usernames");
        let revisions = async {
            let mut query = sqlx::query_as::<_, (i64, i64)>(&revisions_sql);
            for arg in &c.args {
                query = query.bind(arg.as_str());
            }
            query
                .fetch_all(&self.pool)
                .await
                .context("Querying contributor mappings failed")
        };
        let users = async {
            sqlx::query_as::<_, (i64, String)>("SELECT id, username FROM auth_user")
                .fetch_all(&self.pool)
                .await
                .context("Querying usernames failed")
        };
        let (revisions, users) = tokio::try_join!(revisions, users)?;

        let mut index = ContributorIndex::new(ignored.iter().cloned());
        for (document_id, creator_id) in revisions {
            index.add_revision(document_id, creator_id);
        }
        for (id, username) in users {
            index.add_user(id, username);
        }
        Ok(index)
    }

    fn revisions(&self) -> RowStream<RevisionRow> {
        let c = constraints(&self.filter, "d", None, true);
        let sql = format!(
            r#"
            SELECT d.locale, d.slug, r.created, u.username
            FROM wiki_revision r
            INNER JOIN wiki_document d ON r.document_id = d.id
            INNER JOIN auth_user u ON r.creator_id = u.id
            {}
            ORDER BY d.locale, r.created DESC, r.id DESC
            "#,
            c.sql
        );
        self.spawn_stream("revisions", sql, c.args, decode_revision)
    }

    async fn document_counts(&self) -> Result<Vec<LocaleCount>> {
        let c = self.document_constraints();
        let sql = format!(
            r#"
            SELECT w.locale, COUNT(*) AS count
            FROM wiki_document w
            LEFT OUTER JOIN wiki_document p ON w.parent_id = p.id
            {}
            GROUP BY w.locale
            ORDER BY w.locale
            "#,
            c.sql
        );
        let mut query = sqlx::query_as::<_, (String, i64)>(&sql);
        for arg in &c.args {
            query = query.bind(arg.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Querying document counts failed")?;
        Ok(rows
            .into_iter()
            .map(|(locale, count)| LocaleCount { locale, count })
            .collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_constraints() {
        let c = constraints(&SourceFilter::default(), "w", Some("p"), false);
        assert_eq!(
            c.sql,
            " WHERE w.current_revision_id IS NOT NULL AND w.html <> '' AND w.deleted = 0"
        );
        assert!(c.args.is_empty());
    }

    #[test]
    fn locales_and_prefixes() {
        let filter = SourceFilter {
            locales: vec!["en-US".to_string(), "fr".to_string()],
            exclude_prefixes: vec!["Archive".to_string()],
        };
        let c = constraints(&filter, "w", Some("p"), false);
        assert!(c.sql.contains("w.locale IN (?, ?)"));
        assert!(c.sql.contains("NOT (w.slug LIKE ?)"));
        assert!(c.sql.contains("((p.slug IS NULL) OR NOT (p.slug LIKE ?))"));
        assert_eq!(c.args, vec!["en-US", "fr", "Archive%", "Archive%"]);
    }

    #[test]
    fn deleted_included_without_parent() {
        let filter = SourceFilter {
            locales: vec![],
            exclude_prefixes: vec!["A".to_string(), "B".to_string()],
        };
        let c = constraints(&filter, "d", None, true);
        assert!(!c.sql.contains("deleted"));
        assert!(c.sql.contains("NOT (d.slug LIKE ? OR d.slug LIKE ?)"));
        assert_eq!(c.args, vec!["A%", "B%"]);
    }
}

//! Document source abstraction.
//!
//! The [`DocumentSource`] trait is the seam between the migration core and
//! the legacy relational store. The core never manages connections beyond
//! opening a source at the start of a run and closing it at the end.
//!
//! Row streams are single-pass and lazy: a producer task reads rows from the
//! store and pushes them into a bounded channel, and the consumer pulls them
//! with [`RowStream::next`]. When the consumer goes away the producer stops
//! at its next send.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::contributors::ContributorIndex;
use crate::models::{DocumentRow, RedirectRow, RevisionRow};

pub use memory::MemorySource;
pub use sqlite::SqliteSource;

/// Row filter applied by every query of a run.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    /// Locale allow-list; empty means all locales.
    pub locales: Vec<String>,
    /// Slug prefixes excluded from the row and from its parent.
    pub exclude_prefixes: Vec<String>,
}

impl SourceFilter {
    pub fn allows(&self, locale: &str, slug: &str, parent_slug: Option<&str>) -> bool {
        if !self.locales.is_empty() && !self.locales.iter().any(|l| l == locale) {
            return false;
        }
        let excluded = |s: &str| self.exclude_prefixes.iter().any(|p| s.starts_with(p.as_str()));
        !excluded(slug) && !parent_slug.is_some_and(excluded)
    }
}

/// Number of documents per locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleCount {
    pub locale: String,
    pub count: i64,
}

/// Sending half of a [`RowStream`].
pub type RowSender<T> = mpsc::Sender<Result<T>>;

/// A lazy, single-pass stream of rows backed by a bounded channel.
pub struct RowStream<T> {
    rx: mpsc::Receiver<Result<T>>,
}

impl<T: Send + 'static> RowStream<T> {
    /// A connected sender/stream pair buffering at most `capacity` rows.
    pub fn channel(capacity: usize) -> (RowSender<T>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// A finished stream yielding `items` in order.
    pub fn from_results(items: Vec<Result<T>>) -> Self {
        let (tx, stream) = Self::channel(items.len());
        for item in items {
            // Capacity covers every item, so this never fails.
            let _ = tx.try_send(item);
        }
        stream
    }

    pub fn from_rows(rows: Vec<T>) -> Self {
        Self::from_results(rows.into_iter().map(Ok).collect())
    }

    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }

    /// Drain the stream, failing on the first error.
    pub async fn try_collect(mut self) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }
}

/// The legacy document store, as seen by the migration.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`localized_archive_slugs`](DocumentSource::localized_archive_slugs) | Slugs whose parent is an English archive root |
/// | [`redirects`](DocumentSource::redirects) | Stream of every redirect document |
/// | [`documents`](DocumentSource::documents) | Stream of every document with its parent |
/// | [`contributors`](DocumentSource::contributors) | Document creators and usernames |
/// | [`revisions`](DocumentSource::revisions) | Stream of every revision with its author |
/// | [`document_counts`](DocumentSource::document_counts) | Documents per locale |
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Slugs of documents whose parent slug is exactly one of `english_roots`.
    async fn localized_archive_slugs(&self, english_roots: &[String]) -> Result<Vec<String>>;

    fn redirects(&self) -> RowStream<RedirectRow>;

    fn documents(&self) -> RowStream<DocumentRow>;

    /// Creator ids per document (most recent revision first) and usernames.
    /// Deleted documents are included.
    async fn contributors(&self, ignored: &[String]) -> Result<ContributorIndex>;

    /// Every revision of a matching document (deleted ones included),
    /// ordered by locale and then most recent first.
    fn revisions(&self) -> RowStream<RevisionRow>;

    async fn document_counts(&self) -> Result<Vec<LocaleCount>>;

    async fn close(&self) {}
}

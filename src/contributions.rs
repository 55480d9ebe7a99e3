//! Per-revision contributions dump.
//!
//! Streams every revision, newest first within each locale, and writes one
//! CSV record (`LOCALE,SLUG,USERNAME,CREATED`) per revision. A run of
//! consecutive revisions by the same user on one document collapses into its
//! most recent revision. Archived documents and ignored accounts are left
//! out before collapsing, so they never split a run.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::archive::ArchivePrefixSet;
use crate::config::MigrationConfig;
use crate::history::iso_millis;
use crate::models::RevisionRow;
use crate::source::DocumentSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ContributionRecord {
    pub locale: String,
    pub slug: String,
    pub username: String,
    #[serde(serialize_with = "iso_millis")]
    pub created: DateTime<Utc>,
}

/// Decides which revisions make it into the dump.
#[derive(Debug)]
pub struct ContributionLog {
    prefixes: ArchivePrefixSet,
    ignored: HashSet<String>,
    /// Author of the last accepted revision per `(locale, slug)`.
    last_author: HashMap<(String, String), String>,
}

impl ContributionLog {
    pub fn new(prefixes: ArchivePrefixSet, ignored: &[String]) -> Self {
        Self {
            prefixes,
            ignored: ignored.iter().cloned().collect(),
            last_author: HashMap::new(),
        }
    }

    /// Rows must arrive in stream order (most recent first per document).
    pub fn accept(&mut self, row: RevisionRow) -> Option<ContributionRecord> {
        if self.ignored.contains(&row.username) || self.prefixes.matches_slug(&row.slug) {
            return None;
        }
        let key = (row.locale.clone(), row.slug.clone());
        match self.last_author.get_mut(&key) {
            Some(last) if *last == row.username => return None,
            Some(last) => last.clone_from(&row.username),
            None => {
                self.last_author.insert(key, row.username.clone());
            }
        }
        Some(ContributionRecord {
            locale: row.locale,
            slug: row.slug,
            username: row.username,
            created: row.created,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContributionSummary {
    /// Revisions read from the source.
    pub revisions: u64,
    /// Records written.
    pub written: u64,
}

/// Write the contributions CSV for `source` into `out`, then close the
/// source.
pub async fn export_contributions<W: Write>(
    options: &MigrationConfig,
    source: &dyn DocumentSource,
    out: W,
) -> Result<ContributionSummary> {
    let result = write_contributions(options, source, out).await;
    source.close().await;
    result
}

async fn write_contributions<W: Write>(
    options: &MigrationConfig,
    source: &dyn DocumentSource,
    out: W,
) -> Result<ContributionSummary> {
    let mut prefixes = ArchivePrefixSet::new(&options.extra_archive_prefixes);
    let localized = source
        .localized_archive_slugs(prefixes.english_roots())
        .await?;
    prefixes.extend_localized(localized);

    let mut log = ContributionLog::new(prefixes, &options.ignored_contributors);
    let mut writer = csv::Writer::from_writer(out);
    let mut summary = ContributionSummary::default();

    let mut rows = source.revisions();
    while let Some(row) = rows.next().await {
        let row = row.context("Reading revisions failed")?;
        summary.revisions += 1;
        if let Some(record) = log.accept(row) {
            writer
                .serialize(&record)
                .context("Writing contribution record failed")?;
            summary.written += 1;
        }
    }
    writer.flush().context("Flushing contributions failed")?;

    info!(
        revisions = summary.revisions,
        written = summary.written,
        "contributions exported"
    );
    Ok(summary)
}

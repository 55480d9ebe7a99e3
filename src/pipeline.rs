//! Per-document unit of work and run orchestration.
//!
//! A run goes through these phases:
//!
//! 1. Build the [`MigrationContext`]: archive prefixes, resolved redirects
//!    and contributors.
//! 2. Stream every document through the [`Governor`], running
//!    [`process_row`] once per document.
//! 3. Close the source and write the per-locale files.
//!
//! Any error in phase 2 stops the run before anything is written.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::context::MigrationContext;
use crate::error::MigrateError;
use crate::governor::Governor;
use crate::history::{chase_translation, HistoryAggregator, WikiHistory};
use crate::models::DocumentRow;
use crate::normalize::{extract_redirect_target, Fix, Normalized};
use crate::output::{MigrationOutput, OutputWriter, RedirectMap};
use crate::source::DocumentSource;

/// What happened to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// The document's own URI is covered by a fundamental redirect.
    Fundamental,
    ArchivedRedirect,
    /// Redirect without a usable target.
    DiscardedRedirect,
    /// Redirect whose target could not be made sense of.
    MessedRedirect,
    Redirect { improved: bool, fast_forwarded: bool },
    Archived,
    Content { translated: bool },
}

/// Mutable state shared by the units of work of one run.
#[derive(Debug, Default)]
pub struct Sinks {
    pub history: HistoryAggregator,
    redirects: Mutex<HashMap<String, BTreeMap<String, String>>>,
    built_paths: Mutex<HashSet<(String, String)>>,
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_redirect(&self, locale: &str, from: String, to: String) {
        self.redirects
            .lock()
            .entry(locale.to_string())
            .or_default()
            .insert(from, to);
    }

    /// Claim the `(locale, slug)` output path. Returns `false` when another
    /// document already claimed it; slugs compare case-insensitively.
    fn claim_path(&self, locale: &str, slug: &str) -> bool {
        self.built_paths
            .lock()
            .insert((locale.to_string(), slug.to_lowercase()))
    }

    pub fn into_output(self) -> MigrationOutput {
        MigrationOutput {
            history: self.history.into_snapshot(),
            redirects: self.redirects.into_inner().into_iter().collect(),
        }
    }
}

/// Classify one document and record whatever it contributes.
pub fn process_row(ctx: &MigrationContext, sinks: &Sinks, row: DocumentRow) -> Result<RowOutcome> {
    let uri = row.uri();
    if ctx.fundamentals.resolve(&uri).is_some() {
        return Ok(RowOutcome::Fundamental);
    }
    let archived = ctx.classifier().is_archived(&row);

    if row.is_redirect {
        if archived {
            return Ok(RowOutcome::ArchivedRedirect);
        }
        let Some(raw) = extract_redirect_target(&row.html) else {
            info!(locale = %row.locale, slug = %row.slug, "is redirect but no REDIRECT_HTML");
            return Ok(RowOutcome::DiscardedRedirect);
        };
        let (url, improved) = match ctx.normalizer.normalize(&raw, &row.locale) {
            Normalized::Malformed => return Ok(RowOutcome::MessedRedirect),
            Normalized::External(url) => (url, false),
            Normalized::Canonical { uri, fix } => (uri, fix == Fix::Improved),
        };
        let Some(final_uri) = ctx.redirects.final_destination(&uri) else {
            // Dropped while building the graph, e.g. a self-redirect.
            return Ok(RowOutcome::DiscardedRedirect);
        };
        let fast_forwarded = url != final_uri;
        sinks.record_redirect(&row.locale, uri, final_uri.to_string());
        return Ok(RowOutcome::Redirect {
            improved,
            fast_forwarded,
        });
    }

    if row.locale.is_empty() {
        return Err(MigrateError::MissingLocale(row.id).into());
    }
    if archived {
        return Ok(RowOutcome::Archived);
    }

    if !sinks.claim_path(&row.locale, &row.slug) && ctx.options.start_clean {
        return Err(MigrateError::DuplicatePath(format!("{}/{}", row.locale, row.slug)).into());
    }

    let translation = chase_translation(&row, &ctx.redirects)?;
    sinks.history.record(
        &row.locale,
        &row.slug,
        WikiHistory {
            modified: row.modified,
            contributors: ctx.contributors.usernames_for(row.id),
        },
    );
    let translated = translation.is_some();
    if let Some(record) = translation {
        sinks.history.record_translation(&row.locale, &row.slug, record);
    }
    Ok(RowOutcome::Content { translated })
}

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub documents: u64,
    pub content: u64,
    pub translations: u64,
    pub archived: u64,
    pub fundamental: u64,
    pub redirects: u64,
    pub improved_redirects: u64,
    pub fast_forwarded_redirects: u64,
    pub archived_redirects: u64,
    pub discarded_redirects: u64,
    pub messed_redirects: u64,
    pub peak_in_flight: usize,
    pub files_written: usize,
}

impl MigrationReport {
    pub fn record(&mut self, outcome: RowOutcome) {
        self.documents += 1;
        match outcome {
            RowOutcome::Fundamental => self.fundamental += 1,
            RowOutcome::ArchivedRedirect => self.archived_redirects += 1,
            RowOutcome::DiscardedRedirect => self.discarded_redirects += 1,
            RowOutcome::MessedRedirect => self.messed_redirects += 1,
            RowOutcome::Redirect {
                improved,
                fast_forwarded,
            } => {
                self.redirects += 1;
                self.improved_redirects += u64::from(improved);
                self.fast_forwarded_redirects += u64::from(fast_forwarded);
            }
            RowOutcome::Archived => self.archived += 1,
            RowOutcome::Content { translated } => {
                self.content += 1;
                self.translations += u64::from(translated);
            }
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration summary")?;
        writeln!(f, "=================")?;
        writeln!(f, "  Documents:            {}", self.documents)?;
        writeln!(f, "  Content:              {}", self.content)?;
        writeln!(f, "  Translations:         {}", self.translations)?;
        writeln!(f, "  Archived:             {}", self.archived)?;
        writeln!(f, "  Fundamental:          {}", self.fundamental)?;
        writeln!(f, "  Redirects:            {}", self.redirects)?;
        writeln!(f, "    improved:           {}", self.improved_redirects)?;
        writeln!(f, "    fast-forwarded:     {}", self.fast_forwarded_redirects)?;
        writeln!(f, "    archived:           {}", self.archived_redirects)?;
        writeln!(f, "    discarded:          {}", self.discarded_redirects)?;
        writeln!(f, "    messed up:          {}", self.messed_redirects)?;
        writeln!(f, "  Peak in flight:       {}", self.peak_in_flight)?;
        write!(f, "  Files written:        {}", self.files_written)
    }
}

/// Run a full migration from `source` into the configured output trees.
pub async fn run_migration(config: &Config, source: &dyn DocumentSource) -> Result<MigrationReport> {
    let result = migrate_documents(config, source).await;
    source.close().await;
    let (report, output) = result?;

    let writer = OutputWriter::new(&config.output, config.migration.start_clean);
    let files_written = writer.write_all(&output)?;
    info!(files = files_written, "output written");

    Ok(MigrationReport {
        files_written,
        ..report
    })
}

async fn migrate_documents(
    config: &Config,
    source: &dyn DocumentSource,
) -> Result<(MigrationReport, MigrationOutput)> {
    let ctx = Arc::new(MigrationContext::build(source, config.migration.clone()).await?);
    let sinks = Arc::new(Sinks::new());
    let governor = Governor::new(config.migration.max_open_files);
    let mut report = MigrationReport::default();

    let summary = governor
        .drive(
            source.documents(),
            |row| {
                let ctx = ctx.clone();
                let sinks = sinks.clone();
                async move { process_row(&ctx, &sinks, row) }
            },
            |outcome| report.record(outcome),
        )
        .await?;
    report.peak_in_flight = summary.peak_in_flight;
    debug!(
        rows = summary.rows,
        peak_in_flight = summary.peak_in_flight,
        "document stream drained"
    );

    let sinks = Arc::try_unwrap(sinks).map_err(|_| anyhow!("run state still shared after drain"))?;
    Ok((report, sinks.into_output()))
}

/// Resolve redirects only and return the final redirect map per source
/// locale. Archival chains and redirects living in an archived section are
/// left out, matching what [`run_migration`] writes.
pub async fn resolve_redirects(config: &Config, source: &dyn DocumentSource) -> Result<RedirectMap> {
    let ctx = MigrationContext::build(source, config.migration.clone()).await;
    source.close().await;
    let ctx = ctx?;

    let mut map = RedirectMap::new();
    for (from, result) in ctx.redirects.iter() {
        if result.to_archive
            || ctx.prefixes.matches_uri(from)
            || ctx.fundamentals.resolve(from).is_some()
        {
            continue;
        }
        let Some(locale) = from.split('/').nth(1).filter(|l| !l.is_empty()) else {
            continue;
        };
        map.entry(locale.to_string())
            .or_default()
            .insert(from.to_string(), result.final_uri.clone());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, MigrationConfig, OutputConfig};
    use crate::models::ParentRef;
    use crate::source::{MemorySource, SourceFilter};
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::Path;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap()
    }

    fn doc(id: i64, locale: &str, slug: &str) -> DocumentRow {
        DocumentRow {
            id,
            title: slug.to_string(),
            slug: slug.to_string(),
            locale: locale.to_string(),
            is_redirect: false,
            html: "<p>content</p>".to_string(),
            modified: at(),
            parent: None,
        }
    }

    fn redirect(id: i64, locale: &str, slug: &str, href: &str) -> DocumentRow {
        DocumentRow {
            is_redirect: true,
            html: format!(r#"REDIRECT <a class="redirect" href="{}">x</a>"#, href),
            ..doc(id, locale, slug)
        }
    }

    fn translated(id: i64, locale: &str, slug: &str, parent: &str, parent_is_redirect: bool) -> DocumentRow {
        DocumentRow {
            parent: Some(ParentRef {
                slug: parent.to_string(),
                locale: "en-US".to_string(),
                is_redirect: parent_is_redirect,
                modified: at(),
            }),
            ..doc(id, locale, slug)
        }
    }

    fn config(root: &Path, migration: MigrationConfig) -> Config {
        Config {
            db: DbConfig {
                path: root.join("unused.sqlite"),
            },
            output: OutputConfig {
                content_root: root.join("content"),
                translated_root: root.join("translated"),
                translated_rendered_root: None,
            },
            migration,
        }
    }

    fn source() -> MemorySource {
        let mut source = MemorySource::new(SourceFilter::default());
        source
            .add_document(doc(1, "en-US", "Web/HTML"))
            .add_document(doc(2, "en-US", "Web/CSS"))
            .add_document(redirect(3, "en-US", "Old/HTML", "/en/HTML"))
            .add_document(redirect(4, "en-US", "Older/HTML", "/en-US/docs/Old/HTML"))
            .add_document(redirect(5, "en-US", "Gone", "/en-US/docs/Archive/Gone"))
            .add_document(doc(6, "en-US", "Archive/Gone"))
            .add_document(translated(7, "fr", "Web/HTML", "Old/HTML", true))
            .add_document(redirect(8, "en-US", "Broken", "/foo/bar/docs/x"))
            .add_document(doc(9, "en-US", "DOM/window"))
            .add_revision(1, 10)
            .add_revision(1, 11)
            .add_revision(1, 10)
            .add_user(10, "alice")
            .add_user(11, "mdnwebdocs-bot");
        source
    }

    #[tokio::test]
    async fn end_to_end_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), MigrationConfig::default());
        let report = run_migration(&cfg, &source()).await.unwrap();

        assert_eq!(report.documents, 9);
        assert_eq!(report.content, 3);
        assert_eq!(report.translations, 1);
        assert_eq!(report.archived, 1);
        assert_eq!(report.fundamental, 1);
        assert_eq!(report.redirects, 2);
        assert_eq!(report.archived_redirects, 1);
        assert_eq!(report.messed_redirects, 1);
        assert!(report.peak_in_flight >= 1);

        let history: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("content/en-us/_wikihistory.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(history["Web/HTML"]["contributors"], serde_json::json!(["alice"]));
        assert!(history["Web/CSS"].get("contributors").is_none());
        assert!(history.get("Archive/Gone").is_none());

        let redirects =
            std::fs::read_to_string(dir.path().join("content/en-us/_redirects.txt")).unwrap();
        assert!(redirects.contains("/en-US/docs/Old/HTML\t/en-US/docs/Web/HTML\n"));
        assert!(redirects.contains("/en-US/docs/Older/HTML\t/en-US/docs/Web/HTML\n"));
        assert!(!redirects.contains("Gone"));

        let translations: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("translated/fr/_translations.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(translations["Web/HTML"]["translation_of"], "Web/HTML");
        assert_eq!(translations["Web/HTML"]["translation_of_original"], "Old/HTML");
    }

    #[tokio::test]
    async fn redirect_outcomes() {
        let src = source();
        let ctx = MigrationContext::build(&src, MigrationConfig::default())
            .await
            .unwrap();
        let sinks = Sinks::new();

        let improved = process_row(&ctx, &sinks, redirect(3, "en-US", "Old/HTML", "/en/HTML")).unwrap();
        assert_eq!(
            improved,
            RowOutcome::Redirect {
                improved: true,
                fast_forwarded: true
            }
        );

        let chained =
            process_row(&ctx, &sinks, redirect(4, "en-US", "Older/HTML", "/en-US/docs/Old/HTML"))
                .unwrap();
        assert_eq!(
            chained,
            RowOutcome::Redirect {
                improved: false,
                fast_forwarded: true
            }
        );

        let missing = DocumentRow {
            is_redirect: true,
            ..doc(20, "en-US", "NoAnchor")
        };
        assert_eq!(
            process_row(&ctx, &sinks, missing).unwrap(),
            RowOutcome::DiscardedRedirect
        );
    }

    #[tokio::test]
    async fn duplicate_path_is_fatal_with_start_clean() {
        let mut src = MemorySource::new(SourceFilter::default());
        src.add_document(doc(1, "en-US", "Web/HTML"))
            .add_document(doc(2, "en-US", "web/html"));

        let dir = tempfile::tempdir().unwrap();
        let lenient = config(dir.path(), MigrationConfig::default());
        run_migration(&lenient, &src).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let strict = config(
            dir.path(),
            MigrationConfig {
                start_clean: true,
                ..MigrationConfig::default()
            },
        );
        let err = run_migration(&strict, &src).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::DuplicatePath(_))
        ));
        assert!(!dir.path().join("content").exists());
    }

    #[tokio::test]
    async fn unexpected_parent_locale_stops_run() {
        let mut src = MemorySource::new(SourceFilter::default());
        let mut row = translated(1, "fr", "Web/HTML", "Web/HTML", false);
        if let Some(parent) = row.parent.as_mut() {
            parent.locale = "de".to_string();
        }
        src.add_document(row);

        let dir = tempfile::tempdir().unwrap();
        let err = run_migration(&config(dir.path(), MigrationConfig::default()), &src)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected en-US"));
        assert!(!dir.path().join("translated").exists());
    }

    #[tokio::test]
    async fn source_failure_writes_nothing() {
        let mut src = source();
        src.fail_after(2);
        let dir = tempfile::tempdir().unwrap();
        let err = run_migration(&config(dir.path(), MigrationConfig::default()), &src)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("connection to document source lost"));
        assert!(!dir.path().join("content").exists());
    }

    #[tokio::test]
    async fn redirects_only() {
        let dir = tempfile::tempdir().unwrap();
        let map = resolve_redirects(&config(dir.path(), MigrationConfig::default()), &source())
            .await
            .unwrap();
        let en = &map["en-US"];
        assert_eq!(en["/en-US/docs/Older/HTML"], "/en-US/docs/Web/HTML");
        assert!(!en.contains_key("/en-US/docs/Gone"));
    }

    #[tokio::test]
    async fn redirects_only_agrees_with_run() {
        let mut src = source();
        src.add_document(redirect(10, "en-US", "Archive/Old", "/en-US/docs/Web/HTML"));

        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), MigrationConfig::default());
        let map = resolve_redirects(&cfg, &src).await.unwrap();
        let report = run_migration(&cfg, &src).await.unwrap();
        assert_eq!(report.archived_redirects, 2);

        let written =
            std::fs::read_to_string(dir.path().join("content/en-us/_redirects.txt")).unwrap();
        let expected: String = map["en-US"]
            .iter()
            .map(|(from, to)| format!("{}\t{}\n", from, to))
            .collect();
        assert_eq!(written, expected);
        assert!(!map["en-US"].contains_key("/en-US/docs/Archive/Old"));
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = MigrationReport::default();
        report.record(RowOutcome::Content { translated: true });
        report.record(RowOutcome::Redirect {
            improved: true,
            fast_forwarded: false,
        });
        report.record(RowOutcome::Archived);
        assert_eq!(report.documents, 3);
        assert_eq!(report.translations, 1);
        assert_eq!(report.improved_redirects, 1);
        assert_eq!(report.fast_forwarded_redirects, 0);
        assert!(report.to_string().contains("Documents:            3"));
    }
}

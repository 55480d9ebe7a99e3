//! Read-only state shared by every unit of work in a run.
//!
//! Built once, before the document stream is opened, and then shared
//! through an `Arc`. Nothing in here changes while documents are processed.

use anyhow::{Context, Result};
use tracing::info;

use crate::archive::{ArchiveClassifier, ArchivePrefixSet};
use crate::config::MigrationConfig;
use crate::contributors::ContributorIndex;
use crate::fundamental::FundamentalRedirects;
use crate::normalize::Normalizer;
use crate::redirects::{BuildStats, RedirectGraph, RedirectResolution};
use crate::source::DocumentSource;

pub struct MigrationContext {
    pub options: MigrationConfig,
    pub normalizer: Normalizer,
    pub fundamentals: FundamentalRedirects,
    pub prefixes: ArchivePrefixSet,
    pub graph_stats: BuildStats,
    pub redirects: RedirectResolution,
    pub contributors: ContributorIndex,
}

impl MigrationContext {
    /// Gather everything the per-row work needs from `source`:
    /// localized archive prefixes, the resolved redirect graph and the
    /// contributor index, in that order.
    pub async fn build(source: &dyn DocumentSource, options: MigrationConfig) -> Result<Self> {
        let normalizer = Normalizer::new();
        let fundamentals = FundamentalRedirects::new();

        let mut prefixes = ArchivePrefixSet::new(&options.extra_archive_prefixes);
        let localized = source
            .localized_archive_slugs(prefixes.english_roots())
            .await?;
        let added = prefixes.extend_localized(localized);
        info!(prefixes = prefixes.len(), localized = added, "archive prefixes ready");

        let mut graph = RedirectGraph::new();
        let mut rows = source.redirects();
        while let Some(row) = rows.next().await {
            let row = row.context("Reading redirect documents failed")?;
            graph.insert_row(&row, &normalizer, &fundamentals);
        }
        let graph_stats = graph.stats();
        info!(
            rows = graph_stats.rows,
            edges = graph.len(),
            fundamental = graph_stats.fundamental,
            "redirect graph built"
        );

        let redirects = graph.resolve(&prefixes);
        info!(
            resolved = redirects.len(),
            discarded = redirects.discarded().len(),
            "redirects resolved"
        );

        let contributors = source
            .contributors(&options.ignored_contributors)
            .await?;
        info!(
            documents = contributors.documents(),
            users = contributors.users(),
            "contributors loaded"
        );

        Ok(Self {
            options,
            normalizer,
            fundamentals,
            prefixes,
            graph_stats,
            redirects,
            contributors,
        })
    }

    pub fn classifier(&self) -> ArchiveClassifier<'_> {
        ArchiveClassifier::new(&self.prefixes, &self.redirects)
    }
}

//! In-memory [`DocumentSource`] for tests and dry runs.
//!
//! Applies the same row filter as the SQLite source. A stream failure can be
//! injected after a number of documents to exercise fail-fast handling.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use async_trait::async_trait;

use super::{DocumentSource, LocaleCount, RowStream, SourceFilter};
use crate::contributors::ContributorIndex;
use crate::models::{DocumentRow, RedirectRow, RevisionRow};

#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    documents: Vec<DocumentRow>,
    /// `(document_id, creator_id, created)`, most recent first.
    revisions: Vec<(i64, i64, DateTime<Utc>)>,
    users: Vec<(i64, String)>,
    filter: SourceFilter,
    fail_after: Option<usize>,
}

impl MemorySource {
    pub fn new(filter: SourceFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn add_document(&mut self, row: DocumentRow) -> &mut Self {
        self.documents.push(row);
        self
    }

    pub fn add_revision(&mut self, document_id: i64, creator_id: i64) -> &mut Self {
        self.add_revision_at(document_id, creator_id, DateTime::<Utc>::default())
    }

    pub fn add_revision_at(
        &mut self,
        document_id: i64,
        creator_id: i64,
        created: DateTime<Utc>,
    ) -> &mut Self {
        self.revisions.push((document_id, creator_id, created));
        self
    }

    pub fn add_user(&mut self, id: i64, username: &str) -> &mut Self {
        self.users.push((id, username.to_string()));
        self
    }

    /// Make the document stream fail after yielding `n` rows.
    pub fn fail_after(&mut self, n: usize) -> &mut Self {
        self.fail_after = Some(n);
        self
    }

    fn visible(&self) -> impl Iterator<Item = &DocumentRow> {
        self.documents.iter().filter(|d| {
            !d.html.is_empty()
                && self.filter.allows(
                    &d.locale,
                    &d.slug,
                    d.parent.as_ref().map(|p| p.slug.as_str()),
                )
        })
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn localized_archive_slugs(&self, english_roots: &[String]) -> Result<Vec<String>> {
        let mut slugs: Vec<String> = self
            .visible()
            .filter(|d| {
                d.parent
                    .as_ref()
                    .is_some_and(|p| english_roots.iter().any(|r| *r == p.slug))
            })
            .map(|d| d.slug.clone())
            .collect();
        slugs.sort();
        slugs.dedup();
        Ok(slugs)
    }

    fn redirects(&self) -> RowStream<RedirectRow> {
        RowStream::from_rows(
            self.visible()
                .filter(|d| d.is_redirect)
                .map(|d| RedirectRow {
                    locale: d.locale.clone(),
                    slug: d.slug.clone(),
                    html: d.html.clone(),
                })
                .collect(),
        )
    }

    fn documents(&self) -> RowStream<DocumentRow> {
        let mut items: Vec<Result<DocumentRow>> = self.visible().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(anyhow!("connection to document source lost")));
        }
        RowStream::from_results(items)
    }

    async fn contributors(&self, ignored: &[String]) -> Result<ContributorIndex> {
        let mut index = ContributorIndex::new(ignored.iter().cloned());
        for (document_id, creator_id, _) in &self.revisions {
            index.add_revision(*document_id, *creator_id);
        }
        for (id, username) in &self.users {
            index.add_user(*id, username.clone());
        }
        Ok(index)
    }

    fn revisions(&self) -> RowStream<RevisionRow> {
        let documents: BTreeMap<i64, &DocumentRow> = self.visible().map(|d| (d.id, d)).collect();
        let users: BTreeMap<i64, &str> = self
            .users
            .iter()
            .map(|(id, name)| (*id, name.as_str()))
            .collect();
        let mut rows: Vec<RevisionRow> = self
            .revisions
            .iter()
            .filter_map(|(document_id, creator_id, created)| {
                let doc = documents.get(document_id)?;
                let username = users.get(creator_id)?;
                Some(RevisionRow {
                    locale: doc.locale.clone(),
                    slug: doc.slug.clone(),
                    username: username.to_string(),
                    created: *created,
                })
            })
            .collect();
        // Stable, so equal timestamps keep insertion order.
        rows.sort_by(|a, b| a.locale.cmp(&b.locale).then(b.created.cmp(&a.created)));
        RowStream::from_rows(rows)
    }

    async fn document_counts(&self) -> Result<Vec<LocaleCount>> {
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for d in self.visible() {
            *counts.entry(d.locale.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(locale, count)| LocaleCount {
                locale: locale.to_string(),
                count,
            })
            .collect())
    }
}

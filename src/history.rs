//! Per-locale wiki history.
//!
//! Units of work record one [`WikiHistory`] entry per content document and
//! one [`TranslationRecord`] per translated document. Both live behind a
//! single short synchronous lock; nothing awaits while holding it. Keys are
//! kept in a `BTreeMap` so the written files are sorted by slug.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::error::MigrateError;
use crate::models::{DocumentRow, TranslationRecord};
use crate::normalize::{make_uri, uri_to_slug, DEFAULT_LOCALE};
use crate::redirects::RedirectResolution;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiHistory {
    #[serde(serialize_with = "iso_millis")]
    pub modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,
}

pub(crate) fn iso_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub type LocaleHistory = BTreeMap<String, WikiHistory>;
pub type LocaleTranslations = BTreeMap<String, TranslationRecord>;

/// Everything aggregated during a run, keyed by locale.
#[derive(Debug, Default)]
pub struct HistorySnapshot {
    pub history: BTreeMap<String, LocaleHistory>,
    pub translations: BTreeMap<String, LocaleTranslations>,
}

#[derive(Debug, Default)]
struct Inner {
    history: HashMap<String, LocaleHistory>,
    translations: HashMap<String, LocaleTranslations>,
}

#[derive(Debug, Default)]
pub struct HistoryAggregator {
    inner: Mutex<Inner>,
}

impl HistoryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the history of one document. A later record for the same
    /// slug replaces the earlier one.
    pub fn record(&self, locale: &str, slug: &str, entry: WikiHistory) {
        let mut inner = self.inner.lock();
        inner
            .history
            .entry(locale.to_string())
            .or_default()
            .insert(slug.to_string(), entry);
    }

    pub fn record_translation(&self, locale: &str, slug: &str, record: TranslationRecord) {
        let mut inner = self.inner.lock();
        inner
            .translations
            .entry(locale.to_string())
            .or_default()
            .insert(slug.to_string(), record);
    }

    /// Number of history entries across all locales.
    pub fn len(&self) -> usize {
        self.inner.lock().history.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_snapshot(self) -> HistorySnapshot {
        let inner = self.inner.into_inner();
        HistorySnapshot {
            history: inner.history.into_iter().collect(),
            translations: inner.translations.into_iter().collect(),
        }
    }
}

/// Work out what a document is a translation of.
///
/// Returns `None` for documents without a parent. Parents must be in the
/// primary locale. A parent that has since become a redirect is followed to
/// its final destination; the original parent slug is kept alongside when
/// the two differ.
pub fn chase_translation(
    row: &DocumentRow,
    redirects: &RedirectResolution,
) -> Result<Option<TranslationRecord>> {
    let Some(parent) = &row.parent else {
        return Ok(None);
    };
    if parent.locale != DEFAULT_LOCALE {
        return Err(MigrateError::UnexpectedParentLocale {
            locale: row.locale.clone(),
            slug: row.slug.clone(),
            parent_locale: parent.locale.clone(),
        }
        .into());
    }

    let mut record = TranslationRecord {
        title: row.title.clone(),
        translation_of: parent.slug.clone(),
        translation_of_original: None,
    };
    if parent.is_redirect {
        let parent_uri = make_uri(&parent.locale, &parent.slug);
        if let Some(final_uri) = redirects.final_destination(&parent_uri) {
            let target = uri_to_slug(final_uri);
            if target != parent.slug {
                record.translation_of = target.to_string();
                record.translation_of_original = Some(parent.slug.clone());
            }
        }
    }
    Ok(Some(record))
}

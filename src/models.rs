//! Core data models used throughout the migration.
//!
//! These types represent the rows read from the legacy store and the
//! records that flow through redirect resolution and history aggregation.

use chrono::{DateTime, Utc};

/// The parent (translation source) of a document, as joined in the
/// document query.
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub slug: String,
    pub locale: String,
    pub is_redirect: bool,
    pub modified: DateTime<Utc>,
}

/// One row of the main document stream.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub locale: String,
    pub is_redirect: bool,
    pub html: String,
    pub modified: DateTime<Utc>,
    pub parent: Option<ParentRef>,
}

impl DocumentRow {
    pub fn uri(&self) -> String {
        crate::normalize::make_uri(&self.locale, &self.slug)
    }
}

/// A redirect document as read while building the redirect graph.
#[derive(Debug, Clone)]
pub struct RedirectRow {
    pub locale: String,
    pub slug: String,
    pub html: String,
}

/// One revision as read for the contributions dump.
#[derive(Debug, Clone)]
pub struct RevisionRow {
    pub locale: String,
    pub slug: String,
    pub username: String,
    pub created: DateTime<Utc>,
}

/// Translation metadata recorded for a document with a parent.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TranslationRecord {
    pub title: String,
    pub translation_of: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_of_original: Option<String>,
}

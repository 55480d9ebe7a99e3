//! Typed fatal conditions raised inside a migration run.
//!
//! Everything else flows through `anyhow`; these variants exist so callers
//! and tests can tell the data problems apart from I/O failures.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("{0} already exists!")]
    DuplicatePath(String),

    #[error("document {locale}/{slug} has a parent in locale '{parent_locale}', expected en-US")]
    UnexpectedParentLocale {
        locale: String,
        slug: String,
        parent_locale: String,
    },

    #[error("refusing to overwrite {} (start clean is set)", .0.display())]
    OutputExists(PathBuf),

    #[error("document {0} has no locale")]
    MissingLocale(i64),
}

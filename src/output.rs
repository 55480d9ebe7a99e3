//! Write the aggregated run state to the content trees.
//!
//! Every locale gets its own folder (lowercased locale name). The primary
//! locale lives under `content_root`, every other locale under
//! `translated_root`. Three files can appear in a locale folder:
//!
//! | File | Content |
//! |------|---------|
//! | `_wikihistory.json` | slug → `{ modified, contributors }`, sorted by slug |
//! | `_redirects.txt` | `from<TAB>to` per line, sorted by source |
//! | `_translations.json` | slug → translation metadata (translated locales only) |
//!
//! When a `translated_rendered_root` is configured, every translated
//! locale's history is mirrored there as well.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::config::OutputConfig;
use crate::error::MigrateError;
use crate::history::{HistorySnapshot, LocaleHistory, LocaleTranslations};
use crate::normalize::DEFAULT_LOCALE;

pub const HISTORY_FILE: &str = "_wikihistory.json";
pub const REDIRECTS_FILE: &str = "_redirects.txt";
pub const TRANSLATIONS_FILE: &str = "_translations.json";

/// Final redirect map per locale: source URI → final destination.
pub type RedirectMap = BTreeMap<String, BTreeMap<String, String>>;

/// Everything a run hands to the writers.
#[derive(Debug, Default)]
pub struct MigrationOutput {
    pub history: HistorySnapshot,
    pub redirects: RedirectMap,
}

pub struct OutputWriter<'a> {
    config: &'a OutputConfig,
    start_clean: bool,
}

impl<'a> OutputWriter<'a> {
    /// With `start_clean` set, any existing output file is an error.
    pub fn new(config: &'a OutputConfig, start_clean: bool) -> Self {
        Self {
            config,
            start_clean,
        }
    }

    pub fn locale_dir(&self, locale: &str) -> PathBuf {
        let root = if locale == DEFAULT_LOCALE {
            &self.config.content_root
        } else {
            &self.config.translated_root
        };
        root.join(locale.to_lowercase())
    }

    fn mirror_dir(&self, locale: &str) -> Option<PathBuf> {
        if locale == DEFAULT_LOCALE {
            return None;
        }
        self.config
            .translated_rendered_root
            .as_ref()
            .map(|root| root.join(locale.to_lowercase()))
    }

    /// Write every file of a run. Returns the number of files written.
    pub fn write_all(&self, output: &MigrationOutput) -> Result<usize> {
        let mut written = self.write_history(&output.history.history)?;
        written += self.write_redirects(&output.redirects)?;
        written += self.write_translations(&output.history.translations)?;
        Ok(written)
    }

    pub fn write_history(&self, history: &BTreeMap<String, LocaleHistory>) -> Result<usize> {
        let mut written = 0;
        for (locale, entries) in history {
            let json = to_json(entries)?;
            self.write_file(&self.locale_dir(locale).join(HISTORY_FILE), &json)?;
            written += 1;
            if let Some(mirror) = self.mirror_dir(locale) {
                self.write_file(&mirror.join(HISTORY_FILE), &json)?;
                written += 1;
            }
        }
        Ok(written)
    }

    pub fn write_redirects(&self, redirects: &RedirectMap) -> Result<usize> {
        let mut written = 0;
        for (locale, pairs) in redirects {
            if pairs.is_empty() {
                continue;
            }
            let mut text = String::new();
            for (from, to) in pairs {
                text.push_str(from);
                text.push('\t');
                text.push_str(to);
                text.push('\n');
            }
            self.write_file(&self.locale_dir(locale).join(REDIRECTS_FILE), &text)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn write_translations(
        &self,
        translations: &BTreeMap<String, LocaleTranslations>,
    ) -> Result<usize> {
        let mut written = 0;
        for (locale, records) in translations {
            if locale == DEFAULT_LOCALE || records.is_empty() {
                continue;
            }
            let json = to_json(records)?;
            self.write_file(&self.locale_dir(locale).join(TRANSLATIONS_FILE), &json)?;
            written += 1;
        }
        Ok(written)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if self.start_clean && path.exists() {
            return Err(MigrateError::OutputExists(path.to_path_buf()).into());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), bytes = content.len(), "wrote output file");
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::WikiHistory;
    use crate::models::TranslationRecord;
    use chrono::{TimeZone, Utc};

    fn config(root: &Path, mirror: bool) -> OutputConfig {
        OutputConfig {
            content_root: root.join("content"),
            translated_root: root.join("translated"),
            translated_rendered_root: mirror.then(|| root.join("rendered")),
        }
    }

    fn sample() -> MigrationOutput {
        let entry = WikiHistory {
            modified: Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap(),
            contributors: vec!["alice".to_string()],
        };
        let mut output = MigrationOutput::default();
        for (locale, slug) in [("en-US", "Web/HTML"), ("en-US", "Web/CSS"), ("fr", "Web/HTML")] {
            output
                .history
                .history
                .entry(locale.to_string())
                .or_default()
                .insert(slug.to_string(), entry.clone());
        }
        output
            .history
            .translations
            .entry("fr".to_string())
            .or_default()
            .insert(
                "Web/HTML".to_string(),
                TranslationRecord {
                    title: "HTML".to_string(),
                    translation_of: "Web/HTML".to_string(),
                    translation_of_original: None,
                },
            );
        let en = output.redirects.entry("en-US".to_string()).or_default();
        en.insert("/en-US/docs/Old/B".to_string(), "/en-US/docs/Web/CSS".to_string());
        en.insert("/en-US/docs/Old/A".to_string(), "/en-US/docs/Web/HTML".to_string());
        output
    }

    #[test]
    fn writes_locale_folders() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), true);
        let written = OutputWriter::new(&cfg, false).write_all(&sample()).unwrap();
        // en-US history, fr history + mirror, en-US redirects, fr translations
        assert_eq!(written, 5);

        let history = std::fs::read_to_string(dir.path().join("content/en-us/_wikihistory.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&history).unwrap();
        let keys: Vec<_> = parsed.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["Web/CSS", "Web/HTML"]);
        assert_eq!(parsed["Web/HTML"]["modified"], "2020-01-02T03:04:05.000Z");

        assert!(dir.path().join("translated/fr/_wikihistory.json").exists());
        assert!(dir.path().join("rendered/fr/_wikihistory.json").exists());
        assert!(!dir.path().join("rendered/en-us").exists());

        let redirects = std::fs::read_to_string(dir.path().join("content/en-us/_redirects.txt")).unwrap();
        assert_eq!(
            redirects,
            "/en-US/docs/Old/A\t/en-US/docs/Web/HTML\n/en-US/docs/Old/B\t/en-US/docs/Web/CSS\n"
        );

        let translations =
            std::fs::read_to_string(dir.path().join("translated/fr/_translations.json")).unwrap();
        assert!(translations.contains("\"translation_of\": \"Web/HTML\""));
        assert!(!translations.contains("translation_of_original"));
    }

    #[test]
    fn start_clean_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), false);
        OutputWriter::new(&cfg, false).write_all(&sample()).unwrap();
        // Overwriting is fine without start clean.
        OutputWriter::new(&cfg, false).write_all(&sample()).unwrap();

        let err = OutputWriter::new(&cfg, true)
            .write_all(&sample())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::OutputExists(_))
        ));
    }
}

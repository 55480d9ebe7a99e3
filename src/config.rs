use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::contributors::IGNORABLE_CONTRIBUTORS;
use crate::governor::MAX_OPEN_FILES;
use crate::normalize::Normalizer;
use crate::source::SourceFilter;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Root of the primary-locale content tree.
    pub content_root: PathBuf,
    /// Root of the translated content tree.
    pub translated_root: PathBuf,
    /// Optional second translated tree that receives a copy of every
    /// translated locale's history.
    #[serde(default)]
    pub translated_rendered_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    #[serde(default)]
    pub locales: Vec<String>,
    #[serde(default)]
    pub exclude_prefixes: Vec<String>,
    #[serde(default)]
    pub start_clean: bool,
    #[serde(default = "default_max_open_files")]
    pub max_open_files: usize,
    #[serde(default = "default_ignored_contributors")]
    pub ignored_contributors: Vec<String>,
    #[serde(default)]
    pub extra_archive_prefixes: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            locales: Vec::new(),
            exclude_prefixes: Vec::new(),
            start_clean: false,
            max_open_files: default_max_open_files(),
            ignored_contributors: default_ignored_contributors(),
            extra_archive_prefixes: Vec::new(),
        }
    }
}

fn default_max_open_files() -> usize {
    MAX_OPEN_FILES
}
fn default_ignored_contributors() -> Vec<String> {
    IGNORABLE_CONTRIBUTORS.iter().map(|s| s.to_string()).collect()
}

impl MigrationConfig {
    pub fn filter(&self) -> SourceFilter {
        SourceFilter {
            locales: self.locales.clone(),
            exclude_prefixes: self.exclude_prefixes.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&mut config)?;
    Ok(config)
}

/// Check the loaded values and bring locale names into canonical case.
pub fn validate(config: &mut Config) -> Result<()> {
    if config.migration.max_open_files == 0 {
        anyhow::bail!("migration.max_open_files must be > 0");
    }

    if config.output.content_root == config.output.translated_root {
        anyhow::bail!("output.content_root and output.translated_root must differ");
    }

    let normalizer = Normalizer::new();
    for locale in config.migration.locales.iter_mut() {
        match normalizer.canonical_locale(locale) {
            Some(canonical) => *locale = canonical.to_string(),
            None => anyhow::bail!("Unknown locale in migration.locales: '{}'", locale),
        }
    }

    if config.migration.exclude_prefixes.iter().any(|p| p.is_empty()) {
        anyhow::bail!("migration.exclude_prefixes must not contain empty prefixes");
    }

    Ok(())
}

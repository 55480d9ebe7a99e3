//! Redirect target normalization.
//!
//! Legacy redirect documents carry their target inside an HTML body
//! (`REDIRECT <a href="...">`). Those targets were written by hand over many
//! years and come in every shape: `/docs/en/Foo`, `/en/docs/Foo`,
//! `/en-us/Foo`, bare `/`, relative paths, and full URLs to other hosts.
//!
//! [`Normalizer::normalize`] maps such a target to one of three outcomes:
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | [`Normalized::External`] | full URL to a foreign host, passed through |
//! | [`Normalized::Canonical`] | `/{locale}/docs/{slug}` (or a locale root) |
//! | [`Normalized::Malformed`] | `docs` in a position that cannot be rewritten |

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// The primary locale; unknown locale tokens fall back to it.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Host of the legacy site. Full URLs pointing back at it are suspicious.
pub const LEGACY_HOST: &str = "developer.mozilla.org";

/// Every locale the corpus accepts, in canonical spelling.
pub const VALID_LOCALES: &[&str] = &[
    "en-US", "ar", "bg", "bn", "ca", "de", "el", "es", "fa", "fi", "fr", "he", "hi-IN", "hu",
    "id", "it", "ja", "kab", "ko", "ms", "my", "nl", "pl", "pt-BR", "pt-PT", "ru", "sv-SE", "th",
    "tr", "uk", "vi", "zh-CN", "zh-TW",
];

/// Historical locale prefixes still found in old redirect targets.
const OLD_LOCALE_PREFIXES: &[(&str, &str)] = &[
    ("en", "en-US"),
    ("cn", "zh-CN"),
    ("zh_tw", "zh-TW"),
    ("zh", "zh-TW"),
    ("pt", "pt-PT"),
];

const REDIRECT_HTML: &str = "REDIRECT <a ";

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).expect("href pattern compiles")
});

/// Whether a canonical target needed rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    Unchanged,
    Improved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    External(String),
    Canonical { uri: String, fix: Fix },
    Malformed,
}

impl Normalized {
    /// The target URL, if the outcome has one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Normalized::External(url) => Some(url),
            Normalized::Canonical { uri, .. } => Some(uri),
            Normalized::Malformed => None,
        }
    }
}

/// Build the absolute URI of a document.
pub fn make_uri(locale: &str, slug: &str) -> String {
    format!("/{}/docs/{}", locale, slug)
}

/// Inverse of [`make_uri`]: everything after the first `/docs/`.
pub fn uri_to_slug(uri: &str) -> &str {
    match uri.split_once("/docs/") {
        Some((_, slug)) => slug,
        None => uri,
    }
}

/// Pull the raw redirect target out of a redirect document body.
///
/// Returns `None` when the body has no `REDIRECT <a ` marker or the anchor
/// has no usable `href`.
pub fn extract_redirect_target(html: &str) -> Option<String> {
    let start = html.find(REDIRECT_HTML)?;
    let caps = HREF_RE.captures(&html[start..])?;
    let href = caps.get(1)?.as_str().trim();
    if href.is_empty() {
        return None;
    }
    let href = href.replace("&amp;", "&");
    match urlencoding::decode(&href) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(href),
    }
}

/// Locale-aware redirect target normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    aliases: HashMap<String, String>,
    valid: HashMap<String, String>,
    default_locale: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        let aliases = OLD_LOCALE_PREFIXES
            .iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect();
        let valid = VALID_LOCALES
            .iter()
            .map(|l| (l.to_lowercase(), l.to_string()))
            .collect();
        Self {
            aliases,
            valid,
            default_locale: DEFAULT_LOCALE.to_string(),
        }
    }

    /// Resolve a locale token through the alias table, then the
    /// case-insensitive table of valid locales.
    pub fn canonical_locale(&self, token: &str) -> Option<&str> {
        let lc = token.to_lowercase();
        self.aliases
            .get(&lc)
            .or_else(|| self.valid.get(&lc))
            .map(String::as_str)
    }

    pub fn is_valid_locale(&self, locale: &str) -> bool {
        self.valid.contains_key(&locale.to_lowercase())
    }

    /// Normalize a raw redirect target.
    ///
    /// `source_locale` is the locale of the redirect document itself and is
    /// only used for relative targets.
    pub fn normalize(&self, raw: &str, source_locale: &str) -> Normalized {
        if raw.contains("://") {
            if raw.contains(LEGACY_HOST) || raw.contains("/http") {
                warn!(target_url = raw, "weird redirect to a full URL");
            }
            return Normalized::External(raw.to_string());
        }
        if raw.is_empty() {
            return Normalized::Malformed;
        }
        if raw == "/" {
            return Normalized::Canonical {
                uri: format!("/{}/", self.default_locale),
                fix: Fix::Improved,
            };
        }
        if !raw.starts_with('/') {
            let locale = self
                .canonical_locale(source_locale)
                .unwrap_or(&self.default_locale);
            return Normalized::Canonical {
                uri: make_uri(locale, raw),
                fix: Fix::Improved,
            };
        }

        let mut split: Vec<String> = raw.split('/').map(str::to_string).collect();
        let token = match split.iter().position(|s| s == "docs") {
            // E.g. /docs/en/JavaScript
            Some(1) => match split.get(2) {
                Some(token) => token.clone(),
                None => return Normalized::Malformed,
            },
            // E.g. /en/docs/HTML or /en-us/Addons
            Some(2) | None => split[1].clone(),
            Some(_) => {
                warn!(target_url = raw, "messed up redirect URL");
                return Normalized::Malformed;
            }
        };

        let mut fix = Fix::Unchanged;
        let locale = match self.canonical_locale(&token) {
            Some(locale) => locale.to_string(),
            None => {
                // Most often '/docs/Web/JavaScript...' which means en-US.
                split.insert(1, self.default_locale.clone());
                fix = Fix::Improved;
                self.default_locale.clone()
            }
        };

        let non_empty = split.iter().filter(|s| !s.is_empty()).count();
        match split.iter().position(|s| s == "docs") {
            // E.g. '/en/' or '/fr'
            None if non_empty == 1 => {
                if split[1] != locale {
                    fix = Fix::Improved;
                }
                return Normalized::Canonical {
                    uri: format!("/{}/", locale),
                    fix,
                };
            }
            Some(2) => {
                if split[1] != locale {
                    split[1] = locale;
                    fix = Fix::Improved;
                }
            }
            // Valid locale, but the '/docs/' part is missing.
            None => {
                split[1] = locale;
                split.insert(2, "docs".to_string());
                fix = Fix::Improved;
            }
            Some(1) => {
                split.remove(2);
                split.insert(1, locale);
                fix = Fix::Improved;
            }
            Some(_) => {
                warn!(target_url = raw, "messed up redirect URL");
                return Normalized::Malformed;
            }
        }

        Normalized::Canonical {
            uri: split.join("/"),
            fix,
        }
    }
}

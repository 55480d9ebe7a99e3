//! Redirect graph construction and resolution.
//!
//! Every redirect document contributes one edge `from_uri → to_uri`. Chains
//! of redirects are resolved down to their final destination once, before
//! any document is classified, and the result is read-only afterwards.
//!
//! Resolution is iterative: each walk keeps an explicit visited set, stops
//! at the first node without an outgoing edge, at a node already resolved
//! by an earlier walk, or at a node it has already visited (a cycle). Every
//! node on the walk is memoized with the shared result, so the total number
//! of hops is linear in the number of edges.
//!
//! A chain is *archival* when its final destination is archive-prefixed or
//! when it contains a cycle. Archival chain members not already covered by a
//! prefix are collected into the discard set.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::archive::ArchivePrefixSet;
use crate::fundamental::FundamentalRedirects;
use crate::models::RedirectRow;
use crate::normalize::{extract_redirect_target, make_uri, Fix, Normalized, Normalizer};

/// Outgoing edge of a redirect node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub to: String,
    /// Produced by a fundamental redirect: the target is the resolution
    /// outright and is never walked further.
    pub pinned: bool,
}

/// Counters collected while building the graph.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub rows: u64,
    pub bad_slugs: u64,
    pub missing_targets: u64,
    pub malformed_targets: u64,
    pub self_redirects: u64,
    pub improved_targets: u64,
    pub fundamental: u64,
}

/// Counters collected while resolving the graph.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub walks: u64,
    pub hops: u64,
    pub cycles: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub final_uri: String,
    pub to_archive: bool,
}

/// Directed graph of redirect edges, keyed by canonical source URI.
#[derive(Debug, Default)]
pub struct RedirectGraph {
    edges: HashMap<String, Edge>,
    stats: BuildStats,
}

impl RedirectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<I>(rows: I, normalizer: &Normalizer, fundamentals: &FundamentalRedirects) -> Self
    where
        I: IntoIterator<Item = RedirectRow>,
    {
        let mut graph = Self::new();
        for row in rows {
            graph.insert_row(&row, normalizer, fundamentals);
        }
        graph
    }

    /// Add the edge described by one redirect document.
    ///
    /// Structurally invalid slugs, missing or malformed targets and
    /// self-redirects are dropped with a diagnostic.
    pub fn insert_row(
        &mut self,
        row: &RedirectRow,
        normalizer: &Normalizer,
        fundamentals: &FundamentalRedirects,
    ) {
        self.stats.rows += 1;
        if row.slug.starts_with('/') {
            warn!(locale = %row.locale, slug = %row.slug, "bad redirect (slug starts with /)");
            self.stats.bad_slugs += 1;
            return;
        }
        if row.slug.contains("//") {
            warn!(locale = %row.locale, slug = %row.slug, "bad redirect (slug contains '//')");
            self.stats.bad_slugs += 1;
            return;
        }

        let from = make_uri(&row.locale, &row.slug);
        let (to, pinned) = match fundamentals.resolve(&from) {
            Some(target) => {
                self.stats.fundamental += 1;
                (target, true)
            }
            None => {
                let Some(raw) = extract_redirect_target(&row.html) else {
                    debug!(uri = %from, "redirect without a REDIRECT anchor");
                    self.stats.missing_targets += 1;
                    return;
                };
                let normalized = normalizer.normalize(&raw, &row.locale);
                let url = match &normalized {
                    Normalized::Malformed => {
                        self.stats.malformed_targets += 1;
                        return;
                    }
                    Normalized::Canonical {
                        uri,
                        fix: Fix::Improved,
                    } => {
                        self.stats.improved_targets += 1;
                        uri.clone()
                    }
                    Normalized::Canonical { uri, .. } => uri.clone(),
                    Normalized::External(url) => url.clone(),
                };
                match fundamentals.resolve(&url) {
                    Some(target) => {
                        self.stats.fundamental += 1;
                        (target, true)
                    }
                    None => (url, false),
                }
            }
        };

        if !self.insert_edge(from.clone(), to, pinned) {
            info!(uri = %from, "bad redirect (from === to)");
            self.stats.self_redirects += 1;
        }
    }

    /// Insert a raw edge. Self-redirects (compared case-insensitively) are
    /// rejected and `false` is returned.
    pub fn insert_edge(&mut self, from: String, to: String, pinned: bool) -> bool {
        if from.to_lowercase() == to.to_lowercase() {
            return false;
        }
        self.edges.insert(from, Edge { to, pinned });
        true
    }

    pub fn edge(&self, from: &str) -> Option<&Edge> {
        self.edges.get(from)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Resolve every source URI to its final destination.
    pub fn resolve(&self, prefixes: &ArchivePrefixSet) -> RedirectResolution {
        let mut results: HashMap<String, ResolutionResult> =
            HashMap::with_capacity(self.edges.len());
        let mut discarded = HashSet::new();
        let mut stats = ResolveStats::default();

        // Sorted so that cycle destinations are deterministic across runs.
        let mut sources: Vec<&str> = self.edges.keys().map(String::as_str).collect();
        sources.sort_unstable();

        for source in sources {
            if results.contains_key(source) {
                continue;
            }
            stats.walks += 1;

            let mut chain: IndexSet<&str> = IndexSet::new();
            chain.insert(source);
            let mut edge = &self.edges[source];

            let result = loop {
                let next = edge.to.as_str();
                stats.hops += 1;
                if edge.pinned {
                    break ResolutionResult {
                        final_uri: next.to_string(),
                        to_archive: prefixes.matches_uri(next),
                    };
                }
                if let Some(known) = results.get(next) {
                    break known.clone();
                }
                if chain.contains(next) {
                    warn!(uri = next, length = chain.len(), "redirect cycle");
                    stats.cycles += 1;
                    break ResolutionResult {
                        final_uri: next.to_string(),
                        to_archive: true,
                    };
                }
                match self.edges.get(next) {
                    Some(following) => {
                        chain.insert(next);
                        edge = following;
                    }
                    None => {
                        break ResolutionResult {
                            final_uri: next.to_string(),
                            to_archive: prefixes.matches_uri(next),
                        }
                    }
                }
            };

            for uri in chain {
                if result.to_archive && !prefixes.matches_uri(uri) {
                    discarded.insert(uri.to_string());
                }
                results.insert(uri.to_string(), result.clone());
            }
        }

        debug!(
            walks = stats.walks,
            hops = stats.hops,
            cycles = stats.cycles,
            "redirect graph resolved"
        );

        RedirectResolution {
            results,
            discarded,
            stats,
        }
    }
}

/// Final destinations of every redirect source, plus the discard set.
#[derive(Debug, Default, Clone)]
pub struct RedirectResolution {
    results: HashMap<String, ResolutionResult>,
    discarded: HashSet<String>,
    stats: ResolveStats,
}

impl RedirectResolution {
    pub fn get(&self, uri: &str) -> Option<&ResolutionResult> {
        self.results.get(uri)
    }

    pub fn final_destination(&self, uri: &str) -> Option<&str> {
        self.results.get(uri).map(|r| r.final_uri.as_str())
    }

    /// Whether `uri` ultimately redirects into the archive or into a cycle.
    pub fn is_archive_redirect(&self, uri: &str) -> bool {
        self.results.get(uri).is_some_and(|r| r.to_archive)
    }

    /// Archival redirect sources not already covered by an archive prefix.
    pub fn discarded(&self) -> &HashSet<String> {
        &self.discarded
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolutionResult)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }
}

//! Contributor identity.
//!
//! Revisions only carry a numeric creator id. The index maps each document
//! to its creators (most recent revision first, each creator once) and each
//! creator id to a username, and filters out accounts that should never be
//! credited (automation bots).

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

/// Contributors we deliberately ignore.
pub const IGNORABLE_CONTRIBUTORS: &[&str] = &["mdnwebdocs-bot"];

#[derive(Debug, Default, Clone)]
pub struct ContributorIndex {
    creators: HashMap<i64, Vec<i64>>,
    usernames: HashMap<i64, String>,
    ignored: HashSet<String>,
}

impl ContributorIndex {
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            creators: HashMap::new(),
            usernames: HashMap::new(),
            ignored: ignored.into_iter().map(Into::into).collect(),
        }
    }

    /// Record one revision. Revisions must arrive most recent first.
    pub fn add_revision(&mut self, document_id: i64, creator_id: i64) {
        let creators = self.creators.entry(document_id).or_default();
        if !creators.contains(&creator_id) {
            creators.push(creator_id);
        }
    }

    pub fn add_user(&mut self, user_id: i64, username: impl Into<String>) {
        self.usernames.insert(user_id, username.into());
    }

    pub fn is_ignored(&self, username: &str) -> bool {
        self.ignored.contains(username)
    }

    /// Ordered, unique usernames credited for a document.
    pub fn usernames_for(&self, document_id: i64) -> Vec<String> {
        let Some(creators) = self.creators.get(&document_id) else {
            return Vec::new();
        };
        creators
            .iter()
            .filter_map(|id| self.usernames.get(id))
            .filter(|name| !self.is_ignored(name))
            .map(String::as_str)
            .collect::<IndexSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn documents(&self) -> usize {
        self.creators.len()
    }

    pub fn users(&self) -> usize {
        self.usernames.len()
    }
}

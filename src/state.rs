//! Durable run state: committed actions, bounded recently-seen caches, and
//! the followed-author set. Loaded once per run, mutated in memory, and
//! persisted atomically at run end.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// One committed repost (and its companion like), keyed by the subject
/// post. `repost_uri` is what retention cleanup retracts later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub post_uri: String,
    pub post_cid: String,
    pub repost_uri: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Persisted bot state. A missing file loads as the empty state; unknown
/// keys in an existing file are dropped on the next save.
///
/// Invariant: every entry in `reposts` has a unique `post_uri`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub reposts: Vec<ActionRecord>,
    #[serde(default)]
    pub seen_reposted: Vec<String>,
    #[serde(default)]
    pub seen_liked: Vec<String>,
    #[serde(default)]
    pub followed: BTreeSet<String>,
    #[serde(default)]
    pub repost_records: BTreeMap<String, String>,
    #[serde(default)]
    pub like_records: BTreeMap<String, String>,
}

impl RunState {
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| StateError::Parse(e.to_string()))
    }

    /// Write to `<path>.tmp`, then rename over `path`. The state file is
    /// never left half-written.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        let data = serde_json::to_vec_pretty(self).map_err(|e| StateError::Parse(e.to_string()))?;
        fs::write(tmp, data)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// URIs of every post this account has already acted on, per history.
    pub fn tracked_uris(&self) -> HashSet<String> {
        self.reposts
            .iter()
            .map(|r| r.post_uri.clone())
            .chain(self.seen_reposted.iter().cloned())
            .collect()
    }

    /// Append an action, preserving the unique-`post_uri` invariant.
    pub fn track(&mut self, record: ActionRecord) {
        if self.reposts.iter().any(|r| r.post_uri == record.post_uri) {
            return;
        }
        self.repost_records.insert(
            record.post_uri.clone(),
            record.repost_uri.clone().unwrap_or_default(),
        );
        self.reposts.push(record);
    }

    pub fn mark_seen_reposted(&mut self, uri: &str, max: usize) {
        push_bounded(&mut self.seen_reposted, uri, max);
    }

    pub fn mark_seen_liked(&mut self, uri: &str, max: usize) {
        push_bounded(&mut self.seen_liked, uri, max);
    }

    pub fn already_liked(&self, uri: &str) -> bool {
        self.seen_liked.iter().any(|u| u == uri) || self.like_records.contains_key(uri)
    }
}

/// Append to a bounded insertion-ordered cache: duplicates are ignored and
/// the oldest entries are truncated once `max` is exceeded, so the newest
/// entries always survive.
fn push_bounded(cache: &mut Vec<String>, uri: &str, max: usize) {
    if cache.iter().any(|u| u == uri) {
        return;
    }
    cache.push(uri.to_string());
    if cache.len() > max {
        let excess = cache.len() - max;
        cache.drain(..excess);
    }
}

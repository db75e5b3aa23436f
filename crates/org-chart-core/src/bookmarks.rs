// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bookmarks keyed by employee id or a user-chosen name.
//!
//! Bookmarks carry no referential integrity: an entry may outlive the
//! employee it names and is filtered out when resolved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Employee, HierarchyTable};

/// One bookmark entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Optional captured view state for named bookmarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

/// Bookmark side-table, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkSet {
    entries: BTreeMap<String, Bookmark>,
}

impl BookmarkSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the bookmark for `key`; returns `true` when it is now bookmarked.
    pub fn toggle(&mut self, key: &str, now_millis: u64) -> bool {
        if self.entries.remove(key).is_some() {
            false
        } else {
            self.entries.insert(
                key.to_owned(),
                Bookmark {
                    timestamp: now_millis,
                    state: None,
                },
            );
            true
        }
    }

    /// Insert or replace a named bookmark.
    pub fn insert(&mut self, key: &str, state: Option<serde_json::Value>, now_millis: u64) {
        self.entries.insert(
            key.to_owned(),
            Bookmark {
                timestamp: now_millis,
                state,
            },
        );
    }

    /// Remove a bookmark; returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether `key` is bookmarked.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up one entry.
    pub fn get(&self, key: &str) -> Option<&Bookmark> {
        self.entries.get(key)
    }

    /// Number of entries, including ones naming deleted employees.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bookmark)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bookmarked employees that still exist, oldest bookmark first.
    pub fn resolve<'a>(&self, table: &'a HierarchyTable) -> Vec<&'a Employee> {
        let mut hits: Vec<(u64, &'a Employee)> = self
            .entries
            .iter()
            .filter_map(|(key, mark)| table.get(key).map(|e| (mark.timestamp, e)))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.into_iter().map(|(_, e)| e).collect()
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! View preferences persisted beside the chart (view mode + theme) and host settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which view renders the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Zoomable tree graph.
    #[default]
    Graph,
    /// Paginated table.
    Grid,
}

/// Color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light palette.
    #[default]
    Light,
    /// Dark palette.
    Dark,
}

/// A stored preference value that is not one of the known variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preference value: {0}")]
pub struct UnknownPref(pub String);

impl ViewMode {
    /// Stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Grid => "grid",
        }
    }
}

impl Theme {
    /// Stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl FromStr for ViewMode {
    type Err = UnknownPref;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graph" => Ok(Self::Graph),
            "grid" => Ok(Self::Grid),
            other => Err(UnknownPref(other.to_owned())),
        }
    }
}

impl FromStr for Theme {
    type Err = UnknownPref;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(UnknownPref(other.to_owned())),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-tunable settings, stored as JSON under the `settings` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Quiet period before a scheduled save fires, in milliseconds.
    pub debounce_ms: u64,
    /// How long a notice stays visible, in milliseconds.
    pub notice_ttl_ms: u64,
    /// Maximum queued notices.
    pub max_notices: usize,
    /// Rows per page in the table view.
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            notice_ttl_ms: 6_000,
            max_notices: 8,
            page_size: 10,
        }
    }
}

impl Settings {
    /// Debounce delay as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Notice lifetime as a duration.
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}

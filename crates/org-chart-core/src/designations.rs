// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Job-title catalog. Edits never cascade to employees holding a title.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Titles seeded into a fresh catalog.
pub const DEFAULT_DESIGNATIONS: [&str; 15] = [
    "Chief Executive Officer",
    "Chief Technology Officer",
    "Engineering Director",
    "Engineering Manager",
    "Senior Software Engineer",
    "Software Engineer",
    "Junior Software Engineer",
    "Product Manager",
    "Project Manager",
    "Business Analyst",
    "Quality Assurance Engineer",
    "UX Designer",
    "UI Developer",
    "DevOps Engineer",
    "System Administrator",
];

/// Rejected catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignationError {
    /// The title is empty after trimming.
    #[error("designation cannot be empty")]
    Empty,
    /// Another entry already has this title.
    #[error("designation already exists: {0}")]
    Duplicate(String),
    /// The title to rename is not in the catalog.
    #[error("designation not found: {0}")]
    NotFound(String),
}

/// Ordered set of job titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignationCatalog {
    titles: Vec<String>,
}

impl Default for DesignationCatalog {
    fn default() -> Self {
        Self {
            titles: DEFAULT_DESIGNATIONS.iter().map(|t| (*t).to_owned()).collect(),
        }
    }
}

impl DesignationCatalog {
    /// Catalog with exactly the given titles.
    pub fn from_titles<I, T>(titles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut catalog = Self { titles: Vec::new() };
        for title in titles {
            let _ = catalog.add(&title.into());
        }
        catalog
    }

    /// Titles in catalog order.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Whether `title` is in the catalog.
    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    /// Append a trimmed title.
    pub fn add(&mut self, title: &str) -> Result<(), DesignationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DesignationError::Empty);
        }
        if self.contains(title) {
            return Err(DesignationError::Duplicate(title.to_owned()));
        }
        self.titles.push(title.to_owned());
        Ok(())
    }

    /// Remove a title; returns whether it was present.
    pub fn remove(&mut self, title: &str) -> bool {
        let before = self.titles.len();
        self.titles.retain(|t| t != title);
        self.titles.len() != before
    }

    /// Rename `old` in place, keeping its position.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), DesignationError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(DesignationError::Empty);
        }
        let index = self
            .titles
            .iter()
            .position(|t| t == old)
            .ok_or_else(|| DesignationError::NotFound(old.to_owned()))?;
        if new != old && self.contains(new) {
            return Err(DesignationError::Duplicate(new.to_owned()));
        }
        new.clone_into(&mut self.titles[index]);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_seeded() {
        let catalog = DesignationCatalog::default();
        assert_eq!(catalog.titles().len(), 15);
        assert!(catalog.contains("UX Designer"));
    }

    #[test]
    fn add_trims_and_rejects_empty_or_duplicate() {
        let mut catalog = DesignationCatalog::from_titles(["A"]);
        catalog.add("  B  ").unwrap();
        assert_eq!(catalog.titles(), ["A", "B"]);
        assert_eq!(catalog.add("   "), Err(DesignationError::Empty));
        assert_eq!(catalog.add("A"), Err(DesignationError::Duplicate("A".into())));
    }

    #[test]
    fn rename_keeps_position() {
        let mut catalog = DesignationCatalog::from_titles(["A", "B", "C"]);
        catalog.rename("B", "Beta").unwrap();
        assert_eq!(catalog.titles(), ["A", "Beta", "C"]);
        catalog.rename("Beta", "Beta").unwrap();
        assert_eq!(
            catalog.rename("A", "C"),
            Err(DesignationError::Duplicate("C".into()))
        );
        assert_eq!(
            catalog.rename("Z", "Y"),
            Err(DesignationError::NotFound("Z".into()))
        );
        assert!(catalog.remove("A"));
        assert!(!catalog.remove("A"));
    }
}

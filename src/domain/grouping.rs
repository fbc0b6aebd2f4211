//! Thematic groupings proposed for a category.
//!
//! Groupings only live for the duration of one reorganization run.

use serde::{Deserialize, Serialize};

use crate::core::sanitize::sanitize;

/// A named cluster of titles within one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
    #[serde(default)]
    pub group_name: Option<String>,

    #[serde(default)]
    pub titles: Option<Vec<String>>,
}

impl Grouping {
    pub fn new(group_name: impl Into<String>, titles: Vec<String>) -> Self {
        Self {
            group_name: Some(group_name.into()),
            titles: Some(titles),
        }
    }

    /// Folder name for this grouping, if it has a usable name and any titles
    pub fn folder_name(&self) -> Option<String> {
        if self.titles.as_ref().map_or(true, |t| t.is_empty()) {
            return None;
        }
        let folder = sanitize(self.group_name.as_deref());
        (!folder.trim().is_empty()).then_some(folder)
    }

    pub fn titles(&self) -> &[String] {
        self.titles.as_deref().unwrap_or_default()
    }
}

/// Batch grouping response shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingResponse {
    #[serde(default)]
    pub groupings: Option<Vec<Grouping>>,
}

impl GroupingResponse {
    pub fn into_groupings(self) -> Vec<Grouping> {
        self.groupings.unwrap_or_default()
    }
}

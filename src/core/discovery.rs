//! Candidate file discovery.
//!
//! A recursive walk filtered to the configured video extensions. Files
//! whose names start with the reserved marker (macOS `._` resource forks,
//! by default) are skipped. Results are sorted so a run is deterministic.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which files count as media
#[derive(Debug, Clone)]
pub struct DiscoveryFilter {
    /// Extensions with leading dot, compared case-insensitively
    pub extensions: Vec<String>,

    /// Names starting with this prefix are ignored
    pub hidden_prefix: String,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self {
            extensions: [".mp4", ".mkv", ".avi", ".mov", ".wmv"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            hidden_prefix: "._".to_string(),
        }
    }
}

impl DiscoveryFilter {
    /// Check if a file name has one of the video extensions
    pub fn is_video_file(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }

    /// Check if a file name should be picked up
    pub fn accepts(&self, file_name: &str) -> bool {
        let hidden = !self.hidden_prefix.is_empty() && file_name.starts_with(&self.hidden_prefix);
        !hidden && self.is_video_file(file_name)
    }

    /// Walk `root` and return every accepted file, sorted
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            warn!(root = %root.display(), "Discovery root is not a directory");
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.accepts(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.into_path())
            .collect();

        files.sort();
        debug!(root = %root.display(), count = files.len(), "Discovered media files");
        files
    }
}

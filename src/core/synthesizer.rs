//! Metadata to destination path synthesis.
//!
//! The layout under the library root is:
//!
//! ```text
//! <root>/<category>/<subfolder>.../<title, episodic without subfolders>/<Season NN>/<file>
//! ```
//!
//! Filenames follow Plex conventions per category:
//! - Movie-like: `"{year} - {title}{ext}"` or `"{title}{ext}"`
//! - Episodic: `"S{nn}E{nn} - {title}{ext}"`, `"E{nn} - {title}{ext}"`, or `"{title}{ext}"`
//! - Other: the original file name, unchanged

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::sanitize::sanitize;
use crate::domain::{dedupe_sequential, MediaRecord};

/// Errors from destination synthesis
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Category '{0}' has no usable characters for a directory name")]
    EmptyCategory(String),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Synthesized destination for a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub directory: PathBuf,
    pub file_name: String,
}

impl Destination {
    /// Full destination path including the file name
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Maps media records onto the library layout
#[derive(Debug, Clone)]
pub struct PathSynthesizer {
    root: PathBuf,
}

impl PathSynthesizer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the destination without touching the filesystem
    pub fn destination(&self, record: &MediaRecord) -> Result<Destination, SynthesisError> {
        Ok(Destination {
            directory: self.directory(record)?,
            file_name: file_name(record),
        })
    }

    /// Compute the destination and, unless `dry_run`, create its directory chain
    pub async fn prepare(
        &self,
        record: &MediaRecord,
        dry_run: bool,
    ) -> Result<Destination, SynthesisError> {
        let destination = self.destination(record)?;

        if !dry_run {
            tokio::fs::create_dir_all(&destination.directory)
                .await
                .map_err(|source| SynthesisError::CreateDir {
                    path: destination.directory.clone(),
                    source,
                })?;
            debug!(dir = %destination.directory.display(), "Destination directory ready");
        }

        Ok(destination)
    }

    /// Destination directory for a record
    pub fn directory(&self, record: &MediaRecord) -> Result<PathBuf, SynthesisError> {
        let category = sanitize(Some(record.category.label()));
        if category.trim().is_empty() {
            return Err(SynthesisError::EmptyCategory(record.category.to_string()));
        }

        let mut dir = self.root.join(category);

        let mut has_subfolder = false;
        for subfolder in dedupe_sequential(&record.subfolders) {
            has_subfolder |= push_segment(&mut dir, &subfolder);
        }

        if record.category.is_episodic() && !record.title.is_empty() {
            // Subfolders already carry the show's identity
            if !has_subfolder {
                push_segment(&mut dir, &record.title);
            }
            if let Some(season) = record.season_number() {
                dir.push(format!("Season {season:02}"));
            }
        }

        Ok(dir)
    }
}

/// Destination file name for a record
pub fn file_name(record: &MediaRecord) -> String {
    let ext = record.extension();
    let title = sanitize(Some(&record.title));

    if record.category.is_movie_like() {
        return match record.year.as_deref().filter(|y| !y.is_empty()) {
            Some(year) => format!("{year} - {title}{ext}"),
            None => format!("{title}{ext}"),
        };
    }

    if record.category.is_episodic() {
        let season = record.season_number().map(|n| format!("S{n:02}"));
        let episode = record.episode_number().map(|n| format!("E{n:02}"));

        return match (season, episode) {
            (Some(s), Some(e)) => format!("{s}{e} - {title}{ext}"),
            (None, Some(e)) => format!("{e} - {title}{ext}"),
            _ => format!("{title}{ext}"),
        };
    }

    record
        .original_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Push a sanitized segment; blank segments are dropped
fn push_segment(dir: &mut PathBuf, label: &str) -> bool {
    let segment = sanitize(Some(label));
    if segment.trim().is_empty() {
        return false;
    }
    dir.push(segment);
    true
}

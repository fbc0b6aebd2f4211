//! Append-only CSV cache of processed files.
//!
//! The cache maps a file's original (pre-move) path to the record it was
//! routed with. Rows are only ever appended during a run; when a key shows
//! up more than once the last row wins. Pruning works on the in-memory table
//! and `compact` is the explicit way to persist it.
//!
//! Column order is fixed:
//!
//! ```text
//! original_path,new_path,category,title,show_name,year,season,episode
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::{Category, MediaRecord};

/// Expected header, in order
pub const CACHE_HEADERS: [&str; 8] = [
    "original_path",
    "new_path",
    "category",
    "title",
    "show_name",
    "year",
    "season",
    "episode",
];

/// Errors that can occur with the cache store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Unexpected headers in {path}. Expected: {expected:?}, Got: {found:?}")]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid cache row {line} in {path}: {reason}")]
    InvalidRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to persist compacted cache: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// On-disk row shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheRow {
    original_path: String,
    new_path: String,
    category: String,
    title: String,
    show_name: Option<String>,
    year: Option<String>,
    season: Option<String>,
    episode: Option<String>,
}

impl From<&MediaRecord> for CacheRow {
    fn from(record: &MediaRecord) -> Self {
        Self {
            original_path: record.original_path.to_string_lossy().into_owned(),
            new_path: record
                .new_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            category: record.category.to_string(),
            title: record.title.clone(),
            show_name: record.show_name.clone(),
            year: record.year.clone(),
            season: record.season.clone(),
            episode: record.episode.clone(),
        }
    }
}

impl CacheRow {
    fn into_record(self) -> Result<MediaRecord, String> {
        if self.original_path.is_empty() {
            return Err("empty original_path".to_string());
        }
        let category: Category = self
            .category
            .parse()
            .map_err(|_| "empty category".to_string())?;
        if self.title.trim().is_empty() {
            return Err("empty title".to_string());
        }

        Ok(MediaRecord {
            original_path: PathBuf::from(self.original_path),
            new_path: (!self.new_path.is_empty()).then(|| PathBuf::from(self.new_path)),
            category,
            title: self.title,
            show_name: self.show_name,
            year: self.year,
            season: self.season,
            episode: self.episode,
            subfolders: Vec::new(),
        })
    }
}

/// Durable table of media records keyed by original path
#[derive(Debug)]
pub struct CacheStore {
    /// Backing CSV file; `None` for an in-memory cache (`--no-cache`)
    path: Option<PathBuf>,

    entries: HashMap<PathBuf, MediaRecord>,
}

impl CacheStore {
    /// A cache that is never read from or written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
        }
    }

    /// Load the cache file, or start empty if it does not exist yet
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let mut store = Self {
            path: Some(path.clone()),
            entries: HashMap::new(),
        };

        if !fs::try_exists(&path).await? {
            info!(path = %path.display(), "No cache file found, starting with an empty cache");
            return Ok(store);
        }

        let content = fs::read(&path).await?;
        if content.is_empty() {
            return Ok(store);
        }

        let mut reader = csv::Reader::from_reader(content.as_slice());
        let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if found != CACHE_HEADERS {
            return Err(CacheError::HeaderMismatch {
                path,
                expected: CACHE_HEADERS.iter().map(|h| h.to_string()).collect(),
                found,
            });
        }

        for (idx, row) in reader.deserialize::<CacheRow>().enumerate() {
            let row = row?;
            let line = idx as u64 + 2;
            let record = row.into_record().map_err(|reason| CacheError::InvalidRow {
                path: path.clone(),
                line,
                reason,
            })?;
            store.entries.insert(record.original_path.clone(), record);
        }

        info!(path = %path.display(), entries = store.entries.len(), "Loaded cache");
        Ok(store)
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, original_path: &Path) -> Option<&MediaRecord> {
        self.entries.get(original_path)
    }

    pub fn contains(&self, original_path: &Path) -> bool {
        self.entries.contains_key(original_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a processed file: durable append first, then the in-memory table
    pub async fn append(&mut self, record: MediaRecord) -> Result<(), CacheError> {
        if let Some(path) = &self.path {
            append_row(path, &CacheRow::from(&record)).await?;
            debug!(path = %record.original_path.display(), cache = %path.display(), "Cache entry written");
        }
        self.entries.insert(record.original_path.clone(), record);
        Ok(())
    }

    /// Drop every entry whose key is not in `seen`. Returns the removed keys.
    pub fn prune<'a, I>(&mut self, seen: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let seen: std::collections::HashSet<&Path> = seen.into_iter().collect();
        let mut removed: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|k| !seen.contains(k.as_path()))
            .cloned()
            .collect();
        removed.sort();

        for key in &removed {
            info!(path = %key.display(), "Removing from cache, no longer present");
            self.entries.remove(key);
        }
        removed
    }

    /// Rewrite the backing file from the in-memory table (temp file + rename)
    pub async fn compact(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut records: Vec<&MediaRecord> = self.entries.values().collect();
        records.sort_by(|a, b| a.original_path.cmp(&b.original_path));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CACHE_HEADERS)?;
        for record in records {
            writer.serialize(CacheRow::from(record))?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        info!(entries = self.entries.len(), "Compacted cache");
        Ok(())
    }
}

async fn append_row(path: &Path, row: &CacheRow) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let needs_header = file.metadata().await?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if needs_header {
        writer.write_record(CACHE_HEADERS)?;
    }
    writer.serialize(row)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;

    file.write_all(&bytes).await?;
    file.flush().await?;
    Ok(())
}

//! Per-file pipeline states and run summaries.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Where a file is in the pipeline
///
/// `Discovered → (CacheHit | Classifying) → Enriching → PathSynthesis →
/// Moving → Cached`, with `Skipped` and `Failed` as the other terminal
/// states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Discovered,
    CacheHit,
    Classifying,
    Enriching,
    PathSynthesis,
    Moving,
    Cached,
    Skipped,
    Failed,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileStage::Discovered => "discovered",
            FileStage::CacheHit => "cache_hit",
            FileStage::Classifying => "classifying",
            FileStage::Enriching => "enriching",
            FileStage::PathSynthesis => "path_synthesis",
            FileStage::Moving => "moving",
            FileStage::Cached => "cached",
            FileStage::Skipped => "skipped",
            FileStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Routed (or would be, in a dry run) and recorded
    Cached {
        destination: PathBuf,
        from_cache: bool,
        sidecar_failures: usize,
    },

    /// Adapter could not identify the file; left untouched
    Skipped { reason: String },

    /// Validation, synthesis, or move error; left untouched
    Failed { stage: FileStage, error: String },
}

impl FileOutcome {
    pub fn stage(&self) -> FileStage {
        match self {
            FileOutcome::Cached { .. } => FileStage::Cached,
            FileOutcome::Skipped { .. } => FileStage::Skipped,
            FileOutcome::Failed { .. } => FileStage::Failed,
        }
    }
}

/// Counters for a rescue run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub cached: usize,
    pub cache_hits: usize,
    pub skipped: usize,
    pub failed: usize,
    pub sidecar_failures: usize,
    pub pruned: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Cached {
                from_cache,
                sidecar_failures,
                ..
            } => {
                self.cached += 1;
                if *from_cache {
                    self.cache_hits += 1;
                }
                self.sidecar_failures += sidecar_failures;
            }
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Counters for a reorganization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorganizeSummary {
    pub categories: usize,
    pub files: usize,
    pub groupings: usize,
    pub discarded: usize,
    pub moved: usize,
    pub failed: usize,
}

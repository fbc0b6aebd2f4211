//! plexsort - LLM-assisted media library organizer
//!
//! Classifies loosely-named media files, maps the metadata onto a
//! normalized Plex-style layout and remembers every decision in a CSV
//! cache so repeated runs are idempotent and cheap.
//!
//! # Architecture
//!
//! - A classifier (LLM) turns file names into metadata
//! - An enricher (TMDb) corroborates titles and years
//! - The synthesizer derives `root/category/.../file` deterministically
//! - The move executor relocates a file together with its sidecars
//! - The cache is appended after every routed file and pruned at run end
//!
//! # Modules
//!
//! - `adapters`: Classifier and Enricher traits with OpenAI / TMDb clients
//! - `core`: Synthesis, cache, moves, orchestration, grouping
//! - `domain`: Data structures (Category, MediaRecord, Grouping, outcomes)
//! - `config`: YAML + environment settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Route orphaned files into the library
//! plexsort --rescue
//!
//! # Preview regrouping the existing library
//! plexsort --reorganize --dry-run
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use config::Settings;
pub use core::{CacheStore, GroupingEngine, Orchestrator, PathSynthesizer};
pub use domain::{Category, FileOutcome, MediaRecord};

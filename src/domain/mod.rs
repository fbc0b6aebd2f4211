//! Domain types for plexsort.
//!
//! This module contains the core data structures:
//! - Category: Library categories and their naming rules
//! - Record: Raw classifications and validated media records
//! - Grouping: Thematic clusters used by reorganization
//! - Outcome: Per-file pipeline states and run summaries

pub mod category;
pub mod grouping;
pub mod outcome;
pub mod record;

// Re-export commonly used types
pub use category::{Category, EmptyCategory};
pub use grouping::{Grouping, GroupingResponse};
pub use outcome::{FileOutcome, FileStage, ReorganizeSummary, RunSummary};
pub use record::{dedupe_sequential, Classification, MediaRecord, ValidationError};

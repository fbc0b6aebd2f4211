//! Media metadata, before and after validation.
//!
//! `Classification` mirrors what the classification adapter returns: every
//! field may be null. `MediaRecord` is what the rest of the pipeline works
//! with; building one is the single place required fields are checked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::category::Category;

/// Raw per-file classification as returned by the adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default, deserialize_with = "nullable_text")]
    pub category: Option<String>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub subfolders: Vec<String>,

    #[serde(default, deserialize_with = "nullable_text")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable_text")]
    pub show_name: Option<String>,

    #[serde(default, deserialize_with = "nullable_text")]
    pub year: Option<String>,

    #[serde(default, deserialize_with = "nullable_text")]
    pub season: Option<String>,

    #[serde(default, deserialize_with = "nullable_text")]
    pub episode: Option<String>,
}

impl Classification {
    /// True when the adapter could not identify the file at all
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.title.is_none()
            && self.show_name.is_none()
            && self.year.is_none()
            && self.season.is_none()
            && self.episode.is_none()
            && self.subfolders.is_empty()
    }
}

/// A classification that cannot become a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Classification has no category")]
    MissingCategory,

    #[error("Classification has no title")]
    MissingTitle,
}

/// Validated metadata for one media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Where the file was discovered (cache key)
    pub original_path: PathBuf,

    /// Where the file was routed, once processed
    pub new_path: Option<PathBuf>,

    pub category: Category,

    pub title: String,

    /// TV only
    pub show_name: Option<String>,

    pub year: Option<String>,

    pub season: Option<String>,

    pub episode: Option<String>,

    /// Grouping labels, adjacent repeats collapsed. Blank labels stay as
    /// separators and are dropped when the path is built.
    pub subfolders: Vec<String>,
}

impl MediaRecord {
    /// Validate a classification for the file at `original_path`
    pub fn from_classification(
        original_path: impl Into<PathBuf>,
        classification: Classification,
    ) -> Result<Self, ValidationError> {
        let category = classification
            .category
            .as_deref()
            .and_then(|c| c.parse::<Category>().ok())
            .ok_or(ValidationError::MissingCategory)?;

        let title = classification
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingTitle)?;

        Ok(Self {
            original_path: original_path.into(),
            new_path: None,
            category,
            title,
            show_name: classification.show_name,
            year: classification.year,
            season: classification.season,
            episode: classification.episode,
            subfolders: dedupe_sequential(&classification.subfolders),
        })
    }

    /// Original extension including the dot, or empty
    pub fn extension(&self) -> String {
        extension_of(&self.original_path)
    }

    /// Season number when it parses as an integer
    pub fn season_number(&self) -> Option<u32> {
        self.season.as_deref().and_then(parse_number)
    }

    /// Episode number when it parses as an integer
    pub fn episode_number(&self) -> Option<u32> {
        self.episode.as_deref().and_then(parse_number)
    }
}

/// Collapse immediately repeated labels; non-adjacent repeats are kept
pub fn dedupe_sequential(items: &[String]) -> Vec<String> {
    let mut deduped: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if deduped.last() != Some(item) {
            deduped.push(item.clone());
        }
    }
    deduped
}

/// Digits only; "01" is 1, "1a" and "+1" are not numbers
pub fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// File extension with its leading dot, verbatim
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Accepts a string, a number, or null. Blank strings become None.
fn nullable_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Str(String),
        Int(u64),
        Float(f64),
    }

    let value = Option::<Text>::deserialize(deserializer)?;
    Ok(match value {
        Some(Text::Str(s)) if s.trim().is_empty() => None,
        Some(Text::Str(s)) => Some(s),
        Some(Text::Int(n)) => Some(n.to_string()),
        Some(Text::Float(f)) => Some(f.to_string()),
        None => None,
    })
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default().into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dedupe_collapses_adjacent_only() {
        assert_eq!(
            dedupe_sequential(&strings(&["A", "B", "B"])),
            strings(&["A", "B"])
        );
        assert_eq!(
            dedupe_sequential(&strings(&["A", "B", "A"])),
            strings(&["A", "B", "A"])
        );
        assert!(dedupe_sequential(&[]).is_empty());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("01"), Some(1));
        assert_eq!(parse_number("12"), Some(12));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("+1"), None);
        assert_eq!(parse_number("1a"), None);
    }

    #[test]
    fn test_classification_parsing_accepts_numbers_and_blanks() {
        let json = r#"{
            "category": "Movies",
            "subfolders": [],
            "title": "Test Movie",
            "year": 2020,
            "season": "",
            "episode": null
        }"#;

        let parsed: Classification = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.category.as_deref(), Some("Movies"));
        assert_eq!(parsed.year.as_deref(), Some("2020"));
        assert_eq!(parsed.season, None);
        assert_eq!(parsed.episode, None);
        assert_eq!(parsed.show_name, None);
    }

    #[test]
    fn test_null_subfolders() {
        let json = r#"{"category": "Anime", "subfolders": null, "title": "X"}"#;
        let parsed: Classification = serde_json::from_str(json).unwrap();
        assert!(parsed.subfolders.is_empty());
    }

    #[test]
    fn test_all_null_classification_is_empty() {
        let json = r#"{"category": null, "subfolders": [], "title": null,
            "show_name": null, "year": null, "season": null, "episode": null}"#;
        let parsed: Classification = serde_json::from_str(json).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_record_requires_category_and_title() {
        let missing_category = Classification {
            title: Some("Something".to_string()),
            ..Default::default()
        };
        assert_eq!(
            MediaRecord::from_classification("/in/a.mkv", missing_category),
            Err(ValidationError::MissingCategory)
        );

        let missing_title = Classification {
            category: Some("Movies".to_string()),
            ..Default::default()
        };
        assert_eq!(
            MediaRecord::from_classification("/in/a.mkv", missing_title),
            Err(ValidationError::MissingTitle)
        );
    }

    #[test]
    fn test_record_dedupes_subfolders() {
        let classification = Classification {
            category: Some("TV Shows".to_string()),
            title: Some("Test Show".to_string()),
            subfolders: strings(&["FooBar", "BazBoo", "BazBoo", ""]),
            ..Default::default()
        };

        let record = MediaRecord::from_classification("/in/a.mkv", classification).unwrap();
        assert_eq!(record.category, Category::TvShows);
        assert_eq!(record.subfolders, strings(&["FooBar", "BazBoo", ""]));
        assert_eq!(record.extension(), ".mkv");
    }

    #[test]
    fn test_blank_subfolder_separates_duplicates() {
        let classification = Classification {
            category: Some("Movies".to_string()),
            title: Some("Test Movie".to_string()),
            subfolders: strings(&["A", "", "A"]),
            ..Default::default()
        };

        let record = MediaRecord::from_classification("/in/a.mkv", classification).unwrap();
        assert_eq!(record.subfolders, strings(&["A", "", "A"]));
    }
}

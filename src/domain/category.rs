//! Library categories.
//!
//! The five built-in categories drive both the directory layout and the
//! filename scheme. Anything else an adapter hands back is kept verbatim
//! as `Other` so the file can still be routed (with its name untouched).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error for a category label that carries no text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Category label is empty")]
pub struct EmptyCategory;

/// Top-level library category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Movies,
    TvShows,
    KidsMovies,
    KidsTv,
    Anime,

    /// Unrecognized label, preserved as given
    Other(String),
}

impl Category {
    /// Every built-in category, in display order
    pub const BUILTIN: [Category; 5] = [
        Category::Movies,
        Category::TvShows,
        Category::KidsMovies,
        Category::KidsTv,
        Category::Anime,
    ];

    /// Directory / display label
    pub fn label(&self) -> &str {
        match self {
            Category::Movies => "Movies",
            Category::TvShows => "TV Shows",
            Category::KidsMovies => "Kids Movies",
            Category::KidsTv => "Kids TV",
            Category::Anime => "Anime",
            Category::Other(label) => label,
        }
    }

    /// Serialized content organized by season/episode
    pub fn is_episodic(&self) -> bool {
        matches!(self, Category::TvShows | Category::KidsTv | Category::Anime)
    }

    /// Single-release content named "{year} - {title}"
    pub fn is_movie_like(&self) -> bool {
        matches!(self, Category::Movies | Category::KidsMovies)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = EmptyCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        if label.is_empty() {
            return Err(EmptyCategory);
        }

        let category = Category::BUILTIN
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or_else(|| Category::Other(label.to_string()));

        Ok(category)
    }
}

impl TryFrom<String> for Category {
    type Error = EmptyCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

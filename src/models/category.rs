use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Headline categories understood by the news API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    General,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
}

impl NewsCategory {
    pub const ALL: [NewsCategory; 7] = [
        NewsCategory::General,
        NewsCategory::Business,
        NewsCategory::Technology,
        NewsCategory::Science,
        NewsCategory::Health,
        NewsCategory::Sports,
        NewsCategory::Entertainment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NewsCategory::General => "general",
            NewsCategory::Business => "business",
            NewsCategory::Technology => "technology",
            NewsCategory::Science => "science",
            NewsCategory::Health => "health",
            NewsCategory::Sports => "sports",
            NewsCategory::Entertainment => "entertainment",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            NewsCategory::General => "General",
            NewsCategory::Business => "Business",
            NewsCategory::Technology => "Technology",
            NewsCategory::Science => "Science",
            NewsCategory::Health => "Health",
            NewsCategory::Sports => "Sports",
            NewsCategory::Entertainment => "Entertainment",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewsCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| AppError::InvalidArgument(format!("unknown category: {}", s)))
    }
}

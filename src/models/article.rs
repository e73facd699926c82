use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to an article on first insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub(crate) i64);

impl ArticleId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for ArticleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub source: String,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub category: Option<String>,
    pub is_bookmarked: bool,
    pub is_saved_for_offline: bool,
}

impl Article {
    pub fn flag(&self, flag: ArticleFlag) -> bool {
        match flag {
            ArticleFlag::Bookmarked => self.is_bookmarked,
            ArticleFlag::Offline => self.is_saved_for_offline,
        }
    }

    pub(crate) fn set_flag(&mut self, flag: ArticleFlag, value: bool) {
        match flag {
            ArticleFlag::Bookmarked => self.is_bookmarked = value,
            ArticleFlag::Offline => self.is_saved_for_offline = value,
        }
    }

    /// Pinned articles are exempt from age-based eviction.
    pub fn is_pinned(&self) -> bool {
        self.is_bookmarked || self.is_saved_for_offline
    }
}

/// An article as it is about to be ingested. Flags are never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub source: String,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArticleFlag {
    Bookmarked,
    Offline,
}

impl ArticleFlag {
    pub(crate) fn column(self) -> &'static str {
        match self {
            ArticleFlag::Bookmarked => "is_bookmarked",
            ArticleFlag::Offline => "is_saved_offline",
        }
    }
}

/// Predicate for listing stored articles. Set fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArticleQuery {
    pub category: Option<String>,
    pub bookmarked_only: bool,
}

impl ArticleQuery {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            bookmarked_only: false,
        }
    }

    pub fn bookmarked() -> Self {
        Self {
            category: None,
            bookmarked_only: true,
        }
    }
}

// API payloads

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: Option<u32>,
    #[serde(default)]
    pub articles: Vec<RawArticle>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub source: RawSource,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSource {
    pub id: Option<String>,
    pub name: String,
}

impl RawArticle {
    /// Map the API shape onto an ingestable record tagged with the fetch context.
    pub fn into_new_article(self, category: Option<&str>) -> NewArticle {
        let published_at = parse_datetime(&self.published_at).unwrap_or_else(|| {
            tracing::debug!(
                "Unparseable publishedAt {:?} for {}, using now",
                self.published_at,
                self.url
            );
            Utc::now()
        });

        NewArticle {
            title: self.title,
            description: self.description,
            content: self.content,
            author: self.author,
            source: self.source.name,
            url: self.url,
            image_url: self.url_to_image,
            published_at,
            category: category.map(str::to_string),
        }
    }
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 / ISO-8601 (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

/// Fixed-width UTC text, so lexical order in SQLite matches time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

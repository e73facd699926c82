use chrono::{DateTime, Utc};

use crate::db::Listing;
use crate::error::{Advisory, StorageResult};
use crate::models::{Article, ArticleFlag, ArticleId, ArticleQuery};

/// A logical listing with its own refresh state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// Headlines, either all of them or a single category.
    Headlines { category: Option<String> },
    Search { query: String },
    Bookmarks,
}

impl Default for ViewKey {
    fn default() -> Self {
        ViewKey::Headlines { category: None }
    }
}

impl ViewKey {
    pub fn headlines(category: Option<&str>) -> Self {
        ViewKey::Headlines {
            category: category.map(str::to_string),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        ViewKey::Search {
            query: query.into(),
        }
    }

    pub(crate) fn listing(&self) -> Listing {
        match self {
            ViewKey::Headlines { category } => Listing::Filter(ArticleQuery {
                category: category.clone(),
                bookmarked_only: false,
            }),
            ViewKey::Search { query } => Listing::Text(query.clone()),
            ViewKey::Bookmarks => Listing::Filter(ArticleQuery::bookmarked()),
        }
    }

    /// Category tag applied to records ingested for this view.
    pub(crate) fn ingest_category(&self) -> Option<&str> {
        match self {
            ViewKey::Headlines { category } => category.as_deref(),
            ViewKey::Search { .. } | ViewKey::Bookmarks => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Fetching,
}

/// Articles for a view, plus an advisory when part of the pipeline failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub articles: Vec<Article>,
    pub advisory: Option<Advisory>,
    /// A remote refresh for this view was in flight when the snapshot was taken.
    pub refreshing: bool,
}

impl Snapshot {
    pub(crate) fn fresh(articles: Vec<Article>) -> Self {
        Self {
            articles,
            advisory: None,
            refreshing: false,
        }
    }

    /// A failed read becomes an empty listing carrying the storage error.
    pub(crate) fn from_store(result: StorageResult<Vec<Article>>) -> Self {
        match result {
            Ok(articles) => Self::fresh(articles),
            Err(e) => {
                tracing::warn!("Local read failed: {}", e);
                Self {
                    articles: Vec::new(),
                    advisory: Some(e.into()),
                    refreshing: false,
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn newest(&self) -> Option<&Article> {
        self.articles.first()
    }
}

/// The view most recently served to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleView {
    pub view: ViewKey,
    pub snapshot: Snapshot,
}

impl VisibleView {
    /// Patch a toggled flag in place. Returns whether anything changed.
    pub(crate) fn apply_flag(&mut self, id: ArticleId, flag: ArticleFlag, value: bool) -> bool {
        let articles = &mut self.snapshot.articles;

        if self.view == ViewKey::Bookmarks && flag == ArticleFlag::Bookmarked && !value {
            let before = articles.len();
            articles.retain(|a| a.id != id);
            return articles.len() != before;
        }

        match articles.iter_mut().find(|a| a.id == id) {
            Some(article) if article.flag(flag) != value => {
                article.set_flag(flag, value);
                true
            }
            _ => false,
        }
    }

    /// Drop unpinned articles published before `cutoff`.
    pub(crate) fn drop_expired(&mut self, cutoff: DateTime<Utc>) -> bool {
        let articles = &mut self.snapshot.articles;
        let before = articles.len();
        articles.retain(|a| a.is_pinned() || a.published_at >= cutoff);
        articles.len() != before
    }
}

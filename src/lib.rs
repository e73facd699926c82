//! Local-first cache and sync layer for a headlines/search news API.
//!
//! [`ArticleStore`] owns the persisted articles; [`FeedCache`] decides when
//! to go to the [`RemoteSource`], merges what comes back, and publishes the
//! visible listing to subscribers.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;

pub use cache::{CacheSettings, FeedCache, ImageCache, Snapshot, ViewKey, ViewState, VisibleView};
pub use config::Config;
pub use db::{ArticleStore, IngestReport, Listing};
pub use error::{Advisory, AppError, RemoteError, Result, StorageError};
pub use feed::{NewsApiClient, RemoteSource, SampleSource};
pub use models::{Article, ArticleFlag, ArticleId, ArticleQuery, NewArticle, NewsCategory, RawArticle};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RemoteError;
use crate::models::RawArticle;

/// A remote provider of articles.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Top headlines, optionally restricted to one category.
    async fn fetch_headlines(&self, category: Option<&str>) -> Result<Vec<RawArticle>, RemoteError>;

    /// Articles matching a free-text query.
    async fn fetch_search(&self, query: &str) -> Result<Vec<RawArticle>, RemoteError>;

    async fn fetch_image(&self, url: &str) -> Result<Bytes, RemoteError>;
}

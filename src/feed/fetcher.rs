use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::error::{AppError, RemoteError, Result};
use crate::models::{ApiResponse, RawArticle};

use super::source::RemoteSource;

/// HTTP client for a NewsAPI-compatible headlines/search service.
pub struct NewsApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    country: String,
}

impl NewsApiClient {
    pub fn new(config: &Config, api_key: String) -> Result<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("invalid base_url {:?}: {}", config.base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("news-cache/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            country: config.country.clone(),
        })
    }

    async fn get_articles(&self, endpoint: &str, query: &[(&str, &str)]) -> std::result::Result<Vec<RawArticle>, RemoteError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await?;

        check_status(response.status())?;

        let bytes = response.bytes().await?;
        let payload: ApiResponse =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;

        if payload.status != "ok" {
            let reason = payload
                .message
                .or(payload.code)
                .unwrap_or_else(|| format!("status {:?}", payload.status));
            return Err(RemoteError::Decode(reason));
        }

        tracing::debug!("Fetched {} articles from {}", payload.articles.len(), endpoint);
        Ok(payload.articles)
    }
}

#[async_trait]
impl RemoteSource for NewsApiClient {
    async fn fetch_headlines(&self, category: Option<&str>) -> std::result::Result<Vec<RawArticle>, RemoteError> {
        let mut query = vec![("country", self.country.as_str())];
        if let Some(category) = category {
            query.push(("category", category));
        }
        self.get_articles("top-headlines", &query).await
    }

    async fn fetch_search(&self, query: &str) -> std::result::Result<Vec<RawArticle>, RemoteError> {
        self.get_articles("everything", &[("q", query), ("sortBy", "publishedAt")])
            .await
    }

    async fn fetch_image(&self, url: &str) -> std::result::Result<Bytes, RemoteError> {
        let response = self.client.get(url).send().await?;
        check_status(response.status())?;
        Ok(response.bytes().await?)
    }
}

fn check_status(status: StatusCode) -> std::result::Result<(), RemoteError> {
    match status.as_u16() {
        200..=299 => Ok(()),
        401 => Err(RemoteError::Unauthorized),
        429 => Err(RemoteError::RateLimited),
        code => Err(RemoteError::ServerError(code)),
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::watch;

use news_cache::models::RawSource;
use news_cache::{
    ArticleStore, CacheSettings, FeedCache, NewArticle, RawArticle, RemoteError, RemoteSource,
    VisibleView,
};

/// Scripted remote source that records how often it was called.
#[derive(Default)]
pub struct StubSource {
    headlines: Vec<RawArticle>,
    searches: HashMap<String, (Vec<RawArticle>, Duration)>,
    failure: Option<RemoteError>,
    delay: Duration,
    headline_calls: AtomicUsize,
    image_calls: AtomicUsize,
    search_calls: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headlines(mut self, articles: Vec<RawArticle>) -> Self {
        self.headlines = articles;
        self
    }

    pub fn with_search(mut self, query: &str, articles: Vec<RawArticle>, delay: Duration) -> Self {
        self.searches.insert(query.to_string(), (articles, delay));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: RemoteError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn headline_calls(&self) -> usize {
        self.headline_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSource for StubSource {
    async fn fetch_headlines(&self, _category: Option<&str>) -> Result<Vec<RawArticle>, RemoteError> {
        self.headline_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.headlines.clone()),
        }
    }

    async fn fetch_search(&self, query: &str) -> Result<Vec<RawArticle>, RemoteError> {
        self.search_calls.lock().unwrap().push(query.to_string());
        let (articles, delay) = self.searches.get(query).cloned().unwrap_or_default();
        tokio::time::sleep(delay).await;
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(articles),
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<Bytes, RemoteError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(url.as_bytes().to_vec()))
    }
}

pub fn raw(url: &str, title: &str, minutes_old: i64) -> RawArticle {
    RawArticle {
        source: RawSource {
            id: None,
            name: "Test Wire".to_string(),
        },
        author: None,
        title: title.to_string(),
        description: None,
        url: url.to_string(),
        url_to_image: None,
        published_at: (Utc::now() - chrono::Duration::minutes(minutes_old)).to_rfc3339(),
        content: None,
    }
}

pub fn stored(url: &str, title: &str, category: Option<&str>, minutes_old: i64) -> NewArticle {
    raw(url, title, minutes_old).into_new_article(category)
}

pub fn settings() -> CacheSettings {
    CacheSettings {
        search_debounce: Duration::ZERO,
        ..CacheSettings::default()
    }
}

pub async fn cache_with(stub: StubSource, seed: Vec<NewArticle>) -> (FeedCache, Arc<StubSource>) {
    cache_with_settings(stub, seed, settings()).await
}

pub async fn cache_with_settings(
    stub: StubSource,
    seed: Vec<NewArticle>,
    settings: CacheSettings,
) -> (FeedCache, Arc<StubSource>) {
    let store = ArticleStore::open_in_memory().await.unwrap();
    for article in seed {
        store.upsert_if_absent(article).await.unwrap();
    }
    let stub = Arc::new(stub);
    let cache = FeedCache::new(store, stub.clone(), settings);
    (cache, stub)
}

/// Wait until the visible view satisfies `pred`.
pub async fn visible_where(
    updates: &mut watch::Receiver<VisibleView>,
    pred: impl FnMut(&VisibleView) -> bool,
) -> VisibleView {
    tokio::time::timeout(Duration::from_secs(2), updates.wait_for(pred))
        .await
        .expect("timed out waiting for visible view")
        .expect("cache dropped")
        .clone()
}

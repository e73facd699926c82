//! Local-first article cache.
//!
//! Every view is served from the [`ArticleStore`] first. A remote refresh is
//! started in the background when the view is empty, when its newest article
//! is older than the freshness threshold, or when the caller forces one. At
//! most one refresh per view is in flight; later requests for the same view
//! join it. Search results are tagged with a generation so that only the
//! latest query can change what is visible.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use bytes::Bytes;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::ArticleStore;
use crate::error::{Advisory, RemoteError};
use crate::feed::RemoteSource;
use crate::models::{ArticleFlag, ArticleId, NewArticle};

use super::images::ImageCache;
use super::view::{Snapshot, ViewKey, ViewState, VisibleView};

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// A view whose newest article is older than this gets refreshed.
    pub freshness: Duration,
    /// Default age for [`FeedCache::evict_expired`].
    pub retention: Duration,
    /// Delay before a search hits the remote source.
    pub search_debounce: StdDuration,
    pub image_max_entries: usize,
    pub image_max_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness: Duration::hours(1),
            retention: Duration::days(30),
            search_debounce: StdDuration::from_millis(500),
            image_max_entries: 100,
            image_max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl From<&Config> for CacheSettings {
    fn from(config: &Config) -> Self {
        Self {
            freshness: Duration::minutes(i64::from(config.freshness_minutes)),
            retention: Duration::days(i64::from(config.retention_days)),
            search_debounce: StdDuration::from_millis(config.search_debounce_ms),
            image_max_entries: config.image_cache_max_entries,
            image_max_bytes: config.image_cache_max_bytes,
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Snapshot>>;

struct PendingSearch {
    query: String,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct CacheState {
    in_flight: HashMap<ViewKey, SharedRefresh>,
    search_generation: u64,
    pending_search: Option<PendingSearch>,
    /// Bumped whenever a refresh or search result is published.
    publications: u64,
}

struct Inner {
    store: ArticleStore,
    remote: Arc<dyn RemoteSource>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
    visible: watch::Sender<VisibleView>,
    images: Mutex<ImageCache>,
}

/// Mediates between a [`RemoteSource`] and the [`ArticleStore`].
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct FeedCache {
    inner: Arc<Inner>,
}

impl FeedCache {
    pub fn new(store: ArticleStore, remote: Arc<dyn RemoteSource>, settings: CacheSettings) -> Self {
        let (visible, _) = watch::channel(VisibleView::default());
        let images = ImageCache::new(settings.image_max_entries, settings.image_max_bytes);

        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                settings,
                state: Mutex::new(CacheState::default()),
                visible,
                images: Mutex::new(images),
            }),
        }
    }

    pub fn store(&self) -> &ArticleStore {
        &self.inner.store
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Notifications whenever the visible view changes.
    pub fn subscribe(&self) -> watch::Receiver<VisibleView> {
        self.inner.visible.subscribe()
    }

    pub fn visible(&self) -> VisibleView {
        self.inner.visible.borrow().clone()
    }

    pub async fn view_state(&self, view: &ViewKey) -> ViewState {
        if self.inner.state.lock().await.in_flight.contains_key(view) {
            ViewState::Fetching
        } else {
            ViewState::Idle
        }
    }

    /// Wait for the in-flight refresh of `view`, if there is one.
    pub async fn wait_for_refresh(&self, view: &ViewKey) -> Option<Snapshot> {
        let refresh = self.inner.state.lock().await.in_flight.get(view).cloned()?;
        Some(refresh.await)
    }

    // Views

    /// Headlines for `category` (all categories when `None`).
    ///
    /// Without `force_refresh` this returns the local listing at once and
    /// refreshes in the background if the listing is empty or stale. With it,
    /// this waits for a refresh (joining one already in flight) and returns
    /// the merged result.
    pub async fn get_by_category(&self, category: Option<&str>, force_refresh: bool) -> Snapshot {
        let view = ViewKey::headlines(category);
        let (mut snapshot, mut state) = self.inner.read_then_lock(&view).await;

        if force_refresh {
            let refresh = self.start_refresh(&mut state, &view);
            snapshot.refreshing = true;
            self.inner.show(view.clone(), snapshot);
            drop(state);

            let snapshot = refresh.await;
            let mut state = self.inner.state.lock().await;
            self.inner.publish_if_visible(&mut state, &view, snapshot.clone());
            return snapshot;
        }

        let stale = self.inner.is_stale(&snapshot);
        snapshot.refreshing = stale || state.in_flight.contains_key(&view);
        self.inner.show(view.clone(), snapshot.clone());

        if stale {
            let _ = self.start_refresh(&mut state, &view);
        } else {
            tracing::debug!("Serving {:?} from cache", view);
        }
        snapshot
    }

    /// Bookmarked articles. Local only.
    pub async fn bookmarks(&self) -> Snapshot {
        let view = ViewKey::Bookmarks;
        let snapshot = self.inner.read_local(&view).await;
        self.inner.show(view, snapshot.clone());
        snapshot
    }

    /// Local matches for `query` now; remote matches are merged in and
    /// published once they arrive, unless a newer search has started.
    pub async fn search(&self, query: &str) -> Snapshot {
        let query = query.trim();
        let view = ViewKey::search(query);

        if query.is_empty() {
            let mut state = self.inner.state.lock().await;
            state.search_generation += 1;
            if let Some(superseded) = state.pending_search.take() {
                tracing::debug!("Cancelling superseded search for {:?}", superseded.query);
                superseded.task.abort();
            }
            let snapshot = Snapshot::default();
            self.inner.show(view, snapshot.clone());
            return snapshot;
        }

        let (mut snapshot, mut state) = self.inner.read_then_lock(&view).await;
        snapshot.refreshing = true;

        if let Some(pending) = &state.pending_search {
            if pending.query == query && !pending.task.is_finished() {
                tracing::debug!("Coalescing repeated search for {:?}", query);
                self.inner.show(view, snapshot.clone());
                return snapshot;
            }
        }

        state.search_generation += 1;
        let generation = state.search_generation;
        if let Some(superseded) = state.pending_search.take() {
            tracing::debug!("Cancelling superseded search for {:?}", superseded.query);
            superseded.task.abort();
        }

        self.inner.show(view.clone(), snapshot.clone());

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.remote_search(generation, view).await });
        state.pending_search = Some(PendingSearch {
            query: query.to_string(),
            task,
        });

        snapshot
    }

    // Flags

    pub async fn toggle_bookmark(&self, id: ArticleId) -> Result<(), Advisory> {
        self.toggle(id, ArticleFlag::Bookmarked).await
    }

    pub async fn toggle_offline(&self, id: ArticleId) -> Result<(), Advisory> {
        self.toggle(id, ArticleFlag::Offline).await
    }

    async fn toggle(&self, id: ArticleId, flag: ArticleFlag) -> Result<(), Advisory> {
        match self.inner.store.toggle_flag(id, flag).await {
            Ok(Some(value)) => {
                self.inner
                    .visible
                    .send_if_modified(|visible| visible.apply_flag(id, flag, value));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                tracing::warn!("Failed to toggle {:?} on article {}: {}", flag, id, e);
                Err(e.into())
            }
        }
    }

    // Eviction

    /// Remove unpinned articles older than `max_age`. Returns how many went.
    pub async fn evict(&self, max_age: Duration) -> Result<usize, Advisory> {
        self.evict_before(Utc::now() - max_age).await
    }

    /// Remove unpinned articles published before `cutoff`.
    pub async fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<usize, Advisory> {
        // Stored timestamps carry microseconds; compare at the same precision.
        let cutoff = cutoff.trunc_subsecs(6);
        let removed = self.inner.store.evict_before(cutoff).await.map_err(|e| {
            tracing::warn!("Eviction failed: {}", e);
            Advisory::from(e)
        })?;

        if removed > 0 {
            self.inner
                .visible
                .send_if_modified(|visible| visible.drop_expired(cutoff));
        }
        Ok(removed)
    }

    /// [`evict`](Self::evict) with the configured retention (30 days by default).
    pub async fn evict_expired(&self) -> Result<usize, Advisory> {
        self.evict(self.inner.settings.retention).await
    }

    // Images

    pub async fn image(&self, url: &str) -> Result<Bytes, RemoteError> {
        if let Some(data) = self.inner.images.lock().await.get(url) {
            return Ok(data);
        }

        let data = self.inner.remote.fetch_image(url).await?;
        self.inner
            .images
            .lock()
            .await
            .insert(url.to_string(), data.clone());
        Ok(data)
    }

    pub async fn clear_images(&self) {
        self.inner.images.lock().await.clear();
    }

    /// Join the in-flight refresh for `view` or start one. The refresh is
    /// driven by its own task, so it completes even if every caller stops
    /// waiting on it.
    fn start_refresh(&self, state: &mut CacheState, view: &ViewKey) -> SharedRefresh {
        if let Some(existing) = state.in_flight.get(view) {
            tracing::debug!("Joining in-flight refresh for {:?}", view);
            return existing.clone();
        }

        tracing::debug!("Refreshing {:?}", view);
        let inner = Arc::clone(&self.inner);
        let key = view.clone();
        let refresh = async move { inner.refresh(&key).await }.boxed().shared();
        state.in_flight.insert(view.clone(), refresh.clone());

        let inner = Arc::clone(&self.inner);
        let key = view.clone();
        let driver = refresh.clone();
        tokio::spawn(async move {
            let snapshot = driver.await;
            let mut state = inner.state.lock().await;
            state.in_flight.remove(&key);
            inner.publish_if_visible(&mut state, &key, snapshot);
        });

        refresh
    }
}

impl Inner {
    async fn read_local(&self, view: &ViewKey) -> Snapshot {
        Snapshot::from_store(self.store.list(view.listing()).await)
    }

    /// Read `view` without holding the state lock, then take it. If a result
    /// was published in between, the read is redone so it cannot replace
    /// newer data.
    async fn read_then_lock(&self, view: &ViewKey) -> (Snapshot, MutexGuard<'_, CacheState>) {
        let seen = self.state.lock().await.publications;
        let snapshot = self.read_local(view).await;

        let state = self.state.lock().await;
        if state.publications == seen {
            return (snapshot, state);
        }
        let snapshot = self.read_local(view).await;
        (snapshot, state)
    }

    fn is_stale(&self, snapshot: &Snapshot) -> bool {
        match snapshot.newest() {
            Some(newest) => Utc::now() - newest.published_at > self.settings.freshness,
            None => true,
        }
    }

    /// Fetch remotely, ingest, and re-read the view. Falls back to the local
    /// listing with an advisory when the remote call fails.
    async fn refresh(&self, view: &ViewKey) -> Snapshot {
        let fetched = match view {
            ViewKey::Headlines { category } => self.remote.fetch_headlines(category.as_deref()).await,
            ViewKey::Search { query } => self.remote.fetch_search(query).await,
            ViewKey::Bookmarks => return self.read_local(view).await,
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Remote fetch for {:?} failed: {}", view, e);
                let mut snapshot = self.read_local(view).await;
                if snapshot.advisory.is_none() {
                    snapshot.advisory = Some(Advisory::Remote(e));
                }
                return snapshot;
            }
        };

        let records: Vec<NewArticle> = raw
            .into_iter()
            .map(|article| article.into_new_article(view.ingest_category()))
            .collect();

        match self.store.ingest_then_list(records, view.listing()).await {
            Ok((report, articles)) => {
                tracing::info!(
                    "Ingested {:?}: {} new, {} existing, {} failed",
                    view,
                    report.inserted,
                    report.existing,
                    report.failed
                );
                Snapshot::fresh(articles)
            }
            Err(e) => {
                tracing::error!("Failed to ingest {:?}: {}", view, e);
                let mut snapshot = self.read_local(view).await;
                if snapshot.advisory.is_none() {
                    snapshot.advisory = Some(e.into());
                }
                snapshot
            }
        }
    }

    async fn remote_search(&self, generation: u64, view: ViewKey) {
        if !self.settings.search_debounce.is_zero() {
            tokio::time::sleep(self.settings.search_debounce).await;
            if self.state.lock().await.search_generation != generation {
                return;
            }
        }

        // Ingestion below commits even if this search gets superseded; only
        // publishing is conditional on still being the latest generation.
        let snapshot = self.refresh(&view).await;

        let mut state = self.state.lock().await;
        if state.search_generation != generation {
            tracing::debug!("Discarding results for superseded {:?}", view);
            return;
        }
        state.pending_search = None;
        state.publications += 1;
        self.show(view, snapshot);
    }

    fn show(&self, view: ViewKey, snapshot: Snapshot) {
        self.visible.send_replace(VisibleView { view, snapshot });
    }

    fn publish_if_visible(&self, state: &mut CacheState, view: &ViewKey, snapshot: Snapshot) {
        state.publications += 1;
        self.visible.send_if_modified(|visible| {
            if visible.view == *view {
                visible.snapshot = snapshot;
                true
            } else {
                false
            }
        });
    }
}

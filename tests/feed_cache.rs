mod common;

use std::time::Duration;

use common::{cache_with, cache_with_settings, raw, stored, visible_where, StubSource};
use news_cache::{
    Advisory, ArticleId, ArticleQuery, CacheSettings, RemoteError, ViewKey, ViewState,
};

#[tokio::test]
async fn stale_view_triggers_exactly_one_fetch() {
    let seed = vec![stored("https://example.com/old", "Old news", Some("technology"), 120)];
    let (cache, stub) = cache_with(StubSource::new(), seed).await;

    let snapshot = cache.get_by_category(Some("technology"), false).await;
    assert_eq!(snapshot.articles.len(), 1);
    assert!(snapshot.refreshing);

    cache.wait_for_refresh(&ViewKey::headlines(Some("technology"))).await;
    assert_eq!(stub.headline_calls(), 1);
}

#[tokio::test]
async fn fresh_view_is_served_locally() {
    let seed = vec![stored("https://example.com/new", "New news", Some("technology"), 30)];
    let (cache, stub) = cache_with(StubSource::new(), seed).await;

    let snapshot = cache.get_by_category(Some("technology"), false).await;
    assert_eq!(snapshot.articles.len(), 1);
    assert!(!snapshot.refreshing);

    let view = ViewKey::headlines(Some("technology"));
    assert_eq!(cache.view_state(&view).await, ViewState::Idle);
    assert!(cache.wait_for_refresh(&view).await.is_none());
    assert_eq!(stub.headline_calls(), 0);
}

#[tokio::test]
async fn empty_view_publishes_remote_results() {
    let stub = StubSource::new().with_headlines(vec![
        raw("https://example.com/1", "Mars rover finds water", 5),
        raw("https://example.com/2", "Comet passes Earth", 10),
    ]);
    let (cache, _stub) = cache_with(stub, Vec::new()).await;
    let mut updates = cache.subscribe();

    let snapshot = cache.get_by_category(Some("science"), false).await;
    assert!(snapshot.is_empty());
    assert!(snapshot.refreshing);

    let visible = visible_where(&mut updates, |v| !v.snapshot.refreshing).await;
    assert_eq!(visible.view, ViewKey::headlines(Some("science")));
    let titles: Vec<_> = visible.snapshot.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Mars rover finds water", "Comet passes Earth"]);
    assert!(visible
        .snapshot
        .articles
        .iter()
        .all(|a| a.category.as_deref() == Some("science")));
}

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    let stub = StubSource::new()
        .with_headlines(vec![raw("https://example.com/1", "Markets rally", 5)])
        .with_delay(Duration::from_millis(50));
    let (cache, stub) = cache_with(stub, Vec::new()).await;

    let (first, second, third) = tokio::join!(
        cache.get_by_category(Some("business"), true),
        cache.get_by_category(Some("business"), true),
        cache.get_by_category(Some("business"), false),
    );

    assert_eq!(stub.headline_calls(), 1);
    assert_eq!(first.articles.len(), 1);
    assert_eq!(first, second);
    assert!(third.refreshing);
}

#[tokio::test]
async fn forced_refresh_joins_background_refresh() {
    let stub = StubSource::new()
        .with_headlines(vec![raw("https://example.com/1", "Cup final tonight", 5)])
        .with_delay(Duration::from_millis(50));
    let (cache, stub) = cache_with(stub, Vec::new()).await;

    let background = cache.get_by_category(Some("sports"), false).await;
    assert!(background.refreshing);
    assert_eq!(
        cache.view_state(&ViewKey::headlines(Some("sports"))).await,
        ViewState::Fetching
    );

    let forced = cache.get_by_category(Some("sports"), true).await;
    assert_eq!(forced.articles.len(), 1);
    assert_eq!(stub.headline_calls(), 1);
}

#[tokio::test]
async fn forced_refresh_does_not_replace_a_newer_view() {
    let stub = StubSource::new()
        .with_headlines(vec![raw("https://example.com/1", "Cup final tonight", 5)])
        .with_delay(Duration::from_millis(150));
    let (cache, _stub) = cache_with(stub, Vec::new()).await;
    let mut updates = cache.subscribe();

    let forced = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get_by_category(Some("sports"), true).await }
    });

    let visible = visible_where(&mut updates, |v| v.view == ViewKey::headlines(Some("sports"))).await;
    assert!(visible.snapshot.refreshing);

    cache.search("abbey").await;
    visible_where(&mut updates, |v| {
        v.view == ViewKey::search("abbey") && !v.snapshot.refreshing
    })
    .await;

    let forced = forced.await.unwrap();
    assert_eq!(forced.articles.len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.visible().view, ViewKey::search("abbey"));
}

#[tokio::test]
async fn remote_failure_serves_local_with_advisory() {
    let seed = vec![stored("https://example.com/old", "Cached story", None, 180)];
    let stub = StubSource::new().failing(RemoteError::RateLimited);
    let (cache, _stub) = cache_with(stub, seed).await;

    let snapshot = cache.get_by_category(None, true).await;

    assert_eq!(snapshot.articles.len(), 1);
    assert_eq!(snapshot.advisory, Some(Advisory::Remote(RemoteError::RateLimited)));
    assert_eq!(cache.visible().snapshot, snapshot);
}

#[tokio::test]
async fn remote_failure_on_empty_view_is_empty_with_advisory() {
    let stub = StubSource::new().failing(RemoteError::Unauthorized);
    let (cache, _stub) = cache_with(stub, Vec::new()).await;

    let snapshot = cache.get_by_category(Some("health"), true).await;

    assert!(snapshot.is_empty());
    assert_eq!(snapshot.advisory, Some(Advisory::Remote(RemoteError::Unauthorized)));
}

#[tokio::test]
async fn refetch_keeps_flags_and_original_content() {
    let seed = vec![stored("https://example.com/1", "Original title", None, 180)];
    let stub = StubSource::new().with_headlines(vec![
        raw("https://example.com/1", "Rewritten title", 1),
        raw("https://example.com/2", "Another story", 2),
    ]);
    let (cache, _stub) = cache_with(stub, seed).await;

    let id = cache.get_by_category(None, false).await.articles[0].id;
    cache.toggle_bookmark(id).await.unwrap();
    cache.toggle_offline(id).await.unwrap();

    cache.get_by_category(None, true).await;
    cache.get_by_category(None, true).await;

    let article = cache.store().get(id).await.unwrap().unwrap();
    assert_eq!(article.title, "Original title");
    assert!(article.is_bookmarked);
    assert!(article.is_saved_for_offline);
    assert_eq!(cache.store().count().await.unwrap(), 2);
}

#[tokio::test]
async fn latest_search_wins_over_slower_earlier_search() {
    let stub = StubSource::new()
        .with_search(
            "a",
            vec![raw("https://example.com/sea", "Sea salt prices", 1)],
            Duration::from_millis(150),
        )
        .with_search(
            "ab",
            vec![raw("https://example.com/abbey", "Abbey road reopens", 1)],
            Duration::from_millis(10),
        );
    let (cache, _stub) = cache_with(stub, Vec::new()).await;
    let mut updates = cache.subscribe();

    cache.search("a").await;
    cache.search("ab").await;

    let visible = visible_where(&mut updates, |v| {
        v.view == ViewKey::search("ab") && !v.snapshot.refreshing
    })
    .await;
    assert_eq!(visible.snapshot.articles[0].title, "Abbey road reopens");

    // Give the slower search time to land if it were still running.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let visible = cache.visible();
    assert_eq!(visible.view, ViewKey::search("ab"));
    let titles: Vec<_> = visible.snapshot.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Abbey road reopens"]);
}

#[tokio::test]
async fn debounced_search_only_sends_the_last_query() {
    let stub = StubSource::new()
        .with_search(
            "a",
            vec![raw("https://example.com/sea", "Sea salt prices", 1)],
            Duration::ZERO,
        )
        .with_search(
            "ab",
            vec![raw("https://example.com/abbey", "Abbey road reopens", 1)],
            Duration::ZERO,
        );
    let settings = CacheSettings {
        search_debounce: Duration::from_millis(100),
        ..CacheSettings::default()
    };
    let (cache, stub) = cache_with_settings(stub, Vec::new(), settings).await;
    let mut updates = cache.subscribe();

    cache.search("a").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.search("ab").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(stub.search_calls().is_empty());

    let visible = visible_where(&mut updates, |v| {
        v.view == ViewKey::search("ab") && !v.snapshot.refreshing
    })
    .await;
    let titles: Vec<_> = visible.snapshot.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Abbey road reopens"]);
    assert_eq!(stub.search_calls(), vec!["ab".to_string()]);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.visible().view, ViewKey::search("ab"));
    assert_eq!(stub.search_calls(), vec!["ab".to_string()]);
}

#[tokio::test]
async fn repeated_search_is_coalesced() {
    let stub = StubSource::new().with_search(
        "climate",
        vec![raw("https://example.com/c", "Climate summit closes", 1)],
        Duration::from_millis(50),
    );
    let (cache, stub) = cache_with(stub, Vec::new()).await;
    let mut updates = cache.subscribe();

    cache.search("climate").await;
    cache.search("  climate ").await;

    let visible = visible_where(&mut updates, |v| !v.snapshot.refreshing).await;
    assert_eq!(visible.snapshot.articles.len(), 1);
    assert_eq!(stub.search_calls(), vec!["climate".to_string()]);
}

#[tokio::test]
async fn search_repeated_after_results_land_settles_again() {
    let stub = StubSource::new().with_search(
        "climate",
        vec![raw("https://example.com/c", "Climate summit closes", 1)],
        Duration::ZERO,
    );
    let (cache, stub) = cache_with(stub, Vec::new()).await;
    let mut updates = cache.subscribe();

    cache.search("climate").await;
    visible_where(&mut updates, |v| !v.snapshot.refreshing).await;

    let again = cache.search("climate").await;
    assert!(again.refreshing);
    assert_eq!(again.articles.len(), 1);

    let visible = visible_where(&mut updates, |v| !v.snapshot.refreshing).await;
    assert_eq!(visible.snapshot.articles.len(), 1);
    assert_eq!(stub.search_calls().len(), 2);
}

#[tokio::test]
async fn empty_search_returns_nothing() {
    let seed = vec![stored("https://example.com/1", "Anything", None, 5)];
    let (cache, stub) = cache_with(StubSource::new(), seed).await;

    let snapshot = cache.search("   ").await;

    assert!(snapshot.is_empty());
    assert!(!snapshot.refreshing);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(stub.search_calls().is_empty());
}

#[tokio::test]
async fn search_shows_local_matches_first() {
    let seed = vec![
        stored("https://example.com/1", "Electric cars sell out", None, 5),
        stored("https://example.com/2", "Rain expected", None, 5),
    ];
    let (cache, _stub) = cache_with(StubSource::new(), seed).await;

    let snapshot = cache.search("electric").await;

    assert!(snapshot.refreshing);
    assert_eq!(snapshot.articles.len(), 1);
    assert_eq!(snapshot.articles[0].title, "Electric cars sell out");
}

#[tokio::test]
async fn toggles_update_visible_view_in_place() {
    let seed = vec![
        stored("https://example.com/1", "First", None, 5),
        stored("https://example.com/2", "Second", None, 10),
    ];
    let (cache, _stub) = cache_with(StubSource::new(), seed).await;

    let snapshot = cache.get_by_category(None, false).await;
    let id = snapshot.articles[1].id;

    cache.toggle_offline(id).await.unwrap();
    let visible = cache.visible();
    assert!(visible.snapshot.articles[1].is_saved_for_offline);
    assert!(!visible.snapshot.articles[0].is_saved_for_offline);

    cache.toggle_offline(id).await.unwrap();
    assert!(!cache.visible().snapshot.articles[1].is_saved_for_offline);
}

#[tokio::test]
async fn toggling_unknown_article_is_a_no_op() {
    let (cache, _stub) = cache_with(StubSource::new(), Vec::new()).await;

    assert!(cache.toggle_bookmark(ArticleId::from(9999)).await.is_ok());
    assert_eq!(cache.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn unbookmarking_drops_article_from_bookmarks_view() {
    let seed = vec![
        stored("https://example.com/1", "Keep", None, 5),
        stored("https://example.com/2", "Drop", None, 10),
    ];
    let (cache, stub) = cache_with(StubSource::new(), seed).await;

    let listing = cache.get_by_category(None, false).await;
    for article in &listing.articles {
        cache.toggle_bookmark(article.id).await.unwrap();
    }

    let bookmarks = cache.bookmarks().await;
    assert_eq!(bookmarks.articles.len(), 2);

    cache.toggle_bookmark(bookmarks.articles[1].id).await.unwrap();
    let titles: Vec<_> = cache
        .visible()
        .snapshot
        .articles
        .iter()
        .map(|a| a.title.clone())
        .collect();
    assert_eq!(titles, vec!["Keep".to_string()]);
    assert_eq!(stub.headline_calls(), 0);
}

#[tokio::test]
async fn eviction_spares_pinned_articles() {
    let day = 24 * 60;
    let seed = vec![
        stored("https://example.com/recent", "Recent", None, day),
        stored("https://example.com/old", "Old", None, 40 * day),
        stored("https://example.com/kept", "Old but saved", None, 40 * day),
        stored("https://example.com/marked", "Old but bookmarked", None, 40 * day),
    ];
    let (cache, _stub) = cache_with(StubSource::new(), seed).await;

    let listing = cache.get_by_category(None, true).await;
    for article in &listing.articles {
        match article.title.as_str() {
            "Old but saved" => cache.toggle_offline(article.id).await.unwrap(),
            "Old but bookmarked" => cache.toggle_bookmark(article.id).await.unwrap(),
            _ => {}
        }
    }

    assert_eq!(cache.evict_expired().await.unwrap(), 1);

    let titles: Vec<_> = cache
        .visible()
        .snapshot
        .articles
        .iter()
        .map(|a| a.title.clone())
        .collect();
    assert!(!titles.contains(&"Old".to_string()));
    assert_eq!(titles.len(), 3);

    let remaining = cache.store().query(ArticleQuery::default()).await.unwrap();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.iter().filter(|a| a.title != "Recent").all(|a| a.is_pinned()));
}

#[tokio::test]
async fn eviction_patch_matches_what_the_store_kept() {
    let seed = vec![
        stored("https://example.com/edge", "At the cutoff", None, 10),
        stored("https://example.com/older", "Before the cutoff", None, 20),
    ];
    let (cache, _stub) = cache_with(StubSource::new(), seed).await;

    let listing = cache.get_by_category(None, false).await;
    assert!(!listing.refreshing);
    let cutoff = listing.articles[0].published_at;

    assert_eq!(cache.evict_before(cutoff).await.unwrap(), 1);

    let visible: Vec<_> = cache
        .visible()
        .snapshot
        .articles
        .iter()
        .map(|a| a.title.clone())
        .collect();
    let stored: Vec<_> = cache
        .store()
        .query(ArticleQuery::default())
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(visible, vec!["At the cutoff".to_string()]);
    assert_eq!(visible, stored);
}

#[tokio::test]
async fn images_are_fetched_once_until_cleared() {
    let (cache, stub) = cache_with(StubSource::new(), Vec::new()).await;
    let url = "https://example.com/a.jpg";

    let first = cache.image(url).await.unwrap();
    let second = cache.image(url).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(stub.image_calls(), 1);

    cache.clear_images().await;
    cache.image(url).await.unwrap();
    assert_eq!(stub.image_calls(), 2);
}

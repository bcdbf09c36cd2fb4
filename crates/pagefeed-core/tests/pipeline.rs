#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use pagefeed_core::{
    ContentCache, FileStore, HttpFetcher, ImageSlot, ImageState, LoadStatus, PageKey,
    PaginationController, RequestOutcome, RetryPolicy, SkipReason, TokioClock,
};
use serde_json::json;
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn envelope(server: &MockServer, page: u32, ids: &[u64], next: Option<u32>) -> serde_json::Value {
    let results: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Character {id}"),
                "status": "Alive",
                "image": format!("{}/avatar/{id}.jpeg", server.uri()),
            })
        })
        .collect();
    json!({
        "info": {
            "count": 4,
            "pages": 2,
            "next": next.map(|n| format!("{}/api/character?page={n}", server.uri())),
            "prev": (page > 1).then(|| format!("{}/api/character?page={}", server.uri(), page - 1)),
        },
        "results": results,
    })
}

async fn mount_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(server, 1, &[1, 2], Some(2))))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(server, 2, &[3, 4], None)))
        .mount(server)
        .await;
}

fn first_page_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/api/character?page=1", server.uri())).unwrap()
}

#[tokio::test]
async fn pages_persist_across_controllers() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_pages(&server).await;
    let data = tempdir()?;
    let fetcher = Arc::new(HttpFetcher::with_timeout(
        first_page_url(&server),
        Duration::from_secs(5),
    )?);

    // Given: a controller that walks the whole resource
    {
        let store = FileStore::open(data.path(), "character")?;
        let controller = PaginationController::new(store, fetcher.clone(), "")?;
        assert!(matches!(
            controller.load_initial().await?,
            Some(RequestOutcome::Applied { .. })
        ));
        assert!(matches!(
            controller.on_item_visible(2).await?,
            Some(RequestOutcome::Applied { items: 2, .. })
        ));
        assert_eq!(
            controller.request_next_page().await?,
            RequestOutcome::Skipped(SkipReason::Exhausted)
        );
    }

    // When: a new controller opens the same store
    let store = FileStore::open(data.path(), "character")?;
    let controller = PaginationController::new(store, fetcher, "character 3")?;

    // Then: persisted pages are reused without fetching again
    assert_eq!(controller.load_initial().await?, None);
    assert_eq!(controller.load_status().await?, LoadStatus::Idle);
    let pages = controller.current_pages().await?;
    let ids: Vec<u64> = pages.iter().flat_map(|p| p.items.iter().map(|i| i.id)).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(pages[0].items[0].attributes["status"], "Alive");

    let sections = controller.sections().await?;
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].items[0].id, 3);

    let page_requests = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(page_requests, 2);
    Ok(())
}

#[tokio::test]
async fn reload_replaces_persisted_pages() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_pages(&server).await;
    let data = tempdir()?;
    let fetcher = Arc::new(HttpFetcher::new(first_page_url(&server))?);
    let controller =
        PaginationController::new(FileStore::open(data.path(), "character")?, fetcher, "")?;

    controller.request_next_page().await?;
    controller.request_next_page().await?;
    assert_eq!(controller.current_pages().await?.len(), 2);

    let outcome = controller.request_reload().await?;

    assert_eq!(outcome, RequestOutcome::Applied { key: PageKey::first(), items: 2 });
    let pages = controller.current_pages().await?;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].next_cursor.as_deref().is_some_and(|n| n.ends_with("page=2")));
    Ok(())
}

#[tokio::test]
async fn server_error_surfaces_message_and_keeps_pages() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let data = tempdir()?;
    let fetcher = Arc::new(HttpFetcher::new(first_page_url(&server))?);
    let controller =
        PaginationController::new(FileStore::open(data.path(), "character")?, fetcher, "")?;

    let outcome = controller.request_reload().await?;

    assert!(matches!(outcome, RequestOutcome::Failed(_)));
    let message = controller.last_error_message().await?.expect("error message");
    assert!(message.contains("500"), "{message}");
    assert!(controller.current_pages().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn images_are_downloaded_once_and_served_from_cache() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/avatar/1.jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8jpeg".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let cache_dir = tempdir()?;
    let fetcher = Arc::new(
        HttpFetcher::new(first_page_url(&server))?.with_temp_dir(cache_dir.path().join(".tmp")),
    );
    let cache = ContentCache::new(cache_dir.path().join("images"), fetcher)?;
    let url = format!("{}/avatar/1.jpeg", server.uri());

    let mut first = ImageSlot::new(&url);
    let mut second = ImageSlot::new(&url);
    first.load(&cache).await;
    second.load(&cache).await;

    assert_eq!(*first.state(), ImageState::Loaded(b"\xff\xd8jpeg".to_vec()));
    assert_eq!(first.state(), second.state());
    assert!(cache.contains(&url).await?);
    let stats = cache.stats().await?;
    assert_eq!((stats.misses, stats.hits, stats.downloads), (1, 1, 1));
    Ok(())
}

#[tokio::test]
async fn missing_image_fails_after_bounded_attempts() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/avatar/404.jpeg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;
    let cache_dir = tempdir()?;
    let fetcher = Arc::new(HttpFetcher::new(first_page_url(&server))?);
    let cache = ContentCache::new(cache_dir.path(), fetcher)?;
    let url = format!("{}/avatar/404.jpeg", server.uri());
    let policy = RetryPolicy::new(3, Duration::from_millis(10));
    let mut slot = ImageSlot::with_policy(&url, policy, Arc::new(TokioClock));

    slot.load(&cache).await;
    slot.load(&cache).await;

    assert!(matches!(slot.state(), ImageState::Failed(m) if m.contains("3 attempts")));
    assert!(!cache.contains(&url).await?);
    Ok(())
}

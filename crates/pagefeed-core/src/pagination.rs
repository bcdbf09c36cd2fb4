//! Sequential page loading for one list resource.
//!
//! The [`PaginationController`] keeps its mutable state (the page store, the
//! in-flight request, the last loaded key, status and last error) on a
//! [`SerializedExecutor`]. A request runs in three steps:
//!
//! 1. **Begin** (serialized): pick the key, decide whether to skip, and mark
//!    the request as the one in flight.
//! 2. **Fetch** (caller's task): ask the [`PageFetcher`] for the page.
//! 3. **Complete** (serialized): apply the result only if the request is still
//!    the one in flight; otherwise drop it as stale.
//!
//! A forced request always targets the first page and supersedes whatever is
//! in flight. A non-forced request is skipped while any request is in flight,
//! so there is never more than one logical fetch per controller.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagefeed_core::{Config, HttpFetcher, MemoryStore, PaginationController};
//!
//! # async fn demo() -> pagefeed_core::Result<()> {
//! let config = Config::default();
//! let fetcher = Arc::new(HttpFetcher::from_config(&config.api)?);
//! let controller = PaginationController::new(MemoryStore::new(), fetcher, "")?;
//!
//! controller.load_initial().await?;
//! controller.request_next_page().await?;
//! for section in controller.sections().await? {
//!     println!("{}: {} items", section.initial, section.items.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::executor::SerializedExecutor;
use crate::fetcher::PageFetcher;
use crate::sections::{self, Section};
use crate::store::PageStore;
use crate::{Error, LoadStatus, PageKey, PageResult, Result};

/// Why a request did not start a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The key was the last one loaded.
    Duplicate,
    /// Another request is already in flight.
    InFlight,
    /// The last persisted page has no successor.
    Exhausted,
}

/// What a page request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The page was fetched and persisted.
    Applied {
        /// Key that was loaded.
        key: PageKey,
        /// Number of items on the page.
        items: usize,
    },
    /// No fetch was started.
    Skipped(SkipReason),
    /// The fetch finished after being superseded; its result was dropped.
    Stale,
    /// The fetch or the write failed; the message is also kept as the last
    /// error.
    Failed(String),
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied { key, items } => write!(f, "loaded {items} items from {key}"),
            Self::Skipped(SkipReason::Duplicate) => f.write_str("skipped: page already loaded"),
            Self::Skipped(SkipReason::InFlight) => f.write_str("skipped: a load is in progress"),
            Self::Skipped(SkipReason::Exhausted) => f.write_str("no more pages"),
            Self::Stale => f.write_str("superseded by a newer load"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    key: PageKey,
    ticket: u64,
    forced: bool,
}

enum Begin {
    Start { key: PageKey, ticket: u64 },
    Skip(SkipReason),
}

struct ControllerState {
    store: Box<dyn PageStore>,
    loading: Option<InFlight>,
    last_loaded: Option<PageKey>,
    status: LoadStatus,
    last_error: Option<String>,
    next_ticket: u64,
}

impl ControllerState {
    fn begin(&mut self, force: bool) -> Result<Begin> {
        let key = if force {
            if let Some(previous) = &self.loading {
                debug!("Forced reload supersedes in-flight load of {}", previous.key);
            }
            PageKey::first()
        } else {
            if self.loading.is_some() {
                return Ok(Begin::Skip(SkipReason::InFlight));
            }
            let Some(key) = self.next_key()? else {
                return Ok(Begin::Skip(SkipReason::Exhausted));
            };
            if self.last_loaded.as_ref() == Some(&key) {
                return Ok(Begin::Skip(SkipReason::Duplicate));
            }
            key
        };

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.loading = Some(InFlight {
            key: key.clone(),
            ticket,
            forced: force,
        });
        self.status = LoadStatus::Loading;
        Ok(Begin::Start { key, ticket })
    }

    /// Successor of the most recently persisted page.
    fn next_key(&self) -> Result<Option<PageKey>> {
        let Some(last) = self.store.last_page()? else {
            return Ok(Some(PageKey::first()));
        };
        match last.next_key() {
            Err(Error::InvalidCursor(reason)) => {
                debug!("Treating unusable next cursor as end of list: {}", reason);
                Ok(None)
            },
            other => other,
        }
    }

    fn complete(&mut self, ticket: u64, result: Result<PageResult>) -> RequestOutcome {
        let current = self.loading.as_ref().map(|inflight| inflight.ticket);
        if current != Some(ticket) {
            debug!("Dropping stale page result (ticket {})", ticket);
            return RequestOutcome::Stale;
        }
        let Some(InFlight { key, forced, .. }) = self.loading.take() else {
            return RequestOutcome::Stale;
        };
        self.status = LoadStatus::Idle;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load {} ({}): {}", key, e.category(), e);
                return self.record_failure(&e);
            },
        };
        let items = page.items.len();
        let written = if forced {
            self.store.replace_all(page)
        } else {
            self.store.append(page)
        };
        if let Err(e) = written {
            warn!("Failed to store {} ({}): {}", key, e.category(), e);
            return self.record_failure(&e);
        }

        info!("Loaded {} items from {}", items, key);
        self.last_loaded = Some(key.clone());
        self.last_error = None;
        RequestOutcome::Applied { key, items }
    }

    /// Release the in-flight slot of a request whose caller went away.
    fn abandon(&mut self, ticket: u64) {
        if self.loading.as_ref().is_some_and(|inflight| inflight.ticket == ticket) {
            debug!("Page request abandoned (ticket {})", ticket);
            self.loading = None;
            self.status = LoadStatus::Idle;
        }
    }

    fn record_failure(&mut self, err: &Error) -> RequestOutcome {
        let message = err.to_string();
        self.last_error = Some(message.clone());
        RequestOutcome::Failed(message)
    }
}

/// Releases the in-flight slot if a request is dropped before completing.
struct InFlightGuard<'a> {
    state: &'a SerializedExecutor<ControllerState>,
    ticket: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.state.enqueue(move |state| state.abandon(ticket));
    }
}

/// Drives page fetches for one list resource and persists the results.
pub struct PaginationController {
    state: SerializedExecutor<ControllerState>,
    fetcher: Arc<dyn PageFetcher>,
    search_text: String,
}

impl PaginationController {
    /// Create a controller owning `store`.
    ///
    /// `search_text` filters [`sections`](Self::sections); pass `""` for no
    /// filter.
    pub fn new(
        store: impl PageStore,
        fetcher: Arc<dyn PageFetcher>,
        search_text: impl Into<String>,
    ) -> Result<Self> {
        let state = ControllerState {
            store: Box::new(store),
            loading: None,
            last_loaded: None,
            status: LoadStatus::Unknown,
            last_error: None,
            next_ticket: 0,
        };
        Ok(Self {
            state: SerializedExecutor::spawn("pagefeed-pagination", state)?,
            fetcher,
            search_text: search_text.into(),
        })
    }

    /// Search text applied when grouping items.
    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// Request a page.
    ///
    /// With `force`, the first page is reloaded and replaces every persisted
    /// page. Otherwise the successor of the last persisted page is appended.
    ///
    /// Load failures are reported through the outcome, not as `Err`; `Err`
    /// means the controller's worker is gone.
    ///
    /// Dropping the returned future releases the in-flight slot, so a
    /// cancelled request never blocks later ones.
    pub async fn request_page(&self, force: bool) -> Result<RequestOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.state.enqueue(move |state| {
            let begin = state.begin(force);
            // Nobody is waiting for this request any more.
            if let Err(Ok(Begin::Start { ticket, .. })) = reply_tx.send(begin) {
                state.abandon(ticket);
            }
        });
        let begin = reply_rx.await.map_err(|_| Error::ExecutorClosed)?;

        let (key, ticket) = match begin {
            Ok(Begin::Start { key, ticket }) => (key, ticket),
            Ok(Begin::Skip(reason)) => {
                debug!("Page request skipped: {:?}", reason);
                return Ok(RequestOutcome::Skipped(reason));
            },
            Err(e) => {
                return self
                    .state
                    .call(move |state| {
                        warn!("Failed to choose the next page ({}): {}", e.category(), e);
                        state.record_failure(&e)
                    })
                    .await;
            },
        };

        let guard = InFlightGuard {
            state: &self.state,
            ticket,
        };
        debug!("Fetching {}", key);
        let result = self.fetcher.fetch_page(&key).await;
        let outcome = self
            .state
            .call(move |state| state.complete(ticket, result))
            .await;
        // Completion already released the slot; the guard would be a no-op.
        std::mem::forget(guard);
        outcome
    }

    /// Append the next page, if there is one.
    pub async fn request_next_page(&self) -> Result<RequestOutcome> {
        self.request_page(false).await
    }

    /// Reload from the first page, discarding persisted pages on success.
    pub async fn request_reload(&self) -> Result<RequestOutcome> {
        self.request_page(true).await
    }

    /// Load the first page if nothing is persisted yet.
    ///
    /// Returns `None` when persisted pages were reused as-is.
    pub async fn load_initial(&self) -> Result<Option<RequestOutcome>> {
        let reuse = self
            .state
            .call(|state| {
                let has_pages = state.store.has_any_pages()?;
                if has_pages && state.loading.is_none() {
                    state.status = LoadStatus::Idle;
                }
                Ok::<_, Error>(has_pages)
            })
            .await??;

        if reuse {
            debug!("Reusing persisted pages");
            return Ok(None);
        }
        self.request_reload().await.map(Some)
    }

    /// Notify that the item `id` is about to become visible.
    ///
    /// Requests the next page when `id` is the last loaded item; returns
    /// `None` otherwise.
    pub async fn on_item_visible(&self, id: u64) -> Result<Option<RequestOutcome>> {
        let is_last = self
            .state
            .call(move |state| {
                let last = state.store.last_page()?;
                Ok::<_, Error>(sections::is_last_item(last.as_slice(), id))
            })
            .await??;

        if is_last {
            self.request_next_page().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Persisted pages in load order.
    pub async fn current_pages(&self) -> Result<Vec<PageResult>> {
        self.state
            .call(|state| state.store.list_persisted_pages())
            .await?
    }

    /// Current loading status.
    pub async fn load_status(&self) -> Result<LoadStatus> {
        self.state.call(|state| state.status).await
    }

    /// Message of the last failed load, cleared by the next successful one.
    pub async fn last_error_message(&self) -> Result<Option<String>> {
        self.state.call(|state| state.last_error.clone()).await
    }

    /// Key of the most recently applied page.
    pub async fn last_loaded_key(&self) -> Result<Option<PageKey>> {
        self.state.call(|state| state.last_loaded.clone()).await
    }

    /// Persisted items grouped by name initial, filtered by the search text.
    pub async fn sections(&self) -> Result<Vec<Section>> {
        let pages = self.current_pages().await?;
        Ok(sections::group_by_initial(&pages, &self.search_text))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Item;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::sync::{Semaphore, mpsc};

    const P2: &str = "https://api.test/character?page=2";
    const P3: &str = "https://api.test/character?page=3";

    fn page(ids: &[u64], next: Option<&str>) -> PageResult {
        let items = ids.iter().map(|id| Item::new(*id, format!("Item {id}"))).collect();
        let page = PageResult::new(items, 6);
        match next {
            Some(next) => page.with_next(next),
            None => page,
        }
    }

    type Scripted = std::result::Result<PageResult, String>;

    /// Serves scripted pages per key. Keys with a gate block until released.
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Mutex<HashMap<PageKey, VecDeque<Scripted>>>,
        gates: Mutex<HashMap<PageKey, Arc<Semaphore>>>,
        calls: Mutex<Vec<PageKey>>,
        entered: Mutex<Option<mpsc::UnboundedSender<PageKey>>>,
    }

    impl ScriptedFetcher {
        fn respond(&self, key: &PageKey, response: Scripted) {
            self.responses
                .lock()
                .unwrap()
                .entry(key.clone())
                .or_default()
                .push_back(response);
        }

        fn gate(&self, key: &PageKey) -> mpsc::UnboundedReceiver<PageKey> {
            self.gates
                .lock()
                .unwrap()
                .insert(key.clone(), Arc::new(Semaphore::new(0)));
            let (tx, rx) = mpsc::unbounded_channel();
            *self.entered.lock().unwrap() = Some(tx);
            rx
        }

        fn release(&self, key: &PageKey) {
            if let Some(gate) = self.gates.lock().unwrap().get(key) {
                gate.add_permits(1);
            }
        }

        fn calls(&self) -> Vec<PageKey> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, key: &PageKey) -> Result<PageResult> {
            self.calls.lock().unwrap().push(key.clone());
            let gate = self.gates.lock().unwrap().get(key).cloned();
            if let Some(gate) = gate {
                if let Some(tx) = self.entered.lock().unwrap().as_ref() {
                    let _ = tx.send(key.clone());
                }
                gate.acquire().await.unwrap().forget();
            }
            let next = self
                .responses
                .lock()
                .unwrap()
                .get_mut(key)
                .and_then(VecDeque::pop_front);
            match next {
                Some(Ok(page)) => Ok(page),
                Some(Err(message)) => Err(Error::Transport(message)),
                None => Err(Error::Transport(format!("no response scripted for {key}"))),
            }
        }
    }

    /// Memory store that logs which write operation was used.
    #[derive(Clone, Default)]
    struct RecordingStore {
        inner: MemoryStore,
        ops: Arc<Mutex<Vec<&'static str>>>,
    }

    impl PageStore for RecordingStore {
        fn list_persisted_pages(&self) -> Result<Vec<PageResult>> {
            self.inner.list_persisted_pages()
        }

        fn replace_all(&mut self, page: PageResult) -> Result<()> {
            self.ops.lock().unwrap().push("replace_all");
            self.inner.replace_all(page)
        }

        fn append(&mut self, page: PageResult) -> Result<()> {
            self.ops.lock().unwrap().push("append");
            self.inner.append(page)
        }

        fn has_any_pages(&self) -> Result<bool> {
            self.inner.has_any_pages()
        }
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore(MemoryStore);

    impl PageStore for ReadOnlyStore {
        fn list_persisted_pages(&self) -> Result<Vec<PageResult>> {
            self.0.list_persisted_pages()
        }

        fn replace_all(&mut self, _page: PageResult) -> Result<()> {
            Err(Error::Storage("read-only".into()))
        }

        fn append(&mut self, _page: PageResult) -> Result<()> {
            Err(Error::Storage("read-only".into()))
        }

        fn has_any_pages(&self) -> Result<bool> {
            self.0.has_any_pages()
        }
    }

    /// Store whose reads always fail.
    struct UnreadableStore;

    impl PageStore for UnreadableStore {
        fn list_persisted_pages(&self) -> Result<Vec<PageResult>> {
            Err(Error::Storage("disk unavailable".into()))
        }

        fn replace_all(&mut self, _page: PageResult) -> Result<()> {
            Ok(())
        }

        fn append(&mut self, _page: PageResult) -> Result<()> {
            Ok(())
        }

        fn has_any_pages(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn p2() -> PageKey {
        PageKey::from_cursor(P2).unwrap()
    }

    fn setup(store: impl PageStore) -> (Arc<PaginationController>, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let controller = PaginationController::new(store, fetcher.clone(), "").unwrap();
        (Arc::new(controller), fetcher)
    }

    #[tokio::test]
    async fn test_sequential_pages_are_appended_in_order() {
        // Given: a remote with three linked pages
        let (controller, fetcher) = setup(MemoryStore::new());
        let p1 = page(&[1, 2], Some(P2));
        let p2_page = page(&[3, 4], Some(P3));
        let p3_page = page(&[5, 6], None);
        fetcher.respond(&PageKey::first(), Ok(p1.clone()));
        fetcher.respond(&p2(), Ok(p2_page.clone()));
        fetcher.respond(&PageKey::from_cursor(P3).unwrap(), Ok(p3_page.clone()));
        assert_eq!(controller.load_status().await.unwrap(), LoadStatus::Unknown);

        // When: requesting until the remote is exhausted
        let mut outcomes = Vec::new();
        for _ in 0..4 {
            outcomes.push(controller.request_next_page().await.unwrap());
        }

        // Then: every page persisted once, in fetch order
        assert!(matches!(outcomes[0], RequestOutcome::Applied { items: 2, .. }));
        assert!(matches!(outcomes[2], RequestOutcome::Applied { items: 2, .. }));
        assert_eq!(outcomes[3], RequestOutcome::Skipped(SkipReason::Exhausted));
        assert_eq!(controller.current_pages().await.unwrap(), vec![p1, p2_page, p3_page]);
        assert_eq!(fetcher.calls().len(), 3);
        assert_eq!(controller.load_status().await.unwrap(), LoadStatus::Idle);
    }

    #[tokio::test]
    async fn test_first_then_cursor_key_tracks_last_loaded() {
        let (controller, fetcher) = setup(MemoryStore::new());
        fetcher.respond(&PageKey::first(), Ok(page(&[1, 2], Some(P2))));
        fetcher.respond(&p2(), Ok(page(&[3], None)));

        controller.request_next_page().await.unwrap();
        assert_eq!(controller.current_pages().await.unwrap().len(), 1);
        assert_eq!(controller.last_loaded_key().await.unwrap(), Some(PageKey::first()));

        let outcome = controller.request_next_page().await.unwrap();
        assert_eq!(outcome, RequestOutcome::Applied { key: p2(), items: 1 });
        assert_eq!(controller.current_pages().await.unwrap().len(), 2);
        assert_eq!(controller.last_loaded_key().await.unwrap(), Some(p2()));
    }

    #[tokio::test]
    async fn test_rapid_requests_fetch_once() {
        // Given: the first page fetch is held open
        let (controller, fetcher) = setup(MemoryStore::new());
        fetcher.respond(&PageKey::first(), Ok(page(&[1], Some(P2))));
        let mut entered = fetcher.gate(&PageKey::first());

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.request_next_page().await })
        };
        entered.recv().await.unwrap();
        assert_eq!(controller.load_status().await.unwrap(), LoadStatus::Loading);

        // When: a second request arrives while the first is in flight
        let second = controller.request_next_page().await.unwrap();
        fetcher.release(&PageKey::first());
        let first = first.await.unwrap().unwrap();

        // Then: one fetch, one applied page
        assert_eq!(second, RequestOutcome::Skipped(SkipReason::InFlight));
        assert!(matches!(first, RequestOutcome::Applied { .. }));
        assert_eq!(fetcher.calls(), vec![PageKey::first()]);
        assert_eq!(controller.current_pages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forced_reload_discards_in_flight_page() {
        // Given: page 1 persisted and the page 2 fetch held open
        let old = page(&[1, 2], Some(P2));
        let (controller, fetcher) = setup(MemoryStore::with_pages(vec![old]));
        fetcher.respond(&p2(), Ok(page(&[3, 4], None)));
        let fresh = page(&[10, 11], Some(P2));
        fetcher.respond(&PageKey::first(), Ok(fresh.clone()));
        let mut entered = fetcher.gate(&p2());

        let next = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.request_next_page().await })
        };
        entered.recv().await.unwrap();

        // When: a reload completes before page 2 arrives
        let reload = controller.request_reload().await.unwrap();
        fetcher.release(&p2());
        let next = next.await.unwrap().unwrap();

        // Then: only the fresh first page remains
        assert!(matches!(reload, RequestOutcome::Applied { .. }));
        assert_eq!(next, RequestOutcome::Stale);
        assert_eq!(controller.current_pages().await.unwrap(), vec![fresh]);
        assert_eq!(controller.last_loaded_key().await.unwrap(), Some(PageKey::first()));
        assert_eq!(controller.load_status().await.unwrap(), LoadStatus::Idle);
    }

    #[tokio::test]
    async fn test_next_page_is_skipped_while_reload_in_flight() {
        let (controller, fetcher) = setup(MemoryStore::with_pages(vec![page(&[1], Some(P2))]));
        fetcher.respond(&PageKey::first(), Ok(page(&[9], Some(P2))));
        let mut entered = fetcher.gate(&PageKey::first());

        let reload = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.request_reload().await })
        };
        entered.recv().await.unwrap();

        let next = controller.request_next_page().await.unwrap();
        fetcher.release(&PageKey::first());

        assert_eq!(next, RequestOutcome::Skipped(SkipReason::InFlight));
        assert!(matches!(reload.await.unwrap().unwrap(), RequestOutcome::Applied { .. }));
        assert!(!fetcher.calls().contains(&p2()));
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_in_flight_slot() {
        // Given: a first page fetch held open by a task
        let (controller, fetcher) = setup(MemoryStore::new());
        fetcher.respond(&PageKey::first(), Ok(page(&[1], Some(P2))));
        let mut entered = fetcher.gate(&PageKey::first());
        let pending = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.request_next_page().await })
        };
        entered.recv().await.unwrap();

        // When: the task is aborted mid-fetch
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        fetcher.release(&PageKey::first());

        // Then: the slot is free and the next request loads the page
        assert_eq!(controller.load_status().await.unwrap(), LoadStatus::Idle);
        let outcome = controller.request_next_page().await.unwrap();
        assert_eq!(outcome, RequestOutcome::Applied { key: PageKey::first(), items: 1 });
        assert_eq!(fetcher.calls(), vec![PageKey::first(), PageKey::first()]);
    }

    #[tokio::test]
    async fn test_unreadable_store_fails_without_fetching() {
        let (controller, fetcher) = setup(UnreadableStore);

        let outcome = controller.request_next_page().await.unwrap();

        assert!(matches!(outcome, RequestOutcome::Failed(ref m) if m.contains("disk unavailable")));
        let message = controller.last_error_message().await.unwrap().unwrap();
        assert!(message.contains("disk unavailable"));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_replace_all_only_when_forced() {
        let store = RecordingStore::default();
        let ops = Arc::clone(&store.ops);
        let (controller, fetcher) = setup(store);
        fetcher.respond(&PageKey::first(), Ok(page(&[1], Some(P2))));
        fetcher.respond(&p2(), Ok(page(&[2], Some(P3))));
        fetcher.respond(&PageKey::first(), Ok(page(&[1], Some(P2))));

        controller.request_next_page().await.unwrap();
        controller.request_next_page().await.unwrap();
        controller.request_reload().await.unwrap();

        assert_eq!(*ops.lock().unwrap(), vec!["append", "append", "replace_all"]);
        assert_eq!(controller.current_pages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_pages_and_reports_message() {
        // Given: one persisted page and a failing page 2
        let persisted = page(&[1], Some(P2));
        let (controller, fetcher) = setup(MemoryStore::with_pages(vec![persisted.clone()]));
        fetcher.respond(&p2(), Err("HTTP 503".into()));
        fetcher.respond(&p2(), Ok(page(&[2], None)));

        // When
        let outcome = controller.request_next_page().await.unwrap();

        // Then: one human-readable message, nothing written
        match outcome {
            RequestOutcome::Failed(message) => assert!(message.contains("HTTP 503")),
            other => panic!("Expected Failed, got {other:?}"),
        }
        let message = controller.last_error_message().await.unwrap().unwrap();
        assert!(message.contains("HTTP 503"));
        assert_eq!(controller.current_pages().await.unwrap(), vec![persisted]);
        assert_eq!(controller.last_loaded_key().await.unwrap(), None);
        assert_eq!(controller.load_status().await.unwrap(), LoadStatus::Idle);

        // And: the next success clears the error
        let retry = controller.request_next_page().await.unwrap();
        assert!(matches!(retry, RequestOutcome::Applied { .. }));
        assert_eq!(controller.last_error_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_load_failure() {
        let (controller, fetcher) = setup(ReadOnlyStore(MemoryStore::new()));
        fetcher.respond(&PageKey::first(), Ok(page(&[1], None)));

        let outcome = controller.request_next_page().await.unwrap();

        assert!(matches!(outcome, RequestOutcome::Failed(ref m) if m.contains("read-only")));
        assert_eq!(controller.last_loaded_key().await.unwrap(), None);
        assert!(controller.current_pages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cursor_means_no_more_pages() {
        let (controller, fetcher) =
            setup(MemoryStore::with_pages(vec![page(&[1], Some("not a url"))]));

        let outcome = controller.request_next_page().await.unwrap();

        assert_eq!(outcome, RequestOutcome::Skipped(SkipReason::Exhausted));
        assert!(fetcher.calls().is_empty());
        assert_eq!(controller.last_error_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_loaded_key_is_not_fetched_twice() {
        // Given: the first page loaded, then the store emptied behind our back
        let store = MemoryStore::new();
        let (controller, fetcher) = setup(store);
        fetcher.respond(&PageKey::first(), Ok(page(&[1], None)));
        controller.request_next_page().await.unwrap();
        controller
            .state
            .call(|state| state.store = Box::new(MemoryStore::new()))
            .await
            .unwrap();

        // When: the computed key is again the first page
        let outcome = controller.request_next_page().await.unwrap();

        // Then
        assert_eq!(outcome, RequestOutcome::Skipped(SkipReason::Duplicate));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_load_initial_fetches_only_when_empty() {
        let (empty, fetcher) = setup(MemoryStore::new());
        fetcher.respond(&PageKey::first(), Ok(page(&[1], Some(P2))));
        let outcome = empty.load_initial().await.unwrap();
        assert!(matches!(outcome, Some(RequestOutcome::Applied { .. })));

        let (warm, fetcher) = setup(MemoryStore::with_pages(vec![page(&[1], Some(P2))]));
        assert_eq!(warm.load_initial().await.unwrap(), None);
        assert!(fetcher.calls().is_empty());
        assert_eq!(warm.load_status().await.unwrap(), LoadStatus::Idle);
    }

    #[tokio::test]
    async fn test_visible_last_item_triggers_next_page() {
        let (controller, fetcher) = setup(MemoryStore::with_pages(vec![page(&[1, 2], Some(P2))]));
        fetcher.respond(&p2(), Ok(page(&[3], None)));

        assert_eq!(controller.on_item_visible(1).await.unwrap(), None);
        assert!(fetcher.calls().is_empty());

        let outcome = controller.on_item_visible(2).await.unwrap();
        assert!(matches!(outcome, Some(RequestOutcome::Applied { .. })));
        assert_eq!(fetcher.calls(), vec![p2()]);
    }

    #[tokio::test]
    async fn test_sections_use_search_text() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let pages = vec![PageResult::new(
            vec![Item::new(1, "Rick Sanchez"), Item::new(2, "Morty Smith")],
            2,
        )];
        let controller =
            PaginationController::new(MemoryStore::with_pages(pages), fetcher, "morty").unwrap();

        let sections = controller.sections().await.unwrap();

        assert_eq!(controller.search_text(), "morty");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].initial, "M");
    }
}

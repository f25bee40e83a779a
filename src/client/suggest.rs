//! Debounced search-as-you-type.
//!
//! Keystrokes are fed with [`SuggestionBox::input`]. A lookup fires once the
//! text has been stable for the debounce interval; a newer keystroke before
//! that replaces the pending lookup. Lookups already in flight are left to
//! finish, and each carries a sequence number so that a late answer to an
//! older query never replaces the suggestions of a newer one.

use crate::client::ListingsClient;
use crate::domain::model::ListingSummary;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(300);

#[async_trait]
pub trait SuggestionSource: Send + Sync + 'static {
    async fn suggest(&self, query: &str) -> Result<Vec<ListingSummary>>;
}

#[async_trait]
impl SuggestionSource for ListingsClient {
    async fn suggest(&self, query: &str) -> Result<Vec<ListingSummary>> {
        self.search(query).await
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionState {
    /// Query the shown suggestions belong to.
    pub query: String,
    pub suggestions: Vec<ListingSummary>,
    /// A newer lookup than the one shown is still running.
    pub loading: bool,
    /// Sequence number of the lookup whose answer is shown.
    pub revision: u64,
}

pub struct SuggestionBox {
    keystrokes: mpsc::UnboundedSender<String>,
    state: watch::Receiver<SuggestionState>,
    worker: JoinHandle<()>,
}

impl SuggestionBox {
    pub fn spawn<S: SuggestionSource>(source: Arc<S>) -> Self {
        Self::with_interval(source, DEBOUNCE_INTERVAL)
    }

    pub fn with_interval<S: SuggestionSource>(source: Arc<S>, interval: Duration) -> Self {
        let (keystrokes, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SuggestionState::default());
        let worker = tokio::spawn(debounce(source, interval, rx, Arc::new(state_tx)));

        Self {
            keystrokes,
            state,
            worker,
        }
    }

    /// Full current text of the search input.
    pub fn input(&self, text: impl Into<String>) {
        if self.keystrokes.send(text.into()).is_err() {
            tracing::debug!("Suggestion worker stopped, dropping keystroke");
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.clone()
    }

    /// Waits until the suggestions shown belong to `query` and no newer lookup
    /// is running. Covers the debounce interval of a keystroke not yet fired.
    pub async fn wait_for_query(&self, query: &str) -> SuggestionState {
        let mut updates = self.state.clone();
        let settled = updates
            .wait_for(|state| state.query == query && !state.loading)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }
}

impl Drop for SuggestionBox {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn debounce<S: SuggestionSource>(
    source: Arc<S>,
    interval: Duration,
    mut keystrokes: mpsc::UnboundedReceiver<String>,
    state: Arc<watch::Sender<SuggestionState>>,
) {
    let issued = Arc::new(AtomicU64::new(0));
    let mut pending: Option<(String, Instant)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);

        tokio::select! {
            text = keystrokes.recv() => match text {
                Some(text) => pending = Some((text, Instant::now() + interval)),
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some((query, _)) = pending.take() {
                    fire(&source, &state, &issued, query);
                }
            }
        }
    }
}

fn fire<S: SuggestionSource>(
    source: &Arc<S>,
    state: &Arc<watch::Sender<SuggestionState>>,
    issued: &Arc<AtomicU64>,
    query: String,
) {
    let seq = issued.fetch_add(1, Ordering::SeqCst) + 1;

    if query.trim().is_empty() {
        apply(state, issued, seq, query, Vec::new());
        return;
    }

    state.send_modify(|current| current.loading = true);

    let source = Arc::clone(source);
    let state = Arc::clone(state);
    let issued = Arc::clone(issued);
    tokio::spawn(async move {
        let suggestions = match source.suggest(&query).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!("Error fetching suggestions for {:?}: {}", query, e);
                Vec::new()
            }
        };
        apply(&state, &issued, seq, query, suggestions);
    });
}

fn apply(
    state: &watch::Sender<SuggestionState>,
    issued: &AtomicU64,
    seq: u64,
    query: String,
    suggestions: Vec<ListingSummary>,
) {
    state.send_if_modified(|current| {
        if seq <= current.revision {
            tracing::debug!("Discarding stale suggestions for {:?}", query);
            return false;
        }

        // 在鎖內讀取, 新的查詢才不會在這之後把 loading 蓋掉
        let latest = issued.load(Ordering::SeqCst);
        current.query = query;
        current.suggestions = suggestions;
        current.revision = seq;
        current.loading = seq < latest;
        true
    });
}

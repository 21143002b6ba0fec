//! Feed synchronization: the three-way fetch and its published view.
//!
//! `run` fans out the news, source-health and retry-metrics requests as
//! one logical operation and replaces the whole snapshot atomically.
//! Overlapping runs (quick filter edits, push triggers mid-fetch) are
//! resolved by stamping every run with a sequence number at issue time;
//! a settlement older than the newest one already applied is discarded,
//! so the view always reflects the most recently requested filter and is
//! never a torn merge of two fetches.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, instrument, warn};

use crate::api::NewsBackend;
use crate::filter::FilterState;
use crate::model::{FilterOptions, NewsItem, NewsList, RetryMetrics, SourceHealth};

/// Highlighted focus section shows at most this many items.
pub const FOCUS_LIMIT: usize = 4;

/// One atomic replacement unit for the view: the fetched triple plus the
/// focus projection derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub news: Vec<NewsItem>,
    pub total: u64,
    pub focus: Vec<NewsItem>,
    pub health: Vec<SourceHealth>,
    pub retry: RetryMetrics,
    pub refreshed_at: DateTime<Utc>,
}

/// What the viewer sees. A failed refresh records its message here but
/// never clears a previously published snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub snapshot: Option<FeedSnapshot>,
    pub error: Option<String>,
    pub loading: bool,
}

struct Published {
    view: ViewState,
    /// Highest sequence number that has settled (success or failure).
    last_settled: u64,
}

pub struct FeedSynchronizer {
    backend: Arc<dyn NewsBackend>,
    page_size: u32,
    issued: AtomicU64,
    published: Mutex<Published>,
    tx: watch::Sender<ViewState>,
}

impl FeedSynchronizer {
    pub fn new(
        backend: Arc<dyn NewsBackend>,
        page_size: u32,
    ) -> (Arc<FeedSynchronizer>, watch::Receiver<ViewState>) {
        let (tx, rx) = watch::channel(ViewState::default());
        let sync = Arc::new(FeedSynchronizer {
            backend,
            page_size,
            issued: AtomicU64::new(0),
            published: Mutex::new(Published {
                view: ViewState::default(),
                last_settled: 0,
            }),
            tx,
        });
        (sync, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    /// Execute one three-way fetch for the given filter snapshot.
    ///
    /// May be invoked again before a prior invocation settles; the
    /// sequence gate decides which settlement is applied.
    #[instrument(skip_all)]
    pub async fn run(&self, filter: FilterState) {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut published = self.published.lock().await;
            published.view.loading = true;
            let _ = self.tx.send(published.view.clone());
        }

        let result = tokio::try_join!(
            self.backend.list_news(&filter, self.page_size, 0),
            self.backend.source_health(),
            self.backend.retry_metrics(),
        );

        let mut published = self.published.lock().await;
        if seq <= published.last_settled {
            debug!(seq, "discarding settlement superseded by a newer run");
            return;
        }
        published.last_settled = seq;

        match result {
            Ok((news, health, retry)) => {
                let NewsList { total, items } = news;
                let focus = focus_subset(&items);
                published.view.snapshot = Some(FeedSnapshot {
                    news: items,
                    total,
                    focus,
                    health,
                    retry,
                    refreshed_at: Utc::now(),
                });
                published.view.error = None;
            }
            Err(err) => {
                warn!(%err, seq, "feed refresh failed");
                published.view.error = Some(err.to_string());
            }
        }
        // Still loading only if a newer run is in flight.
        published.view.loading = self.issued.load(Ordering::SeqCst) > seq;
        let _ = self.tx.send(published.view.clone());
    }
}

/// Focus projection: already-fetched items flagged as relevant, in source
/// order, capped for the highlighted section. A pure projection, not a
/// separate fetch.
pub fn focus_subset(items: &[NewsItem]) -> Vec<NewsItem> {
    items
        .iter()
        .filter(|item| item.china_related)
        .take(FOCUS_LIMIT)
        .cloned()
        .collect()
}

/// One-shot vocabulary load. Failure degrades the selectors to empty
/// rather than reaching the main error surface.
pub async fn load_filter_options(backend: &dyn NewsBackend) -> FilterOptions {
    match backend.filter_options().await {
        Ok(options) => options,
        Err(err) => {
            warn!(%err, "filter vocabulary unavailable, selectors degrade to empty");
            FilterOptions::default()
        }
    }
}

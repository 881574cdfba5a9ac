//! Subscription Registry - Keyed Chart Sessions
//!
//! Owns the set of active `(symbol, timeframe)` subscriptions. Each key
//! maps to exactly one provider chart session and one callback:
//! - `subscribe` on an existing key is a no-op (the first callback stays)
//! - `unsubscribe` on an unknown key is a no-op
//! - provider close failures are logged; the key is always removed
//!
//! Every mutation holds the registry lock for its full duration, including
//! the awaited connect and session open (single writer). Readers go through
//! a separate series index that is only locked briefly, so a hanging
//! handshake never delays snapshots.
//!
//! When the provider ends a session (socket drop, symbol error) the
//! forwarding task removes its own entry and asks the connection manager
//! to re-check the transport, so the next `subscribe` opens a fresh session.
//!
//! Delivery and unsubscribe race through a per-subscription gate: the
//! callback only runs while the gate holds it, and unsubscribe empties the
//! gate under the same lock. Once `unsubscribe` returns, the old callback
//! can no longer be invoked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::connection_manager::ConnectionManager;
use crate::adapters::metrics::FeedMetrics;
use crate::domain::normalizer::normalize_bars;
use crate::domain::series::{PricePoint, PriceSummary, is_strictly_ascending, merge_into};
use crate::domain::symbol::SymbolMapper;
use crate::domain::timeframe::Timeframe;
use crate::error::{FeedError, FeedResult};
use crate::ports::price_feed::{FeedUpdate, SubscriptionKey, UpdateCallback};
use crate::ports::provider::SessionId;

/// Default cap on the rolling series kept per subscription.
pub const DEFAULT_MAX_SERIES_LEN: usize = 300;

type Gate = Arc<Mutex<Option<UpdateCallback>>>;
type Entries = Arc<Mutex<HashMap<SubscriptionKey, Subscription>>>;
/// Rolling merged series per key; the sender lives in the forwarding task.
type SeriesIndex = Arc<RwLock<HashMap<SubscriptionKey, watch::Receiver<Vec<PricePoint>>>>>;

/// Live state behind one subscription key.
struct Subscription {
    /// Provider chart session feeding this key.
    session_id: SessionId,
    /// Callback slot; `None` once unsubscribed.
    gate: Gate,
    /// Keeps sight of the forwarding task's series sender; closed once the
    /// session has ended.
    series_rx: watch::Receiver<Vec<PricePoint>>,
    /// Task piping provider pushes through normalization to the callback.
    task: JoinHandle<()>,
}

impl Subscription {
    /// Whether the provider session is still streaming.
    fn is_live(&self) -> bool {
        self.series_rx.has_changed().is_ok() && !self.task.is_finished()
    }

    /// Close the gate and stop forwarding. Does not touch the provider.
    async fn shut(self) -> SessionId {
        self.gate.lock().await.take();
        self.task.abort();
        self.session_id
    }
}

/// Registry of active subscriptions.
pub struct SubscriptionRegistry {
    connection: Arc<ConnectionManager>,
    symbols: SymbolMapper,
    entries: Entries,
    index: SeriesIndex,
    max_series_len: usize,
    metrics: Arc<FeedMetrics>,
}

impl SubscriptionRegistry {
    pub fn new(
        connection: Arc<ConnectionManager>,
        symbols: SymbolMapper,
        max_series_len: usize,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            connection,
            symbols,
            entries: Arc::new(Mutex::new(HashMap::new())),
            index: Arc::new(RwLock::new(HashMap::new())),
            max_series_len: max_series_len.max(1),
            metrics,
        }
    }

    /// Register `on_update` for `(symbol, timeframe)`.
    ///
    /// # Errors
    /// `FeedError::Subscription` when connecting or opening the provider
    /// session fails. The key stays unregistered in that case.
    #[instrument(skip(self, on_update))]
    pub async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        on_update: UpdateCallback,
    ) -> FeedResult<()> {
        let key = SubscriptionKey::new(symbol, timeframe);
        let mut entries = self.entries.lock().await;

        match entries.get(&key) {
            Some(existing) if existing.is_live() => {
                debug!(key = %key, "Already subscribed, keeping existing session");
                return Ok(());
            }
            Some(_) => {
                // Session ended but its task has not cleaned up yet.
                if let Some(dead) = entries.remove(&key) {
                    dead.shut().await;
                }
                self.index.write().await.remove(&key);
                debug!(key = %key, "Replacing ended chart session");
            }
            None => {}
        }

        let fail = |reason: String| FeedError::Subscription {
            key: key.to_string(),
            reason,
        };

        self.connection
            .connect()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let ticker = self.symbols.map_symbol(symbol);
        let token = timeframe.provider_token();
        let provider = self.connection.provider();

        let session = match provider.open_chart_session(&ticker, token).await {
            Ok(session) => {
                self.metrics.session_opens.with_label_values(&["ok"]).inc();
                session
            }
            Err(e) => {
                self.metrics.session_opens.with_label_values(&["error"]).inc();
                warn!(key = %key, ticker = %ticker, error = %e, "Chart session open failed");
                return Err(fail(format!("{e:#}")));
            }
        };

        let gate: Gate = Arc::new(Mutex::new(Some(on_update)));
        let (series_tx, series_rx) = watch::channel(Vec::new());
        let task = tokio::spawn(forward_updates(
            Forwarder {
                key: key.clone(),
                session_id: session.id.clone(),
                gate: Arc::clone(&gate),
                series_tx,
                max_series_len: self.max_series_len,
                entries: Arc::clone(&self.entries),
                index: Arc::clone(&self.index),
                connection: Arc::clone(&self.connection),
                metrics: Arc::clone(&self.metrics),
            },
            session.bars,
        ));

        info!(key = %key, ticker = %ticker, token, session = %session.id, "Subscribed");

        self.index.write().await.insert(key.clone(), series_rx.clone());
        entries.insert(
            key,
            Subscription {
                session_id: session.id,
                gate,
                series_rx,
                task,
            },
        );
        record_active(&self.metrics, entries.len());

        Ok(())
    }

    /// Remove the subscription for `(symbol, timeframe)`, if any.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, symbol: &str, timeframe: Timeframe) {
        let key = SubscriptionKey::new(symbol, timeframe);
        let mut entries = self.entries.lock().await;

        let Some(subscription) = entries.remove(&key) else {
            debug!(key = %key, "Unsubscribe for unknown key ignored");
            return;
        };
        self.index.write().await.remove(&key);
        record_active(&self.metrics, entries.len());

        let session_id = subscription.shut().await;

        if let Err(e) = self
            .connection
            .provider()
            .close_chart_session(&session_id)
            .await
        {
            warn!(key = %key, session = %session_id, error = %e, "Chart session close failed");
            self.metrics
                .teardown_errors
                .with_label_values(&["close_session"])
                .inc();
        }

        info!(key = %key, "Unsubscribed");
    }

    /// Drop every subscription without provider calls.
    ///
    /// Used when the connection itself is torn down, which ends all of
    /// its sessions.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        for (_, subscription) in entries.drain() {
            subscription.shut().await;
        }
        self.index.write().await.clear();
        record_active(&self.metrics, 0);

        if count > 0 {
            info!(count, "Subscriptions invalidated");
        }
    }

    /// Whether a subscription with a running session exists for the key.
    pub async fn contains(&self, key: &SubscriptionKey) -> bool {
        self.index
            .read()
            .await
            .get(key)
            .is_some_and(|rx| rx.has_changed().is_ok())
    }

    /// Currently registered keys.
    pub async fn active_keys(&self) -> Vec<SubscriptionKey> {
        self.index.read().await.keys().cloned().collect()
    }

    /// Clone of the merged series for a key, `None` if not subscribed or
    /// its session has ended.
    pub async fn latest_series(&self, key: &SubscriptionKey) -> Option<Vec<PricePoint>> {
        let index = self.index.read().await;
        let rx = index.get(key)?;
        rx.has_changed().is_ok().then(|| rx.borrow().clone())
    }

    /// Wait up to `timeout` for a non-empty merged series.
    ///
    /// Returns `None` when the key is not subscribed, the session ended
    /// empty, or nothing arrived in time.
    pub async fn wait_for_series(
        &self,
        key: &SubscriptionKey,
        timeout: Duration,
    ) -> Option<Vec<PricePoint>> {
        let mut series_rx = self.index.read().await.get(key)?.clone();

        match tokio::time::timeout(timeout, series_rx.wait_for(|s| !s.is_empty())).await {
            Ok(Ok(series)) => Some(series.clone()),
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(key = %key, ?timeout, "No live update before snapshot deadline");
                None
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn record_active(metrics: &FeedMetrics, count: usize) {
    metrics.subscriptions_active.set(count as i64);
}

/// Everything the forwarding task needs for one session.
struct Forwarder {
    key: SubscriptionKey,
    session_id: SessionId,
    gate: Gate,
    series_tx: watch::Sender<Vec<PricePoint>>,
    max_series_len: usize,
    entries: Entries,
    index: SeriesIndex,
    connection: Arc<ConnectionManager>,
    metrics: Arc<FeedMetrics>,
}

/// Forward provider pushes for one session until it ends.
///
/// Each batch is normalized, stripped of points with out-of-order OHLC
/// (incomplete OHLC falls back to a simple point), checked for ascending
/// timestamps, merged into the rolling series and handed to the callback
/// with a fresh summary.
async fn forward_updates(fwd: Forwarder, mut bars: mpsc::Receiver<Value>) {
    let Forwarder {
        key,
        session_id,
        gate,
        series_tx,
        max_series_len,
        entries,
        index,
        connection,
        metrics,
    } = fwd;

    while let Some(payload) = bars.recv().await {
        let raw = normalize_bars(Some(&payload));

        let before = raw.len();
        let points: Vec<PricePoint> = raw.into_iter().filter_map(PricePoint::sanitized).collect();
        if points.len() < before {
            warn!(key = %key, dropped = before - points.len(), "Dropped bars violating OHLC ordering");
            metrics.updates_dropped.with_label_values(&["invalid"]).inc();
        }

        if points.is_empty() {
            metrics.updates_dropped.with_label_values(&["empty"]).inc();
            continue;
        }

        if !is_strictly_ascending(&points) {
            warn!(key = %key, points = points.len(), "Dropped batch with unordered timestamps");
            metrics.updates_dropped.with_label_values(&["unordered"]).inc();
            continue;
        }

        let mut summary = PriceSummary::default();
        series_tx.send_modify(|series| {
            merge_into(series, &points, max_series_len);
            summary = PriceSummary::from_points(series);
        });

        let guard = gate.lock().await;
        let Some(callback) = guard.as_ref() else {
            metrics.updates_dropped.with_label_values(&["stale"]).inc();
            return;
        };

        callback(FeedUpdate {
            key: key.clone(),
            points,
            summary,
        });
        metrics
            .updates_delivered
            .with_label_values(&[key.timeframe.label()])
            .inc();
    }

    // Closing the series marks the subscription dead for readers at once.
    drop(series_tx);
    info!(key = %key, session = %session_id, "Chart session ended by provider");

    connection.check_transport().await;

    let mut entries = entries.lock().await;
    let owned = entries
        .get(&key)
        .is_some_and(|s| s.session_id == session_id);
    if !owned {
        return;
    }
    if let Some(ended) = entries.remove(&key) {
        ended.gate.lock().await.take();
    }
    index.write().await.remove(&key);
    record_active(&metrics, entries.len());
    debug!(key = %key, "Ended subscription removed");
}

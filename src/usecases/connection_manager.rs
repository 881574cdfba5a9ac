//! Connection Manager - Single Provider Connection Lifecycle
//!
//! Owns the one logical connection to the market-data provider.
//!
//! State machine:
//! `Disconnected → Connecting → Connected`, `Connecting → Failed`,
//! `Connected → Disconnected`, `Failed → Connecting`.
//!
//! Concurrent `connect()` calls coalesce: the first caller starts a
//! handshake and stores it as a shared future; everyone arriving while it
//! is in flight awaits that same future and sees the same outcome.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, watch};
use tracing::{info, instrument, warn};

use crate::adapters::metrics::FeedMetrics;
use crate::error::{FeedError, FeedResult};
use crate::ports::provider::MarketDataProvider;

/// Lifecycle state of the provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Numeric encoding for the Prometheus gauge.
    pub const fn as_gauge(self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Failed => 3,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

type ConnectAttempt = Shared<BoxFuture<'static, FeedResult<()>>>;

struct Inner {
    state: ConnectionState,
    /// In-flight handshake and the generation it belongs to.
    attempt: Option<(u64, ConnectAttempt)>,
    /// Bumped on every new attempt and on disconnect, so a stale attempt
    /// finishing late cannot overwrite newer state.
    generation: u64,
}

/// Owns the provider connection and its state machine.
pub struct ConnectionManager {
    provider: Arc<dyn MarketDataProvider>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
    metrics: Arc<FeedMetrics>,
}

impl ConnectionManager {
    pub fn new(provider: Arc<dyn MarketDataProvider>, metrics: Arc<FeedMetrics>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        metrics.set_connection_state(ConnectionState::Disconnected);

        Self {
            provider,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                attempt: None,
                generation: 0,
            }),
            state_tx,
            metrics,
        }
    }

    /// The provider this manager connects.
    pub fn provider(&self) -> Arc<dyn MarketDataProvider> {
        Arc::clone(&self.provider)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions (drives the readiness probe).
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Ensure the connection is up.
    ///
    /// Returns immediately when already connected, joins the in-flight
    /// attempt when connecting, otherwise starts a new handshake.
    ///
    /// # Errors
    /// `FeedError::Connection` when the transport cannot be established.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn connect(&self) -> FeedResult<()> {
        let (generation, attempt) = {
            let mut inner = self.inner.lock().await;

            if let Some((generation, attempt)) = &inner.attempt {
                (*generation, attempt.clone())
            } else if inner.state == ConnectionState::Connected && self.provider.is_connected() {
                return Ok(());
            } else {
                if inner.state == ConnectionState::Connected {
                    warn!("Provider transport dropped, reconnecting");
                }
                inner.generation += 1;
                let attempt = self.start_attempt();
                inner.attempt = Some((inner.generation, attempt.clone()));
                self.set_state(&mut inner, ConnectionState::Connecting);
                (inner.generation, attempt)
            }
        };

        let outcome = attempt.await;

        let mut inner = self.inner.lock().await;
        if inner.generation == generation && inner.attempt.is_some() {
            inner.attempt = None;
            match &outcome {
                Ok(()) => {
                    info!("Provider connected");
                    self.set_state(&mut inner, ConnectionState::Connected);
                }
                Err(e) => {
                    warn!(error = %e, "Provider connection failed");
                    self.set_state(&mut inner, ConnectionState::Failed);
                }
            }
        }

        outcome
    }

    /// Close the connection.
    ///
    /// No-op when already disconnected. Provider close errors are logged
    /// and swallowed; the state always ends `Disconnected`.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn disconnect(&self) {
        let previous = {
            let mut inner = self.inner.lock().await;
            if inner.state == ConnectionState::Disconnected {
                return;
            }
            let previous = inner.state;
            inner.generation += 1;
            inner.attempt = None;
            self.set_state(&mut inner, ConnectionState::Disconnected);
            previous
        };

        if matches!(
            previous,
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            if let Err(e) = self.provider.disconnect().await {
                warn!(error = %e, "Provider disconnect failed, state reset anyway");
                self.metrics
                    .teardown_errors
                    .with_label_values(&["disconnect"])
                    .inc();
            }
        }

        info!(previous = %previous, "Provider disconnected");
    }

    /// Re-check the transport after a session ended.
    ///
    /// Moves `Connected` to `Disconnected` when the provider reports its
    /// socket gone, so readiness and the state gauge stop claiming a live
    /// connection. The next `connect()` reconnects. Returns the state
    /// after the check.
    pub async fn check_transport(&self) -> ConnectionState {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Connected
            && inner.attempt.is_none()
            && !self.provider.is_connected()
        {
            warn!(provider = self.provider.name(), "Provider transport lost");
            inner.generation += 1;
            self.set_state(&mut inner, ConnectionState::Disconnected);
        }
        inner.state
    }

    fn start_attempt(&self) -> ConnectAttempt {
        let provider = Arc::clone(&self.provider);
        let metrics = Arc::clone(&self.metrics);

        async move {
            let result = provider.connect().await;
            let outcome = if result.is_ok() { "ok" } else { "error" };
            metrics.handshakes.with_label_values(&[outcome]).inc();
            result.map_err(|e| FeedError::connection(&e))
        }
        .boxed()
        .shared()
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        inner.state = state;
        self.state_tx.send_replace(state);
        self.metrics.set_connection_state(state);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::ports::provider::ChartSession;

    /// Provider whose handshake takes a while and fails a set number of times.
    struct SlowProvider {
        handshakes: AtomicUsize,
        failures_left: AtomicUsize,
        connected: std::sync::atomic::AtomicBool,
        fail_disconnect: bool,
    }

    impl SlowProvider {
        fn new(failures: usize, fail_disconnect: bool) -> Self {
            Self {
                handshakes: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(failures),
                connected: std::sync::atomic::AtomicBool::new(false),
                fail_disconnect,
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for SlowProvider {
        async fn connect(&self) -> anyhow::Result<()> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("handshake refused");
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            if self.fail_disconnect {
                anyhow::bail!("close frame rejected");
            }
            Ok(())
        }

        async fn open_chart_session(&self, _: &str, _: &str) -> anyhow::Result<ChartSession> {
            anyhow::bail!("not used")
        }

        async fn close_chart_session(&self, _: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn manager(provider: &Arc<SlowProvider>) -> ConnectionManager {
        let provider: Arc<dyn MarketDataProvider> = Arc::clone(provider) as _;
        ConnectionManager::new(provider, Arc::new(FeedMetrics::new().unwrap()))
    }

    #[tokio::test]
    async fn test_concurrent_connects_share_one_handshake() {
        let provider = Arc::new(SlowProvider::new(0, false));
        let manager = manager(&provider);

        let (a, b) = tokio::join!(manager.connect(), manager.connect());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Connected);

        manager.connect().await.unwrap();
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_shared_then_retry_succeeds() {
        let provider = Arc::new(SlowProvider::new(1, false));
        let manager = manager(&provider);

        let (a, b) = tokio::join!(manager.connect(), manager.connect());
        assert!(matches!(a, Err(FeedError::Connection(_))));
        assert_eq!(a, b);
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Failed);

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_is_noop_when_disconnected() {
        let provider = Arc::new(SlowProvider::new(0, true));
        let manager = manager(&provider);
        let mut state_rx = manager.subscribe_state();

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!state_rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_disconnect_error_swallowed() {
        let provider = Arc::new(SlowProvider::new(0, true));
        let manager = manager(&provider);

        manager.connect().await.unwrap();
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            manager
                .metrics
                .teardown_errors
                .with_label_values(&["disconnect"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_dropped_transport_triggers_reconnect() {
        let provider = Arc::new(SlowProvider::new(0, false));
        let manager = manager(&provider);

        manager.connect().await.unwrap();
        provider.connected.store(false, Ordering::SeqCst);
        manager.connect().await.unwrap();
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lost_transport_reported_disconnected() {
        let provider = Arc::new(SlowProvider::new(0, false));
        let manager = manager(&provider);

        manager.connect().await.unwrap();
        assert_eq!(manager.check_transport().await, ConnectionState::Connected);

        provider.connected.store(false, Ordering::SeqCst);
        let mut state_rx = manager.subscribe_state();
        assert_eq!(manager.check_transport().await, ConnectionState::Disconnected);
        assert!(state_rx.has_changed().unwrap());
        assert_eq!(manager.metrics.connection_state.get(), 0);

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_check_transport_ignores_disconnected_manager() {
        let provider = Arc::new(SlowProvider::new(0, false));
        let manager = manager(&provider);

        assert_eq!(manager.check_transport().await, ConnectionState::Disconnected);
        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 0);
    }
}

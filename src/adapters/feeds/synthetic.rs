//! Synthetic Provider - Offline Stand-in for the Chart WebSocket
//!
//! Implements `MarketDataProvider` without any network. Each chart session
//! gets a random-walk history followed by one fresh candle per tick,
//! serialized in the same `{ "bars": [...] }` shape the live provider
//! emits (times in seconds), so the normalizer and registry see no
//! difference.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::series::{PricePoint, SeriesKind};
use crate::domain::synthetic::SyntheticSeriesGenerator;
use crate::domain::timeframe::Timeframe;
use crate::ports::provider::{ChartSession, MarketDataProvider, SessionId};

/// In-process provider backed by the synthetic generator.
pub struct SyntheticProvider {
    generator: SyntheticSeriesGenerator,
    tick_interval: Duration,
    channel_capacity: usize,
    connected: AtomicBool,
    sessions: Mutex<HashMap<SessionId, JoinHandle<()>>>,
}

impl SyntheticProvider {
    pub fn new(
        generator: SyntheticSeriesGenerator,
        tick_interval: Duration,
        channel_capacity: usize,
    ) -> Self {
        Self {
            generator,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            channel_capacity: channel_capacity.max(1),
            connected: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sessions still streaming.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Serialize points as provider-native bars with second-resolution times.
pub fn to_wire_bars(points: &[PricePoint]) -> Value {
    let bars: Vec<Value> = points
        .iter()
        .map(|p| {
            json!({
                "time": p.timestamp / 1000,
                "open": p.open,
                "high": p.high,
                "low": p.low,
                "close": p.close.unwrap_or(p.price),
                "volume": p.volume,
            })
        })
        .collect();
    json!({ "bars": bars })
}

async fn stream_session(
    generator: SyntheticSeriesGenerator,
    timeframe: Timeframe,
    tick_interval: Duration,
    tx: mpsc::Sender<Value>,
) {
    let mut rng = StdRng::from_entropy();

    // Whole seconds so the wire round-trip keeps timestamps exact.
    let now_ms = Utc::now().timestamp_millis() / 1000 * 1000;
    let history = generator.generate_with_rng(&mut rng, timeframe, SeriesKind::Ohlcv, now_ms);
    let Some(mut last) = history.last().copied() else {
        return;
    };
    if tx.send(to_wire_bars(&history)).await.is_err() {
        return;
    }

    let mut ticker = interval_at(Instant::now() + tick_interval, tick_interval);
    loop {
        ticker.tick().await;
        let timestamp = last.timestamp + timeframe.spacing_ms();
        last = generator.next_bar(&mut rng, timeframe, last.price, timestamp);
        if tx.send(to_wire_bars(&[last])).await.is_err() {
            break;
        }
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticProvider {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Synthetic provider connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        for (_, task) in self.sessions.lock().await.drain() {
            task.abort();
        }
        info!("Synthetic provider disconnected");
        Ok(())
    }

    async fn open_chart_session(&self, ticker: &str, timeframe: &str) -> Result<ChartSession> {
        anyhow::ensure!(
            self.connected.load(Ordering::SeqCst),
            "synthetic provider is not connected"
        );

        let session_id = format!("syn_{}", Uuid::new_v4().simple());
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let task = tokio::spawn(stream_session(
            self.generator.clone(),
            Timeframe::from_provider_token(timeframe),
            self.tick_interval,
            tx,
        ));
        self.sessions.lock().await.insert(session_id.clone(), task);

        debug!(session = %session_id, ticker, timeframe, "Synthetic session opened");
        Ok(ChartSession::new(session_id, rx))
    }

    async fn close_chart_session(&self, session_id: &str) -> Result<()> {
        if let Some(task) = self.sessions.lock().await.remove(session_id) {
            task.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

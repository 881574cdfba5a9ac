//! TradingView Chart WebSocket Provider
//!
//! Implements the `MarketDataProvider` port over the public chart
//! WebSocket. Anonymous access only (public unauthorized token).
//!
//! Per chart session:
//! 1. `chart_create_session [cs]`
//! 2. `resolve_symbol [cs, sym_ref, "={symbol, adjustment}"]`
//! 3. `create_series [cs, series_id, "s1", sym_ref, token, bars]`
//!
//! The server answers with `timescale_update` (history) and `du`
//! (incremental) messages whose rows are `v = [time, o, h, l, c, volume]`.
//! Rows are re-shaped into `{ "bars": [...] }` payloads and pushed to the
//! session's channel; the bar normalizer takes it from there.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::codec::{self, Frame};
use crate::config::ProviderConfig;
use crate::ports::provider::{ChartSession, MarketDataProvider, SessionId};

const ANONYMOUS_TOKEN: &str = "unauthorized_user_token";
const SYMBOL_REF: &str = "sds_sym_1";
const SERIES_ID: &str = "sds_1";

type SessionMap = Arc<RwLock<HashMap<SessionId, mpsc::Sender<Value>>>>;

/// Generic protocol message `{ "m": method, "p": params }`.
#[derive(Debug, Deserialize)]
struct WireMessage {
    m: String,
    #[serde(default)]
    p: Vec<Value>,
}

/// Live socket: writer queue plus the two pump tasks.
struct Transport {
    out_tx: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Chart WebSocket provider.
pub struct TradingViewProvider {
    ws_url: String,
    origin: String,
    bars_per_session: u32,
    channel_capacity: usize,
    transport: Mutex<Option<Transport>>,
    sessions: SessionMap,
    connected: Arc<AtomicBool>,
}

impl TradingViewProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            ws_url: config.ws_url.clone(),
            origin: config.origin.clone(),
            bars_per_session: config.bars_per_session,
            channel_capacity: config.channel_capacity.max(1),
            transport: Mutex::new(None),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Writer queue of the live transport.
    async fn sender(&self) -> Result<mpsc::UnboundedSender<Message>> {
        let transport = self.transport.lock().await;
        match transport.as_ref() {
            Some(t) if self.connected.load(Ordering::SeqCst) => Ok(t.out_tx.clone()),
            _ => anyhow::bail!("provider WebSocket is not connected"),
        }
    }
}

fn send_call(out_tx: &mpsc::UnboundedSender<Message>, method: &str, params: &Value) -> Result<()> {
    out_tx
        .send(Message::Text(codec::encode_message(method, params)))
        .map_err(|_| anyhow::anyhow!("provider writer closed while sending {method}"))
}

#[async_trait]
impl MarketDataProvider for TradingViewProvider {
    #[instrument(skip(self), fields(url = %self.ws_url))]
    async fn connect(&self) -> Result<()> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .context("Invalid provider WebSocket URL")?;
        request.headers_mut().insert(
            "Origin",
            HeaderValue::from_str(&self.origin).context("Invalid Origin header")?,
        );

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Provider WebSocket connection failed")?;
        let (mut write, read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    warn!(error = %e, "Provider WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Set before the reader starts so an immediate close is not overwritten.
        self.connected.store(true, Ordering::SeqCst);
        let reader = tokio::spawn(read_loop(
            read,
            out_tx.clone(),
            Arc::clone(&self.sessions),
            Arc::clone(&self.connected),
        ));

        if let Err(e) = send_call(&out_tx, "set_auth_token", &json!([ANONYMOUS_TOKEN])) {
            self.connected.store(false, Ordering::SeqCst);
            reader.abort();
            writer.abort();
            return Err(e);
        }

        let previous = self.transport.lock().await.replace(Transport {
            out_tx,
            reader,
            writer,
        });
        if let Some(stale) = previous {
            stale.reader.abort();
            stale.writer.abort();
        }

        info!("Provider WebSocket connected");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.sessions.write().await.clear();

        let Some(transport) = self.transport.lock().await.take() else {
            return Ok(());
        };

        let sent = transport.out_tx.send(Message::Close(None));
        drop(transport.out_tx);
        transport.reader.abort();

        if tokio::time::timeout(Duration::from_secs(2), transport.writer)
            .await
            .is_err()
        {
            warn!("Provider WebSocket writer did not finish closing in time");
        }

        sent.map_err(|_| anyhow::anyhow!("provider writer already closed"))?;
        info!("Provider WebSocket closed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_chart_session(&self, ticker: &str, timeframe: &str) -> Result<ChartSession> {
        let out_tx = self.sender().await?;

        let simple = Uuid::new_v4().simple().to_string();
        let session_id = format!("cs_{}", &simple[..12]);
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.sessions.write().await.insert(session_id.clone(), tx);

        let symbol_spec = format!("={}", json!({ "symbol": ticker, "adjustment": "splits" }));
        let calls = [
            ("chart_create_session", json!([session_id, ""])),
            ("resolve_symbol", json!([session_id, SYMBOL_REF, symbol_spec])),
            (
                "create_series",
                json!([session_id, SERIES_ID, "s1", SYMBOL_REF, timeframe, self.bars_per_session]),
            ),
        ];

        for (method, params) in &calls {
            if let Err(e) = send_call(&out_tx, method, params) {
                self.sessions.write().await.remove(&session_id);
                return Err(e);
            }
        }

        debug!(session = %session_id, ticker, timeframe, "Chart session requested");
        Ok(ChartSession::new(session_id, rx))
    }

    async fn close_chart_session(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);

        // Sessions die with the socket; nothing to tell the server then.
        let Ok(out_tx) = self.sender().await else {
            return Ok(());
        };
        send_call(&out_tx, "chart_delete_session", &json!([session_id]))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "tradingview"
    }
}

/// Pump inbound frames until the socket ends, then drop every session.
async fn read_loop<S>(
    mut read: S,
    out_tx: mpsc::UnboundedSender<Message>,
    sessions: SessionMap,
    connected: Arc<AtomicBool>,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text(&text, &out_tx, &sessions).await,
            Ok(Message::Close(frame)) => {
                info!(?frame, "Provider closed the WebSocket");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Provider WebSocket read failed");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    sessions.write().await.clear();
    debug!("Provider read loop ended");
}

async fn handle_text(text: &str, out_tx: &mpsc::UnboundedSender<Message>, sessions: &SessionMap) {
    let frames = match codec::decode_frames(text) {
        Ok(frames) => frames,
        Err(e) => {
            debug!(error = %e, "Failed to decode provider frames");
            return;
        }
    };

    for frame in frames {
        match frame {
            Frame::Heartbeat(beat) => {
                let _ = out_tx.send(Message::Text(codec::frame(&beat)));
            }
            Frame::Message(value) => dispatch(value, sessions).await,
        }
    }
}

async fn dispatch(value: Value, sessions: &SessionMap) {
    // Server hello and other method-less payloads are informational.
    let Ok(msg) = serde_json::from_value::<WireMessage>(value) else {
        return;
    };
    let session_id = msg.p.first().and_then(Value::as_str).unwrap_or_default();

    match msg.m.as_str() {
        "timescale_update" | "du" => {
            let Some(payload) = msg.p.get(1).map(series_rows_to_bars) else {
                return;
            };
            let sessions = sessions.read().await;
            let Some(tx) = sessions.get(session_id) else {
                debug!(session = session_id, "Update for unknown chart session");
                return;
            };
            if let Err(e) = tx.try_send(payload) {
                warn!(session = session_id, error = %e, "Chart session channel full or closed, update dropped");
            }
        }
        "series_error" | "symbol_error" | "critical_error" => {
            warn!(session = session_id, method = %msg.m, params = ?msg.p, "Provider rejected chart session");
            sessions.write().await.remove(session_id);
        }
        "protocol_error" => warn!(params = ?msg.p, "Provider protocol error"),
        other => debug!(method = other, "Ignoring provider message"),
    }
}

/// Re-shape `{ series_id: { "s": [ { "v": [t, o, h, l, c, vol] } ] } }`
/// into `{ "bars": [ { time, open, high, low, close, volume } ] }`.
fn series_rows_to_bars(update: &Value) -> Value {
    let bars: Vec<Value> = update
        .as_object()
        .into_iter()
        .flat_map(|series| series.values())
        .filter_map(|series| series.get("s").and_then(Value::as_array))
        .flatten()
        .filter_map(|row| {
            let v = row.get("v")?.as_array()?;
            Some(json!({
                "time": v.first()?,
                "open": v.get(1),
                "high": v.get(2),
                "low": v.get(3),
                "close": v.get(4)?,
                "volume": v.get(5),
            }))
        })
        .collect();

    json!({ "bars": bars })
}

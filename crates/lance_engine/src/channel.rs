//! WebSocket client for the job and mesh event streams.
//!
//! A [`Connection`] is one subscription. It never reconnects: once the socket
//! closes, for whatever reason, the connection stays closed and the sink is
//! told so through [`ChannelSink::on_close`].

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lance_core::{decode_frame, ChannelSubject, MeshEvent};
use lance_logging::{lance_debug, lance_info, lance_warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::ClientSettings;

/// Keepalive payload. The server does not answer it.
pub const KEEPALIVE_PAYLOAD: &str = "ping";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("no async runtime to drive the connection")]
    NoRuntime,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Receives decoded events and lifecycle signals of one connection. Callbacks
/// run on the runtime's worker threads.
pub trait ChannelSink: Send + Sync {
    fn on_event(&self, event: MeshEvent);

    fn on_open(&self) {}

    fn on_error(&self, _error: &ChannelError) {}

    fn on_close(&self) {}
}

#[derive(Debug)]
struct Shared {
    endpoint: String,
    state: AtomicU8,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl Shared {
    fn new(endpoint: String, state: ChannelState) -> Self {
        Self {
            endpoint,
            state: AtomicU8::new(state as u8),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: ChannelState, to: ChannelState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Handle to a live subscription.
#[derive(Debug)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// A connection that was never established. Closing it does nothing.
    pub fn noop(endpoint: impl Into<String>) -> Self {
        let shared = Shared::new(endpoint.into(), ChannelState::Closed);
        shared.closed.store(true, Ordering::SeqCst);
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Stops the keepalive and closes the socket. Safe to call any number of
    /// times, also after the server already closed the connection.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lance_debug!("closing channel {}", self.shared.endpoint);
        if !self.shared.transition(ChannelState::Open, ChannelState::Closing) {
            self.shared.transition(ChannelState::Connecting, ChannelState::Closing);
        }
        self.shared.cancel.cancel();
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }
}

/// Builds the WebSocket URL of `subject` on the backend at `base_url`.
pub fn channel_url(base_url: &str, subject: &ChannelSubject) -> Result<String, ChannelError> {
    let invalid = |reason: String| ChannelError::InvalidEndpoint {
        endpoint: base_url.to_string(),
        reason,
    };
    let mut url = Url::parse(base_url).map_err(|err| invalid(err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch to {scheme}")))?;
    url.set_path(&subject.path());
    url.set_query(None);
    Ok(url.to_string())
}

/// Opens live connections with shared keepalive and connect settings.
#[derive(Debug, Clone)]
pub struct LiveChannel {
    keepalive: Duration,
    connect_timeout: Duration,
}

impl LiveChannel {
    pub fn new(settings: &ClientSettings) -> Self {
        Self {
            keepalive: settings.keepalive_interval,
            connect_timeout: settings.connect_timeout,
        }
    }

    /// Opens `endpoint` and streams its events into `sink`.
    ///
    /// Must be called from within a tokio runtime. If the connection cannot
    /// be set up at all, the sink hears `on_error` and `on_close` and a no-op
    /// connection is returned.
    pub fn open(&self, endpoint: &str, sink: Arc<dyn ChannelSink>) -> Connection {
        if let Err(err) = validate_endpoint(endpoint) {
            return degrade(endpoint, sink.as_ref(), err);
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => return degrade(endpoint, sink.as_ref(), ChannelError::NoRuntime),
        };

        let shared = Arc::new(Shared::new(endpoint.to_string(), ChannelState::Connecting));
        let task = ConnectionTask {
            shared: shared.clone(),
            sink,
            keepalive: self.keepalive,
            connect_timeout: self.connect_timeout,
        };
        runtime.spawn(task.run());
        Connection { shared }
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ChannelError> {
    let url = Url::parse(endpoint).map_err(|err| ChannelError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ChannelError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn degrade(endpoint: &str, sink: &dyn ChannelSink, err: ChannelError) -> Connection {
    lance_warn!("channel {} unavailable: {}", endpoint, err);
    sink.on_error(&err);
    sink.on_close();
    Connection::noop(endpoint)
}

struct ConnectionTask {
    shared: Arc<Shared>,
    sink: Arc<dyn ChannelSink>,
    keepalive: Duration,
    connect_timeout: Duration,
}

impl ConnectionTask {
    async fn run(self) {
        let endpoint = self.shared.endpoint.clone();
        let connect = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => None,
            result = tokio::time::timeout(
                self.connect_timeout,
                tokio_tungstenite::connect_async(endpoint.as_str()),
            ) => Some(result),
        };

        let mut ws = match connect {
            None => return self.finish(),
            Some(Ok(Ok((ws, _response)))) => ws,
            Some(Ok(Err(err))) => {
                self.fail(ChannelError::Connect(err.to_string()));
                return self.finish();
            }
            Some(Err(_elapsed)) => {
                self.fail(ChannelError::Connect(format!(
                    "timed out after {:?}",
                    self.connect_timeout
                )));
                return self.finish();
            }
        };

        if !self.shared.transition(ChannelState::Connecting, ChannelState::Open) {
            let _ = ws.close(None).await;
            return self.finish();
        }
        lance_info!("channel {} open", endpoint);
        self.sink.on_open();

        let mut keepalive = interval_at(Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => {
                    if let Err(err) = ws.close(None).await {
                        lance_debug!("channel {}: close handshake failed: {}", endpoint, err);
                    }
                    break;
                }
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.deliver(&text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.deliver(&text),
                        Err(err) => lance_warn!("channel {}: non-utf8 frame dropped: {}", endpoint, err),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        lance_info!("channel {} closed by server: {:?}", endpoint, frame);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        self.fail(ChannelError::Transport(err.to_string()));
                        break;
                    }
                    None => break,
                },
                _ = keepalive.tick() => {
                    if let Err(err) = ws.send(Message::Text(KEEPALIVE_PAYLOAD.to_string())).await {
                        self.fail(ChannelError::Transport(err.to_string()));
                        break;
                    }
                }
            }
        }
        self.finish();
    }

    fn deliver(&self, text: &str) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        match decode_frame(text) {
            Ok(event) => self.sink.on_event(event),
            Err(err) => lance_warn!("channel {}: dropping frame: {}", self.shared.endpoint, err),
        }
    }

    fn fail(&self, err: ChannelError) {
        lance_warn!("channel {}: {}", self.shared.endpoint, err);
        self.sink.on_error(&err);
    }

    fn finish(&self) {
        self.shared.set_state(ChannelState::Closed);
        lance_info!("channel {} closed", self.shared.endpoint);
        self.sink.on_close();
    }
}

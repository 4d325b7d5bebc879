use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lance_core::MeshEvent;
use lance_engine::{ChannelError, ChannelSink, ChannelState, ClientSettings, LiveChannel};
use pretty_assertions::assert_eq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(lance_logging::initialize_for_tests);
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Open,
    Event(String),
    Error,
    Close,
}

struct RecordingSink {
    tx: UnboundedSender<Seen>,
}

impl ChannelSink for RecordingSink {
    fn on_event(&self, event: MeshEvent) {
        let _ = self.tx.send(Seen::Event(event.kind.timeline_label()));
    }

    fn on_open(&self) {
        let _ = self.tx.send(Seen::Open);
    }

    fn on_error(&self, _error: &ChannelError) {
        let _ = self.tx.send(Seen::Error);
    }

    fn on_close(&self) {
        let _ = self.tx.send(Seen::Close);
    }
}

fn recording_sink() -> (Arc<RecordingSink>, UnboundedReceiver<Seen>) {
    let (tx, rx) = unbounded_channel();
    (Arc::new(RecordingSink { tx }), rx)
}

fn live_channel(keepalive: Duration) -> LiveChannel {
    LiveChannel::new(&ClientSettings {
        keepalive_interval: keepalive,
        connect_timeout: Duration::from_secs(2),
        ..ClientSettings::default()
    })
}

async fn next_seen(rx: &mut UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("sink callback in time")
        .expect("sink still connected")
}

async fn serve_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{addr}/ws/mesh")
}

#[tokio::test]
async fn frames_are_decoded_and_malformed_ones_skipped() {
    init_logging();
    let endpoint = serve_once(|mut ws| async move {
        for frame in [
            r#"{"type":"subtask_started","timestamp":"T1","data":{"title":"Voiceover"}}"#,
            "{broken",
            r#"{"type":"handoff","timestamp":"T2","data":{"source_name":"A","target_name":"B"}}"#,
        ] {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        // Hold the socket open until the client leaves.
        while ws.next().await.is_some() {}
    })
    .await;

    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_secs(30)).open(&endpoint, sink);

    assert_eq!(next_seen(&mut rx).await, Seen::Open);
    assert_eq!(conn.state(), ChannelState::Open);
    assert_eq!(
        next_seen(&mut rx).await,
        Seen::Event("Voiceover started".to_string())
    );
    assert_eq!(
        next_seen(&mut rx).await,
        Seen::Event("Handoff: A → B".to_string())
    );

    conn.close();
    assert_eq!(next_seen(&mut rx).await, Seen::Close);
}

#[tokio::test]
async fn keepalive_pings_while_open() {
    init_logging();
    let (ping_tx, mut ping_rx) = unbounded_channel();
    let endpoint = serve_once(move |mut ws| async move {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = ping_tx.send(text);
            }
        }
    })
    .await;

    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_millis(50)).open(&endpoint, sink);
    assert_eq!(next_seen(&mut rx).await, Seen::Open);

    for _ in 0..2 {
        let ping = tokio::time::timeout(Duration::from_secs(2), ping_rx.recv())
            .await
            .unwrap();
        assert_eq!(ping.as_deref(), Some("ping"));
    }
    conn.close();
}

#[tokio::test]
async fn close_twice_tears_down_once() {
    init_logging();
    let endpoint = serve_once(|mut ws| async move {
        while ws.next().await.is_some() {}
    })
    .await;

    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_millis(20)).open(&endpoint, sink);
    assert_eq!(next_seen(&mut rx).await, Seen::Open);

    conn.close();
    conn.close();
    assert_eq!(next_seen(&mut rx).await, Seen::Close);
    conn.close();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(conn.state(), ChannelState::Closed);
}

#[tokio::test]
async fn server_close_is_final() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_secs(30)).open(&format!("ws://{addr}/ws/jobs/7"), sink);

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    assert_eq!(next_seen(&mut rx).await, Seen::Open);
    ws.close(None).await.unwrap();

    assert_eq!(next_seen(&mut rx).await, Seen::Close);
    assert_eq!(conn.state(), ChannelState::Closed);
    conn.close();

    let second = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(second.is_err(), "client reconnected");
}

#[tokio::test]
async fn invalid_endpoint_degrades_to_a_noop_connection() {
    init_logging();
    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_secs(30)).open("not a url", sink);

    assert_eq!(conn.state(), ChannelState::Closed);
    assert_eq!(rx.recv().await, Some(Seen::Error));
    assert_eq!(rx.recv().await, Some(Seen::Close));
    conn.close();
    conn.close();
}

#[tokio::test]
async fn refused_connection_reports_error_then_close() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_secs(30)).open(&format!("ws://{addr}/ws/mesh"), sink);

    assert_eq!(next_seen(&mut rx).await, Seen::Error);
    assert_eq!(next_seen(&mut rx).await, Seen::Close);
    assert_eq!(conn.state(), ChannelState::Closed);
}

#[test]
fn opening_outside_a_runtime_is_harmless() {
    let (sink, mut rx) = recording_sink();
    let conn = live_channel(Duration::from_secs(30)).open("ws://127.0.0.1:9/ws/mesh", sink);

    assert_eq!(conn.state(), ChannelState::Closed);
    assert_eq!(rx.try_recv().ok(), Some(Seen::Error));
    assert_eq!(rx.try_recv().ok(), Some(Seen::Close));
    conn.close();
}

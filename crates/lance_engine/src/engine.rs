use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use lance_core::{ChannelSubject, Effect, MeshEvent};
use lance_logging::{lance_debug, lance_error, lance_info};

use crate::channel::{channel_url, ChannelError, ChannelSink, Connection, LiveChannel};
use crate::rest::{MeshApi, ReqwestMeshApi};
use crate::{ChannelEvent, ClientSettings, EngineEvent};

enum EngineCommand {
    Run(Effect),
}

/// Executes effects on a background tokio runtime and reports results as
/// [`EngineEvent`]s. Holds at most one live connection per subject.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Self {
        let api = Arc::new(ReqwestMeshApi::new(settings.clone()));
        Self::with_api(settings, api)
    }

    pub fn with_api(settings: ClientSettings, api: Arc<dyn MeshApi>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    lance_error!("engine runtime failed to start: {}", err);
                    return;
                }
            };
            let _guard = runtime.enter();
            let mut worker = Worker {
                settings: settings.clone(),
                channel: LiveChannel::new(&settings),
                api,
                event_tx,
                connections: HashMap::new(),
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(&runtime, command);
            }
            worker.close_all();
            lance_debug!("engine thread exiting");
        });

        Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    pub fn execute(&self, effect: Effect) {
        let _ = self.cmd_tx.send(EngineCommand::Run(effect));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.recv_timeout(timeout).ok()
    }
}

struct LiveConnection {
    connection: Connection,
    retired: Arc<AtomicBool>,
}

impl LiveConnection {
    fn retire(self) {
        self.retired.store(true, Ordering::SeqCst);
        self.connection.close();
    }
}

struct Worker {
    settings: ClientSettings,
    channel: LiveChannel,
    api: Arc<dyn MeshApi>,
    event_tx: mpsc::Sender<EngineEvent>,
    connections: HashMap<ChannelSubject, LiveConnection>,
}

impl Worker {
    fn handle(&mut self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        let EngineCommand::Run(effect) = command;
        match effect {
            Effect::OpenChannel(subject) => self.open(subject),
            Effect::CloseChannel(subject) => {
                if let Some(live) = self.connections.remove(&subject) {
                    lance_info!("closing channel {}", subject);
                    live.retire();
                }
            }
            request => {
                let api = self.api.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let event = run_request(api.as_ref(), request).await;
                    if let Some(event) = event {
                        let _ = event_tx.send(event);
                    }
                });
            }
        }
    }

    fn open(&mut self, subject: ChannelSubject) {
        if let Some(previous) = self.connections.remove(&subject) {
            lance_debug!("replacing channel {}", subject);
            previous.retire();
        }
        let retired = Arc::new(AtomicBool::new(false));
        let sink = Arc::new(ForwardingSink {
            subject: subject.clone(),
            tx: self.event_tx.clone(),
            retired: retired.clone(),
        });
        let connection = match channel_url(&self.settings.base_url, &subject) {
            Ok(endpoint) => self.channel.open(&endpoint, sink),
            Err(err) => {
                sink.on_error(&err);
                sink.on_close();
                Connection::noop(subject.path())
            }
        };
        self.connections.insert(
            subject,
            LiveConnection {
                connection,
                retired,
            },
        );
    }

    fn close_all(&mut self) {
        for (_, live) in self.connections.drain() {
            live.retire();
        }
    }
}

async fn run_request(api: &dyn MeshApi, effect: Effect) -> Option<EngineEvent> {
    let event = match effect {
        Effect::FetchSession => EngineEvent::SessionFetched(api.current_user().await),
        Effect::Logout => EngineEvent::LoggedOut(api.logout().await),
        Effect::FetchJob { job_id, seq } => {
            let result = api.job(&job_id).await;
            EngineEvent::JobFetched {
                job_id,
                seq,
                result,
            }
        }
        Effect::FetchTopology => EngineEvent::TopologyFetched(api.topology().await),
        Effect::FetchHealth => EngineEvent::HealthFetched(api.health().await),
        Effect::OpenChannel(_) | Effect::CloseChannel(_) => return None,
    };
    Some(event)
}

/// Forwards connection callbacks as engine events until the connection is
/// retired, after which late callbacks are dropped.
struct ForwardingSink {
    subject: ChannelSubject,
    tx: mpsc::Sender<EngineEvent>,
    retired: Arc<AtomicBool>,
}

impl ForwardingSink {
    fn forward(&self, event: ChannelEvent) {
        if self.retired.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(EngineEvent::Channel {
            subject: self.subject.clone(),
            event,
        });
    }
}

impl ChannelSink for ForwardingSink {
    fn on_event(&self, event: MeshEvent) {
        self.forward(ChannelEvent::Frame(event));
    }

    fn on_open(&self) {
        self.forward(ChannelEvent::Opened);
    }

    fn on_error(&self, error: &ChannelError) {
        self.forward(ChannelEvent::Error(error.to_string()));
    }

    fn on_close(&self) {
        self.forward(ChannelEvent::Closed);
    }
}

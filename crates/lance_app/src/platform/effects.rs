use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lance_core::{Effect, Msg};
use lance_engine::{ChannelEvent, ClientSettings, EngineEvent, EngineHandle};
use lance_logging::{lance_info, lance_warn};

use super::app::Inbox;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hands effects to the engine and feeds its results back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: ClientSettings, inbox: mpsc::Sender<Inbox>) -> Self {
        lance_info!("backend at {}", settings.base_url);
        let runner = Self {
            engine: EngineHandle::new(settings),
        };
        runner.spawn_event_loop(inbox);
        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            lance_info!("effect {:?}", effect);
            self.engine.execute(effect);
        }
    }

    fn spawn_event_loop(&self, inbox: mpsc::Sender<Inbox>) {
        let engine = self.engine.clone();
        thread::spawn(move || loop {
            let Some(event) = engine.recv_timeout(POLL_INTERVAL) else {
                continue;
            };
            if inbox.send(Inbox::Msg(to_msg(event))).is_err() {
                break;
            }
        });
    }
}

fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::SessionFetched(Ok(user)) => Msg::SessionLoaded(user),
        EngineEvent::SessionFetched(Err(err)) => {
            lance_warn!("session fetch failed: {}", err);
            Msg::SessionLoaded(None)
        }
        EngineEvent::LoggedOut(Ok(())) => Msg::NoOp,
        EngineEvent::LoggedOut(Err(err)) => {
            lance_warn!("logout failed: {}", err);
            Msg::NoOp
        }
        EngineEvent::JobFetched {
            seq,
            result: Ok(job),
            ..
        } => Msg::JobFetched { seq, job },
        EngineEvent::JobFetched {
            job_id,
            result: Err(err),
            ..
        } => {
            lance_warn!("job {} fetch failed: {}", job_id, err);
            Msg::JobFetchFailed {
                job_id,
                message: err.to_string(),
            }
        }
        EngineEvent::TopologyFetched(Ok(snapshot)) => Msg::TopologyFetched(snapshot),
        EngineEvent::TopologyFetched(Err(err)) => {
            lance_warn!("topology fetch failed: {}", err);
            Msg::TopologyFetchFailed {
                message: err.to_string(),
            }
        }
        EngineEvent::HealthFetched(Ok(health)) => Msg::HealthFetched(health),
        EngineEvent::HealthFetched(Err(err)) => {
            lance_warn!("health fetch failed: {}", err);
            Msg::NoOp
        }
        EngineEvent::Channel { subject, event } => match event {
            ChannelEvent::Opened => Msg::ChannelOpened(subject),
            ChannelEvent::Frame(event) => Msg::ChannelEvent { subject, event },
            ChannelEvent::Error(message) => Msg::ChannelError { subject, message },
            ChannelEvent::Closed => Msg::ChannelClosed(subject),
        },
    }
}

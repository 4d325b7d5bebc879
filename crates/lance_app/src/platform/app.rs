use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use lance_core::scene::{FrameGate, PulseAnimator};
use lance_core::{update, AppState, Msg, TickFrame, ViewKind};
use lance_logging::{lance_debug, lance_info, lance_warn};

use super::config::AppConfig;
use super::effects::EffectRunner;
use super::ui::input::{self, Command};
use super::ui::render;

/// Lets close handshakes go out before the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// View opened at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum StartView {
    Mesh,
    Job(String),
}

/// Everything the main loop reacts to.
pub(crate) enum Inbox {
    Msg(Msg),
    Command(Command),
}

pub fn run_app(config: AppConfig, start: StartView) -> anyhow::Result<()> {
    let (inbox_tx, inbox_rx) = mpsc::channel::<Inbox>();
    let (frame_tx, frame_rx) = mpsc::channel::<TickFrame>();

    let runner = EffectRunner::new(config.client_settings(), inbox_tx.clone());
    let mut shell = Shell::new(&config, runner, frame_rx);
    shell.state.subscribe_frames(frame_tx);

    // Layout cadence; also drives throttled rendering.
    spawn_ticker(inbox_tx.clone(), config.frame_interval());
    spawn_input(inbox_tx);

    shell.dispatch(Msg::SessionStarted);
    shell.dispatch(match start {
        StartView::Mesh => Msg::MeshViewOpened {
            width: config.width,
            height: config.height,
        },
        StartView::Job(job_id) => Msg::JobViewOpened { job_id },
    });

    while let Ok(item) = inbox_rx.recv() {
        match item {
            Inbox::Msg(msg) => shell.dispatch(msg),
            Inbox::Command(Command::Quit) => break,
            Inbox::Command(command) => shell.command(command),
        }
        shell.present()?;
    }

    shell.shutdown();
    Ok(())
}

struct Shell {
    state: AppState,
    runner: EffectRunner,
    frames: mpsc::Receiver<TickFrame>,
    gate: FrameGate,
    pulse: PulseAnimator,
    clock: Instant,
    flashing: bool,
    needs_render: bool,
    last_render: Option<Instant>,
    render_interval: Duration,
    default_viewport: (f64, f64),
    clear_screen: bool,
}

impl Shell {
    fn new(config: &AppConfig, runner: EffectRunner, frames: mpsc::Receiver<TickFrame>) -> Self {
        Self {
            state: AppState::new(),
            runner,
            frames,
            gate: FrameGate::default(),
            pulse: PulseAnimator::default(),
            clock: Instant::now(),
            flashing: false,
            needs_render: true,
            last_render: None,
            render_interval: config.render_interval(),
            default_viewport: (config.width, config.height),
            clear_screen: io::stdout().is_terminal(),
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);

        if let Some(pulse) = state.take_pulse() {
            lance_debug!("pulse {:?}", pulse.kind);
            self.pulse.trigger(self.clock.elapsed());
        }
        match state.layout_generation() {
            Some(generation) => self.gate.bind(generation),
            None => self.gate.unbind(),
        }
        if state.consume_dirty() {
            self.needs_render = true;
        }
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn command(&mut self, command: Command) {
        let msg = match command {
            Command::Drag { x, y } => Msg::PointerDown { x, y },
            Command::Move { x, y } => Msg::PointerMoved { x, y },
            Command::Release => Msg::PointerUp,
            Command::Zoom { factor, anchor } => {
                let (x, y) = anchor.unwrap_or_else(|| {
                    let (width, height) = self.viewport();
                    (width / 2.0, height / 2.0)
                });
                Msg::Zoomed { factor, x, y }
            }
            Command::Pan { dx, dy } => Msg::Panned { dx, dy },
            Command::Resize { width, height } => Msg::Resized { width, height },
            Command::OpenJob(job_id) => Msg::JobViewOpened { job_id },
            Command::OpenMesh => {
                let (width, height) = self.viewport();
                Msg::MeshViewOpened { width, height }
            }
            Command::Close(kind) => Msg::ViewClosed(kind),
            Command::Logout => Msg::LogoutClicked,
            Command::Quit => return,
        };
        self.dispatch(msg);
    }

    fn viewport(&self) -> (f64, f64) {
        self.state
            .mesh()
            .map(|mesh| mesh.viewport())
            .unwrap_or(self.default_viewport)
    }

    /// Redraws when state changed, the layout moved or an edge flash is in
    /// progress, at most once per render interval.
    fn present(&mut self) -> io::Result<()> {
        let mut moved = false;
        while let Ok(frame) = self.frames.try_recv() {
            if self.gate.accepts(&frame) {
                moved = true;
            } else {
                lance_debug!("stale frame from layout generation {}", frame.generation);
            }
        }

        let now = self.clock.elapsed();
        let flashing = self.pulse.is_animating(now);
        let flash_ended = self.flashing && !flashing;
        self.flashing = flashing;
        if !(self.needs_render || moved || flashing || flash_ended) {
            return Ok(());
        }
        if self
            .last_render
            .is_some_and(|at| at.elapsed() < self.render_interval)
        {
            self.needs_render = true;
            return Ok(());
        }

        self.needs_render = false;
        self.last_render = Some(Instant::now());
        let screen = render::render(&self.state.view(), self.pulse.intensity(now));
        let mut out = io::stdout().lock();
        if self.clear_screen {
            write!(out, "\x1b[2J\x1b[H")?;
        }
        writeln!(out, "{screen}")?;
        out.flush()
    }

    fn shutdown(&mut self) {
        lance_info!("shutting down");
        let open: Vec<_> = [
            self.state.job().map(|_| ViewKind::JobTracker),
            self.state.mesh().map(|_| ViewKind::Mesh),
        ]
        .into_iter()
        .flatten()
        .collect();
        for kind in open {
            self.dispatch(Msg::ViewClosed(kind));
        }
        thread::sleep(SHUTDOWN_GRACE);
    }
}

fn spawn_ticker(inbox: mpsc::Sender<Inbox>, interval: Duration) {
    thread::spawn(move || {
        while inbox.send(Inbox::Msg(Msg::Tick)).is_ok() {
            thread::sleep(interval);
        }
    });
}

fn spawn_input(inbox: mpsc::Sender<Inbox>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    lance_warn!("stdin read failed: {}", err);
                    break;
                }
            };
            match input::parse(&line) {
                Ok(Some(command)) => {
                    if inbox.send(Inbox::Command(command)).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => eprintln!("{err}\n  {}", input::HELP),
            }
        }
        lance_debug!("stdin closed, input disabled");
    });
}

use crate::{ChannelSubject, Job, MeshEvent, MeshHealth, TopologySnapshot, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    JobTracker,
    Mesh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// App start: load the current user.
    SessionStarted,
    /// Result of the current-user fetch; `None` when signed out.
    SessionLoaded(Option<User>),
    /// User asked to sign out.
    LogoutClicked,
    /// Job tracker activated for a job.
    JobViewOpened { job_id: String },
    /// Authoritative job resource arrived for request `seq`.
    JobFetched { seq: u64, job: Job },
    JobFetchFailed { job_id: String, message: String },
    /// Mesh view activated with its viewport size.
    MeshViewOpened { width: f64, height: f64 },
    TopologyFetched(TopologySnapshot),
    TopologyFetchFailed { message: String },
    HealthFetched(MeshHealth),
    /// Live channel reached the open state.
    ChannelOpened(ChannelSubject),
    /// Decoded frame from a live channel.
    ChannelEvent {
        subject: ChannelSubject,
        event: MeshEvent,
    },
    /// Transport error reported by a live channel.
    ChannelError {
        subject: ChannelSubject,
        message: String,
    },
    ChannelClosed(ChannelSubject),
    /// Pointer pressed at a screen position; starts a drag on a node hit.
    PointerDown { x: f64, y: f64 },
    PointerMoved { x: f64, y: f64 },
    PointerUp,
    /// Zoom by `factor` around a screen anchor.
    Zoomed { factor: f64, x: f64, y: f64 },
    Panned { dx: f64, dy: f64 },
    Resized { width: f64, height: f64 },
    /// View torn down; its channel closes and its simulation stops.
    ViewClosed(ViewKind),
    /// Render frame cadence.
    Tick,
    /// Wakes the loop without changing state.
    NoOp,
}


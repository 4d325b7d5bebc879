//! AgentLance core: live event model, topology, force layout and the pure
//! state machine driving the job tracker and mesh views.
mod channel;
mod effect;
pub mod event;
pub mod event_log;
pub mod job;
pub mod layout;
mod msg;
pub mod scene;
pub mod session;
mod state;
pub mod topology;
mod update;
mod view_model;

pub use channel::{ChannelSubject, LinkStatus};
pub use effect::Effect;
pub use event::{decode_frame, DecodeError, EventKind, EventTone, MeshEvent, PlannedSubtask};
pub use event_log::{EventLog, JobTimeline, MeshFeed, Pulse, PulseKind, FEED_DISPLAY_LIMIT};
pub use job::{Deliverable, Job, JobProjection, JobStatus, Subtask, SubtaskStatus, SubtaskView};
pub use layout::{LayoutSettings, Point, RunState, Simulation, TickFrame};
pub use msg::{Msg, ViewKind};
pub use session::{SessionState, User};
pub use state::{AppState, FrameSender, JobTrackerState, MeshViewState};
pub use topology::{MeshEdge, MeshHealth, MeshNode, NodeStatus, Topology, TopologySnapshot};
pub use update::update;
pub use view_model::{AppViewModel, FeedRow, JobView, MeshViewModel, TimelineRow};

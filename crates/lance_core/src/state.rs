use std::sync::mpsc;

use lance_logging::{lance_debug, lance_info};

use crate::event::{EventKind, MeshEvent};
use crate::event_log::{JobTimeline, MeshFeed, Pulse};
use crate::layout::{Point, Simulation, TickFrame};
use crate::scene::{hit_test, ViewTransform};
use crate::topology::{MeshHealth, Topology, TopologySnapshot};
use crate::view_model::AppViewModel;
use crate::{ChannelSubject, LinkStatus, SessionState};

/// Receives a copy of every simulation frame.
pub type FrameSender = mpsc::Sender<TickFrame>;

/// State of the job tracker view for one job.
#[derive(Debug)]
pub struct JobTrackerState {
    timeline: JobTimeline,
    link: LinkStatus,
    last_error: Option<String>,
}

impl JobTrackerState {
    pub(crate) fn new(job_id: &str) -> Self {
        Self {
            timeline: JobTimeline::new(job_id),
            link: LinkStatus::Connecting,
            last_error: None,
        }
    }

    pub fn job_id(&self) -> &str {
        self.timeline.job_id()
    }

    pub fn subject(&self) -> ChannelSubject {
        ChannelSubject::Job(self.timeline.job_id().to_string())
    }

    pub fn timeline(&self) -> &JobTimeline {
        &self.timeline
    }

    pub(crate) fn timeline_mut(&mut self) -> &mut JobTimeline {
        &mut self.timeline
    }

    pub fn link(&self) -> LinkStatus {
        self.link
    }

    pub(crate) fn set_link(&mut self, link: LinkStatus) {
        self.link = link;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.last_error = Some(message);
    }
}

/// State of the mesh view: topology, layout, feed and viewport.
#[derive(Debug)]
pub struct MeshViewState {
    topology: Topology,
    topology_loaded: bool,
    health: Option<MeshHealth>,
    feed: MeshFeed,
    simulation: Option<Simulation>,
    width: f64,
    height: f64,
    transform: ViewTransform,
    dragging: Option<String>,
    link: LinkStatus,
    last_error: Option<String>,
}

impl MeshViewState {
    pub(crate) fn new(width: f64, height: f64) -> Self {
        Self {
            topology: Topology::new(),
            topology_loaded: false,
            health: None,
            feed: MeshFeed::new(),
            simulation: None,
            width,
            height,
            transform: ViewTransform::IDENTITY,
            dragging: None,
            link: LinkStatus::Connecting,
            last_error: None,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn topology_loaded(&self) -> bool {
        self.topology_loaded
    }

    pub fn health(&self) -> Option<&MeshHealth> {
        self.health.as_ref()
    }

    pub fn feed(&self) -> &MeshFeed {
        &self.feed
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        self.simulation.as_ref()
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn viewport(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    pub fn link(&self) -> LinkStatus {
        self.link
    }

    pub(crate) fn set_link(&mut self, link: LinkStatus) {
        self.link = link;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub(crate) fn set_health(&mut self, health: MeshHealth) {
        self.health = Some(health);
    }

    /// Loads a snapshot and (re)starts the layout, carrying over the physics
    /// state of nodes that are still present.
    pub(crate) fn load_topology(&mut self, snapshot: TopologySnapshot, sinks: &[FrameSender]) {
        self.topology.load_snapshot(snapshot.nodes, snapshot.edges);
        self.topology_loaded = true;
        self.restart_layout(sinks);
        if let Some(id) = self.dragging.clone() {
            if self.topology.node(&id).is_none() {
                self.dragging = None;
            }
        }
    }

    pub(crate) fn resize(&mut self, width: f64, height: f64, sinks: &[FrameSender]) {
        self.width = width;
        self.height = height;
        if self.simulation.is_some() {
            self.restart_layout(sinks);
        }
    }

    fn restart_layout(&mut self, sinks: &[FrameSender]) {
        let nodes = self.topology.nodes();
        let edges = self.topology.edges();
        let mut next = match self.simulation.take() {
            Some(previous) => previous.restart(nodes, edges, self.width, self.height),
            None => Simulation::start(nodes, edges, self.width, self.height),
        };
        for sink in sinks {
            attach_sink(&mut next, sink.clone());
        }
        self.simulation = Some(next);
    }

    pub(crate) fn attach_sink(&mut self, sink: FrameSender) {
        if let Some(sim) = self.simulation.as_mut() {
            attach_sink(sim, sink);
        }
    }

    /// Appends a live event to the feed and applies any topology change it
    /// implies. Returns true when the graph's look changed.
    pub(crate) fn apply_event(&mut self, event: MeshEvent) -> bool {
        let mut changed = false;
        if let (EventKind::AgentStatusChanged { status: Some(status) }, Some(agent_id)) =
            (&event.kind, event.agent_id.as_deref())
        {
            if let Some(node) = self.topology.apply_status(agent_id, *status) {
                let node = node.clone();
                if let Some(sim) = self.simulation.as_mut() {
                    sim.update_node(&node);
                }
                changed = true;
            }
        }
        self.feed.append(event);
        changed
    }

    pub(crate) fn take_pulse(&mut self) -> Option<Pulse> {
        self.feed.take_pulse()
    }

    pub(crate) fn tick(&mut self) -> bool {
        self.simulation
            .as_mut()
            .and_then(Simulation::tick)
            .is_some()
    }

    pub(crate) fn pointer_down(&mut self, screen: Point) -> bool {
        let Some(sim) = self.simulation.as_mut() else {
            return false;
        };
        let Some(id) = hit_test(sim, &self.transform, screen) else {
            return false;
        };
        if let Some(previous) = self.dragging.take() {
            sim.unpin(&previous);
        }
        let at = self.transform.invert(screen);
        sim.pin(&id, at.x, at.y);
        lance_debug!("drag started on {}", id);
        self.dragging = Some(id);
        true
    }

    pub(crate) fn pointer_moved(&mut self, screen: Point) -> bool {
        let (Some(sim), Some(id)) = (self.simulation.as_mut(), self.dragging.as_deref()) else {
            return false;
        };
        let at = self.transform.invert(screen);
        sim.pin(id, at.x, at.y)
    }

    pub(crate) fn pointer_up(&mut self) -> bool {
        let Some(id) = self.dragging.take() else {
            return false;
        };
        if let Some(sim) = self.simulation.as_mut() {
            sim.unpin(&id);
        }
        true
    }

    pub(crate) fn zoom(&mut self, factor: f64, anchor: Point) {
        self.transform.zoom_at(anchor, factor);
    }

    pub(crate) fn pan(&mut self, dx: f64, dy: f64) {
        self.transform.pan(dx, dy);
    }

    pub(crate) fn teardown(&mut self) {
        if let Some(sim) = self.simulation.as_mut() {
            sim.stop();
        }
        self.dragging = None;
        lance_info!("mesh view torn down");
    }
}

fn attach_sink(sim: &mut Simulation, sink: FrameSender) {
    sim.on_tick(move |frame| {
        let _ = sink.send(frame.clone());
    });
}

#[derive(Debug, Default)]
pub struct AppState {
    session: SessionState,
    job: Option<JobTrackerState>,
    mesh: Option<MeshViewState>,
    frame_sinks: Vec<FrameSender>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::from_state(self)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn job(&self) -> Option<&JobTrackerState> {
        self.job.as_ref()
    }

    pub(crate) fn job_mut(&mut self) -> Option<&mut JobTrackerState> {
        self.job.as_mut()
    }

    pub(crate) fn replace_job(&mut self, job: Option<JobTrackerState>) -> Option<JobTrackerState> {
        std::mem::replace(&mut self.job, job)
    }

    pub fn mesh(&self) -> Option<&MeshViewState> {
        self.mesh.as_ref()
    }

    pub(crate) fn mesh_mut(&mut self) -> Option<&mut MeshViewState> {
        self.mesh.as_mut()
    }

    pub(crate) fn replace_mesh(&mut self, mesh: Option<MeshViewState>) -> Option<MeshViewState> {
        std::mem::replace(&mut self.mesh, mesh)
    }

    pub(crate) fn frame_sinks(&self) -> &[FrameSender] {
        &self.frame_sinks
    }

    /// Subscribes to layout frames of the current and all future simulations.
    pub fn subscribe_frames(&mut self, sink: FrameSender) {
        if let Some(mesh) = self.mesh.as_mut() {
            mesh.attach_sink(sink.clone());
        }
        self.frame_sinks.push(sink);
    }

    /// Takes the latest mesh pulse not yet handed to the render surface.
    pub fn take_pulse(&mut self) -> Option<Pulse> {
        self.mesh.as_mut().and_then(MeshViewState::take_pulse)
    }

    /// Generation of the simulation currently driving the mesh view.
    pub fn layout_generation(&self) -> Option<u64> {
        self.mesh
            .as_ref()
            .and_then(MeshViewState::simulation)
            .map(Simulation::generation)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

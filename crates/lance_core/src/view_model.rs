use crate::event::{EventTone, MeshEvent};
use crate::job::{Deliverable, JobStatus, SubtaskView};
use crate::scene::Scene;
use crate::state::{JobTrackerState, MeshViewState};
use crate::topology::MeshHealth;
use crate::{AppState, LinkStatus, User};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub user: Option<User>,
    pub session_loading: bool,
    pub job: Option<JobView>,
    pub mesh: Option<MeshViewModel>,
}

impl AppViewModel {
    pub(crate) fn from_state(state: &AppState) -> Self {
        Self {
            user: state.session().user().cloned(),
            session_loading: state.session().is_loading(),
            job: state.job().map(JobView::from_tracker),
            mesh: state.mesh().map(MeshViewModel::from_mesh),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub label: String,
    pub timestamp: String,
    pub tone: EventTone,
    /// Only the newest row is marked, so the UI can emphasise it.
    pub is_latest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: String,
    pub title: Option<String>,
    pub link: LinkStatus,
    pub status: JobStatus,
    pub subtasks: Vec<SubtaskView>,
    pub deliverables: Vec<Deliverable>,
    pub timeline: Vec<TimelineRow>,
    pub error: Option<String>,
}

impl JobView {
    fn from_tracker(tracker: &JobTrackerState) -> Self {
        let timeline = tracker.timeline();
        let projection = timeline.project_job();
        let entries = timeline.log().entries();
        let rows = entries
            .iter()
            .enumerate()
            .map(|(index, event)| TimelineRow {
                label: event.kind.timeline_label(),
                timestamp: event.timestamp.clone(),
                tone: event.kind.tone(),
                is_latest: index + 1 == entries.len(),
            })
            .collect();
        Self {
            job_id: tracker.job_id().to_string(),
            title: timeline
                .job()
                .map(|job| job.title.clone())
                .filter(|title| !title.is_empty()),
            link: tracker.link(),
            status: projection.status,
            subtasks: projection.subtasks.clone(),
            deliverables: projection.deliverables.clone(),
            timeline: rows,
            error: tracker.last_error().map(ToOwned::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    /// Event type with underscores spaced out.
    pub heading: String,
    pub label: String,
    pub timestamp: String,
    pub tone: EventTone,
}

impl FeedRow {
    fn from_event(event: &MeshEvent) -> Self {
        Self {
            heading: event.kind.feed_label(),
            label: event.kind.timeline_label(),
            timestamp: event.timestamp.clone(),
            tone: event.kind.tone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshViewModel {
    pub link: LinkStatus,
    pub health: Option<MeshHealth>,
    pub node_count: usize,
    pub edge_count: usize,
    pub event_count: usize,
    /// Newest first.
    pub feed: Vec<FeedRow>,
    /// Resting-state scene; pulse intensity is applied by the render surface.
    pub scene: Option<Scene>,
    pub layout_active: bool,
    /// Width and height of the canvas the scene is laid out in.
    pub viewport: (f64, f64),
    pub zoom: f64,
    pub dragging: Option<String>,
    pub error: Option<String>,
}

impl MeshViewModel {
    fn from_mesh(mesh: &MeshViewState) -> Self {
        let simulation = mesh.simulation();
        Self {
            link: mesh.link(),
            health: mesh.health().cloned(),
            node_count: mesh.topology().nodes().len(),
            edge_count: mesh.topology().edges().len(),
            event_count: mesh.feed().log().len(),
            feed: mesh.feed().recent().map(FeedRow::from_event).collect(),
            scene: simulation.map(|sim| Scene::build(sim, mesh.transform(), 0.0)),
            layout_active: simulation.is_some_and(|sim| sim.is_running()),
            viewport: mesh.viewport(),
            zoom: mesh.transform().k,
            dragging: mesh.dragging().map(ToOwned::to_owned),
            error: mesh.last_error().map(ToOwned::to_owned),
        }
    }
}

use lance_logging::{lance_debug, lance_info, lance_warn};

use crate::layout::Point;
use crate::state::{JobTrackerState, MeshViewState};
use crate::{AppState, ChannelSubject, Effect, LinkStatus, Msg, ViewKind};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SessionStarted => {
            if state.session_mut().begin_loading() {
                state.mark_dirty();
                vec![Effect::FetchSession]
            } else {
                Vec::new()
            }
        }
        Msg::SessionLoaded(user) => {
            state.session_mut().loaded(user);
            state.mark_dirty();
            Vec::new()
        }
        Msg::LogoutClicked => match state.session_mut().logout() {
            Some(user) => {
                lance_info!("signing out {}", user.username);
                state.mark_dirty();
                vec![Effect::Logout]
            }
            None => Vec::new(),
        },
        Msg::JobViewOpened { job_id } => open_job_view(&mut state, job_id),
        Msg::JobFetched { seq, job } => {
            match state.job_mut() {
                Some(tracker) if tracker.job_id() == job.id => {
                    if tracker.timeline_mut().apply_job(seq, job) {
                        state.mark_dirty();
                    }
                }
                _ => lance_debug!("dropping job {} fetched after its view closed", job.id),
            }
            Vec::new()
        }
        Msg::JobFetchFailed { job_id, message } => {
            lance_warn!("fetching job {} failed: {}", job_id, message);
            if let Some(tracker) = state.job_mut().filter(|t| t.job_id() == job_id) {
                tracker.set_error(message);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::MeshViewOpened { width, height } => {
            if state.mesh().is_some() {
                let sinks = state.frame_sinks().to_vec();
                if let Some(mesh) = state.mesh_mut() {
                    mesh.resize(width, height, &sinks);
                }
                Vec::new()
            } else {
                state.replace_mesh(Some(MeshViewState::new(width, height)));
                state.mark_dirty();
                vec![
                    Effect::FetchTopology,
                    Effect::FetchHealth,
                    Effect::OpenChannel(ChannelSubject::Mesh),
                ]
            }
        }
        Msg::TopologyFetched(snapshot) => {
            let sinks = state.frame_sinks().to_vec();
            match state.mesh_mut() {
                Some(mesh) => {
                    mesh.load_topology(snapshot, &sinks);
                    state.mark_dirty();
                }
                None => lance_debug!("dropping topology fetched after the mesh view closed"),
            }
            Vec::new()
        }
        Msg::TopologyFetchFailed { message } => {
            lance_warn!("fetching topology failed: {}", message);
            if let Some(mesh) = state.mesh_mut() {
                mesh.set_error(message);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::HealthFetched(health) => {
            if let Some(mesh) = state.mesh_mut() {
                mesh.set_health(health);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ChannelOpened(subject) => {
            set_link(&mut state, &subject, LinkStatus::Live);
            Vec::new()
        }
        Msg::ChannelEvent { subject, event } => match subject {
            ChannelSubject::Job(job_id) => match state.job_mut() {
                Some(tracker) if tracker.job_id() == job_id => {
                    let timeline = tracker.timeline_mut();
                    let refresh = timeline.append(event).then(|| timeline.next_request());
                    state.mark_dirty();
                    if let Some(seq) = refresh {
                        vec![Effect::FetchJob { job_id, seq }]
                    } else {
                        Vec::new()
                    }
                }
                _ => {
                    lance_debug!("dropping event {} for closed job {}", event.kind.tag(), job_id);
                    Vec::new()
                }
            },
            ChannelSubject::Mesh => {
                match state.mesh_mut() {
                    Some(mesh) => {
                        mesh.apply_event(event);
                        state.mark_dirty();
                    }
                    None => lance_debug!("dropping mesh event {}", event.kind.tag()),
                }
                Vec::new()
            }
        },
        Msg::ChannelError { subject, message } => {
            lance_warn!("channel {} error: {}", subject, message);
            match subject {
                ChannelSubject::Job(ref job_id) => {
                    if let Some(tracker) = state.job_mut().filter(|t| t.job_id() == job_id) {
                        tracker.set_error(message);
                        state.mark_dirty();
                    }
                }
                ChannelSubject::Mesh => {
                    if let Some(mesh) = state.mesh_mut() {
                        mesh.set_error(message);
                        state.mark_dirty();
                    }
                }
            }
            Vec::new()
        }
        Msg::ChannelClosed(subject) => {
            set_link(&mut state, &subject, LinkStatus::Disconnected);
            Vec::new()
        }
        Msg::PointerDown { x, y } => {
            if state.mesh_mut().is_some_and(|m| m.pointer_down(Point::new(x, y))) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::PointerMoved { x, y } => {
            if state.mesh_mut().is_some_and(|m| m.pointer_moved(Point::new(x, y))) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::PointerUp => {
            if state.mesh_mut().is_some_and(|m| m.pointer_up()) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::Zoomed { factor, x, y } => {
            if let Some(mesh) = state.mesh_mut() {
                mesh.zoom(factor, Point::new(x, y));
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::Panned { dx, dy } => {
            if let Some(mesh) = state.mesh_mut() {
                mesh.pan(dx, dy);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::Resized { width, height } => {
            let sinks = state.frame_sinks().to_vec();
            if let Some(mesh) = state.mesh_mut() {
                mesh.resize(width, height, &sinks);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ViewClosed(ViewKind::JobTracker) => match state.replace_job(None) {
            Some(tracker) => {
                state.mark_dirty();
                vec![Effect::CloseChannel(tracker.subject())]
            }
            None => Vec::new(),
        },
        Msg::ViewClosed(ViewKind::Mesh) => match state.replace_mesh(None) {
            Some(mut mesh) => {
                mesh.teardown();
                state.mark_dirty();
                vec![Effect::CloseChannel(ChannelSubject::Mesh)]
            }
            None => Vec::new(),
        },
        Msg::Tick => {
            if state.mesh_mut().is_some_and(MeshViewState::tick) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn open_job_view(state: &mut AppState, job_id: String) -> Vec<Effect> {
    if state.job().is_some_and(|t| t.job_id() == job_id) {
        return Vec::new();
    }
    let mut effects = Vec::with_capacity(3);
    let mut tracker = JobTrackerState::new(&job_id);
    let seq = tracker.timeline_mut().next_request();
    if let Some(previous) = state.replace_job(Some(tracker)) {
        effects.push(Effect::CloseChannel(previous.subject()));
    }
    state.mark_dirty();
    effects.push(Effect::FetchJob {
        job_id: job_id.clone(),
        seq,
    });
    effects.push(Effect::OpenChannel(ChannelSubject::Job(job_id)));
    effects
}

fn set_link(state: &mut AppState, subject: &ChannelSubject, link: LinkStatus) {
    match subject {
        ChannelSubject::Job(job_id) => {
            if let Some(tracker) = state.job_mut().filter(|t| t.job_id() == job_id) {
                tracker.set_link(link);
                state.mark_dirty();
            }
        }
        ChannelSubject::Mesh => {
            if let Some(mesh) = state.mesh_mut() {
                mesh.set_link(link);
                state.mark_dirty();
            }
        }
    }
}

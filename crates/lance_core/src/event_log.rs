use lance_logging::lance_debug;

use crate::event::{EventKind, MeshEvent};
use crate::job::{Job, JobProjection, JobStatus};

/// Append-only record of the events received on one subscription, in arrival
/// order. Entries are never reordered, deduplicated or removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventLog {
    entries: Vec<MeshEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns its position in the log.
    pub fn append(&mut self, event: MeshEvent) -> usize {
        self.entries.push(event);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MeshEvent] {
        &self.entries
    }

    pub fn last(&self) -> Option<&MeshEvent> {
        self.entries.last()
    }
}

/// Event log of one job plus the projection derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTimeline {
    job_id: String,
    log: EventLog,
    base: Option<Job>,
    projection: JobProjection,
    /// First terminal status reached; later fetches cannot undo it.
    terminal: Option<JobStatus>,
    requested: u64,
    applied: u64,
}

impl JobTimeline {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            log: EventLog::new(),
            base: None,
            projection: JobProjection::default(),
            terminal: None,
            requested: 0,
            applied: 0,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// The last job resource fetched from the server, if any.
    pub fn job(&self) -> Option<&Job> {
        self.base.as_ref()
    }

    /// Appends an event and folds it into the projection. Returns true when
    /// the event calls for a fresh fetch of the job resource.
    pub fn append(&mut self, event: MeshEvent) -> bool {
        let refresh = event.kind.triggers_job_refresh();
        self.projection.apply(&event);
        self.log.append(event);
        self.latch_terminal();
        refresh
    }

    /// Replaces the authoritative job resource and recomputes the projection
    /// from it and the full log.
    /// Numbers the next fetch of the job resource. Responses are applied
    /// only in request order.
    pub fn next_request(&mut self) -> u64 {
        self.requested += 1;
        self.requested
    }

    /// Takes a fetched job as the new base unless a later request was
    /// already applied. Returns false for a dropped response.
    pub fn apply_job(&mut self, seq: u64, job: Job) -> bool {
        if seq <= self.applied {
            lance_debug!(
                "job {}: ignoring response {} older than {}",
                self.job_id,
                seq,
                self.applied
            );
            return false;
        }
        self.applied = seq;
        self.projection = JobProjection::fold(Some(&job), self.log.entries());
        self.base = Some(job);
        if let Some(terminal) = self.terminal {
            if self.projection.status != terminal {
                lance_debug!(
                    "job {}: keeping terminal status {:?} over fetched {:?}",
                    self.job_id,
                    terminal,
                    self.projection.status
                );
                self.projection.status = terminal;
            }
        }
        self.latch_terminal();
        true
    }

    pub fn project_job(&self) -> &JobProjection {
        &self.projection
    }

    fn latch_terminal(&mut self) {
        if self.terminal.is_none() && self.projection.status.is_terminal() {
            self.terminal = Some(self.projection.status);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    SubtaskStarted,
    Handoff,
}

/// Transient highlight signal for the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulse {
    pub kind: PulseKind,
    /// Position of the triggering event in the mesh log.
    pub sequence: usize,
    pub source_agent_id: Option<String>,
    pub target_agent_id: Option<String>,
}

/// Number of most recent events the mesh feed shows.
pub const FEED_DISPLAY_LIMIT: usize = 100;

/// Mesh-wide event log with the pending pulse for the next frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshFeed {
    log: EventLog,
    pending_pulse: Option<Pulse>,
}

impl MeshFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Pulse-worthy events replace any pulse not yet taken.
    pub fn append(&mut self, event: MeshEvent) {
        let kind = match event.kind {
            EventKind::SubtaskStarted { .. } => Some(PulseKind::SubtaskStarted),
            EventKind::Handoff { .. } => Some(PulseKind::Handoff),
            _ => None,
        };
        let source_agent_id = event
            .source_agent_id
            .clone()
            .or_else(|| event.agent_id.clone());
        let target_agent_id = event.target_agent_id.clone();
        let sequence = self.log.append(event);
        if let Some(kind) = kind {
            self.pending_pulse = Some(Pulse {
                kind,
                sequence,
                source_agent_id,
                target_agent_id,
            });
        }
    }

    /// Takes the most recent pulse since the last call, if any.
    pub fn take_pulse(&mut self) -> Option<Pulse> {
        self.pending_pulse.take()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Most recent events first, capped at [`FEED_DISPLAY_LIMIT`].
    pub fn recent(&self) -> impl Iterator<Item = &MeshEvent> {
        self.log
            .entries()
            .iter()
            .rev()
            .take(FEED_DISPLAY_LIMIT)
    }
}

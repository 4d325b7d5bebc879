//! Live mesh events as they arrive on the job and mesh channels.
//!
//! Frames are decoded leniently: only the `type` tag is required. Payload
//! fields that are missing or of the wrong shape fall back to empty values so
//! that a single odd frame still lands in the timeline.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::topology::NodeStatus;

/// A subtask announced by a `job_decomposed` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct PlannedSubtask {
    pub title: String,
    pub skill: String,
}

/// Typed payload of a mesh event, one variant per wire `type` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    JobCreated {
        title: String,
        skills: Vec<String>,
    },
    JobDecomposed {
        subtask_count: Option<u32>,
        subtasks: Vec<PlannedSubtask>,
    },
    SubtaskAssigned {
        skill: String,
        agent_name: String,
    },
    SubtaskStarted {
        title: String,
    },
    SubtaskCompleted {
        title: String,
        deliverable_type: String,
    },
    SubtaskFailed {
        title: String,
        error: Option<String>,
    },
    Handoff {
        source_name: String,
        target_name: String,
    },
    JobCompleted {
        deliverables_count: Option<u32>,
    },
    JobFailed {
        error: Option<String>,
        failed_subtasks: Vec<String>,
    },
    AgentRegistered {
        name: Option<String>,
    },
    AgentStatusChanged {
        status: Option<NodeStatus>,
    },
    /// A tag this client does not know about; kept verbatim.
    Other(String),
}

/// Coarse visual category for a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTone {
    Info,
    Assigned,
    Running,
    Success,
    Failure,
    Transfer,
}

impl EventKind {
    /// The wire `type` string for this event.
    pub fn tag(&self) -> &str {
        match self {
            EventKind::JobCreated { .. } => "job_created",
            EventKind::JobDecomposed { .. } => "job_decomposed",
            EventKind::SubtaskAssigned { .. } => "subtask_assigned",
            EventKind::SubtaskStarted { .. } => "subtask_started",
            EventKind::SubtaskCompleted { .. } => "subtask_completed",
            EventKind::SubtaskFailed { .. } => "subtask_failed",
            EventKind::Handoff { .. } => "handoff",
            EventKind::JobCompleted { .. } => "job_completed",
            EventKind::JobFailed { .. } => "job_failed",
            EventKind::AgentRegistered { .. } => "agent_registered",
            EventKind::AgentStatusChanged { .. } => "agent_status_changed",
            EventKind::Other(tag) => tag,
        }
    }

    /// Human readable label used by the job timeline.
    pub fn timeline_label(&self) -> String {
        match self {
            EventKind::JobCreated { title, .. } => format!("Job created: {title}"),
            EventKind::JobDecomposed {
                subtask_count,
                subtasks,
            } => {
                let count = subtask_count.unwrap_or(subtasks.len() as u32);
                format!("Decomposed into {count} subtasks")
            }
            EventKind::SubtaskAssigned { skill, agent_name } => {
                format!("{agent_name} assigned: {skill}")
            }
            EventKind::SubtaskStarted { title } => format!("{title} started"),
            EventKind::SubtaskCompleted {
                title,
                deliverable_type,
            } => format!("{title} completed ({deliverable_type})"),
            EventKind::SubtaskFailed { title, error } => {
                let error = non_empty(error.as_deref()).unwrap_or("unknown");
                format!("{title} failed: {error}")
            }
            EventKind::Handoff {
                source_name,
                target_name,
            } => format!("Handoff: {source_name} → {target_name}"),
            EventKind::JobCompleted { deliverables_count } => format!(
                "Job completed! {} deliverables",
                deliverables_count.unwrap_or(0)
            ),
            EventKind::JobFailed {
                error,
                failed_subtasks,
            } => match non_empty(error.as_deref()) {
                Some(error) => format!("Job failed: {error}"),
                None => format!(
                    "Job failed: {}",
                    serde_json::to_string(failed_subtasks).unwrap_or_default()
                ),
            },
            EventKind::AgentRegistered { name } => match non_empty(name.as_deref()) {
                Some(name) => format!("Agent registered: {name}"),
                None => "Agent registered".to_string(),
            },
            EventKind::AgentStatusChanged { status } => match status {
                Some(status) => format!("Agent is now {}", status.as_str()),
                None => "Agent status changed".to_string(),
            },
            EventKind::Other(tag) => tag.clone(),
        }
    }

    /// Label used by the mesh event feed: the tag with underscores spaced out.
    pub fn feed_label(&self) -> String {
        self.tag().replace('_', " ")
    }

    pub fn tone(&self) -> EventTone {
        match self {
            EventKind::JobCreated { .. }
            | EventKind::AgentRegistered { .. }
            | EventKind::AgentStatusChanged { .. }
            | EventKind::Other(_) => EventTone::Info,
            EventKind::SubtaskAssigned { .. } => EventTone::Assigned,
            EventKind::SubtaskStarted { .. } => EventTone::Running,
            EventKind::SubtaskCompleted { .. } | EventKind::JobCompleted { .. } => {
                EventTone::Success
            }
            EventKind::SubtaskFailed { .. } | EventKind::JobFailed { .. } => EventTone::Failure,
            EventKind::JobDecomposed { .. } | EventKind::Handoff { .. } => EventTone::Transfer,
        }
    }

    /// Whether the mesh view should flash its edges for this event.
    pub fn is_pulse(&self) -> bool {
        matches!(
            self,
            EventKind::SubtaskStarted { .. } | EventKind::Handoff { .. }
        )
    }

    /// Whether the authoritative job resource should be fetched again.
    pub fn triggers_job_refresh(&self) -> bool {
        matches!(
            self,
            EventKind::JobCompleted { .. }
                | EventKind::JobFailed { .. }
                | EventKind::SubtaskCompleted { .. }
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// One decoded frame from a live channel. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEvent {
    pub id: Option<String>,
    pub kind: EventKind,
    /// ISO-8601 timestamp exactly as sent by the server.
    pub timestamp: String,
    pub job_id: Option<String>,
    pub agent_id: Option<String>,
    pub subtask_id: Option<String>,
    pub source_agent_id: Option<String>,
    pub target_agent_id: Option<String>,
    pub data: Value,
}

impl MeshEvent {
    /// Builds an event with no envelope metadata, mostly useful in tests.
    pub fn new(kind: EventKind, timestamp: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            timestamp: timestamp.into(),
            job_id: None,
            agent_id: None,
            subtask_id: None,
            source_agent_id: None,
            target_agent_id: None,
            data: Value::Null,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a mesh event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame has an empty type tag")]
    EmptyType,
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    subtask_id: Option<String>,
    #[serde(default)]
    source_agent_id: Option<String>,
    #[serde(default)]
    target_agent_id: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JobCreatedData {
    title: String,
    skills: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JobDecomposedData {
    subtask_count: Option<u32>,
    subtasks: Vec<PlannedSubtask>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AssignedData {
    skill: String,
    agent_name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SubtaskData {
    title: String,
    deliverable_type: String,
    error: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct HandoffData {
    source_name: String,
    target_name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JobOutcomeData {
    deliverables_count: Option<u32>,
    error: Option<String>,
    failed_subtasks: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AgentData {
    name: Option<String>,
    status: Option<String>,
}

fn payload<T: DeserializeOwned + Default>(data: &Value) -> T {
    if data.is_object() {
        serde_json::from_value(data.clone()).unwrap_or_default()
    } else {
        T::default()
    }
}

fn kind_from_wire(tag: String, data: &Value) -> EventKind {
    match tag.as_str() {
        "job_created" => {
            let d: JobCreatedData = payload(data);
            EventKind::JobCreated {
                title: d.title,
                skills: d.skills,
            }
        }
        "job_decomposed" => {
            let d: JobDecomposedData = payload(data);
            EventKind::JobDecomposed {
                subtask_count: d.subtask_count,
                subtasks: d.subtasks,
            }
        }
        "subtask_assigned" => {
            let d: AssignedData = payload(data);
            EventKind::SubtaskAssigned {
                skill: d.skill,
                agent_name: d.agent_name,
            }
        }
        "subtask_started" => {
            let d: SubtaskData = payload(data);
            EventKind::SubtaskStarted { title: d.title }
        }
        "subtask_completed" => {
            let d: SubtaskData = payload(data);
            EventKind::SubtaskCompleted {
                title: d.title,
                deliverable_type: d.deliverable_type,
            }
        }
        "subtask_failed" => {
            let d: SubtaskData = payload(data);
            EventKind::SubtaskFailed {
                title: d.title,
                error: d.error,
            }
        }
        "handoff" => {
            let d: HandoffData = payload(data);
            EventKind::Handoff {
                source_name: d.source_name,
                target_name: d.target_name,
            }
        }
        "job_completed" => {
            let d: JobOutcomeData = payload(data);
            EventKind::JobCompleted {
                deliverables_count: d.deliverables_count,
            }
        }
        "job_failed" => {
            let d: JobOutcomeData = payload(data);
            EventKind::JobFailed {
                error: d.error,
                failed_subtasks: d.failed_subtasks,
            }
        }
        "agent_registered" => {
            let d: AgentData = payload(data);
            EventKind::AgentRegistered { name: d.name }
        }
        "agent_status_changed" => {
            let d: AgentData = payload(data);
            EventKind::AgentStatusChanged {
                status: d.status.as_deref().and_then(NodeStatus::parse),
            }
        }
        _ => EventKind::Other(tag),
    }
}

/// Decodes one text frame from a live channel.
pub fn decode_frame(text: &str) -> Result<MeshEvent, DecodeError> {
    let wire: WireEvent = serde_json::from_str(text)?;
    if wire.kind.is_empty() {
        return Err(DecodeError::EmptyType);
    }
    let kind = kind_from_wire(wire.kind, &wire.data);
    Ok(MeshEvent {
        id: wire.id,
        kind,
        timestamp: wire.timestamp.unwrap_or_default(),
        job_id: wire.job_id,
        agent_id: wire.agent_id,
        subtask_id: wire.subtask_id,
        source_agent_id: wire.source_agent_id,
        target_agent_id: wire.target_agent_id,
        data: wire.data,
    })
}

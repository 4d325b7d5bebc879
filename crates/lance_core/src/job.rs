//! Job resource as served by `/api/jobs/{id}` and the projection folded from
//! the job's event log.

use serde::Deserialize;

use crate::event::{EventKind, MeshEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Decomposing,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Ordering used to keep status monotonic; terminal states share the top rank.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Decomposing => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Decomposing => "decomposing",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    #[default]
    Pending,
    WaitingDependency,
    InProgress,
    Completed,
    Failed,
}

impl SubtaskStatus {
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::WaitingDependency => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::WaitingDependency => "waiting dependency",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub required_skill: String,
    pub status: SubtaskStatus,
    pub assigned_agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Deliverable {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub description: String,
    pub client_name: String,
    pub status: JobStatus,
    pub subtasks: Vec<Subtask>,
    pub deliverables: Vec<Deliverable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskView {
    pub id: Option<String>,
    pub title: String,
    pub skill: String,
    pub status: SubtaskStatus,
    pub agent_name: Option<String>,
}

impl SubtaskView {
    fn from_subtask(subtask: &Subtask) -> Self {
        Self {
            id: Some(subtask.id.clone()).filter(|id| !id.is_empty()),
            title: subtask.title.clone(),
            skill: subtask.required_skill.clone(),
            status: subtask.status,
            agent_name: None,
        }
    }

    fn advance(&mut self, next: SubtaskStatus) {
        if next.rank() > self.status.rank() {
            self.status = next;
        }
    }
}

/// Current state of a job: the last fetched resource advanced by its events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobProjection {
    pub status: JobStatus,
    pub subtasks: Vec<SubtaskView>,
    pub deliverables: Vec<Deliverable>,
}

impl JobProjection {
    pub fn from_job(job: &Job) -> Self {
        Self {
            status: job.status,
            subtasks: job.subtasks.iter().map(SubtaskView::from_subtask).collect(),
            deliverables: job.deliverables.clone(),
        }
    }

    /// Folds `events` in order on top of `base`.
    pub fn fold<'a>(base: Option<&Job>, events: impl IntoIterator<Item = &'a MeshEvent>) -> Self {
        let mut projection = base.map(Self::from_job).unwrap_or_default();
        for event in events {
            projection.apply(event);
        }
        projection
    }

    /// Status only moves forward; once terminal it never changes.
    pub fn advance_status(&mut self, next: JobStatus) {
        if self.status.is_terminal() {
            return;
        }
        if next.rank() > self.status.rank() {
            self.status = next;
        }
    }

    pub fn apply(&mut self, event: &MeshEvent) {
        let subtask_id = event.subtask_id.as_deref();
        match &event.kind {
            EventKind::JobDecomposed { subtasks, .. } => {
                self.advance_status(JobStatus::InProgress);
                if self.subtasks.is_empty() {
                    self.subtasks = subtasks
                        .iter()
                        .map(|planned| SubtaskView {
                            id: None,
                            title: planned.title.clone(),
                            skill: planned.skill.clone(),
                            status: SubtaskStatus::Pending,
                            agent_name: None,
                        })
                        .collect();
                }
            }
            EventKind::SubtaskAssigned { skill, agent_name } => {
                let index = self
                    .find_subtask(subtask_id, None)
                    .or_else(|| self.first_unassigned(skill));
                let view = self.subtask_entry(index, subtask_id, "", skill);
                if !agent_name.is_empty() {
                    view.agent_name = Some(agent_name.clone());
                }
            }
            EventKind::SubtaskStarted { title } => {
                self.advance_status(JobStatus::InProgress);
                let index = self.find_subtask(subtask_id, Some(title.as_str()));
                self.subtask_entry(index, subtask_id, title, "")
                    .advance(SubtaskStatus::InProgress);
            }
            EventKind::SubtaskCompleted { title, .. } => {
                let index = self.find_subtask(subtask_id, Some(title.as_str()));
                self.subtask_entry(index, subtask_id, title, "")
                    .advance(SubtaskStatus::Completed);
            }
            EventKind::SubtaskFailed { title, .. } => {
                let index = self.find_subtask(subtask_id, Some(title.as_str()));
                self.subtask_entry(index, subtask_id, title, "")
                    .advance(SubtaskStatus::Failed);
            }
            EventKind::JobCompleted { .. } => self.advance_status(JobStatus::Completed),
            EventKind::JobFailed { .. } => self.advance_status(JobStatus::Failed),
            EventKind::JobCreated { .. }
            | EventKind::Handoff { .. }
            | EventKind::AgentRegistered { .. }
            | EventKind::AgentStatusChanged { .. }
            | EventKind::Other(_) => {}
        }
    }

    fn find_subtask(&self, id: Option<&str>, title: Option<&str>) -> Option<usize> {
        if let Some(id) = id {
            if let Some(index) = self
                .subtasks
                .iter()
                .position(|st| st.id.as_deref() == Some(id))
            {
                return Some(index);
            }
        }
        let title = title.filter(|t| !t.is_empty())?;
        self.subtasks
            .iter()
            .position(|st| st.title == title && (st.id.is_none() || id.is_none()))
    }

    fn first_unassigned(&self, skill: &str) -> Option<usize> {
        self.subtasks
            .iter()
            .position(|st| st.id.is_none() && st.agent_name.is_none() && st.skill == skill)
    }

    /// Returns the subtask at `index`, adopting the event's id and title when
    /// the projection lacked them, or appends a new entry.
    fn subtask_entry(
        &mut self,
        index: Option<usize>,
        id: Option<&str>,
        title: &str,
        skill: &str,
    ) -> &mut SubtaskView {
        let index = match index {
            Some(index) => index,
            None => {
                self.subtasks.push(SubtaskView {
                    id: None,
                    title: String::new(),
                    skill: String::new(),
                    status: SubtaskStatus::Pending,
                    agent_name: None,
                });
                self.subtasks.len() - 1
            }
        };
        let view = &mut self.subtasks[index];
        if view.id.is_none() {
            view.id = id.map(ToOwned::to_owned);
        }
        if view.title.is_empty() && !title.is_empty() {
            view.title = title.to_string();
        }
        if view.skill.is_empty() && !skill.is_empty() {
            view.skill = skill.to_string();
        }
        view
    }
}

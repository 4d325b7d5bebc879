use std::fmt;

use lance_core::{ChannelSubject, Job, MeshEvent, MeshHealth, TopologySnapshot, User};

/// Results reported back from the engine thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionFetched(Result<Option<User>, ApiError>),
    LoggedOut(Result<(), ApiError>),
    JobFetched {
        job_id: String,
        seq: u64,
        result: Result<Job, ApiError>,
    },
    TopologyFetched(Result<TopologySnapshot, ApiError>),
    HealthFetched(Result<MeshHealth, ApiError>),
    Channel {
        subject: ChannelSubject,
        event: ChannelEvent,
    },
}

/// Lifecycle and data signals of one live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Frame(MeshEvent),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "invalid response body"),
        }
    }
}

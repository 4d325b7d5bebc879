use std::fmt;

/// Which live stream a connection is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelSubject {
    /// Events of a single job.
    Job(String),
    /// Every event in the mesh.
    Mesh,
}

impl ChannelSubject {
    /// Path of the WebSocket endpoint, relative to the host.
    pub fn path(&self) -> String {
        match self {
            ChannelSubject::Job(job_id) => format!("/ws/jobs/{job_id}"),
            ChannelSubject::Mesh => "/ws/mesh".to_string(),
        }
    }
}

impl fmt::Display for ChannelSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSubject::Job(job_id) => write!(f, "job:{job_id}"),
            ChannelSubject::Mesh => write!(f, "mesh"),
        }
    }
}

/// Connection status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Connecting,
    Live,
    Disconnected,
}

impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Connecting => "Connecting",
            LinkStatus::Live => "Live",
            LinkStatus::Disconnected => "Disconnected",
        }
    }
}

use crate::ChannelSubject;

/// IO requested by [`crate::update`], executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchSession,
    Logout,
    /// `seq` orders responses; see [`crate::JobTimeline::next_request`].
    FetchJob { job_id: String, seq: u64 },
    FetchTopology,
    FetchHealth,
    OpenChannel(ChannelSubject),
    CloseChannel(ChannelSubject),
}

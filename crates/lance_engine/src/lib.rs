//! AgentLance engine: live channels, REST collaborators and effect execution.
pub mod channel;
mod engine;
pub mod rest;
mod settings;
mod types;

pub use channel::{channel_url, ChannelError, ChannelSink, ChannelState, Connection, LiveChannel};
pub use engine::EngineHandle;
pub use rest::{MeshApi, ReqwestMeshApi};
pub use settings::ClientSettings;
pub use types::{ApiError, ChannelEvent, EngineEvent, FailureKind};

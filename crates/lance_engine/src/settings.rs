use std::time::Duration;

/// Where the backend lives and how patient to be with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// HTTP origin of the backend; live channels use the matching ws origin.
    pub base_url: String,
    pub keepalive_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

use lance_core::{Job, MeshHealth, TopologySnapshot, User};
use lance_logging::lance_debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{ApiError, ClientSettings, FailureKind};

/// Snapshot and bootstrap reads against the backend. Fetched once per view
/// activation and on refresh triggers, never polled.
#[async_trait::async_trait]
pub trait MeshApi: Send + Sync {
    async fn topology(&self) -> Result<TopologySnapshot, ApiError>;

    async fn health(&self) -> Result<MeshHealth, ApiError>;

    async fn job(&self, job_id: &str) -> Result<Job, ApiError>;

    /// The signed-in user, or `None` when the session is not authenticated.
    async fn current_user(&self) -> Result<Option<User>, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestMeshApi {
    settings: ClientSettings,
}

impl ReqwestMeshApi {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        let raw = format!("{}{}", self.settings.base_url.trim_end_matches('/'), path);
        reqwest::Url::parse(&raw).map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        lance_debug!("GET {}", url);
        self.build_client()?
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = check_status(self.get(path).await?)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl MeshApi for ReqwestMeshApi {
    async fn topology(&self) -> Result<TopologySnapshot, ApiError> {
        self.get_json("/api/mesh/topology").await
    }

    async fn health(&self) -> Result<MeshHealth, ApiError> {
        self.get_json("/api/mesh/health").await
    }

    async fn job(&self, job_id: &str) -> Result<Job, ApiError> {
        self.get_json(&format!("/api/jobs/{job_id}")).await
    }

    async fn current_user(&self) -> Result<Option<User>, ApiError> {
        let response = self.get("/users/me/").await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        let response = check_status(response)?;
        read_json(response).await.map(Some)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let url = self.endpoint("/logout")?;
        lance_debug!("POST {}", url);
        let response = self
            .build_client()?
            .post(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).map(|_| ())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}

//! Remote project API collaborator.
//!
//! The orchestration core only needs four opaque operations against the
//! remote account: translate the local source tree into project nodes,
//! upload, deploy, and fetch project status. They are expressed as the
//! [`ProjectApi`] trait so the dev session can be driven by the HTTP client
//! in production and by fakes in tests.

use async_trait::async_trait;
use hs_core::{Build, DeployStatus, Environment, ProjectData, ProjectNodes};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Outcome of an upload as reported by the remote API. Deploy information is
/// present only when auto-deploy ran for the produced build.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub build: Build,
    pub deploy_status: Option<DeployStatus>,
}

#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// Translate the local source tree into the intermediate representation.
    async fn translate_project(
        &self,
        account_id: u64,
        src_dir: &Path,
        platform_version: &str,
    ) -> Result<ProjectNodes, ApiError>;

    /// Upload the project source and wait for the resulting build.
    async fn upload_project(
        &self,
        account_id: u64,
        project_name: &str,
        src_dir: &Path,
    ) -> Result<UploadOutcome, ApiError>;

    /// Promote an existing build; returns the deploy id.
    async fn deploy_build(
        &self,
        account_id: u64,
        project_name: &str,
        build_id: u64,
        force: bool,
    ) -> Result<u64, ApiError>;

    /// Fetch the remote view of the project (latest/deployed builds).
    async fn fetch_project_status(
        &self,
        account_id: u64,
        project_name: &str,
    ) -> Result<ProjectData, ApiError>;
}

/// HTTP implementation of [`ProjectApi`].
pub struct HttpProjectApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    build: Build,
    #[serde(default)]
    deploy_status: Option<DeployStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployResponse {
    deploy_id: u64,
}

impl HttpProjectApi {
    pub fn new(env: Environment) -> Result<Self, ApiError> {
        Self::with_base_url(env.api_host())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn check(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            operation,
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ProjectApi for HttpProjectApi {
    async fn translate_project(
        &self,
        account_id: u64,
        src_dir: &Path,
        platform_version: &str,
    ) -> Result<ProjectNodes, ApiError> {
        let url = format!(
            "{}/developer/projects/v1/{}/translate",
            self.base_url, account_id
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "srcDir": src_dir,
                "platformVersion": platform_version,
            }))
            .send()
            .await?;
        let response = Self::check(response, "translate").await?;
        Ok(response.json().await?)
    }

    async fn upload_project(
        &self,
        account_id: u64,
        project_name: &str,
        src_dir: &Path,
    ) -> Result<UploadOutcome, ApiError> {
        let url = format!(
            "{}/developer/projects/v1/{}/{}/upload",
            self.base_url, account_id, project_name
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({ "srcDir": src_dir }))
            .send()
            .await?;
        let response = Self::check(response, "upload").await?;
        let parsed: UploadResponse = response.json().await?;
        Ok(UploadOutcome {
            build: parsed.build,
            deploy_status: parsed.deploy_status,
        })
    }

    async fn deploy_build(
        &self,
        account_id: u64,
        project_name: &str,
        build_id: u64,
        force: bool,
    ) -> Result<u64, ApiError> {
        let url = format!(
            "{}/developer/projects/v1/{}/{}/deploys",
            self.base_url, account_id, project_name
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({ "buildId": build_id, "force": force }))
            .send()
            .await?;
        let response = Self::check(response, "deploy").await?;
        let parsed: DeployResponse = response.json().await?;
        Ok(parsed.deploy_id)
    }

    async fn fetch_project_status(
        &self,
        account_id: u64,
        project_name: &str,
    ) -> Result<ProjectData, ApiError> {
        let url = format!(
            "{}/developer/projects/v1/{}/{}",
            self.base_url, account_id, project_name
        );
        let response = self.client.get(&url).send().await?;
        let response = Self::check(response, "fetch status").await?;
        Ok(response.json().await?)
    }
}

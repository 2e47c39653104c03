//! Project domain types.
//!
//! A project is translated from the local source tree into a set of
//! [`ProjectNode`]s keyed by a stable `uid`. Translation replaces the node
//! map wholesale; a uid that was present before a translation and absent
//! afterwards means the component was removed locally.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// HubSpot environment a session targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Qa,
}

impl Environment {
    pub fn api_host(&self) -> &'static str {
        match self {
            Environment::Prod => "https://api.hubapi.com",
            Environment::Qa => "https://api.hubapiqa.com",
        }
    }
}

/// Per-session project configuration, loaded once from `hsproject.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    pub src_dir: PathBuf,
    pub platform_version: String,
}

/// Kind of deployable component a project node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    App,
    UiExtension,
    PrivateApp,
    PublicApp,
}

/// Local-development bookkeeping attached to every project node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDevNodeInfo {
    pub component_root: PathBuf,
    pub component_config_path: PathBuf,
    #[serde(default)]
    pub config_updated_since_last_upload: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub parsing_errors: Vec<String>,
}

/// One deployable unit (app, UI extension, function) in the translated
/// intermediate representation of the local source tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub uid: String,
    pub component_type: ComponentType,
    pub local_dev: LocalDevNodeInfo,
    #[serde(default)]
    pub component_deps: BTreeMap<String, String>,
    /// Component-specific configuration, opaque to the orchestration core.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Node map produced by a translation, keyed by uid.
pub type ProjectNodes = BTreeMap<String, ProjectNode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Success,
    Failure,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployStatus {
    Success,
    Failure,
    Pending,
}

/// Server-side compiled artifact of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub build_id: u64,
    pub status: BuildStatus,
    /// Deploy triggered automatically by the build, when auto-deploy is on.
    #[serde(default)]
    pub auto_deploy_id: Option<u64>,
    /// Uids of the components included in this build.
    #[serde(default)]
    pub component_uids: Vec<String>,
}

/// Remote-side view of the project: identity plus latest/deployed builds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub project_id: u64,
    #[serde(default)]
    pub latest_build: Option<Build>,
    #[serde(default)]
    pub deployed_build: Option<Build>,
}

/// Install/auth status for one app component on the testing account.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstallData {
    pub installed: bool,
    #[serde(default)]
    pub auth_url: Option<String>,
}

/// Outcome of an upload. Upload, build, and deploy are independent: a build
/// can succeed while auto-deploy is disabled or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub upload_success: bool,
    pub build_success: bool,
    pub deploy_success: bool,
    #[serde(default)]
    pub deploy_id: Option<u64>,
}

/// Outcome of deploying an existing build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub success: bool,
    #[serde(default)]
    pub deploy_id: Option<u64>,
}

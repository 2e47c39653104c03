//! Shared fakes and fixtures for local dev tests.

use async_trait::async_trait;
use hs_core::{
    Build, BuildStatus, ComponentType, DeployStatus, Environment, LocalDevNodeInfo,
    ProjectConfig, ProjectData, ProjectNode, ProjectNodes,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::api::{ApiError, ProjectApi, UploadOutcome};
use crate::local_dev::dev_server::{
    DevServerError, DevServerInterface, DevServerManager, FileChangeEvent,
};
use crate::local_dev::logger::{CollectingSink, LocalDevLogger};
use crate::local_dev::ports::LocalPortManager;
use crate::local_dev::process::LocalDevProcess;
use crate::local_dev::state::{LocalDevState, LocalDevStateInit};
use crate::paths;

pub(crate) fn sample_node(uid: &str) -> ProjectNode {
    ProjectNode {
        uid: uid.to_string(),
        component_type: ComponentType::UiExtension,
        local_dev: LocalDevNodeInfo::default(),
        component_deps: BTreeMap::new(),
        config: serde_json::Value::Null,
    }
}

pub(crate) fn sample_nodes(uids: &[&str]) -> ProjectNodes {
    uids.iter()
        .map(|uid| (uid.to_string(), sample_node(uid)))
        .collect()
}

/// Project data with a successful deployed build covering the given uids.
pub(crate) fn deployed_project_data(component_uids: &[&str]) -> ProjectData {
    ProjectData {
        project_id: 9,
        latest_build: None,
        deployed_build: Some(Build {
            build_id: 1,
            status: BuildStatus::Success,
            auto_deploy_id: None,
            component_uids: component_uids.iter().map(|u| u.to_string()).collect(),
        }),
    }
}

/// In-memory [`ProjectApi`] with call counters and scriptable outcomes.
pub(crate) struct FakeProjectApi {
    nodes: Mutex<ProjectNodes>,
    build_succeeds: AtomicBool,
    upload_delay_ms: AtomicU64,
    translate_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    deploy_calls: AtomicUsize,
}

impl FakeProjectApi {
    pub(crate) fn new(nodes: ProjectNodes) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            build_succeeds: AtomicBool::new(true),
            upload_delay_ms: AtomicU64::new(0),
            translate_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            deploy_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_nodes(&self, nodes: ProjectNodes) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub(crate) fn fail_build(&self) {
        self.build_succeeds.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_upload_delay_ms(&self, millis: u64) {
        self.upload_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub(crate) fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn deploy_calls(&self) -> usize {
        self.deploy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectApi for FakeProjectApi {
    async fn translate_project(
        &self,
        _account_id: u64,
        _src_dir: &Path,
        _platform_version: &str,
    ) -> Result<ProjectNodes, ApiError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn upload_project(
        &self,
        _account_id: u64,
        _project_name: &str,
        _src_dir: &Path,
    ) -> Result<UploadOutcome, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.build_succeeds.load(Ordering::SeqCst) {
            Ok(UploadOutcome {
                build: Build {
                    build_id: 2,
                    status: BuildStatus::Success,
                    auto_deploy_id: Some(77),
                    component_uids: Vec::new(),
                },
                deploy_status: Some(DeployStatus::Success),
            })
        } else {
            Ok(UploadOutcome {
                build: Build {
                    build_id: 2,
                    status: BuildStatus::Failure,
                    auto_deploy_id: None,
                    component_uids: Vec::new(),
                },
                deploy_status: None,
            })
        }
    }

    async fn deploy_build(
        &self,
        _account_id: u64,
        _project_name: &str,
        _build_id: u64,
        _force: bool,
    ) -> Result<u64, ApiError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(901)
    }

    async fn fetch_project_status(
        &self,
        _account_id: u64,
        _project_name: &str,
    ) -> Result<ProjectData, ApiError> {
        Ok(ProjectData::default())
    }
}

/// Dev server whose `file_change` failures can be toggled at runtime.
struct ToggleFailServer {
    fail_file_changes: Arc<AtomicBool>,
}

#[async_trait]
impl DevServerInterface for ToggleFailServer {
    fn name(&self) -> &str {
        "toggle-fail"
    }

    async fn file_change(
        &self,
        _path: &Path,
        _event: FileChangeEvent,
    ) -> Result<(), DevServerError> {
        if self.fail_file_changes.load(Ordering::SeqCst) {
            return Err(DevServerError::interface(
                "toggle-fail",
                "file change rejected",
            ));
        }
        Ok(())
    }
}

pub(crate) const FIXTURE_PROJECT_NAME: &str = "test-project";

/// A fully wired [`LocalDevProcess`] over fakes and a temp project dir.
pub(crate) struct ProcessFixture {
    pub(crate) process: Arc<LocalDevProcess>,
    pub(crate) api: Arc<FakeProjectApi>,
    pub(crate) sink: Arc<CollectingSink>,
    fail_file_changes: Arc<AtomicBool>,
    _dir: TempDir,
}

impl ProcessFixture {
    pub(crate) fn new(project_data: ProjectData, nodes: ProjectNodes) -> Self {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig {
            name: FIXTURE_PROJECT_NAME.to_string(),
            src_dir: PathBuf::from("src"),
            platform_version: "2025.2".to_string(),
        };
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join(paths::PROJECT_CONFIG_FILE),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();

        let state = Arc::new(LocalDevState::new(LocalDevStateInit {
            target_project_account_id: 111,
            target_testing_account_id: 222,
            project_id: 9,
            project_dir: dir.path().to_path_buf(),
            env: Environment::Prod,
            project_data,
            project_nodes: nodes,
        }));

        let api = Arc::new(FakeProjectApi::new(state.project_nodes()));
        let sink = Arc::new(CollectingSink::new());
        let logger = Arc::new(LocalDevLogger::new(sink.clone(), 222, Some(222), false));

        let fail_file_changes = Arc::new(AtomicBool::new(false));
        let manager = DevServerManager::new(vec![Arc::new(ToggleFailServer {
            fail_file_changes: fail_file_changes.clone(),
        })]);

        let process = Arc::new(LocalDevProcess::new(
            state,
            manager,
            api.clone(),
            logger,
            Arc::new(LocalPortManager::new()),
            config,
        ));

        Self {
            process,
            api,
            sink,
            fail_file_changes,
            _dir: dir,
        }
    }

    pub(crate) fn write_project_config_named(&self, name: &str) {
        let config = ProjectConfig {
            name: name.to_string(),
            src_dir: PathBuf::from("src"),
            platform_version: "2025.2".to_string(),
        };
        std::fs::write(
            self.process
                .state()
                .project_dir()
                .join(paths::PROJECT_CONFIG_FILE),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();
    }

    pub(crate) fn fail_file_changes(&self) {
        self.fail_file_changes.store(true, Ordering::SeqCst);
    }
}

//! Session orchestrator for `hs project dev`.
//!
//! `LocalDevProcess` owns the session state, the dev server manager, and the
//! remote API collaborator. Every mutation of session state funnels through
//! here: the file watcher and the websocket control plane both call into
//! this type, and state listeners (terminal, websocket clients) observe the
//! results.

use hs_core::{
    Build, BuildStatus, DeployResult, DeployStatus, DevServerMessage, ProjectConfig,
    ProjectNodes, UploadResult,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::{ApiError, ProjectApi};
use crate::config;
use crate::local_dev::dev_server::{
    DevServerError, DevServerManager, FileChangeEvent, SetupArgs, StartArgs,
};
use crate::local_dev::logger::LocalDevLogger;
use crate::local_dev::ports::PortManager;
use crate::local_dev::state::{AppData, ListenerToken, LocalDevState};

#[derive(Debug, thiserror::Error)]
pub enum LocalDevError {
    #[error("local dev requires a previously deployed build")]
    NoDeployedBuild,

    #[error(transparent)]
    DevServer(#[from] DevServerError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Releases the upload/deploy in-flight flag when the operation finishes.
struct OperationGuard<'a>(&'a AtomicBool);

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct LocalDevProcess {
    state: Arc<LocalDevState>,
    manager: Arc<DevServerManager>,
    api: Arc<dyn ProjectApi>,
    logger: Arc<LocalDevLogger>,
    port_manager: Arc<dyn PortManager>,
    project_config: Mutex<ProjectConfig>,
    server_messages: broadcast::Sender<DevServerMessage>,
    message_forwarder: Mutex<Option<JoinHandle<()>>>,
    operation_in_flight: AtomicBool,
}

impl LocalDevProcess {
    pub fn new(
        state: Arc<LocalDevState>,
        manager: DevServerManager,
        api: Arc<dyn ProjectApi>,
        logger: Arc<LocalDevLogger>,
        port_manager: Arc<dyn PortManager>,
        project_config: ProjectConfig,
    ) -> Self {
        let (server_messages, _) = broadcast::channel(32);
        Self {
            state,
            manager: Arc::new(manager),
            api,
            logger,
            port_manager,
            project_config: Mutex::new(project_config),
            server_messages,
            message_forwarder: Mutex::new(None),
            operation_in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<LocalDevState> {
        &self.state
    }

    pub fn logger(&self) -> &Arc<LocalDevLogger> {
        &self.logger
    }

    pub fn port_manager(&self) -> &Arc<dyn PortManager> {
        &self.port_manager
    }

    fn project_config(&self) -> ProjectConfig {
        self.project_config
            .lock()
            .expect("project config lock poisoned")
            .clone()
    }

    /// Start the session. Local dev needs a deployed build as its baseline;
    /// without one there is nothing to serve and the session cannot start.
    pub async fn start(&self) -> Result<(), LocalDevError> {
        let project_data = self.state.project_data();
        let Some(deployed_build) = project_data.deployed_build else {
            let config = self.project_config();
            self.logger.no_deployed_build_error(&config.name);
            return Err(LocalDevError::NoDeployedBuild);
        };

        let setup_args = SetupArgs {
            account_id: self.state.target_testing_account_id(),
            env: self.state.env(),
            project_nodes: self.state.project_nodes(),
            port_manager: self.port_manager.clone(),
        };
        if let Err(error) = self.manager.setup(&setup_args).await {
            self.logger.dev_server_setup_error(&error);
            return Err(error.into());
        }

        let config = self.project_config();
        self.logger
            .startup_message(&config.name, self.state.target_testing_account_id());

        let start_args = Arc::new(StartArgs {
            account_id: self.state.target_testing_account_id(),
            project_config: config,
            port_manager: self.port_manager.clone(),
        });
        if let Err(error) = self.manager.start(start_args).await {
            self.logger.dev_server_start_error(&error);
            return Err(error.into());
        }

        self.state.set_dev_servers_started(true);
        self.logger.dev_servers_started();
        self.spawn_message_forwarder();

        let missing = missing_component_uids(&self.state.project_nodes(), &deployed_build);
        if !missing.is_empty() {
            self.logger.missing_components_warning(&missing);
        }

        Ok(())
    }

    /// Stop the session. Cleanup is attempted from any state, and a cleanup
    /// failure is reported rather than swallowed.
    pub async fn stop(&self, show_progress: bool) -> Result<(), LocalDevError> {
        if show_progress {
            self.logger.cleanup_started();
        }

        if let Some(handle) = self
            .message_forwarder
            .lock()
            .expect("forwarder lock poisoned")
            .take()
        {
            handle.abort();
        }

        let result = self.manager.cleanup().await;
        self.state.set_dev_servers_started(false);
        match result {
            Ok(()) => {
                if show_progress {
                    self.logger.cleanup_succeeded();
                }
                Ok(())
            }
            Err(error) => {
                self.logger.cleanup_error(&error);
                Err(error.into())
            }
        }
    }

    /// Re-translate the local source tree and replace the node map
    /// wholesale.
    pub async fn update_project_nodes(&self) -> Result<(), LocalDevError> {
        let config = self.project_config();
        let src_dir = self.state.project_dir().join(&config.src_dir);
        let nodes = self
            .api
            .translate_project(
                self.state.target_project_account_id(),
                &src_dir,
                &config.platform_version,
            )
            .await?;
        self.state.set_project_nodes(nodes);
        Ok(())
    }

    /// Upload the project and classify the outcome. Upload, build, and
    /// deploy are independent flags; a second request while one is running
    /// is refused.
    pub async fn upload_project(&self) -> UploadResult {
        let Some(_guard) = self.try_begin_operation() else {
            self.logger.upload_in_progress_warning();
            return UploadResult::default();
        };

        // Re-read the project config from disk: the file may have changed
        // or disappeared since the session started.
        let session_name = self.project_config().name;
        let config = match config::load_project_config(self.state.project_dir()) {
            Ok(config) if config.name == session_name => config,
            _ => {
                self.logger.config_mismatch_warning();
                return UploadResult::default();
            }
        };

        let src_dir = self.state.project_dir().join(&config.src_dir);
        let outcome = match self
            .api
            .upload_project(
                self.state.target_project_account_id(),
                &config.name,
                &src_dir,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                self.logger.upload_error(&error);
                return UploadResult::default();
            }
        };

        let build_success = outcome.build.status == BuildStatus::Success;
        let deploy_success = outcome.deploy_status == Some(DeployStatus::Success);
        let deploy_id = outcome.build.auto_deploy_id;

        let mut project_data = self.state.project_data();
        project_data.latest_build = Some(outcome.build.clone());
        if deploy_success {
            project_data.deployed_build = Some(outcome.build);
        }
        self.state.set_project_data(project_data);
        self.state
            .snapshot_nodes_at_last_upload(self.state.project_nodes());

        if deploy_success {
            self.state.clear_upload_warnings();
            match self.update_project_nodes().await {
                Ok(()) => self
                    .state
                    .snapshot_nodes_at_last_deploy(self.state.project_nodes()),
                Err(error) => self.logger.translation_error(&error),
            }
        }

        UploadResult {
            upload_success: true,
            build_success,
            deploy_success,
            deploy_id,
        }
    }

    /// Promote the latest known build. Refuses when there is no build to
    /// deploy, without touching the remote API.
    pub async fn deploy_latest_build(&self, force: bool) -> DeployResult {
        let Some(_guard) = self.try_begin_operation() else {
            self.logger.upload_in_progress_warning();
            return DeployResult::default();
        };

        let mut project_data = self.state.project_data();
        let Some(latest_build) = project_data.latest_build.clone() else {
            self.logger.no_build_to_deploy_error();
            return DeployResult::default();
        };

        let config = self.project_config();
        match self
            .api
            .deploy_build(
                self.state.target_project_account_id(),
                &config.name,
                latest_build.build_id,
                force,
            )
            .await
        {
            Ok(deploy_id) => {
                project_data.deployed_build = Some(latest_build);
                self.state.set_project_data(project_data);
                DeployResult {
                    success: true,
                    deploy_id: Some(deploy_id),
                }
            }
            Err(error) => {
                self.logger.deploy_error(&error);
                DeployResult::default()
            }
        }
    }

    /// Forward a source change to the dev servers. Watcher callbacks must
    /// never crash the watch loop, so failures are logged and dropped.
    pub async fn handle_file_change(&self, path: &Path, event: FileChangeEvent) {
        if let Err(error) = self.manager.file_change(path, event).await {
            self.logger.file_change_error(&error);
        }
    }

    /// A component or project config file changed: re-translate and raise
    /// the re-upload warning unconditionally. Config changes always require
    /// a redeploy; source changes do not.
    pub async fn handle_config_file_change(&self) {
        if let Err(error) = self.update_project_nodes().await {
            self.logger.translation_error(&error);
        }
        let warning = self.logger.upload_warning();
        self.state.add_upload_warning(warning);
    }

    /// Persist that the user has seen the welcome screen in the UI.
    pub fn mark_welcome_screen_viewed(&self) {
        let result = config::GlobalConfig::load().and_then(|mut global| {
            global.viewed_welcome_screen = true;
            global.save()
        });
        if let Err(error) = result {
            tracing::warn!("failed to persist welcome screen flag: {error}");
        }
    }

    fn try_begin_operation(&self) -> Option<OperationGuard<'_>> {
        if self.operation_in_flight.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(OperationGuard(&self.operation_in_flight))
    }

    // State listener registration, with immediate delivery of the current
    // value so new subscribers never wait for the next change.

    pub fn add_project_nodes_listener<F>(&self, f: F) -> ListenerToken
    where
        F: Fn(&ProjectNodes) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let listener = f.clone();
        let token = self.state.subscribe_project_nodes(move |v| listener(v));
        f(&self.state.project_nodes());
        token
    }

    pub fn add_app_data_listener<F>(&self, f: F) -> ListenerToken
    where
        F: Fn(&AppData) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let listener = f.clone();
        let token = self.state.subscribe_app_data(move |v| listener(v));
        f(&self.state.app_data());
        token
    }

    pub fn add_upload_warnings_listener<F>(&self, f: F) -> ListenerToken
    where
        F: Fn(&Vec<String>) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let listener = f.clone();
        let token = self.state.subscribe_upload_warnings(move |v| listener(v));
        f(&self.state.upload_warnings());
        token
    }

    pub fn add_dev_servers_started_listener<F>(&self, f: F) -> ListenerToken
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let listener = f.clone();
        let token = self.state.subscribe_dev_servers_started(move |v| listener(v));
        f(&self.state.dev_servers_started());
        token
    }

    pub fn remove_state_listener(&self, token: ListenerToken) {
        self.state.remove_listener(token);
    }

    /// Broadcast a server-originated event (websocket connected, app install
    /// progress) to the dev servers and any other subscribers.
    pub fn send_dev_server_message(&self, message: DevServerMessage) {
        let _ = self.server_messages.send(message);
    }

    pub fn subscribe_server_messages(&self) -> broadcast::Receiver<DevServerMessage> {
        self.server_messages.subscribe()
    }

    fn spawn_message_forwarder(&self) {
        let mut receiver = self.server_messages.subscribe();
        let manager = self.manager.clone();
        let logger = self.logger.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if let Err(error) = manager.message(message).await {
                            logger.file_change_error(&error);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self
            .message_forwarder
            .lock()
            .expect("forwarder lock poisoned") = Some(handle);
    }
}

/// Uids present in the local node map but absent from a build's component
/// list.
fn missing_component_uids(nodes: &ProjectNodes, build: &Build) -> Vec<String> {
    nodes
        .keys()
        .filter(|uid| !build.component_uids.iter().any(|c| c == *uid))
        .cloned()
        .collect()
}

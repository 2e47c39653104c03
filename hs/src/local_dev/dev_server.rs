//! Dev server lifecycle coordination.
//!
//! Dev servers are external components (one per component category, e.g. UI
//! extensions) plugged in behind [`DevServerInterface`]. Every lifecycle
//! method has a default no-op implementation, so an interface only overrides
//! the phases it participates in.
//!
//! The manager sequences `setup` across interfaces (later interfaces may
//! depend on resources earlier ones provision, such as allocated ports) and
//! fans out `start`, `file_change`, `message`, and `cleanup` concurrently.

use async_trait::async_trait;
use hs_core::{DevServerMessage, Environment, ProjectConfig, ProjectNodes};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use tokio::task::JoinSet;

use super::ports::{PortError, PortManager};

#[derive(Debug, thiserror::Error)]
pub enum DevServerError {
    #[error("dev servers must be initialized before calling {0}")]
    NotInitialized(&'static str),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("{server}: {message}")]
    Interface { server: String, message: String },
}

impl DevServerError {
    pub fn interface(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Interface {
            server: server.into(),
            message: message.into(),
        }
    }
}

/// Filesystem event kind forwarded to dev servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeEvent {
    Add,
    Change,
    Unlink,
    UnlinkDir,
}

impl std::fmt::Display for FileChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileChangeEvent::Add => "add",
            FileChangeEvent::Change => "change",
            FileChangeEvent::Unlink => "unlink",
            FileChangeEvent::UnlinkDir => "unlinkDir",
        };
        f.pad(s)
    }
}

pub struct SetupArgs {
    pub account_id: u64,
    pub env: Environment,
    pub project_nodes: ProjectNodes,
    pub port_manager: Arc<dyn PortManager>,
}

pub struct StartArgs {
    pub account_id: u64,
    pub project_config: ProjectConfig,
    pub port_manager: Arc<dyn PortManager>,
}

/// Capability contract for one external dev server. Defaults make every
/// phase optional.
#[async_trait]
pub trait DevServerInterface: Send + Sync {
    fn name(&self) -> &str;

    async fn setup(&self, _args: &SetupArgs) -> Result<(), DevServerError> {
        Ok(())
    }

    async fn start(&self, _args: &StartArgs) -> Result<(), DevServerError> {
        Ok(())
    }

    async fn file_change(
        &self,
        _path: &Path,
        _event: FileChangeEvent,
    ) -> Result<(), DevServerError> {
        Ok(())
    }

    async fn message(&self, _message: DevServerMessage) -> Result<(), DevServerError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), DevServerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecyclePhase {
    Uninitialized,
    SetupDone,
    Started,
}

pub struct DevServerManager {
    interfaces: Vec<Arc<dyn DevServerInterface>>,
    phase: Mutex<LifecyclePhase>,
}

impl DevServerManager {
    pub fn new(interfaces: Vec<Arc<dyn DevServerInterface>>) -> Self {
        Self {
            interfaces,
            phase: Mutex::new(LifecyclePhase::Uninitialized),
        }
    }

    fn phase(&self) -> LifecyclePhase {
        *self.phase.lock().expect("phase lock poisoned")
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        *self.phase.lock().expect("phase lock poisoned") = phase;
    }

    /// Start the port manager, then run `setup` on every interface strictly
    /// in registration order.
    pub async fn setup(&self, args: &SetupArgs) -> Result<(), DevServerError> {
        args.port_manager.start().await?;

        for interface in &self.interfaces {
            interface.setup(args).await?;
        }

        self.set_phase(LifecyclePhase::SetupDone);
        Ok(())
    }

    /// Start every interface concurrently. Fails if `setup` has not
    /// completed.
    pub async fn start(&self, args: Arc<StartArgs>) -> Result<(), DevServerError> {
        match self.phase() {
            LifecyclePhase::Uninitialized => {
                return Err(DevServerError::NotInitialized("start"));
            }
            LifecyclePhase::Started => return Ok(()),
            LifecyclePhase::SetupDone => {}
        }

        let mut tasks = JoinSet::new();
        for interface in self.interfaces.iter().cloned() {
            let args = args.clone();
            tasks.spawn(async move { interface.start(&args).await });
        }

        Self::drain(&mut tasks).await?;
        self.set_phase(LifecyclePhase::Started);
        Ok(())
    }

    /// Forward a filesystem event to every started interface. No-op before
    /// `start`.
    pub async fn file_change(
        &self,
        path: &Path,
        event: FileChangeEvent,
    ) -> Result<(), DevServerError> {
        if self.phase() != LifecyclePhase::Started {
            return Ok(());
        }

        let path: PathBuf = path.to_path_buf();
        let mut tasks = JoinSet::new();
        for interface in self.interfaces.iter().cloned() {
            let path = path.clone();
            tasks.spawn(async move { interface.file_change(&path, event).await });
        }
        Self::drain(&mut tasks).await
    }

    /// Fan a process-wide event out to every started interface.
    pub async fn message(&self, message: DevServerMessage) -> Result<(), DevServerError> {
        if self.phase() != LifecyclePhase::Started {
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for interface in self.interfaces.iter().cloned() {
            tasks.spawn(async move { interface.message(message).await });
        }
        Self::drain(&mut tasks).await
    }

    /// Tear everything down. Safe from any phase; a no-op unless started.
    pub async fn cleanup(&self) -> Result<(), DevServerError> {
        if self.phase() != LifecyclePhase::Started {
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for interface in self.interfaces.iter().cloned() {
            tasks.spawn(async move { interface.cleanup().await });
        }
        let result = Self::drain(&mut tasks).await;
        self.set_phase(LifecyclePhase::Uninitialized);
        result
    }

    /// Await every spawned task; every interface is attempted even when one
    /// fails, and the first failure is surfaced afterwards.
    async fn drain(
        tasks: &mut JoinSet<Result<(), DevServerError>>,
    ) -> Result<(), DevServerError> {
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => Err(DevServerError::interface(
                    "dev server task",
                    join_error.to_string(),
                )),
            };
            if let Err(error) = outcome
                && first_error.is_none()
            {
                first_error = Some(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

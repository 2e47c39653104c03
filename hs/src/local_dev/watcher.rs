//! Filesystem watcher for the local dev session.
//!
//! Watches the project source tree plus the project config file and routes
//! every change through [`LocalDevProcess`]: component/project config
//! changes trigger a re-translation, everything else is forwarded to the
//! dev servers as a plain file change.
//!
//! The set of component config paths is snapshotted when the watcher
//! starts. Components added mid-session get their config edits routed as
//! ordinary source changes until the watcher is restarted; in practice the
//! triggered re-translation on the next real config change makes this
//! self-correcting.

use hs_core::ProjectNodes;
use notify::event::{EventKind, ModifyKind, RemoveKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::local_dev::dev_server::FileChangeEvent;
use crate::local_dev::process::LocalDevProcess;
use crate::paths;

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("failed to create filesystem watcher: {0}")]
    Init(notify::Error),
}

/// How one filesystem event should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchAction {
    ConfigChange,
    SourceChange(FileChangeEvent),
    Ignore,
}

fn map_event_kind(kind: &EventKind) -> Option<FileChangeEvent> {
    match kind {
        EventKind::Create(_) => Some(FileChangeEvent::Add),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(FileChangeEvent::Change),
        EventKind::Remove(RemoveKind::Folder) => Some(FileChangeEvent::UnlinkDir),
        EventKind::Remove(_) => Some(FileChangeEvent::Unlink),
        _ => None,
    }
}

fn classify(config_paths: &BTreeSet<PathBuf>, path: &Path, kind: &EventKind) -> WatchAction {
    let Some(event) = map_event_kind(kind) else {
        return WatchAction::Ignore;
    };
    if config_paths.contains(path) {
        return WatchAction::ConfigChange;
    }
    WatchAction::SourceChange(event)
}

/// Config paths as of one node snapshot: every component's config file plus
/// the project config itself.
fn config_paths_for(project_dir: &Path, nodes: &ProjectNodes) -> BTreeSet<PathBuf> {
    let mut config_paths: BTreeSet<PathBuf> = nodes
        .values()
        .map(|node| project_dir.join(&node.local_dev.component_config_path))
        .collect();
    config_paths.insert(project_dir.join(paths::PROJECT_CONFIG_FILE));
    config_paths
}

pub struct LocalDevWatcher {
    process: Arc<LocalDevProcess>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalDevWatcher {
    pub fn new(process: Arc<LocalDevProcess>) -> Self {
        Self {
            process,
            watcher: Mutex::new(None),
            dispatch_task: Mutex::new(None),
        }
    }

    /// Begin watching the source tree and the project config file.
    pub fn start(&self, src_dir: &Path) -> Result<(), WatcherError> {
        let project_dir = self.process.state().project_dir().to_path_buf();
        let config_paths = config_paths_for(&project_dir, &self.process.state().project_nodes());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        })
        .map_err(WatcherError::Init)?;

        watcher
            .watch(src_dir, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::Watch {
                path: src_dir.to_path_buf(),
                source,
            })?;
        let project_config = project_dir.join(paths::PROJECT_CONFIG_FILE);
        watcher
            .watch(&project_config, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Watch {
                path: project_config,
                source,
            })?;

        let process = self.process.clone();
        let handle = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                let event = match result {
                    Ok(event) => event,
                    Err(error) => {
                        tracing::warn!("filesystem watch error: {error}");
                        continue;
                    }
                };
                for path in &event.paths {
                    match classify(&config_paths, path, &event.kind) {
                        WatchAction::ConfigChange => {
                            process.handle_config_file_change().await;
                        }
                        WatchAction::SourceChange(change) => {
                            process.handle_file_change(path, change).await;
                        }
                        WatchAction::Ignore => {}
                    }
                }
            }
        });

        *self.watcher.lock().expect("watcher lock poisoned") = Some(watcher);
        *self
            .dispatch_task
            .lock()
            .expect("dispatch task lock poisoned") = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        // Dropping the watcher closes the event channel, which ends the
        // dispatch task; the abort only shortcuts an in-flight dispatch.
        *self.watcher.lock().expect("watcher lock poisoned") = None;
        if let Some(handle) = self
            .dispatch_task
            .lock()
            .expect("dispatch task lock poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for LocalDevWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Mutable, observable session state for a local dev run.
//!
//! One [`LocalDevState`] exists per `hs project dev` session. Identity
//! fields are fixed at construction; the four observable fields notify
//! per-field listeners synchronously on every replacement, so a listener is
//! guaranteed to observe the new value before the setter returns.
//!
//! Subscriptions hand out [`ListenerToken`]s for removal instead of relying
//! on closure identity, so double-registration of the same closure is not a
//! hazard.

use hs_core::{AppInstallData, Environment, ProjectData, ProjectNodes};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type AppData = BTreeMap<String, AppInstallData>;

/// Observable fields of [`LocalDevState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    ProjectNodes,
    AppData,
    UploadWarnings,
    DevServersStarted,
}

/// Opaque handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken {
    key: StateKey,
    id: u64,
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observable<T> {
    value: Mutex<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
}

impl<T: Clone> Observable<T> {
    fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn get(&self) -> T {
        self.value.lock().expect("state value lock poisoned").clone()
    }

    /// Replace the value, then invoke every registered listener with the new
    /// value before returning. The value lock is released before listeners
    /// run so they can read other fields freely.
    fn set(&self, next: T) {
        {
            let mut value = self.value.lock().expect("state value lock poisoned");
            *value = next.clone();
        }
        let listeners: Vec<Listener<T>> = self
            .listeners
            .lock()
            .expect("state listener lock poisoned")
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for listener in listeners {
            listener(&next);
        }
    }

    fn subscribe(&self, id: u64, f: Listener<T>) {
        self.listeners
            .lock()
            .expect("state listener lock poisoned")
            .push((id, f));
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .expect("state listener lock poisoned")
            .retain(|(existing, _)| *existing != id);
    }

    fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .expect("state listener lock poisoned")
            .len()
    }
}

pub struct LocalDevStateInit {
    pub target_project_account_id: u64,
    pub target_testing_account_id: u64,
    pub project_id: u64,
    pub project_dir: PathBuf,
    pub env: Environment,
    pub project_data: ProjectData,
    pub project_nodes: ProjectNodes,
}

pub struct LocalDevState {
    target_project_account_id: u64,
    target_testing_account_id: u64,
    project_id: u64,
    project_dir: PathBuf,
    env: Environment,

    project_data: Mutex<ProjectData>,

    project_nodes: Observable<ProjectNodes>,
    app_data: Observable<AppData>,
    upload_warnings: Observable<Vec<String>>,
    dev_servers_started: Observable<bool>,

    project_nodes_at_last_upload: Mutex<ProjectNodes>,
    project_nodes_at_last_deploy: Mutex<ProjectNodes>,

    next_listener_id: AtomicU64,
}

impl LocalDevState {
    pub fn new(init: LocalDevStateInit) -> Self {
        Self {
            target_project_account_id: init.target_project_account_id,
            target_testing_account_id: init.target_testing_account_id,
            project_id: init.project_id,
            project_dir: init.project_dir,
            env: init.env,
            project_data: Mutex::new(init.project_data),
            project_nodes: Observable::new(init.project_nodes),
            app_data: Observable::new(AppData::new()),
            upload_warnings: Observable::new(Vec::new()),
            dev_servers_started: Observable::new(false),
            project_nodes_at_last_upload: Mutex::new(ProjectNodes::new()),
            project_nodes_at_last_deploy: Mutex::new(ProjectNodes::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub fn target_project_account_id(&self) -> u64 {
        self.target_project_account_id
    }

    pub fn target_testing_account_id(&self) -> u64 {
        self.target_testing_account_id
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn env(&self) -> Environment {
        self.env
    }

    pub fn project_data(&self) -> ProjectData {
        self.project_data
            .lock()
            .expect("project data lock poisoned")
            .clone()
    }

    pub fn set_project_data(&self, data: ProjectData) {
        *self
            .project_data
            .lock()
            .expect("project data lock poisoned") = data;
    }

    pub fn project_nodes(&self) -> ProjectNodes {
        self.project_nodes.get()
    }

    /// Replace the node map wholesale. Translation output is never merged.
    pub fn set_project_nodes(&self, nodes: ProjectNodes) {
        self.project_nodes.set(nodes);
    }

    pub fn app_data(&self) -> AppData {
        self.app_data.get()
    }

    pub fn set_app_data(&self, data: AppData) {
        self.app_data.set(data);
    }

    pub fn upload_warnings(&self) -> Vec<String> {
        self.upload_warnings.get()
    }

    /// Append a warning, keeping insertion order and dropping duplicates.
    /// Listeners are only notified when the set actually changed.
    pub fn add_upload_warning(&self, warning: impl Into<String>) -> bool {
        let warning = warning.into();
        let mut next = self.upload_warnings.get();
        if next.contains(&warning) {
            return false;
        }
        next.push(warning);
        self.upload_warnings.set(next);
        true
    }

    pub fn clear_upload_warnings(&self) {
        if self.upload_warnings.get().is_empty() {
            return;
        }
        self.upload_warnings.set(Vec::new());
    }

    pub fn dev_servers_started(&self) -> bool {
        self.dev_servers_started.get()
    }

    pub fn set_dev_servers_started(&self, started: bool) {
        self.dev_servers_started.set(started);
    }

    pub fn project_nodes_at_last_upload(&self) -> ProjectNodes {
        self.project_nodes_at_last_upload
            .lock()
            .expect("snapshot lock poisoned")
            .clone()
    }

    pub fn snapshot_nodes_at_last_upload(&self, nodes: ProjectNodes) {
        *self
            .project_nodes_at_last_upload
            .lock()
            .expect("snapshot lock poisoned") = nodes;
    }

    pub fn project_nodes_at_last_deploy(&self) -> ProjectNodes {
        self.project_nodes_at_last_deploy
            .lock()
            .expect("snapshot lock poisoned")
            .clone()
    }

    pub fn snapshot_nodes_at_last_deploy(&self, nodes: ProjectNodes) {
        *self
            .project_nodes_at_last_deploy
            .lock()
            .expect("snapshot lock poisoned") = nodes;
    }

    fn next_id(&self) -> u64 {
        self.next_listener_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn subscribe_project_nodes(
        &self,
        f: impl Fn(&ProjectNodes) + Send + Sync + 'static,
    ) -> ListenerToken {
        let id = self.next_id();
        self.project_nodes.subscribe(id, Arc::new(f));
        ListenerToken {
            key: StateKey::ProjectNodes,
            id,
        }
    }

    pub fn subscribe_app_data(
        &self,
        f: impl Fn(&AppData) + Send + Sync + 'static,
    ) -> ListenerToken {
        let id = self.next_id();
        self.app_data.subscribe(id, Arc::new(f));
        ListenerToken {
            key: StateKey::AppData,
            id,
        }
    }

    pub fn subscribe_upload_warnings(
        &self,
        f: impl Fn(&Vec<String>) + Send + Sync + 'static,
    ) -> ListenerToken {
        let id = self.next_id();
        self.upload_warnings.subscribe(id, Arc::new(f));
        ListenerToken {
            key: StateKey::UploadWarnings,
            id,
        }
    }

    pub fn subscribe_dev_servers_started(
        &self,
        f: impl Fn(&bool) + Send + Sync + 'static,
    ) -> ListenerToken {
        let id = self.next_id();
        self.dev_servers_started.subscribe(id, Arc::new(f));
        ListenerToken {
            key: StateKey::DevServersStarted,
            id,
        }
    }

    pub fn remove_listener(&self, token: ListenerToken) {
        match token.key {
            StateKey::ProjectNodes => self.project_nodes.unsubscribe(token.id),
            StateKey::AppData => self.app_data.unsubscribe(token.id),
            StateKey::UploadWarnings => self.upload_warnings.unsubscribe(token.id),
            StateKey::DevServersStarted => self.dev_servers_started.unsubscribe(token.id),
        }
    }

    pub fn listener_count(&self, key: StateKey) -> usize {
        match key {
            StateKey::ProjectNodes => self.project_nodes.listener_count(),
            StateKey::AppData => self.app_data.listener_count(),
            StateKey::UploadWarnings => self.upload_warnings.listener_count(),
            StateKey::DevServersStarted => self.dev_servers_started.listener_count(),
        }
    }

    pub fn total_listener_count(&self) -> usize {
        self.listener_count(StateKey::ProjectNodes)
            + self.listener_count(StateKey::AppData)
            + self.listener_count(StateKey::UploadWarnings)
            + self.listener_count(StateKey::DevServersStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::{ComponentType, LocalDevNodeInfo, ProjectNode};
    use std::sync::atomic::AtomicUsize;

    fn test_state() -> LocalDevState {
        LocalDevState::new(LocalDevStateInit {
            target_project_account_id: 111,
            target_testing_account_id: 222,
            project_id: 9,
            project_dir: PathBuf::from("/tmp/project"),
            env: Environment::Prod,
            project_data: ProjectData::default(),
            project_nodes: ProjectNodes::new(),
        })
    }

    fn node(uid: &str) -> ProjectNode {
        ProjectNode {
            uid: uid.to_string(),
            component_type: ComponentType::App,
            local_dev: LocalDevNodeInfo::default(),
            component_deps: BTreeMap::new(),
            config: serde_json::Value::Null,
        }
    }

    fn nodes(uids: &[&str]) -> ProjectNodes {
        uids.iter().map(|u| (u.to_string(), node(u))).collect()
    }

    #[test]
    fn listener_registered_after_a_set_sees_only_later_sets() {
        let state = test_state();
        state.set_project_nodes(nodes(&["v1"]));

        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_in = calls.clone();
        state.subscribe_project_nodes(move |n| {
            calls_in
                .lock()
                .unwrap()
                .push(n.keys().cloned().collect::<Vec<_>>());
        });

        state.set_project_nodes(nodes(&["v2"]));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["v2".to_string()]);
    }

    #[test]
    fn set_notifies_synchronously_after_updating_the_value() {
        let state = Arc::new(test_state());
        let observed = Arc::new(Mutex::new(None));

        let state_in = state.clone();
        let observed_in = observed.clone();
        state.subscribe_dev_servers_started(move |started| {
            // Read back through the store: the new value must already be
            // visible to the listener.
            assert_eq!(state_in.dev_servers_started(), *started);
            *observed_in.lock().unwrap() = Some(*started);
        });

        state.set_dev_servers_started(true);
        assert_eq!(*observed.lock().unwrap(), Some(true));
    }

    #[test]
    fn get_returns_a_defensive_copy() {
        let state = test_state();
        state.set_project_nodes(nodes(&["keep"]));

        let mut copy = state.project_nodes();
        copy.clear();

        assert_eq!(state.project_nodes().len(), 1);
    }

    #[test]
    fn removing_one_token_leaves_other_listeners_intact() {
        let state = test_state();
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));

        let a_in = a_calls.clone();
        let token_a = state.subscribe_dev_servers_started(move |_| {
            a_in.fetch_add(1, Ordering::SeqCst);
        });
        let b_in = b_calls.clone();
        let _token_b = state.subscribe_dev_servers_started(move |_| {
            b_in.fetch_add(1, Ordering::SeqCst);
        });

        state.set_dev_servers_started(true);
        state.remove_listener(token_a);
        state.set_dev_servers_started(false);

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn upload_warnings_deduplicate_and_keep_insertion_order() {
        let state = test_state();
        let notifications = Arc::new(AtomicUsize::new(0));
        let n_in = notifications.clone();
        state.subscribe_upload_warnings(move |_| {
            n_in.fetch_add(1, Ordering::SeqCst);
        });

        assert!(state.add_upload_warning("config changed"));
        assert!(!state.add_upload_warning("config changed"));
        assert!(state.add_upload_warning("component removed"));

        assert_eq!(
            state.upload_warnings(),
            vec!["config changed".to_string(), "component removed".to_string()]
        );
        // The duplicate add must not have notified.
        assert_eq!(notifications.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_upload_warnings_is_quiet_when_already_empty() {
        let state = test_state();
        let notifications = Arc::new(AtomicUsize::new(0));
        let n_in = notifications.clone();
        state.subscribe_upload_warnings(move |_| {
            n_in.fetch_add(1, Ordering::SeqCst);
        });

        state.clear_upload_warnings();
        assert_eq!(notifications.load(Ordering::SeqCst), 0);

        state.add_upload_warning("drift");
        state.clear_upload_warnings();
        assert_eq!(notifications.load(Ordering::SeqCst), 2);
        assert!(state.upload_warnings().is_empty());
    }

    #[test]
    fn snapshots_are_independent_of_live_nodes() {
        let state = test_state();
        state.set_project_nodes(nodes(&["a", "b"]));
        state.snapshot_nodes_at_last_deploy(state.project_nodes());

        state.set_project_nodes(nodes(&["a"]));

        assert_eq!(state.project_nodes_at_last_deploy().len(), 2);
        assert_eq!(state.project_nodes().len(), 1);
    }
}

//! User-facing presentation for the local dev session.
//!
//! The logger composes warnings/errors/status lines and pushes them through
//! a [`LogSink`]. Consecutive identical warnings are suppressed so repeated
//! file-save events do not spam the terminal; emitting anything that is not
//! a warning resets that memory, since the duplicate is no longer the last
//! thing on screen.

use std::sync::Arc;
use std::sync::Mutex;

use crate::output;

/// One rendered line of session output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// Raw underlying error detail, only emitted in verbose mode.
    Detail(String),
}

pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Sink that writes styled lines to the terminal.
pub struct TerminalSink;

impl LogSink for TerminalSink {
    fn emit(&self, event: LogEvent) {
        match event {
            LogEvent::Info(m) => output::step(&m),
            LogEvent::Success(m) => output::success(&m),
            LogEvent::Warning(m) => output::warning(&m),
            LogEvent::Error(m) => output::error(&m),
            LogEvent::Detail(m) => output::muted(&m),
        }
    }
}

/// Sink that records events for inspection in tests.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Warning(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for CollectingSink {
    fn emit(&self, event: LogEvent) {
        self.events.lock().expect("sink lock poisoned").push(event);
    }
}

pub struct LocalDevLogger {
    sink: Arc<dyn LogSink>,
    target_account_id: u64,
    default_account_id: Option<u64>,
    debug: bool,
    last_warning: Mutex<Option<String>>,
}

impl LocalDevLogger {
    pub fn new(
        sink: Arc<dyn LogSink>,
        target_account_id: u64,
        default_account_id: Option<u64>,
        debug: bool,
    ) -> Self {
        Self {
            sink,
            target_account_id,
            default_account_id,
            debug,
            last_warning: Mutex::new(None),
        }
    }

    fn emit(&self, event: LogEvent) {
        // Anything that is not a warning clears the dedup memory: the next
        // identical warning is no longer adjacent to the previous one.
        if !matches!(event, LogEvent::Warning(_)) {
            *self.last_warning.lock().expect("logger lock poisoned") = None;
        }
        self.sink.emit(event);
    }

    fn warn_deduped(&self, text: String) {
        let mut last = self.last_warning.lock().expect("logger lock poisoned");
        if last.as_deref() == Some(text.as_str()) {
            return;
        }
        *last = Some(text.clone());
        drop(last);
        self.sink.emit(LogEvent::Warning(text));
    }

    fn error_with_detail(&self, message: String, error: &dyn std::fmt::Display) {
        self.emit(LogEvent::Error(message));
        if self.debug {
            self.emit(LogEvent::Detail(error.to_string()));
        }
    }

    /// The exact command to run to bring the remote project up to date,
    /// including the account flag when the session does not target the
    /// configured default account.
    pub fn upload_command(&self) -> String {
        match self.default_account_id {
            Some(default) if default == self.target_account_id => {
                "hs project upload".to_string()
            }
            _ => format!("hs project upload --account={}", self.target_account_id),
        }
    }

    /// Warn that local files have drifted from the deployed build. Returns
    /// the composed text so callers can mirror it into session state.
    pub fn upload_warning(&self) -> String {
        let text = format!(
            "Project files changed since the last upload. Run `{}` to upload the latest files.",
            self.upload_command()
        );
        self.warn_deduped(text.clone());
        text
    }

    pub fn missing_components_warning(&self, names: &[String]) -> String {
        let text = format!(
            "The following components exist locally but are not part of the deployed build: {}. Run `{}` to deploy them.",
            names.join(", "),
            self.upload_command()
        );
        self.warn_deduped(text.clone());
        text
    }

    pub fn startup_message(&self, project_name: &str, testing_account_id: u64) {
        self.emit(LogEvent::Info(format!(
            "Starting local dev for {} against account {}",
            project_name, testing_account_id
        )));
        self.emit(LogEvent::Info(
            "Press q or ctrl-c to stop.".to_string(),
        ));
    }

    pub fn dev_servers_started(&self) {
        self.emit(LogEvent::Success("Dev servers running.".to_string()));
    }

    pub fn no_deployed_build_error(&self, project_name: &str) {
        self.emit(LogEvent::Error(format!(
            "{} has no deployed build. Local dev requires a deployed project; run `{}` first.",
            project_name,
            self.upload_command()
        )));
    }

    pub fn no_build_to_deploy_error(&self) {
        self.emit(LogEvent::Error(
            "There is no build to deploy. Upload the project to create one.".to_string(),
        ));
    }

    pub fn config_mismatch_warning(&self) {
        self.emit(LogEvent::Warning(
            "Project config could not be loaded or no longer matches this session; skipping upload."
                .to_string(),
        ));
        // This path intentionally bypasses dedup: a refused upload must
        // always be visible.
        *self.last_warning.lock().expect("logger lock poisoned") = None;
    }

    pub fn dev_server_setup_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail("Failed to set up local dev servers.".to_string(), error);
    }

    pub fn dev_server_start_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail("Failed to start local dev servers.".to_string(), error);
    }

    pub fn file_change_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail(
            "A dev server failed to process a file change.".to_string(),
            error,
        );
    }

    pub fn translation_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail("Failed to translate local project source.".to_string(), error);
    }

    pub fn upload_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail("Project upload failed.".to_string(), error);
    }

    pub fn deploy_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail("Project deploy failed.".to_string(), error);
    }

    pub fn upload_in_progress_warning(&self) {
        self.emit(LogEvent::Warning(
            "An upload or deploy is already in progress; ignoring this request.".to_string(),
        ));
    }

    pub fn cleanup_started(&self) {
        self.emit(LogEvent::Info("Stopping local dev server...".to_string()));
    }

    pub fn cleanup_succeeded(&self) {
        self.emit(LogEvent::Success("Local dev server stopped.".to_string()));
    }

    pub fn cleanup_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail(
            "Failed to clean up local dev servers.".to_string(),
            error,
        );
    }

    pub fn websocket_message_error(&self, error: &dyn std::fmt::Display) {
        self.error_with_detail(
            "Ignoring malformed message from the local dev UI.".to_string(),
            error,
        );
    }
}

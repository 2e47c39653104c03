//! `hs project dev` - run the local development session.

use hs_core::Environment;
use std::sync::Arc;

use crate::api::{HttpProjectApi, ProjectApi};
use crate::commands::resolve_account;
use crate::config;
use crate::local_dev::dev_server::DevServerManager;
use crate::local_dev::logger::{LocalDevLogger, TerminalSink};
use crate::local_dev::ports::{LocalPortManager, PortManager};
use crate::local_dev::process::LocalDevProcess;
use crate::local_dev::state::{LocalDevState, LocalDevStateInit};
use crate::local_dev::watcher::LocalDevWatcher;
use crate::local_dev::websocket::LocalDevWebsocketServer;
use crate::output;

fn is_quit_input(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

/// Block until the user asks to stop: ctrl-c or a lone "q" line on stdin.
/// If stdin closes (detached session), only ctrl-c stops the session.
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::io::AsyncBufReadExt;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return result,
            line = lines.next_line() => {
                match line? {
                    Some(line) if is_quit_input(&line) => return Ok(()),
                    Some(_) => {}
                    // stdin closed; only ctrl-c can stop us now
                    None => return tokio::signal::ctrl_c().await,
                }
            }
        }
    }
}

fn dev_ui_url(env: Environment, account_id: u64, ws_port: u16) -> String {
    let host = match env {
        Environment::Prod => "app.hubspot.com",
        Environment::Qa => "app.hubspotqa.com",
    };
    format!("https://{host}/local-dev-ui/{account_id}?wsPort={ws_port}")
}

pub async fn run(
    account: Option<u64>,
    testing_account: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let project_dir = std::env::current_dir()?;
    let project_config = config::load_project_config(&project_dir)?;

    let global = config::GlobalConfig::load()?;
    let account_id = resolve_account(account, &global)?;
    let testing_account_id = testing_account.unwrap_or(account_id);
    let env = global.account_env(account_id);

    output::section(&format!("Local dev: {}", project_config.name));

    let api: Arc<dyn ProjectApi> = Arc::new(HttpProjectApi::new(env)?);
    let project_data = api
        .fetch_project_status(account_id, &project_config.name)
        .await?;
    let project_nodes = api
        .translate_project(
            account_id,
            &project_dir.join(&project_config.src_dir),
            &project_config.platform_version,
        )
        .await?;

    let state = Arc::new(LocalDevState::new(LocalDevStateInit {
        target_project_account_id: account_id,
        target_testing_account_id: testing_account_id,
        project_id: project_data.project_id,
        project_dir: project_dir.clone(),
        env,
        project_data,
        project_nodes,
    }));

    let logger = Arc::new(LocalDevLogger::new(
        Arc::new(TerminalSink),
        testing_account_id,
        global.default_account,
        output::is_verbose(),
    ));
    // Dev server integrations register here; the session runs without any.
    let manager = DevServerManager::new(Vec::new());
    let port_manager: Arc<dyn PortManager> = Arc::new(LocalPortManager::new());

    let process = Arc::new(LocalDevProcess::new(
        state,
        manager,
        api,
        logger,
        port_manager,
        project_config.clone(),
    ));
    process.start().await?;

    let websocket =
        LocalDevWebsocketServer::new(process.clone(), env!("CARGO_PKG_VERSION"));
    let ws_port = websocket.start().await?;
    output::step(&format!(
        "Local dev UI: {}",
        dev_ui_url(env, testing_account_id, ws_port)
    ));
    if !global.viewed_welcome_screen {
        output::muted("First session: the UI opens with a short welcome tour.");
    }

    let watcher = LocalDevWatcher::new(process.clone());
    watcher.start(&project_dir.join(&project_config.src_dir))?;

    wait_for_shutdown().await?;

    watcher.stop();
    websocket.stop();
    process.stop(true).await?;
    Ok(())
}

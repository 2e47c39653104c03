//! Websocket control plane for the browser-based local dev UI.
//!
//! Listens on a loopback port allocated by the session's port manager.
//! Connections are admitted only from known HubSpot app origins; anything
//! else completes the handshake and is immediately closed with a policy
//! violation. Every admitted client receives CLI metadata plus a full state
//! snapshot, then live updates as session state changes.

use futures_util::{SinkExt, StreamExt};
use hs_core::{ClientMessage, DevServerMessage, ServerMessage, PROTOCOL_VERSION};
use regex::Regex;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::local_dev::ports::PortInstance;
use crate::local_dev::process::LocalDevProcess;

const WS_PORT_INSTANCE_ID: &str = "websocket-server";

#[derive(Debug, thiserror::Error)]
pub enum WebsocketError {
    #[error(transparent)]
    Port(#[from] super::ports::PortError),

    #[error("port manager returned no port for the websocket server")]
    MissingPort,

    #[error("failed to bind websocket listener: {0}")]
    Bind(std::io::Error),
}

/// Only first-party HubSpot app origins may drive the session.
fn origin_allowed(origin: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r"^https://(local|app|app-na2|app-na3|app-ap1|app-eu1)\.(hubspot\.com|hubspotqa\.com)$",
        )
        .expect("origin pattern is a valid regex")
    });
    pattern.is_match(origin)
}

pub struct LocalDevWebsocketServer {
    process: Arc<LocalDevProcess>,
    cli_version: String,
    port: Mutex<Option<u16>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalDevWebsocketServer {
    pub fn new(process: Arc<LocalDevProcess>, cli_version: impl Into<String>) -> Self {
        Self {
            process,
            cli_version: cli_version.into(),
            port: Mutex::new(None),
            accept_task: Mutex::new(None),
        }
    }

    /// Bind the listener and start accepting connections. The session's port
    /// manager must already be running (dev server setup starts it).
    pub async fn start(&self) -> Result<u16, WebsocketError> {
        let ports = self
            .process
            .port_manager()
            .request_ports(&[PortInstance::new(WS_PORT_INSTANCE_ID)])
            .await?;
        let Some(&port) = ports.get(WS_PORT_INSTANCE_ID) else {
            return Err(WebsocketError::MissingPort);
        };

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(WebsocketError::Bind)?;

        let process = self.process.clone();
        let cli_version = self.cli_version.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let process = process.clone();
                        let cli_version = cli_version.clone();
                        tokio::spawn(handle_connection(process, cli_version, stream));
                    }
                    Err(error) => {
                        tracing::warn!("websocket accept failed: {error}");
                    }
                }
            }
        });

        *self.port.lock().expect("port lock poisoned") = Some(port);
        *self.accept_task.lock().expect("accept task lock poisoned") = Some(handle);
        Ok(port)
    }

    pub fn port(&self) -> Option<u16> {
        *self.port.lock().expect("port lock poisoned")
    }

    /// Stop accepting connections. Established connections wind down as
    /// their clients disconnect.
    pub fn stop(&self) {
        if let Some(handle) = self
            .accept_task
            .lock()
            .expect("accept task lock poisoned")
            .take()
        {
            handle.abort();
        }
        *self.port.lock().expect("port lock poisoned") = None;
    }
}

impl Drop for LocalDevWebsocketServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_connection(
    process: Arc<LocalDevProcess>,
    cli_version: String,
    stream: TcpStream,
) {
    let mut origin: Option<String> = None;
    let callback = |request: &Request, response: Response| {
        origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(response)
    };

    let mut ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(error) => {
            tracing::debug!("websocket handshake failed: {error}");
            return;
        }
    };

    // The close code is only deliverable after the handshake, so rejection
    // happens post-accept, before any listener registration.
    if !origin.as_deref().is_some_and(origin_allowed) {
        let reason = match origin.as_deref() {
            Some(origin) => format!("origin not allowed: {origin}"),
            None => "origin not allowed: no origin".to_string(),
        };
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: reason.into(),
        };
        let _ = ws.close(Some(frame)).await;
        while let Some(Ok(_)) = ws.next().await {}
        return;
    }

    // Outbound frames funnel through one queue so state listeners (which run
    // synchronously on the setter's thread) never touch the socket directly.
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let _ = outbound.send(ServerMessage::CliMetadata {
        version: cli_version,
        protocol_version: PROTOCOL_VERSION,
    });
    let _ = outbound.send(ServerMessage::UpdateProjectData(
        process.state().project_data(),
    ));

    // Listener registration delivers the current value immediately, which
    // completes the snapshot; afterwards every state change is pushed.
    let tokens = vec![
        process.add_project_nodes_listener({
            let outbound = outbound.clone();
            move |nodes| {
                let _ = outbound.send(ServerMessage::UpdateProjectNodes(nodes.clone()));
            }
        }),
        process.add_app_data_listener({
            let outbound = outbound.clone();
            move |data| {
                let _ = outbound.send(ServerMessage::UpdateAppData(data.clone()));
            }
        }),
        process.add_upload_warnings_listener({
            let outbound = outbound.clone();
            move |warnings| {
                let _ = outbound.send(ServerMessage::UpdateUploadWarnings(warnings.clone()));
            }
        }),
        process.add_dev_servers_started_listener({
            let outbound = outbound.clone();
            move |started| {
                let _ = outbound.send(ServerMessage::DevServersStarted(*started));
            }
        }),
    ];

    process.send_dev_server_message(DevServerMessage::WebsocketServerConnected);

    let (mut sink, mut inbound) = ws.split();
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(message) = outgoing else { break };
                let Ok(text) = serde_json::to_string(&message) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = inbound.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&process, &outbound, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!("websocket read failed: {error}");
                        break;
                    }
                }
            }
        }
    }

    for token in tokens {
        process.remove_state_listener(token);
    }
}

/// Dispatch one inbound frame. A frame that does not parse is logged and
/// ignored; the connection stays open.
async fn handle_client_frame(
    process: &Arc<LocalDevProcess>,
    outbound: &mpsc::UnboundedSender<ServerMessage>,
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(error) => {
            process.logger().websocket_message_error(&error);
            return;
        }
    };

    match message {
        ClientMessage::Upload => {
            let result = process.upload_project().await;
            let reply = if result.upload_success && result.build_success {
                let build_id = process
                    .state()
                    .project_data()
                    .latest_build
                    .as_ref()
                    .map(|build| build.build_id);
                ServerMessage::UploadSuccess {
                    build_id,
                    deploy_id: result.deploy_id,
                }
            } else {
                ServerMessage::UploadFailure
            };
            let _ = outbound.send(reply);
        }
        ClientMessage::Deploy { force } => {
            let result = process.deploy_latest_build(force).await;
            let reply = if result.success {
                ServerMessage::DeploySuccess {
                    deploy_id: result.deploy_id,
                }
            } else {
                ServerMessage::DeployFailure
            };
            let _ = outbound.send(reply);
        }
        ClientMessage::ViewedWelcomeScreen => {
            process.mark_welcome_screen_viewed();
        }
        ClientMessage::AppInstallSuccess => {
            process.send_dev_server_message(DevServerMessage::AppInstallSuccess);
        }
        ClientMessage::AppInstallFailure => {
            process.send_dev_server_message(DevServerMessage::AppInstallFailure);
        }
        ClientMessage::AppInstallInitiated => {
            process.send_dev_server_message(DevServerMessage::AppInstallInitiated);
        }
    }
}

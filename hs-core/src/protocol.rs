//! Local dev websocket control-plane messages.
//!
//! These types are shared between the `hs` CLI and the browser-based local
//! dev UI. Frames are JSON text with an adjacently tagged envelope:
//! `{ "type": <NAME>, "data": <payload> }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::project::{AppInstallData, ProjectData, ProjectNodes};

pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the CLI to connected UI clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// First frame on every admitted connection.
    CliMetadata {
        version: String,
        protocol_version: u32,
    },

    /// Snapshot of the remote project view (latest/deployed builds).
    UpdateProjectData(ProjectData),

    UpdateProjectNodes(ProjectNodes),

    UpdateAppData(BTreeMap<String, AppInstallData>),

    UpdateUploadWarnings(Vec<String>),

    DevServersStarted(bool),

    UploadSuccess {
        build_id: Option<u64>,
        deploy_id: Option<u64>,
    },

    UploadFailure,

    DeploySuccess {
        deploy_id: Option<u64>,
    },

    DeployFailure,
}

/// Messages sent from a UI client to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Upload,

    Deploy {
        #[serde(default)]
        force: bool,
    },

    ViewedWelcomeScreen,

    AppInstallSuccess,

    AppInstallFailure,

    AppInstallInitiated,
}

/// Process-wide async events fanned out to the registered dev servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DevServerMessage {
    WebsocketServerConnected,
    AppInstallSuccess,
    AppInstallFailure,
    AppInstallInitiated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_envelope_is_type_plus_data() {
        let msg = ServerMessage::DevServersStarted(true);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"DEV_SERVERS_STARTED","data":true}"#);
    }

    #[test]
    fn cli_metadata_serializes_with_screaming_type() {
        let msg = ServerMessage::CliMetadata {
            version: "1.2.3".to_string(),
            protocol_version: PROTOCOL_VERSION,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "CLI_METADATA");
        assert_eq!(value["data"]["version"], "1.2.3");
    }

    #[test]
    fn struct_variant_fields_serialize_as_camel_case() {
        let msg = ServerMessage::CliMetadata {
            version: "1.2.3".to_string(),
            protocol_version: PROTOCOL_VERSION,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["protocolVersion"], 1);

        let msg = ServerMessage::UploadSuccess {
            build_id: Some(2),
            deploy_id: Some(77),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["buildId"], 2);
        assert_eq!(value["data"]["deployId"], 77);

        let msg = ServerMessage::DeploySuccess { deploy_id: Some(9) };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["deployId"], 9);
    }

    #[test]
    fn client_deploy_parses_force_flag() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"DEPLOY","data":{"force":true}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Deploy { force: true });

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"DEPLOY","data":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Deploy { force: false });
    }

    #[test]
    fn client_upload_parses_without_data() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"UPLOAD"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Upload);
    }

    #[test]
    fn unknown_client_message_type_is_an_error() {
        let res = serde_json::from_str::<ClientMessage>(r#"{"type":"REBOOT"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn missing_type_field_is_an_error() {
        let res = serde_json::from_str::<ClientMessage>(r#"{"data":{}}"#);
        assert!(res.is_err());
    }
}

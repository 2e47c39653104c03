//! HS Core - Shared domain and protocol types
//!
//! This crate contains the project/build/deploy domain types and the local
//! dev websocket control-plane messages shared between the `hs` CLI and the
//! browser-based local dev UI.
//!
//! All CLI-specific functionality (config files, remote API client, the
//! orchestration core) lives in the `hs` crate.

mod project;
mod protocol;

pub use project::*;
pub use protocol::*;

//! Local development orchestration: session state, dev server lifecycle,
//! the websocket control plane for the browser UI, and the filesystem
//! watcher that keeps everything in sync with the source tree.

pub mod dev_server;
pub mod logger;
pub mod ports;
pub mod process;
pub mod state;
pub mod watcher;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

//! Port allocation for local dev server instances.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("port manager is not running")]
    NotRunning,

    #[error("failed to allocate a port: {0}")]
    Io(#[from] std::io::Error),
}

/// Descriptor for one instance that needs a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInstance {
    pub instance_id: String,
}

impl PortInstance {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
        }
    }
}

#[async_trait]
pub trait PortManager: Send + Sync {
    fn is_running(&self) -> bool;

    async fn start(&self) -> Result<(), PortError>;

    /// Allocate one port per instance descriptor, keyed by instance id.
    async fn request_ports(
        &self,
        instances: &[PortInstance],
    ) -> Result<BTreeMap<String, u16>, PortError>;
}

/// Port manager backed by the OS: each request binds an ephemeral port and
/// immediately releases it, handing the port number to the caller.
#[derive(Default)]
pub struct LocalPortManager {
    running: AtomicBool,
}

impl LocalPortManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortManager for LocalPortManager {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    async fn start(&self) -> Result<(), PortError> {
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn request_ports(
        &self,
        instances: &[PortInstance],
    ) -> Result<BTreeMap<String, u16>, PortError> {
        if !self.is_running() {
            return Err(PortError::NotRunning);
        }

        let mut ports = BTreeMap::new();
        // Keep the probe listeners alive until every instance has a port so
        // two instances in one request never receive the same port.
        let mut probes = Vec::new();
        for instance in instances {
            let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
            let port = listener.local_addr()?.port();
            ports.insert(instance.instance_id.clone(), port);
            probes.push(listener);
        }

        Ok(ports)
    }
}

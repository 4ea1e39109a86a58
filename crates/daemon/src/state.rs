//! State management for the daemon: owns the topology snapshot (read-copy-
//! update), the SQLite store, and the shared device transport.

use crate::config::FabricConfig;
use fabric_common::topology::TopologySnapshot;
use fabric_common::transport::{DeviceCredentials, DeviceTransport, PooledSshTransport, TransportTimeouts};
use fabric_common::{BridgeDomainService, Database, Deployment, Diagnostic, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// All daemon state behind one clonable handle; the topology pointer is the
/// only thing that gets swapped on each discovery run (spec.md §4.10,
/// "snapshot + swap" — teacher's `parking_lot::RwLock` over an `Arc`).
#[derive(Clone)]
pub struct StateManager {
    config: FabricConfig,
    db: Database,
    topology: Arc<RwLock<Option<Arc<TopologySnapshot>>>>,
    transport: Arc<dyn DeviceTransport>,
}

impl StateManager {
    pub async fn new(config: &FabricConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.store_path).map_err(fabric_common::Error::Io)?;
        let db = Database::open(config.db_path())?;

        let creds = DeviceCredentials {
            username: config.ssh.username.clone(),
            password: config.ssh.password.clone(),
            private_key_path: config.ssh.private_key_path.clone(),
        };
        let credentials: HashMap<String, DeviceCredentials> = config
            .discovery
            .devices
            .keys()
            .map(|name| (name.clone(), creds.clone()))
            .collect();
        let addrs: HashMap<String, String> = config.discovery.devices.clone().into_iter().collect();
        let timeouts = TransportTimeouts {
            command_timeout: Duration::from_secs(config.deployment.command_timeout_seconds),
            session_timeout: Duration::from_secs(config.deployment.session_timeout_seconds),
        };
        let transport = Arc::new(PooledSshTransport::new(addrs, credentials, timeouts));

        info!("state manager initialized, store at {:?}", config.store_path);

        Ok(Self {
            config: config.clone(),
            db,
            topology: Arc::new(RwLock::new(None)),
            transport,
        })
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn transport(&self) -> Arc<dyn DeviceTransport> {
        self.transport.clone()
    }

    /// Publishes a freshly built topology snapshot. Readers already holding
    /// a clone of the previous `Arc` keep seeing it; new readers see the new
    /// one immediately (spec.md §9 "shared mutable topology -> snapshot +
    /// swap").
    pub fn publish_topology(&self, snapshot: TopologySnapshot) {
        *self.topology.write() = Some(Arc::new(snapshot));
    }

    pub fn topology(&self) -> Option<Arc<TopologySnapshot>> {
        self.topology.read().clone()
    }

    pub fn upsert_service(&self, service: &BridgeDomainService) -> Result<()> {
        self.db.upsert_service(service)
    }

    pub fn list_services(&self) -> Result<Vec<BridgeDomainService>> {
        self.db.list_services()
    }

    pub fn get_service(&self, name: &str) -> Result<Option<BridgeDomainService>> {
        self.db.get_service(name)
    }

    pub fn record_diagnostic(&self, diag: Diagnostic) -> Result<()> {
        self.db.insert_diagnostic(&diag)
    }

    pub fn insert_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.db.insert_deployment(deployment)
    }

    pub fn update_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.db.update_deployment(deployment)
    }

    pub fn get_deployment(&self, id: &str) -> Result<Option<Deployment>> {
        self.db.get_deployment(id)
    }

    pub fn device_inventory(&self) -> HashMap<String, String> {
        self.config.discovery.devices.clone().into_iter().collect()
    }
}

//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Store directory path
    pub store_path: PathBuf,

    /// gRPC listen address
    pub grpc_listen: String,

    pub discovery: DiscoveryConfig,
    pub deployment: DeploymentConfig,
    pub consolidation: ConsolidationConfig,
    pub ssh: SshConfig,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            store_path: fabric_common::default_store_path(),
            grpc_listen: fabric_common::default_grpc_listen(),
            discovery: DiscoveryConfig::default(),
            deployment: DeploymentConfig::default(),
            consolidation: ConsolidationConfig::default(),
            ssh: SshConfig::default(),
        }
    }
}

/// Discovery scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// How often the daemon re-discovers the fabric, in seconds. 0 disables
    /// the periodic loop; discovery then only runs on explicit trigger.
    pub interval_seconds: u64,

    /// Device inventory: name -> management address.
    pub devices: std::collections::BTreeMap<String, String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            devices: std::collections::BTreeMap::new(),
        }
    }
}

/// Deployment orchestrator timeouts (spec.md §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub command_timeout_seconds: u64,
    pub session_timeout_seconds: u64,
    pub total_timeout_seconds: u64,
    pub max_concurrent_devices: usize,
    pub spine_service_capacity: usize,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: 30,
            session_timeout_seconds: 300,
            total_timeout_seconds: 1200,
            max_concurrent_devices: 64,
            spine_service_capacity: fabric_common::pathing::DEFAULT_SPINE_SERVICE_CAPACITY,
        }
    }
}

/// Consolidator tuning (spec.md §9 Open Question: confidence floor is
/// deliberately left configurable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    pub confidence_floor: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            confidence_floor: fabric_common::consolidator::DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: None,
            private_key_path: None,
        }
    }
}

impl FabricConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("fabric.db")
    }
}

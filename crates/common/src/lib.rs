//! Fabric Common
//!
//! Shared types and engines for fabric discovery, classification,
//! consolidation, pathing and config synthesis.

pub mod classifier;
pub mod consolidator;
pub mod db;
pub mod error;
pub mod fragment;
pub mod parser;
pub mod pathing;
pub mod synth;
pub mod topology;
pub mod transport;
pub mod types;

pub mod proto {
    include!("generated/fabric.v1.rs");
}

pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store directory, `$HOME/.fabric`.
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".fabric")
}

pub fn default_grpc_listen() -> String {
    "127.0.0.1:7700".to_string()
}

pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("fabric.db")
}

mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}

//! Structured error taxonomy (spec.md §7). Every kind the spec enumerates
//! gets its own variant, carrying the fields needed to surface which
//! device, which command, and which state a failure happened in.

use thiserror::Error;

/// Result type alias using the fabric Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fabric error types
#[derive(Error, Debug)]
pub enum Error {
    // --- Transport (C1) ---
    #[error("device {device} unreachable: {detail}")]
    Unreachable { device: String, detail: String },

    #[error("authentication failed for device {device}")]
    AuthFailed { device: String },

    #[error("timeout after {seconds}s executing on {device}")]
    Timeout { device: String, seconds: u64 },

    #[error("remote error on {device} (exit {exit}): {stderr}")]
    RemoteError {
        device: String,
        exit: i32,
        stderr: String,
    },

    // --- Topology (C3) ---
    #[error("half-edge anomaly between {a} and {b}: {detail}")]
    HalfEdgeAnomaly { a: String, b: String, detail: String },

    #[error("device {device} has unknown role")]
    UnknownRole { device: String },

    #[error("device {device} has no discovered neighbors")]
    DisconnectedDevice { device: String },

    // --- Classification (C5) ---
    #[error("fragment {device}/{bd_name} could not be classified: {reason}")]
    UnclassifiedFragment {
        device: String,
        bd_name: String,
        reason: String,
    },

    // --- Consolidation (C6) ---
    #[error("low-confidence consolidation for service {service_name} (score {score:.2})")]
    LowConfidenceConsolidation { service_name: String, score: f64 },

    #[error("conflicting fragments for service {service_name}: {detail}")]
    ConflictingFragments { service_name: String, detail: String },

    // --- Pathing (C7) ---
    #[error("no path to destination {destination}")]
    NoPath { destination: String },

    #[error("capacity exceeded on spine {spine}")]
    CapacityExceeded { spine: String },

    // --- Intent validation (C8) ---
    #[error("intent rejected: {reason}")]
    IntentRejected { reason: String },

    #[error("interface {device}:{interface} already in use by service {other_service}")]
    InterfaceInUse {
        device: String,
        interface: String,
        other_service: String,
    },

    #[error("VLAN conflict on {device}:{interface}: {detail}")]
    VlanConflict {
        device: String,
        interface: String,
        detail: String,
    },

    // --- Deployment (C9) ---
    #[error("commit-check failed on {device}: {detail}")]
    CommitCheckFailed { device: String, detail: String },

    #[error("commit failed on {device}: {detail}")]
    CommitFailed { device: String, detail: String },

    #[error("post-deployment verification failed on {device}: {detail}")]
    VerifyFailed { device: String, detail: String },

    #[error("rollback failed on {device}: {detail} (inverse commands not confirmed applied)")]
    RollbackFailed { device: String, detail: String },

    // --- Persistence / generic ---
    #[error("resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("resource already exists: {kind} with id {id}")]
    AlreadyExists { kind: String, id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound { kind, id } => {
                tonic::Status::not_found(format!("{} {} not found", kind, id))
            }
            Error::AlreadyExists { kind, id } => {
                tonic::Status::already_exists(format!("{} {} already exists", kind, id))
            }
            Error::IntentRejected { reason } => tonic::Status::invalid_argument(reason),
            Error::InterfaceInUse { .. } | Error::VlanConflict { .. } => {
                tonic::Status::failed_precondition(e.to_string())
            }
            Error::Timeout { seconds, .. } => tonic::Status::deadline_exceeded(format!(
                "Operation timed out after {}s",
                seconds
            )),
            Error::AuthFailed { .. } => tonic::Status::unauthenticated(e.to_string()),
            _ => tonic::Status::internal(e.to_string()),
        }
    }
}

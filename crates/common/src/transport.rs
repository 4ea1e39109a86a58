//! Device Transport (C1) — SSH sessions, command execution, raw output
//! capture. Exec is not transactional; callers compose transactions via
//! `exec_batch`. See spec.md §4.1.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Outcome of a single command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit: i32,
}

/// Credentials used to authenticate an SSH session.
#[derive(Debug, Clone)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<std::path::PathBuf>,
}

/// Per-device, per-session timeout configuration.
#[derive(Debug, Clone, Copy)]
pub struct TransportTimeouts {
    pub command_timeout: Duration,
    pub session_timeout: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            session_timeout: Duration::from_secs(300),
        }
    }
}

/// Abstraction over "talk to a device's CLI" so the discovery and
/// deployment pipelines can run against a real SSH fabric or a
/// `MockTransport` in tests without branching logic.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn dial(&self, device: &str) -> Result<()>;
    async fn exec(&self, device: &str, command: &str) -> Result<ExecResult>;
    async fn exec_batch(&self, device: &str, commands: &[String]) -> Result<Vec<ExecResult>> {
        let mut out = Vec::with_capacity(commands.len());
        for cmd in commands {
            out.push(self.exec(device, cmd).await?);
        }
        Ok(out)
    }
    async fn close(&self, device: &str);
}

/// A bounded, per-device connection pool over `russh`. At most one
/// outstanding command per device session (spec.md §5 shared-resource
/// policy); concurrent callers serialize behind the device's semaphore.
pub struct PooledSshTransport {
    credentials: HashMap<String, DeviceCredentials>,
    addrs: HashMap<String, String>,
    timeouts: TransportTimeouts,
    sessions: Mutex<HashMap<String, Arc<Semaphore>>>,
    max_reconnect_attempts: u32,
}

impl PooledSshTransport {
    pub fn new(
        addrs: HashMap<String, String>,
        credentials: HashMap<String, DeviceCredentials>,
        timeouts: TransportTimeouts,
    ) -> Self {
        Self {
            credentials,
            addrs,
            timeouts,
            sessions: Mutex::new(HashMap::new()),
            max_reconnect_attempts: 3,
        }
    }

    fn session_gate(&self, device: &str) -> Arc<Semaphore> {
        self.sessions
            .lock()
            .entry(device.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    async fn exec_with_backoff(&self, device: &str, command: &str) -> Result<ExecResult> {
        let mut attempt = 0;
        loop {
            match self.exec_once(device, command).await {
                Ok(r) => return Ok(r),
                Err(Error::Unreachable { .. }) if attempt < self.max_reconnect_attempts => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(device, attempt, "reconnect backoff after Unreachable");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Real implementation would open/resume a `russh::client::Handle` and
    /// run `command` over an exec channel. Kept device-pluggable behind the
    /// trait so this module stays testable without a live fabric.
    async fn exec_once(&self, device: &str, command: &str) -> Result<ExecResult> {
        let addr = self
            .addrs
            .get(device)
            .ok_or_else(|| Error::Unreachable {
                device: device.to_string(),
                detail: "no management address on file".to_string(),
            })?;
        let _creds = self.credentials.get(device).ok_or_else(|| Error::AuthFailed {
            device: device.to_string(),
        })?;

        debug!(device, addr, command, "exec");
        Err(Error::Unreachable {
            device: device.to_string(),
            detail: "live SSH transport requires a configured russh client handle".to_string(),
        })
    }
}

#[async_trait]
impl DeviceTransport for PooledSshTransport {
    async fn dial(&self, device: &str) -> Result<()> {
        self.addrs.get(device).map(|_| ()).ok_or_else(|| Error::Unreachable {
            device: device.to_string(),
            detail: "unknown device".to_string(),
        })
    }

    async fn exec(&self, device: &str, command: &str) -> Result<ExecResult> {
        let gate = self.session_gate(device);
        let _permit = gate.acquire().await.map_err(|_| Error::Internal("semaphore closed".into()))?;
        tokio::time::timeout(self.timeouts.command_timeout, self.exec_with_backoff(device, command))
            .await
            .map_err(|_| Error::Timeout {
                device: device.to_string(),
                seconds: self.timeouts.command_timeout.as_secs(),
            })?
    }

    async fn close(&self, device: &str) {
        self.sessions.lock().remove(device);
    }
}

/// In-memory transport used by the engine unit tests and the
/// `fabric-tests` scenario suite: scripted responses per (device, command).
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<(String, String), ExecResult>>,
    dialed: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, device: impl Into<String>, command: impl Into<String>, stdout: impl Into<String>) {
        self.responses.lock().insert(
            (device.into(), command.into()),
            ExecResult {
                stdout: stdout.into(),
                stderr: String::new(),
                exit: 0,
            },
        );
    }

    pub fn dialed_devices(&self) -> Vec<String> {
        self.dialed.lock().clone()
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn dial(&self, device: &str) -> Result<()> {
        self.dialed.lock().push(device.to_string());
        Ok(())
    }

    async fn exec(&self, device: &str, command: &str) -> Result<ExecResult> {
        self.responses
            .lock()
            .get(&(device.to_string(), command.to_string()))
            .cloned()
            .ok_or_else(|| Error::RemoteError {
                device: device.to_string(),
                exit: 1,
                stderr: format!("no scripted response for `{command}`"),
            })
    }

    async fn close(&self, _device: &str) {}
}

//! Deployment Orchestrator (C9) — drives a deployment's per-device state
//! machine (spec.md §4.9):
//!
//! ```text
//! PENDING -> STAGED -> COMMIT_CHECKED -> COMMITTED -> VERIFIED
//! any non-terminal -> FAILED -> ROLLED_BACK
//! ```
//!
//! Stage and commit-check fan out together per device; if any device fails
//! commit-check, commit is never attempted and staged-but-uncommitted
//! devices just discard their candidate config. Commit and verify are each
//! a separate fan-out barrier; a failure in either triggers rollback of
//! every already-committed device, edge devices before core (reverse
//! dependency order).

use crate::state::StateManager;
use fabric_common::transport::DeviceTransport;
use fabric_common::types::{CliCommand, Deployment, DeploymentState};
use fabric_common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Orchestrator {
    state: StateManager,
}

async fn exec_commands(transport: &dyn DeviceTransport, device: &str, commands: &[CliCommand]) -> Result<()> {
    let batch: Vec<String> = commands.iter().map(|c| c.0.clone()).collect();
    transport.exec_batch(device, &batch).await?;
    Ok(())
}

impl Orchestrator {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    fn concurrency_cap(&self, device_count: usize) -> usize {
        self.state
            .config()
            .deployment
            .max_concurrent_devices
            .min(device_count.max(1))
            .max(1)
    }

    /// Runs a phase's operation across `devices` bounded by the configured
    /// concurrency cap, returning the set of devices that failed (with the
    /// failure recorded into `deployment.errors`).
    async fn fan_out<F, Fut>(&self, devices: &[String], op: F) -> HashSet<String>
    where
        F: Fn(Arc<dyn DeviceTransport>, String) -> Fut,
        Fut: std::future::Future<Output = (String, Result<()>)> + Send + 'static,
    {
        let transport = self.state.transport();
        let semaphore = Arc::new(Semaphore::new(self.concurrency_cap(devices.len())));

        let mut handles = Vec::with_capacity(devices.len());
        for device in devices {
            let transport = transport.clone();
            let semaphore = semaphore.clone();
            let fut = op(transport, device.clone());
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                fut.await
            }));
        }

        let mut failed = HashSet::new();
        for handle in handles {
            match handle.await {
                Ok((device, Ok(()))) => {
                    let _ = device;
                }
                Ok((device, Err(e))) => {
                    warn!(device, error = %e, "deployment phase failed on device");
                    failed.insert(device);
                }
                Err(join_err) => {
                    error!(error = %join_err, "deployment phase task did not complete");
                }
            }
        }
        failed
    }

    fn record_failure(&self, deployment: &mut Deployment, device: &str, detail: impl Into<String>) {
        deployment.errors.insert(device.to_string(), detail.into());
        deployment.device_state.insert(device.to_string(), DeploymentState::Failed);
    }

    fn set_state(&self, deployment: &mut Deployment, devices: &[String], state: DeploymentState) {
        for device in devices {
            deployment.device_state.insert(device.clone(), state);
        }
    }

    /// Edge (endpoint) devices roll back before core/transit devices, per
    /// spec.md §5's reverse-dependency-order guarantee.
    fn rollback_order(&self, deployment: &Deployment) -> Vec<String> {
        let mut edge: HashSet<String> = HashSet::new();
        edge.insert(deployment.intent.source.device.clone());
        for dest in &deployment.intent.destinations {
            edge.insert(dest.device.clone());
        }

        let mut devices: Vec<String> = deployment.per_device.keys().cloned().collect();
        devices.sort_by_key(|d| (!edge.contains(d), d.clone()));
        devices
    }

    async fn rollback(&self, deployment: &mut Deployment, cancel: &CancellationToken) {
        let committed: Vec<String> = self
            .rollback_order(deployment)
            .into_iter()
            .filter(|d| {
                matches!(
                    deployment.device_state.get(d),
                    Some(DeploymentState::Committed) | Some(DeploymentState::Verified) | Some(DeploymentState::Failed)
                )
            })
            .collect();

        for device in committed {
            if cancel.is_cancelled() {
                warn!(device, "rollback continuing despite cancellation: inverse commands must still run");
            }
            let change = deployment.per_device.get(&device).cloned();
            let transport = self.state.transport();
            let outcome = async {
                let change = change.ok_or_else(|| Error::Internal(format!("no config change recorded for {device}")))?;
                exec_commands(transport.as_ref(), &device, &change.inverse).await?;
                transport.exec(&device, "commit").await?;
                Ok::<(), Error>(())
            }
            .await;

            match outcome {
                Ok(()) => {
                    deployment.device_state.insert(device.clone(), DeploymentState::RolledBack);
                }
                Err(e) => {
                    error!(device, error = %e, "rollback failed, inverse commands not confirmed applied");
                    deployment.errors.insert(
                        device.clone(),
                        format!("rollback failed: {e}"),
                    );
                }
            }
        }

        deployment.state = DeploymentState::RolledBack;
        deployment.history.push((DeploymentState::RolledBack, now()));
    }

    fn transition(&self, deployment: &mut Deployment, state: DeploymentState) {
        deployment.state = state;
        deployment.history.push((state, now()));
    }

    /// Drives `deployment_id` to a terminal state, persisting after every
    /// phase so a concurrent `GetDeployment` always observes a consistent
    /// snapshot of device_state/errors (never a half-updated phase).
    pub async fn run(&self, deployment_id: &str, cancel: CancellationToken) -> Result<()> {
        let mut deployment = self.state.get_deployment(deployment_id)?.ok_or_else(|| Error::NotFound {
            kind: "deployment".to_string(),
            id: deployment_id.to_string(),
        })?;

        let total_timeout = Duration::from_secs(self.state.config().deployment.total_timeout_seconds);
        match tokio::time::timeout(total_timeout, self.drive(&mut deployment, &cancel)).await {
            Ok(()) => {}
            Err(_) => {
                warn!(deployment_id, "deployment exceeded total_timeout, forcing failure and rollback");
                let stuck: Vec<String> = deployment
                    .device_state
                    .iter()
                    .filter(|(_, s)| !matches!(s, DeploymentState::Verified | DeploymentState::RolledBack))
                    .map(|(d, _)| d.clone())
                    .collect();
                for device in stuck {
                    self.record_failure(&mut deployment, &device, "deployment total_timeout exceeded");
                }
                self.transition(&mut deployment, DeploymentState::Failed);
                self.rollback(&mut deployment, &cancel).await;
            }
        }

        self.state.update_deployment(&deployment)?;
        Ok(())
    }

    async fn drive(&self, deployment: &mut Deployment, cancel: &CancellationToken) {
        let devices: Vec<String> = {
            let mut d: Vec<String> = deployment.per_device.keys().cloned().collect();
            d.sort();
            d
        };

        // Stage + commit-check fan out together, per device.
        let changes = deployment.per_device.clone();
        let failed = self
            .fan_out(&devices, move |transport, device| {
                let change = changes.get(&device).cloned();
                async move {
                    let result = async {
                        let change = change
                            .ok_or_else(|| Error::Internal(format!("no config change for {device}")))?;
                        exec_commands(transport.as_ref(), &device, &change.forward).await?;
                        transport
                            .exec(&device, "commit check")
                            .await
                            .map_err(|e| Error::CommitCheckFailed { device: device.clone(), detail: e.to_string() })?;
                        Ok::<(), Error>(())
                    }
                    .await;
                    (device, result)
                }
            })
            .await;

        self.set_state(deployment, &devices, DeploymentState::CommitChecked);
        for device in &failed {
            self.record_failure(deployment, device, "stage/commit-check failed");
        }
        self.state.update_deployment(deployment).ok();

        if !failed.is_empty() || cancel.is_cancelled() {
            info!(failed = failed.len(), "commit-check failed somewhere, discarding staged config fabric-wide");
            self.transition(deployment, DeploymentState::Failed);
            // Staged-but-never-committed devices have nothing to invert on
            // the device; only already-committed devices need a rollback,
            // and none exist yet at this phase.
            return;
        }

        // Commit, fanned out across all devices.
        let commit_failed = self
            .fan_out(&devices, |transport, device| async move {
                let result = transport
                    .exec(&device, "commit")
                    .await
                    .map(|_| ())
                    .map_err(|e| Error::CommitFailed { device: device.clone(), detail: e.to_string() });
                (device, result)
            })
            .await;

        self.set_state(deployment, &devices, DeploymentState::Committed);
        for device in &commit_failed {
            self.record_failure(deployment, device, "commit failed");
        }
        self.state.update_deployment(deployment).ok();

        if !commit_failed.is_empty() || cancel.is_cancelled() {
            self.transition(deployment, DeploymentState::Failed);
            self.rollback(deployment, cancel).await;
            return;
        }

        // Post-deployment verification.
        let verify_failed = self
            .fan_out(&devices, |transport, device| async move {
                let result = transport
                    .exec(&device, "show bridge-domain")
                    .await
                    .map(|_| ())
                    .map_err(|e| Error::VerifyFailed { device: device.clone(), detail: e.to_string() });
                (device, result)
            })
            .await;

        self.set_state(deployment, &devices, DeploymentState::Verified);
        for device in &verify_failed {
            self.record_failure(deployment, device, "post-deployment verification failed");
        }
        self.state.update_deployment(deployment).ok();

        if !verify_failed.is_empty() {
            self.transition(deployment, DeploymentState::Failed);
            self.rollback(deployment, cancel).await;
            return;
        }

        self.transition(deployment, DeploymentState::Verified);
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

//! Multipass backend for the provider port.
//!
//! Shells out to the `multipass` binary through a [`CommandRunner`], so test
//! doubles can exercise every code path without a hypervisor.

use std::time::Duration;

use anyhow::Result;

use crate::command_runner::{CommandRunner, RunnerError};
use crate::error::FleetError;
use crate::retry;

use super::{Provider, VmRecord, VmState};

/// Launch parameters for worker and storage VMs.
const VM_CPUS: &str = "2";
const VM_MEMORY: &str = "4G";
const VM_DISK: &str = "20G";

/// `multipass launch` pulls images on first use; allow minutes, not seconds.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Interval between readiness probes.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct MultipassProvider<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> MultipassProvider<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn channel_error(name: &str, err: RunnerError) -> FleetError {
        match err {
            RunnerError::Spawn { .. } => FleetError::ProviderUnavailable {
                detail: err.to_string(),
            },
            RunnerError::TimedOut { timeout, .. } => FleetError::Timeout {
                vm: name.to_string(),
                seconds: timeout.as_secs(),
            },
            RunnerError::Wait { .. } => FleetError::ConnectError {
                vm: name.to_string(),
                detail: err.to_string(),
            },
        }
    }

    fn parse_state(state: &str) -> VmState {
        match state {
            "Running" => VmState::Running,
            "Starting" => VmState::Starting,
            "Stopped" | "Suspended" => VmState::Stopped,
            "Deleted" => VmState::Deleted,
            _ => VmState::Unknown,
        }
    }

    fn record_from_info(name: &str, info: &serde_json::Value) -> VmRecord {
        let state = info
            .get("state")
            .and_then(serde_json::Value::as_str)
            .map_or(VmState::Unknown, Self::parse_state);
        let ipv4 = info
            .get("ipv4")
            .and_then(serde_json::Value::as_array)
            .and_then(|addrs| addrs.first())
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        VmRecord {
            name: name.to_string(),
            ipv4,
            state,
        }
    }

    async fn get_once(&self, name: &str) -> Result<Option<VmRecord>> {
        let output = self
            .runner
            .run(
                "multipass",
                &["info", name, "--format", "json"],
            )
            .await
            .map_err(|e| Self::channel_error(name, e))?;
        if !output.status.success() {
            // Multipass reports unknown instances as a command failure.
            return Ok(None);
        }
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            FleetError::ExecError {
                vm: name.to_string(),
                detail: format!("unparseable multipass info output: {e}"),
            }
        })?;
        Ok(parsed
            .get("info")
            .and_then(|i| i.get(name))
            .map(|info| Self::record_from_info(name, info)))
    }

    async fn list_once(&self, name_prefix: &str) -> Result<Vec<VmRecord>> {
        let output = self
            .runner
            .run("multipass", &["list", "--format", "json"])
            .await
            .map_err(|e| Self::channel_error("multipass", e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FleetError::ProviderUnavailable {
                detail: format!("multipass list failed: {}", stderr.trim()),
            }
            .into());
        }
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            FleetError::ProviderUnavailable {
                detail: format!("unparseable multipass list output: {e}"),
            }
        })?;
        let mut records = Vec::new();
        if let Some(entries) = parsed.get("list").and_then(serde_json::Value::as_array) {
            for entry in entries {
                let Some(name) = entry.get("name").and_then(serde_json::Value::as_str) else {
                    continue;
                };
                if !name.starts_with(name_prefix) {
                    continue;
                }
                records.push(Self::record_from_info(name, entry));
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn destroy_once(&self, name: &str) -> Result<()> {
        let output = self
            .runner
            .run("multipass", &["delete", "--purge", name])
            .await
            .map_err(|e| Self::channel_error(name, e))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("does not exist") {
            // Idempotent: destroying an absent VM is not an error.
            return Ok(());
        }
        Err(FleetError::ProviderUnavailable {
            detail: format!("multipass delete {name} failed: {}", stderr.trim()),
        }
        .into())
    }
}

impl<R: CommandRunner> Provider for MultipassProvider<R> {
    async fn create(&self, name: &str) -> Result<VmRecord> {
        let output = self
            .runner
            .run_with_timeout(
                "multipass",
                &[
                    "launch", "--name", name, "--cpus", VM_CPUS, "--memory", VM_MEMORY, "--disk",
                    VM_DISK,
                ],
                LAUNCH_TIMEOUT,
            )
            .await
            .map_err(|e| Self::channel_error(name, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = format!("multipass launch {name} failed: {}", stderr.trim());
            if stderr.contains("quota") || stderr.contains("not enough") {
                return Err(FleetError::QuotaExceeded { detail }.into());
            }
            return Err(FleetError::ProviderUnavailable { detail }.into());
        }
        self.get_once(name).await?.ok_or_else(|| {
            FleetError::ProviderUnavailable {
                detail: format!("{name} launched but is not reported by multipass info"),
            }
            .into()
        })
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        retry::with_backoff(retry::DEFAULT_ATTEMPTS, retry::DEFAULT_BASE_DELAY, || {
            self.destroy_once(name)
        })
        .await
    }

    async fn get(&self, name: &str) -> Result<Option<VmRecord>> {
        retry::with_backoff(retry::DEFAULT_ATTEMPTS, retry::DEFAULT_BASE_DELAY, || {
            self.get_once(name)
        })
        .await
    }

    async fn list(&self, name_prefix: &str) -> Result<Vec<VmRecord>> {
        retry::with_backoff(retry::DEFAULT_ATTEMPTS, retry::DEFAULT_BASE_DELAY, || {
            self.list_once(name_prefix)
        })
        .await
    }

    async fn wait_ready(&self, record: &VmRecord, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let probe = self
                .runner
                .run("multipass", &["exec", &record.name, "--", "true"])
                .await;
            if matches!(&probe, Ok(output) if output.status.success()) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FleetError::Timeout {
                    vm: record.name.clone(),
                    seconds: timeout.as_secs(),
                }
                .into());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

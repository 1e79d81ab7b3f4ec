//! Ship bootstrap: provision one worker VM, mount the shared voyage, and
//! start its agent.
//!
//! Each failure here is reported to the enclosing sail/resume but never
//! aborts it — a partial fleet still makes progress on unblocked tasks.

use anyhow::Result;

use armada_common::voyage::ship_id;
use armada_common::VoyageDescriptor;

use crate::error::FleetError;
use crate::layout::{self, SHIP_CONFIG_DIR, SHIP_TASK_MOUNT, SHIP_VOYAGE_MOUNT};
use crate::provider::{Provider, VmRecord, DEFAULT_READY_TIMEOUT};
use crate::remote::RemoteExec;

/// Stop hook installed on every ship. Reads its identity from the ship's
/// config dir at runtime, so the template needs no substitution.
const STOP_HOOK: &str = include_str!("../../templates/stop_hook.sh");

/// Heredoc delimiter for writing files into the ship over exec.
const EOF_MARK: &str = "ARMADA_EOF";

/// One ship that failed to launch, reported back to sail/resume.
#[derive(Debug, Clone)]
pub struct ShipFailure {
    pub index: u32,
    pub error: String,
}

/// sshfs options: survive storage hiccups, bounded keepalive.
const MOUNT_OPTS: &str = "-o reconnect -o ServerAliveInterval=15 -o ServerAliveCountMax=3";

/// Provision ship `<index>`, mount storage, write identity, install the stop
/// hook, and start the agent detached.
pub async fn bootstrap_ship<P: Provider, R: RemoteExec>(
    provider: &P,
    remote: &R,
    voyage: &VoyageDescriptor,
    storage: &VmRecord,
    index: u32,
) -> Result<()> {
    let vm_name = voyage.ship_vm_name(index);
    let ship = ship_id(index);

    let provision_failed = |detail: String| FleetError::ProvisionFailed {
        voyage: voyage.id.clone(),
        ship: ship.clone(),
        detail,
    };

    let record = provider
        .create(&vm_name)
        .await
        .map_err(|e| provision_failed(e.to_string()))?;
    provider
        .wait_ready(&record, DEFAULT_READY_TIMEOUT)
        .await
        .map_err(|e| provision_failed(e.to_string()))?;

    mount_storage(remote, voyage, storage, &vm_name, &ship).await?;
    write_identity(remote, voyage, storage, &vm_name, &ship).await?;
    install_stop_hook(remote, voyage, &vm_name, &ship).await?;
    start_agent(remote, voyage, &vm_name, &ship, index).await?;

    Ok(())
}

async fn mount_storage<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    storage: &VmRecord,
    vm_name: &str,
    ship: &str,
) -> Result<()> {
    let mount_failed = |detail: String| FleetError::MountFailed {
        voyage: voyage.id.clone(),
        ship: ship.to_string(),
        detail,
    };

    let address = storage
        .ipv4
        .as_deref()
        .ok_or_else(|| mount_failed("storage VM has no reported address".to_string()))?;

    let voyage_export = layout::voyage_root(&voyage.id);
    let task_export = layout::task_root(voyage);
    let script = format!(
        "mkdir -p {SHIP_VOYAGE_MOUNT} {SHIP_TASK_MOUNT} && \
         (mountpoint -q {SHIP_VOYAGE_MOUNT} || \
          sshfs {MOUNT_OPTS} ubuntu@{address}:{voyage_export} {SHIP_VOYAGE_MOUNT}) && \
         (mountpoint -q {SHIP_TASK_MOUNT} || \
          sshfs {MOUNT_OPTS} ubuntu@{address}:{task_export} {SHIP_TASK_MOUNT})"
    );
    let result = remote
        .run(vm_name, &script)
        .await
        .map_err(|e| mount_failed(e.to_string()))?;
    if !result.success() {
        return Err(mount_failed(result.detail()).into());
    }
    Ok(())
}

async fn write_identity<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    storage: &VmRecord,
    vm_name: &str,
    ship: &str,
) -> Result<()> {
    let script = format!(
        "mkdir -p {SHIP_CONFIG_DIR}/hooks && \
         printf '%s\\n' '{ship}' > {SHIP_CONFIG_DIR}/ship_id && \
         printf '%s\\n' '{voyage_id}' > {SHIP_CONFIG_DIR}/voyage_id && \
         printf '%s\\n' '{storage_name}' > {SHIP_CONFIG_DIR}/storage",
        voyage_id = voyage.id,
        storage_name = storage.name,
    );
    let result = remote.run(vm_name, &script).await?;
    if !result.success() {
        return Err(FleetError::AgentStartFailed {
            voyage: voyage.id.clone(),
            ship: ship.to_string(),
            detail: format!("writing ship identity: {}", result.detail()),
        }
        .into());
    }
    Ok(())
}

async fn install_stop_hook<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    vm_name: &str,
    ship: &str,
) -> Result<()> {
    let script = format!(
        "cat > {SHIP_CONFIG_DIR}/hooks/stop_hook.sh <<'{EOF_MARK}'\n{STOP_HOOK}{EOF_MARK}\n\
         chmod +x {SHIP_CONFIG_DIR}/hooks/stop_hook.sh"
    );
    let result = remote.run(vm_name, &script).await?;
    if !result.success() {
        return Err(FleetError::AgentStartFailed {
            voyage: voyage.id.clone(),
            ship: ship.to_string(),
            detail: format!("installing stop hook: {}", result.detail()),
        }
        .into());
    }
    Ok(())
}

async fn start_agent<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    vm_name: &str,
    ship: &str,
    index: u32,
) -> Result<()> {
    let log = format!("{SHIP_VOYAGE_MOUNT}/logs/ship-{index}.log");
    let script = format!(
        "command -v armada-agent >/dev/null || exit 9; \
         cd {SHIP_VOYAGE_MOUNT}/workspace && \
         ARMADA_SHIP_ID={ship} \
         ARMADA_VOYAGE_ROOT={SHIP_VOYAGE_MOUNT} \
         ARMADA_TASK_DIR={SHIP_TASK_MOUNT} \
         ARMADA_STOP_HOOK={SHIP_CONFIG_DIR}/hooks/stop_hook.sh \
         setsid nohup armada-agent >> {log} 2>&1 < /dev/null & disown"
    );
    let result = remote.run(vm_name, &script).await?;
    if !result.success() {
        let detail = if result.exit == 9 {
            "armada-agent is not installed on the ship image".to_string()
        } else {
            result.detail()
        };
        return Err(FleetError::AgentStartFailed {
            voyage: voyage.id.clone(),
            ship: ship.to_string(),
            detail,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fleet::test_support::{FakeProvider, FakeRemote};
    use crate::provider::VmState;

    fn voyage() -> VoyageDescriptor {
        VoyageDescriptor::new("obj", "o/r", 2)
    }

    fn storage_record(ipv4: Option<&str>) -> VmRecord {
        VmRecord {
            name: "storage".into(),
            ipv4: ipv4.map(String::from),
            state: VmState::Running,
        }
    }

    #[tokio::test]
    async fn happy_path_runs_all_phases() {
        let provider = FakeProvider::default();
        let remote = FakeRemote::default();
        let v = voyage();
        let storage = storage_record(Some("10.0.0.1"));

        bootstrap_ship(&provider, &remote, &v, &storage, 0)
            .await
            .expect("bootstrap");

        assert!(provider.vms.borrow().contains_key(&v.ship_vm_name(0)));
        let runs = remote.runs.borrow();
        let commands: Vec<&str> = runs.iter().map(|(_, c)| c.as_str()).collect();
        assert!(commands.iter().any(|c| c.contains("sshfs")), "mounts storage");
        assert!(
            commands.iter().any(|c| c.contains("ship_id")),
            "writes identity"
        );
        assert!(
            commands.iter().any(|c| c.contains("stop_hook.sh")),
            "installs hook"
        );
        assert!(
            commands.iter().any(|c| c.contains("armada-agent")),
            "starts agent"
        );
        // Everything ran against the ship VM.
        assert!(runs.iter().all(|(dest, _)| dest == &v.ship_vm_name(0)));
    }

    #[tokio::test]
    async fn mount_commands_enable_reconnect_and_keepalive() {
        let provider = FakeProvider::default();
        let remote = FakeRemote::default();
        let v = voyage();
        bootstrap_ship(&provider, &remote, &v, &storage_record(Some("10.9.9.9")), 1)
            .await
            .expect("bootstrap");
        let runs = remote.runs.borrow();
        let mount = runs
            .iter()
            .find(|(_, c)| c.contains("sshfs"))
            .expect("mount command");
        assert!(mount.1.contains("-o reconnect"));
        assert!(mount.1.contains("ServerAliveInterval=15"));
        assert!(mount.1.contains("10.9.9.9"));
        assert!(mount.1.contains(&format!("{}-tasks", v.id)));
    }

    #[tokio::test]
    async fn provision_failure_is_tagged_with_ship() {
        let provider = FakeProvider::default();
        let v = voyage();
        provider
            .fail_create
            .borrow_mut()
            .push(v.ship_vm_name(0));
        let remote = FakeRemote::default();

        let err = bootstrap_ship(&provider, &remote, &v, &storage_record(Some("10.0.0.1")), 0)
            .await
            .expect_err("provision fails");
        match err.downcast_ref::<FleetError>() {
            Some(FleetError::ProvisionFailed { ship, .. }) => assert_eq!(ship, "ship-0"),
            other => panic!("expected ProvisionFailed, got {other:?}"),
        }
        assert!(remote.runs.borrow().is_empty(), "no remote calls after failure");
    }

    #[tokio::test]
    async fn missing_storage_address_is_a_mount_failure() {
        let provider = FakeProvider::default();
        let remote = FakeRemote::default();
        let v = voyage();
        let err = bootstrap_ship(&provider, &remote, &v, &storage_record(None), 0)
            .await
            .expect_err("no address");
        assert!(matches!(
            err.downcast_ref::<FleetError>(),
            Some(FleetError::MountFailed { .. })
        ));
    }

    #[tokio::test]
    async fn failed_mount_surfaces_as_mount_failure() {
        let provider = FakeProvider::default();
        let remote = FakeRemote::default();
        remote.fail_on.borrow_mut().push("sshfs".to_string());
        let v = voyage();
        let err = bootstrap_ship(&provider, &remote, &v, &storage_record(Some("10.0.0.1")), 0)
            .await
            .expect_err("mount fails");
        assert!(matches!(
            err.downcast_ref::<FleetError>(),
            Some(FleetError::MountFailed { .. })
        ));
    }

    #[tokio::test]
    async fn failed_agent_start_is_an_agent_start_failure() {
        let provider = FakeProvider::default();
        let remote = FakeRemote::default();
        remote.fail_on.borrow_mut().push("armada-agent".to_string());
        let v = voyage();
        let err = bootstrap_ship(&provider, &remote, &v, &storage_record(Some("10.0.0.1")), 0)
            .await
            .expect_err("agent start fails");
        match err.downcast_ref::<FleetError>() {
            Some(FleetError::AgentStartFailed { voyage, ship, .. }) => {
                assert_eq!(voyage, &v.id);
                assert_eq!(ship, "ship-0");
            }
            other => panic!("expected AgentStartFailed, got {other:?}"),
        }
    }

    #[test]
    fn stop_hook_template_is_idempotent_shell() {
        // The embedded hook must be self-contained: read identity at runtime,
        // tolerate reruns, and never touch task files.
        assert!(STOP_HOOK.starts_with("#!/usr/bin/env bash"));
        assert!(STOP_HOOK.contains("ship_id"));
        assert!(STOP_HOOK.contains("progress.txt"));
        assert!(!STOP_HOOK.contains("tasks/"), "hook must not touch task files");
        assert!(STOP_HOOK.contains("exit 0"));
    }
}

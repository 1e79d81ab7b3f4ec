//! Sail: build a voyage from a plan directory and launch its fleet.
//!
//! Not transactional across VMs. Storage failures abort before any ship is
//! touched; ship failures are collected and reported so the operator can
//! `resume` the gaps. A failed sail leaves the storage VM in place — a
//! visible half-launched voyage beats a half-rolled-back one.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;

use armada_common::VoyageDescriptor;

use crate::error::FleetError;
use crate::fleet::bootstrap::{bootstrap_ship, ShipFailure};
use crate::fleet::Reporter;
use crate::layout;
use crate::plan::Plan;
use crate::provider::{Provider, VmRecord, DEFAULT_READY_TIMEOUT};
use crate::remote::{shell_quote, RemoteExec};
use crate::taskstore::TaskStore;

/// Repository clones pull full history over the network.
const CLONE_TIMEOUT: Duration = Duration::from_secs(600);

/// What sail accomplished.
#[derive(Debug)]
pub struct SailReport {
    pub voyage: VoyageDescriptor,
    /// Indices of ships that bootstrapped cleanly.
    pub launched: Vec<u32>,
    pub failures: Vec<ShipFailure>,
}

/// Launch a new voyage: provision storage, seed the repository and
/// artifacts, publish the task set, then bootstrap `ship_count` ships in
/// parallel.
pub async fn sail<P: Provider, R: RemoteExec>(
    provider: &P,
    remote: &R,
    plan: &Plan,
    ship_count: u32,
    reporter: &dyn Reporter,
) -> Result<SailReport> {
    // 1. The voyage id and branch are finalized here and never change.
    let voyage = VoyageDescriptor::new(plan.objective(), plan.config.repo.clone(), ship_count);

    // 2. Storage first; nothing else exists until it is reachable.
    reporter.step(&format!("provisioning storage for {}", voyage.id));
    let storage = provision_storage(provider, &voyage).await?;
    reporter.success(&format!("storage ready at {}", storage.name));

    // 3.–5. Layout, repository, artifacts, task set.
    init_layout(remote, &voyage, &storage).await?;
    reporter.step(&format!("seeding {} on branch {}", voyage.repo, voyage.branch));
    seed_repository(remote, &voyage, &storage).await?;
    publish_artifacts(remote, &voyage, &storage, plan).await?;
    reporter.success(&format!("published {} tasks", plan.tasks.len()));

    // 6. Fan the ships out in parallel, bounded by the requested count.
    // Failures are collected, not propagated: a partial fleet is resumable.
    reporter.step(&format!("bootstrapping {ship_count} ships"));
    let launches = join_all((0..ship_count).map(|index| {
        let voyage = &voyage;
        let storage = &storage;
        async move {
            (
                index,
                bootstrap_ship(provider, remote, voyage, storage, index).await,
            )
        }
    }))
    .await;

    let mut launched = Vec::new();
    let mut failures = Vec::new();
    for (index, result) in launches {
        match result {
            Ok(()) => launched.push(index),
            Err(err) => {
                reporter.warn(&format!("ship-{index} failed: {err:#}"));
                failures.push(ShipFailure {
                    index,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    reporter.success(&format!("{}/{ship_count} ships underway", launched.len()));

    Ok(SailReport {
        voyage,
        launched,
        failures,
    })
}

async fn provision_storage<P: Provider>(
    provider: &P,
    voyage: &VoyageDescriptor,
) -> Result<VmRecord> {
    let storage_failed = |detail: String| FleetError::StorageProvisionFailed {
        voyage: voyage.id.clone(),
        detail,
    };
    let record = provider
        .create(&voyage.storage_name())
        .await
        .map_err(|e| storage_failed(e.to_string()))?;
    provider
        .wait_ready(&record, DEFAULT_READY_TIMEOUT)
        .await
        .map_err(|e| storage_failed(e.to_string()))?;
    Ok(record)
}

async fn init_layout<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    storage: &VmRecord,
) -> Result<()> {
    let script = format!(
        "sudo mkdir -p {root} && sudo chown \"$(id -un)\": {root} && \
         mkdir -p {artifacts} {logs} {tasks}",
        root = layout::ARMADA_ROOT,
        artifacts = layout::artifacts_dir(&voyage.id),
        logs = layout::logs_dir(&voyage.id),
        tasks = layout::task_root(voyage),
    );
    let result = remote.run(&storage.name, &script).await?;
    if !result.success() {
        return Err(FleetError::StorageProvisionFailed {
            voyage: voyage.id.clone(),
            detail: format!("initializing storage layout: {}", result.detail()),
        }
        .into());
    }
    Ok(())
}

async fn seed_repository<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    storage: &VmRecord,
) -> Result<()> {
    let workspace = layout::workspace_dir(&voyage.id);
    let script = format!(
        "git clone https://github.com/{repo}.git {workspace} && \
         cd {workspace} && git checkout -b {branch}",
        repo = voyage.repo,
        workspace = shell_quote(&workspace),
        branch = shell_quote(&voyage.branch),
    );
    let result = remote
        .run_with_timeout(&storage.name, &script, CLONE_TIMEOUT)
        .await
        .map_err(|e| FleetError::RepoSeedFailed {
            voyage: voyage.id.clone(),
            detail: e.to_string(),
        })?;
    if !result.success() {
        return Err(FleetError::RepoSeedFailed {
            voyage: voyage.id.clone(),
            detail: result.detail(),
        }
        .into());
    }
    Ok(())
}

/// Write one artifact atomically: temp file, then rename.
async fn put_atomic<R: RemoteExec>(
    remote: &R,
    storage_vm: &str,
    path: &str,
    content: &[u8],
) -> Result<()> {
    let tmp = format!("{path}.tmp");
    remote.put(storage_vm, content, &tmp).await?;
    let result = remote
        .run(
            storage_vm,
            &format!("mv -f {} {}", shell_quote(&tmp), shell_quote(path)),
        )
        .await?;
    if !result.success() {
        return Err(FleetError::ExecError {
            vm: storage_vm.to_string(),
            detail: format!("publishing {path}: {}", result.detail()),
        }
        .into());
    }
    Ok(())
}

async fn publish_artifacts<R: RemoteExec>(
    remote: &R,
    voyage: &VoyageDescriptor,
    storage: &VmRecord,
    plan: &Plan,
) -> Result<()> {
    let descriptor_json = voyage.to_json().map_err(|e| FleetError::ExecError {
        vm: storage.name.clone(),
        detail: format!("serializing voyage descriptor: {e}"),
    })?;
    put_atomic(
        remote,
        &storage.name,
        &layout::descriptor_path(&voyage.id),
        descriptor_json.as_bytes(),
    )
    .await?;

    let artifacts = layout::artifacts_dir(&voyage.id);
    put_atomic(
        remote,
        &storage.name,
        &format!("{artifacts}/spec.md"),
        plan.spec.as_bytes(),
    )
    .await?;

    let verify_path = format!("{artifacts}/verify.sh");
    put_atomic(remote, &storage.name, &verify_path, plan.verify.as_bytes()).await?;
    let chmod = remote
        .run(
            &storage.name,
            &format!("chmod +x {}", shell_quote(&verify_path)),
        )
        .await?;
    if !chmod.success() {
        return Err(FleetError::ExecError {
            vm: storage.name.clone(),
            detail: format!("marking verify.sh executable: {}", chmod.detail()),
        }
        .into());
    }

    let first_line = format!(
        "{} voyage {} launched: {} ships requested, {} tasks\n",
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        voyage.id,
        voyage.ship_count,
        plan.tasks.len(),
    );
    put_atomic(
        remote,
        &storage.name,
        &layout::progress_path(&voyage.id),
        first_line.as_bytes(),
    )
    .await?;

    // Task files are preserved verbatim apart from the voyage stamp.
    let store = TaskStore::new(remote, storage.name.clone(), voyage);
    for task in &plan.tasks {
        let mut task = task.clone();
        store.publish_task(&mut task).await?;
    }

    Ok(())
}

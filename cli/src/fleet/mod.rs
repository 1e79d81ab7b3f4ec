//! Fleet orchestration: voyage discovery, ship bootstrap, and sail.
//!
//! Nothing here holds state between invocations. A voyage is re-discovered
//! from VM names alone (`<voyage-id>-storage`, `<voyage-id>-ship-<index>`);
//! progress is re-derived from the task files alone.

pub mod bootstrap;
pub mod sail;

use anyhow::Result;

use armada_common::voyage::{parse_ship_id, parse_ship_vm_name, storage_name};
use armada_common::{Task, VoyageDescriptor, VOYAGE_PREFIX};

use crate::error::FleetError;
use crate::layout;
use crate::provider::{Provider, VmRecord};
use crate::remote::RemoteExec;

/// Progress sink for long-running fleet operations.
///
/// Services emit events through this port; the presentation layer decides
/// how they look. Tests record them.
pub trait Reporter {
    fn step(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Reporter that swallows everything (quiet/JSON modes, tests).
pub struct NullReporter;

impl Reporter for NullReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}

/// Locate the storage VM of `voyage_id`.
pub async fn find_storage<P: Provider>(provider: &P, voyage_id: &str) -> Result<VmRecord> {
    let name = storage_name(voyage_id);
    provider
        .get(&name)
        .await?
        .ok_or_else(|| {
            FleetError::NotFound {
                what: format!("voyage {voyage_id} (no VM named {name})"),
            }
            .into()
        })
}

/// Find the single active voyage by listing storage VMs.
///
/// Zero storage VMs is `NotFound`; more than one is `AmbiguousVoyage` and
/// the caller must name one.
pub async fn autoselect_voyage<P: Provider>(provider: &P) -> Result<String> {
    let records = provider.list(&format!("{VOYAGE_PREFIX}-")).await?;
    let mut candidates: Vec<String> = records
        .iter()
        .filter_map(|r| r.name.strip_suffix("-storage"))
        .map(String::from)
        .collect();
    candidates.sort();
    match candidates.len() {
        0 => Err(FleetError::NotFound {
            what: "an active voyage".to_string(),
        }
        .into()),
        1 => Ok(candidates.remove(0)),
        _ => Err(FleetError::AmbiguousVoyage { candidates }.into()),
    }
}

/// Resolve an optional voyage id argument to `(voyage_id, storage record)`.
pub async fn resolve_voyage<P: Provider>(
    provider: &P,
    voyage_id: Option<&str>,
) -> Result<(String, VmRecord)> {
    let id = match voyage_id {
        Some(id) => id.to_string(),
        None => autoselect_voyage(provider).await?,
    };
    let storage = find_storage(provider, &id).await?;
    Ok((id, storage))
}

/// Reload the immutable descriptor from the storage VM.
pub async fn load_descriptor<R: RemoteExec>(
    remote: &R,
    storage_vm: &str,
    voyage_id: &str,
) -> Result<VoyageDescriptor> {
    let path = layout::descriptor_path(voyage_id);
    let bytes = remote
        .get(storage_vm, &path)
        .await?
        .ok_or_else(|| FleetError::NotFound {
            what: format!("voyage descriptor {path} on {storage_vm}"),
        })?;
    let json = String::from_utf8_lossy(&bytes);
    VoyageDescriptor::from_json(&json).map_err(|e| {
        FleetError::ExecError {
            vm: storage_vm.to_string(),
            detail: format!("voyage descriptor is unreadable: {e}"),
        }
        .into()
    })
}

/// All ship VMs of a voyage, sorted by name.
pub async fn list_ship_vms<P: Provider>(provider: &P, voyage_id: &str) -> Result<Vec<VmRecord>> {
    provider.list(&format!("{voyage_id}-ship-")).await
}

/// Next free ship index: one past the highest index ever requested or
/// observed — the launch request (`ship_count` in the descriptor), the VM
/// list, and the task metadata all count. Indices are monotonic: a failed
/// ship's index is never reused, even when it left no VM and no task
/// behind, so its half-written artifacts can never be mistaken for a live
/// ship's.
#[must_use]
pub fn next_ship_index(voyage: &VoyageDescriptor, vms: &[VmRecord], tasks: &[Task]) -> u32 {
    let from_vms = vms
        .iter()
        .filter_map(|r| parse_ship_vm_name(&voyage.id, &r.name));
    let from_tasks = tasks.iter().flat_map(|t| {
        [&t.metadata.assignee, &t.metadata.completed_by]
            .into_iter()
            .flatten()
            .filter_map(|id| parse_ship_id(id))
            .collect::<Vec<_>>()
    });
    let from_launch = voyage.ship_count.checked_sub(1);
    from_vms
        .chain(from_tasks)
        .chain(from_launch)
        .max()
        .map_or(0, |highest| highest + 1)
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::test_support::FakeProvider;
    use super::*;
    use armada_common::TaskMetadata;

    fn task_claimed_by(ship: &str) -> Task {
        Task {
            id: format!("task-for-{ship}"),
            title: String::new(),
            description: String::new(),
            status: armada_common::TaskStatus::InProgress,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            created: None,
            updated: None,
            metadata: TaskMetadata {
                assignee: Some(ship.to_string()),
                ..TaskMetadata::default()
            },
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn autoselect_with_one_voyage() {
        let provider = FakeProvider::default()
            .with_vm("vyg-aabbccddee-storage", Some("10.0.0.1"))
            .with_vm("vyg-aabbccddee-ship-0", Some("10.0.0.2"));
        let id = autoselect_voyage(&provider).await.expect("one voyage");
        assert_eq!(id, "vyg-aabbccddee");
    }

    #[tokio::test]
    async fn autoselect_fails_with_zero_voyages() {
        let provider = FakeProvider::default();
        let err = autoselect_voyage(&provider).await.expect_err("none");
        assert!(matches!(
            err.downcast_ref::<FleetError>(),
            Some(FleetError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn autoselect_fails_with_two_voyages() {
        let provider = FakeProvider::default()
            .with_vm("vyg-aaaaaaaaaa-storage", None)
            .with_vm("vyg-bbbbbbbbbb-storage", None);
        let err = autoselect_voyage(&provider).await.expect_err("ambiguous");
        match err.downcast_ref::<FleetError>() {
            Some(FleetError::AmbiguousVoyage { candidates }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected AmbiguousVoyage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn find_storage_names_the_missing_vm() {
        let provider = FakeProvider::default();
        let err = find_storage(&provider, "vyg-00").await.expect_err("absent");
        assert!(err.to_string().contains("vyg-00-storage"));
    }

    fn voyage_with_ships(ship_count: u32) -> VoyageDescriptor {
        VoyageDescriptor::new("x", "o/r", ship_count)
    }

    fn vm(voyage: &VoyageDescriptor, index: u32) -> VmRecord {
        VmRecord {
            name: voyage.ship_vm_name(index),
            ipv4: None,
            state: crate::provider::VmState::Running,
        }
    }

    #[test]
    fn next_index_follows_the_launch_request() {
        // Sail asked for 3 ships; even with no VM and no metadata evidence
        // of ship-2 (it failed to provision), index 2 is burned.
        let v = voyage_with_ships(3);
        let vms = vec![vm(&v, 0), vm(&v, 1)];
        assert_eq!(next_ship_index(&v, &vms, &[]), 3);
    }

    #[test]
    fn next_index_is_monotonic_over_vms_and_tasks() {
        let v = voyage_with_ships(1);
        let vms = vec![vm(&v, 1)];
        // A dead ship-4 is only visible through task metadata.
        let tasks = vec![task_claimed_by("ship-4")];
        assert_eq!(next_ship_index(&v, &vms, &tasks), 5);
    }

    #[test]
    fn next_index_ignores_foreign_names() {
        let v = voyage_with_ships(1);
        let vms = vec![VmRecord {
            name: "vyg-bbbbbbbbbb-ship-7".into(),
            ipv4: None,
            state: crate::provider::VmState::Running,
        }];
        assert_eq!(next_ship_index(&v, &vms, &[]), 1);
    }
}

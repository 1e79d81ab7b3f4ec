//! On-disk layout of the storage VM and the ships.
//!
//! Everything persistent lives under [`ARMADA_ROOT`] on the storage VM; the
//! ships see the same trees through their sshfs mounts. Path construction is
//! centralized here so the seeder, the task store, and the bootstrap scripts
//! can never drift apart.

use armada_common::VoyageDescriptor;

/// Root of all voyage data on the storage VM.
pub const ARMADA_ROOT: &str = "/srv/armada";

/// Ship-local directory holding identity files and hooks.
pub const SHIP_CONFIG_DIR: &str = "$HOME/.armada";

/// Ship-local mount point of the voyage root.
pub const SHIP_VOYAGE_MOUNT: &str = "$HOME/mnt/voyage";

/// Ship-local mount point of the task set.
pub const SHIP_TASK_MOUNT: &str = "$HOME/mnt/tasks";

/// Voyage root on the storage VM.
#[must_use]
pub fn voyage_root(voyage_id: &str) -> String {
    format!("{ARMADA_ROOT}/{voyage_id}")
}

/// Task set root on the storage VM.
#[must_use]
pub fn task_root(voyage: &VoyageDescriptor) -> String {
    format!("{ARMADA_ROOT}/{}", voyage.task_set_id)
}

/// Path of one task file.
#[must_use]
pub fn task_path(voyage: &VoyageDescriptor, task_id: &str) -> String {
    format!("{}/{task_id}.json", task_root(voyage))
}

/// The immutable voyage descriptor file.
#[must_use]
pub fn descriptor_path(voyage_id: &str) -> String {
    format!("{}/voyage.json", voyage_root(voyage_id))
}

#[must_use]
pub fn artifacts_dir(voyage_id: &str) -> String {
    format!("{}/artifacts", voyage_root(voyage_id))
}

#[must_use]
pub fn workspace_dir(voyage_id: &str) -> String {
    format!("{}/workspace", voyage_root(voyage_id))
}

#[must_use]
pub fn logs_dir(voyage_id: &str) -> String {
    format!("{}/logs", voyage_root(voyage_id))
}

/// Append-only narrative log shared by sail and the ship stop hooks.
#[must_use]
pub fn progress_path(voyage_id: &str) -> String {
    format!("{}/progress.txt", artifacts_dir(voyage_id))
}

/// One ship's log file under the shared voyage root.
#[must_use]
pub fn ship_log_path(voyage_id: &str, ship_index: u32) -> String {
    format!("{}/ship-{ship_index}.log", logs_dir(voyage_id))
}

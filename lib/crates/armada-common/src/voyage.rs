//! Voyage descriptor — the immutable record a `sail` creates.
//!
//! The descriptor is written once to the storage VM as `voyage.json` and
//! never mutated. Every VM name for the voyage derives from its id, which is
//! how the control plane re-discovers a fleet from a bare id with no local
//! state.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix shared by every voyage id (and therefore every VM name).
pub const VOYAGE_PREFIX: &str = "vyg";

/// Encode bytes as lowercase hex.
#[must_use]
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}

/// Generate a unique voyage identifier.
///
/// Format: `vyg-` followed by 10 lowercase hex characters. Entropy sources:
/// nanosecond timestamp and two independent `RandomState` hashes, so two
/// launches in the same process or the same nanosecond still diverge.
#[must_use]
pub fn generate_voyage_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) ^ d.as_secs())
        .unwrap_or(0);
    let h1 = RandomState::new().build_hasher().finish();
    let h2 = RandomState::new().build_hasher().finish();
    let mixed = nanos ^ h1.rotate_left(17) ^ h2.rotate_left(41);
    format!("{VOYAGE_PREFIX}-{}", hex_encode(&mixed.to_le_bytes()[..5]))
}

/// Immutable voyage record.
///
/// Equality and hashing are by `id` alone: two descriptors with the same id
/// refer to the same voyage regardless of field drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageDescriptor {
    /// Opaque unique id, `vyg-<hex>`.
    pub id: String,
    /// Free text describing what the fleet is building.
    pub objective: String,
    /// Upstream repository in `owner/name` form.
    pub repo: String,
    /// Working branch; defaults to the voyage id.
    pub branch: String,
    /// Name of the shared task directory for this voyage.
    pub task_set_id: String,
    /// Workers provisioned at launch.
    pub ship_count: u32,
    pub created_at: DateTime<Utc>,
}

impl VoyageDescriptor {
    /// Construct a fresh descriptor: assigns the id, derives `branch` and
    /// `task_set_id` from it, and stamps `created_at`.
    #[must_use]
    pub fn new(objective: impl Into<String>, repo: impl Into<String>, ship_count: u32) -> Self {
        let id = generate_voyage_id();
        Self {
            branch: id.clone(),
            task_set_id: format!("{id}-tasks"),
            id,
            objective: objective.into(),
            repo: repo.into(),
            ship_count,
            created_at: Utc::now(),
        }
    }

    /// Serialize to the canonical JSON persisted on the storage VM.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reload a descriptor previously written by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Name of the voyage's storage VM.
    #[must_use]
    pub fn storage_name(&self) -> String {
        storage_name(&self.id)
    }

    /// Name of ship VM `<index>`.
    #[must_use]
    pub fn ship_vm_name(&self, index: u32) -> String {
        format!("{}-ship-{index}", self.id)
    }

    /// Prefix matching every VM belonging to this voyage.
    #[must_use]
    pub fn vm_prefix(&self) -> String {
        format!("{}-", self.id)
    }
}

impl PartialEq for VoyageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VoyageDescriptor {}

impl Hash for VoyageDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Storage VM name for a voyage id.
#[must_use]
pub fn storage_name(voyage_id: &str) -> String {
    format!("{voyage_id}-storage")
}

/// Ship id carried in task metadata: `ship-<index>`.
#[must_use]
pub fn ship_id(index: u32) -> String {
    format!("ship-{index}")
}

/// Parse the index out of a ship id (`ship-3` → 3).
#[must_use]
pub fn parse_ship_id(id: &str) -> Option<u32> {
    id.strip_prefix("ship-")?.parse().ok()
}

/// Parse the ship index out of a VM name (`vyg-ab12cd34ef-ship-3` → 3).
#[must_use]
pub fn parse_ship_vm_name(voyage_id: &str, vm_name: &str) -> Option<u32> {
    vm_name
        .strip_prefix(voyage_id)?
        .strip_prefix("-ship-")?
        .parse()
        .ok()
}

//! Provider port — the abstract contract a VM backend must fulfill.
//!
//! The port knows nothing about voyages: callers own the naming convention
//! (`<voyage-id>-storage`, `<voyage-id>-ship-<index>`) and re-discover a
//! fleet purely by listing names. Backends are selected by the `PROVIDER`
//! environment variable.

pub mod multipass;

use std::time::Duration;

use anyhow::Result;

pub use multipass::MultipassProvider;

/// Lifecycle state of a VM as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Running,
    Starting,
    Stopped,
    Deleted,
    Unknown,
}

/// One VM known to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    /// Backend name; doubles as the remote-exec destination.
    pub name: String,
    /// Primary address, when the backend reports one.
    pub ipv4: Option<String>,
    pub state: VmState,
}

/// Default readiness deadline for freshly created VMs.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(300);

/// VM backend contract.
///
/// `destroy` is idempotent: destroying an absent name is success. `list` is
/// the only discovery mechanism — the control plane holds no state of its
/// own between invocations.
#[allow(async_fn_in_trait)]
pub trait Provider {
    /// Create a VM under `name`. May block until the backend reports it.
    async fn create(&self, name: &str) -> Result<VmRecord>;

    /// Destroy `name`, tolerating its absence.
    async fn destroy(&self, name: &str) -> Result<()>;

    /// Fetch one VM record, `None` when the backend does not know the name.
    async fn get(&self, name: &str) -> Result<Option<VmRecord>>;

    /// All VMs whose name starts with `name_prefix`.
    async fn list(&self, name_prefix: &str) -> Result<Vec<VmRecord>>;

    /// Poll until a trivial command succeeds on the VM, or time out.
    async fn wait_ready(&self, record: &VmRecord, timeout: Duration) -> Result<()>;
}

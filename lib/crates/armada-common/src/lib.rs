//! Shared domain types for the armada control plane.
//!
//! Everything in this crate is pure data: no I/O, no async, no process
//! spawning. The CLI crate owns all remote side effects.

pub mod config;
pub mod derive;
pub mod task;
pub mod voyage;

pub use config::{Config, ConfigError, ProviderKind};
pub use derive::{derive, DataFault, ShipState, ShipStatus, TaskCounts, VoyageState, VoyageStatus};
pub use task::{Task, TaskMetadata, TaskParseError, TaskStatus};
pub use voyage::{generate_voyage_id, VoyageDescriptor, VOYAGE_PREFIX};

//! Typed fleet error kinds and their exit-code mapping.
//!
//! Every operator-visible failure carries the voyage (and ship, when there is
//! one) it belongs to, plus a concrete next action. Errors convert into
//! `anyhow::Error` via `?`; the top level downcasts back to map kinds onto
//! exit codes.

use thiserror::Error;

/// Exit codes of the command surface.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const USAGE: u8 = 1;
    pub const NOT_FOUND: u8 = 2;
    pub const REMOTE: u8 = 3;
    pub const PARTIAL: u8 = 4;
}

/// How a successful command run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything requested happened.
    Clean,
    /// The operation finished but some ships failed; warnings were printed.
    Partial,
}

impl Outcome {
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Clean => exit::SUCCESS,
            Self::Partial => exit::PARTIAL,
        }
    }
}

/// Error kinds shared across the provider port, remote exec, task store,
/// and fleet operations.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("VM provider is unavailable: {detail}\n\nCheck the provider installation and credentials, then retry.")]
    ProviderUnavailable { detail: String },

    #[error("VM provider refused to launch more instances: {detail}\n\nFree capacity or lower --ships, then run 'armada resume'.")]
    QuotaExceeded { detail: String },

    #[error("cannot reach {vm}: {detail}")]
    ConnectError { vm: String, detail: String },

    #[error("command failed on {vm}: {detail}")]
    ExecError { vm: String, detail: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{vm} did not become ready within {seconds}s")]
    Timeout { vm: String, seconds: u64 },

    #[error("failed to provision storage for voyage {voyage}: {detail}\n\nNo ships were launched. Fix the provider and run 'armada sail' again.")]
    StorageProvisionFailed { voyage: String, detail: String },

    #[error("failed to seed repository for voyage {voyage}: {detail}\n\nThe storage VM was left in place for inspection. Run 'armada sink {voyage} --include-storage' to discard it.")]
    RepoSeedFailed { voyage: String, detail: String },

    #[error("voyage {voyage}: failed to provision {ship}: {detail}")]
    ProvisionFailed {
        voyage: String,
        ship: String,
        detail: String,
    },

    #[error("voyage {voyage}: failed to mount shared storage on {ship}: {detail}")]
    MountFailed {
        voyage: String,
        ship: String,
        detail: String,
    },

    #[error("voyage {voyage}: failed to start the agent on {ship}: {detail}")]
    AgentStartFailed {
        voyage: String,
        ship: String,
        detail: String,
    },

    #[error("more than one active voyage: {}\n\nName one explicitly, e.g. 'armada status {}'.", candidates.join(", "), candidates.first().map_or("<voyage-id>", String::as_str))]
    AmbiguousVoyage { candidates: Vec<String> },

    #[error("invalid plan: {detail}")]
    InvalidPlan { detail: String },

    #[error("task file rejected: {detail}")]
    TaskParse { detail: String },
}

impl FleetError {
    /// Map this kind onto the command-surface exit code.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidPlan { .. } | Self::TaskParse { .. } => exit::USAGE,
            Self::NotFound { .. } | Self::AmbiguousVoyage { .. } => exit::NOT_FOUND,
            Self::ProviderUnavailable { .. }
            | Self::QuotaExceeded { .. }
            | Self::ConnectError { .. }
            | Self::ExecError { .. }
            | Self::Timeout { .. }
            | Self::StorageProvisionFailed { .. }
            | Self::RepoSeedFailed { .. }
            | Self::ProvisionFailed { .. }
            | Self::MountFailed { .. }
            | Self::AgentStartFailed { .. } => exit::REMOTE,
        }
    }

    /// Transport-class failures are retried on idempotent operations.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectError { .. } | Self::Timeout { .. })
    }
}

/// Exit code for an error bubbled to the top level.
///
/// Typed fleet kinds map per [`FleetError::exit_code`]; environment
/// configuration problems are usage errors; anything unclassified is treated
/// as a remote failure.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(fleet) = err.downcast_ref::<FleetError>() {
        return fleet.exit_code();
    }
    if err.downcast_ref::<armada_common::ConfigError>().is_some() {
        return exit::USAGE;
    }
    exit::REMOTE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_exit_1() {
        let err = FleetError::InvalidPlan {
            detail: "missing verify.sh".into(),
        };
        assert_eq!(err.exit_code(), exit::USAGE);
    }

    #[test]
    fn not_found_and_ambiguous_exit_2() {
        let nf = FleetError::NotFound {
            what: "voyage vyg-00".into(),
        };
        let amb = FleetError::AmbiguousVoyage {
            candidates: vec!["vyg-aa".into(), "vyg-bb".into()],
        };
        assert_eq!(nf.exit_code(), exit::NOT_FOUND);
        assert_eq!(amb.exit_code(), exit::NOT_FOUND);
    }

    #[test]
    fn remote_errors_exit_3() {
        let err = FleetError::ConnectError {
            vm: "vyg-aa-storage".into(),
            detail: "no route".into(),
        };
        assert_eq!(err.exit_code(), exit::REMOTE);
    }

    #[test]
    fn only_transport_errors_retry() {
        assert!(
            FleetError::Timeout {
                vm: "x".into(),
                seconds: 60
            }
            .is_retryable()
        );
        assert!(
            !FleetError::QuotaExceeded {
                detail: "limit".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn ambiguous_message_names_a_next_action() {
        let err = FleetError::AmbiguousVoyage {
            candidates: vec!["vyg-aa".into(), "vyg-bb".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("vyg-aa, vyg-bb"));
        assert!(msg.contains("armada status vyg-aa"));
    }

    #[test]
    fn unclassified_errors_exit_3() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(exit_code_for(&err), exit::REMOTE);
    }

    #[test]
    fn fleet_errors_survive_anyhow_downcast() {
        let err: anyhow::Error = FleetError::NotFound {
            what: "ship".into(),
        }
        .into();
        assert_eq!(exit_code_for(&err), exit::NOT_FOUND);
    }
}

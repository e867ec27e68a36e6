//! Command implementations for rscnctl
//!
//! - scan: detected GPUs and their reconciled profiles
//! - profiles: the static catalog
//! - install: profile install/remove through the orchestrator
//! - fixup: post-install maintenance operations
//! - package: package version lookup
//! - status: operation preconditions

pub mod fixup;
pub mod install;
pub mod package;
pub mod profiles;
pub mod scan;
pub mod status;

mod progress;

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use rscn_common::{Config, OperationError, Orchestrator, PackageQuery, SystemRunner};

/// Exit code: success
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code: any error not covered below
pub const EXIT_FAILURE: u8 = 1;
/// Exit code: the operation started but did not succeed
pub const EXIT_OPERATION_FAILED: u8 = 2;
/// Exit code: a precondition stopped the operation before it started
pub const EXIT_PRECONDITION: u8 = 3;

/// Result of a command that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    OperationFailed,
}

impl CommandStatus {
    pub fn code(&self) -> u8 {
        match self {
            CommandStatus::Success => EXIT_SUCCESS,
            CommandStatus::OperationFailed => EXIT_OPERATION_FAILED,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Exit code for a command error
pub fn error_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<OperationError>().is_some() {
        EXIT_PRECONDITION
    } else {
        EXIT_FAILURE
    }
}

/// Explicit `--config` file, else the default search
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load_from_path(path)?),
        None => Ok(Config::load()),
    }
}

pub(crate) type SystemQuery = Arc<PackageQuery<SystemRunner>>;

pub(crate) fn system_query(config: &Config) -> SystemQuery {
    Arc::new(PackageQuery::new(SystemRunner::new(), config.packages.clone()))
}

pub(crate) fn system_orchestrator(config: &Config, query: &SystemQuery) -> Orchestrator<SystemRunner> {
    Orchestrator::new(config.operations.clone(), Arc::clone(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_error_codes() {
        let precondition = anyhow::Error::new(OperationError::NoNetwork);
        assert_eq!(error_code(&precondition), EXIT_PRECONDITION);

        let other = anyhow::anyhow!("unknown profile");
        assert_eq!(error_code(&other), EXIT_FAILURE);

        assert_eq!(CommandStatus::Success.code(), 0);
        assert_eq!(CommandStatus::OperationFailed.code(), 2);
    }

    #[test]
    fn test_explicit_config_errors_are_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[operations\nescalation_tool = ").unwrap();
        assert!(load_config(Some(file.path())).is_err());
        assert!(load_config(Some(Path::new("/nonexistent/rscn.toml"))).is_err());
    }

    #[test]
    fn test_explicit_config_is_used() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[operations]\nescalation_tool = \"doas\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.operations.escalation_tool, "doas");
    }
}

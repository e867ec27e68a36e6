//! Error types for RSCN Drivers.
//!
//! Only failures that happen before anything is spawned are errors here.
//! Run-time failures of a started operation travel through
//! [`crate::operations::OperationOutcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::operations::OperationType;

/// Precondition failures of privileged operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Another operation is already running: {0}")]
    AlreadyRunning(OperationType),

    #[error("No packages specified")]
    NoPackages,

    #[error("The package database is locked ({}). Another package manager is probably running.", .0.display())]
    PackageManagerLocked(PathBuf),

    #[error("No network connection available")]
    NoNetwork,

    #[error("No AUR helper found (tried: {0})")]
    NoAurHelper(String),

    #[error("Privileged helper not found (searched: {0})")]
    HelperNotFound(String),
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

//! RSCN Common - GPU detection, driver profiles and package operations
//!
//! Shared library behind `rscnctl`. Identifies GPUs from `lspci`, classifies
//! them into architecture generations, matches them against the driver
//! profile catalog and drives privileged pacman/AUR operations.
//!
//! Data flow:
//! - [`hardware::HardwareScanner`] → device list
//! - [`reconcile::profiles_for_device`] (consulting [`catalog`] and
//!   [`packages::PackageQuery`]) → annotated profile list
//! - [`operations::Orchestrator`] → streamed install/remove events

pub mod catalog;
pub mod config;
pub mod error;
pub mod hardware;
pub mod operations;
pub mod packages;
pub mod reconcile;
pub mod runner;

pub use catalog::{DriverProfile, DriverType, InstallStatus, PackageSource, ProfileKind};
pub use config::Config;
pub use error::{ConfigError, OperationError};
pub use hardware::{Architecture, GpuDevice, HardwareScanner, Vendor};
pub use operations::{OperationEvent, OperationOutcome, OperationType, Orchestrator};
pub use packages::PackageQuery;
pub use reconcile::{profiles_for_device, PackageLookup};
pub use runner::{CommandOutput, CommandRunner, FakeCommandRunner, SystemRunner};

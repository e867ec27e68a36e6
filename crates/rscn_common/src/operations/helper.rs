//! Locating the privileged helper executable.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::OperationConfig;
use crate::error::OperationError;

/// Environment override for the helper location
pub const HELPER_ENV_VAR: &str = "RSCN_DRIVERS_HELPER";

pub const HELPER_NAME: &str = "rscn-drivers-helper";

pub const SYSTEM_HELPER_PATH: &str = "/usr/lib/rscn-drivers/rscn-drivers-helper";

/// Helper locations in search order
///
/// Environment override, configured path, next to the executable, the FHS
/// `../lib/rscn-drivers/` layout, then the system path.
pub fn helper_candidates(
    config: &OperationConfig,
    env_override: Option<PathBuf>,
    exe_dir: Option<&Path>,
) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = env_override.into_iter().collect();
    candidates.extend(config.helper_path.clone());
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(HELPER_NAME));
        candidates.push(dir.join("../lib/rscn-drivers").join(HELPER_NAME));
    }
    candidates.push(PathBuf::from(SYSTEM_HELPER_PATH));
    candidates
}

/// First existing helper candidate for this process
pub fn resolve_helper_path(config: &OperationConfig) -> Result<PathBuf, OperationError> {
    let env_override = env::var_os(HELPER_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let exe = env::current_exe().ok();
    let exe_dir = exe.as_deref().and_then(Path::parent);

    let candidates = helper_candidates(config, env_override, exe_dir);
    match candidates.iter().find(|path| path.is_file()) {
        Some(path) => {
            debug!("Privileged helper: {}", path.display());
            Ok(path.clone())
        }
        None => Err(OperationError::HelperNotFound(
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}

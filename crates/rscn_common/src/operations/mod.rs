//! Privileged operation orchestration.
//!
//! At most one long-running package or maintenance operation runs at a time.
//! Callers start it through the [`Orchestrator`] and follow its progress as
//! a stream of [`OperationEvent`]s ending in exactly one `Finished`.

mod events;
mod helper;
mod lines;
mod orchestrator;
mod shutdown;

pub use events::{OperationEvent, OperationOutcome};
pub use helper::{helper_candidates, resolve_helper_path, HELPER_ENV_VAR, HELPER_NAME, SYSTEM_HELPER_PATH};
pub use lines::LineBuffer;
pub use orchestrator::Orchestrator;
pub use shutdown::terminate_child;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Helper subcommands of the maintenance operations
pub(crate) const REMOVE_KMS_HOOK: &str = "remove-kms-hook";
pub(crate) const REGENERATE_INITRAMFS: &str = "regenerate-initramfs";
pub(crate) const REGENERATE_GRUB: &str = "regenerate-grub";

/// What the orchestrator is doing; `None` means idle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    #[default]
    None,
    PacmanInstall,
    PacmanRemove,
    AurInstall,
    AurRemove,
    RemoveKmsHook,
    RegenerateInitramfs,
    RegenerateGrubConfig,
}

impl OperationType {
    pub fn label(&self) -> &'static str {
        match self {
            OperationType::None => "Idle",
            OperationType::PacmanInstall => "Package installation",
            OperationType::PacmanRemove => "Package removal",
            OperationType::AurInstall => "AUR package installation",
            OperationType::AurRemove => "AUR package removal",
            OperationType::RemoveKmsHook => "KMS hook removal",
            OperationType::RegenerateInitramfs => "Initramfs regeneration",
            OperationType::RegenerateGrubConfig => "GRUB configuration regeneration",
        }
    }

    /// Fixed helper subcommand of the maintenance operations
    pub fn helper_command(&self) -> Option<&'static str> {
        match self {
            OperationType::RemoveKmsHook => Some(REMOVE_KMS_HOOK),
            OperationType::RegenerateInitramfs => Some(REGENERATE_INITRAMFS),
            OperationType::RegenerateGrubConfig => Some(REGENERATE_GRUB),
            _ => None,
        }
    }

    /// Runs through the privilege-escalation wrapper
    pub fn is_privileged(&self) -> bool {
        !matches!(self, OperationType::None | OperationType::AurInstall)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_commands() {
        assert_eq!(OperationType::RemoveKmsHook.helper_command(), Some("remove-kms-hook"));
        assert_eq!(OperationType::RegenerateInitramfs.helper_command(), Some("regenerate-initramfs"));
        assert_eq!(OperationType::RegenerateGrubConfig.helper_command(), Some("regenerate-grub"));
        assert_eq!(OperationType::PacmanInstall.helper_command(), None);
    }

    #[test]
    fn test_privilege_split() {
        assert!(OperationType::PacmanInstall.is_privileged());
        assert!(OperationType::AurRemove.is_privileged());
        assert!(!OperationType::AurInstall.is_privileged());
        assert_eq!(OperationType::default(), OperationType::None);
    }
}

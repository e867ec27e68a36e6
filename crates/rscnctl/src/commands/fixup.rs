//! Fixup Command - post-install maintenance through the privileged helper

use anyhow::{Context, Result};
use tracing::info;

use rscn_common::{CommandRunner, Config, OperationError, OperationType, Orchestrator};

use super::progress::follow;
use super::{system_orchestrator, system_query, CommandStatus};
use crate::cli::FixupTarget;

pub fn operation_for(target: FixupTarget) -> OperationType {
    match target {
        FixupTarget::KmsHook => OperationType::RemoveKmsHook,
        FixupTarget::Initramfs => OperationType::RegenerateInitramfs,
        FixupTarget::Grub => OperationType::RegenerateGrubConfig,
    }
}

fn start<R: CommandRunner>(
    orchestrator: &Orchestrator<R>,
    target: FixupTarget,
) -> Result<(), OperationError> {
    match target {
        FixupTarget::KmsHook => orchestrator.remove_kms_hook(),
        FixupTarget::Initramfs => orchestrator.regenerate_initramfs(),
        FixupTarget::Grub => orchestrator.regenerate_grub_config(),
    }
}

pub async fn run(config: &Config, target: FixupTarget) -> Result<CommandStatus> {
    let operation = operation_for(target);
    info!("Fixup requested: {}", operation);

    let query = system_query(config);
    let orchestrator = system_orchestrator(config, &query);
    let mut events = orchestrator.subscribe();
    start(&orchestrator, target).with_context(|| format!("Cannot start {}", operation))?;

    let outcome = follow(&orchestrator, &mut events).await?;
    Ok(if outcome.is_success() {
        CommandStatus::Success
    } else {
        CommandStatus::OperationFailed
    })
}

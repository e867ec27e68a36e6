//! Single-slot state machine driving privileged subprocesses.
//!
//! Idle → Running(type) → Idle. A start request while Running is rejected,
//! never queued. Each started operation is owned by one supervising task that
//! streams its output, reaps it, releases the slot and emits the terminal
//! event, in that order.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::events::EventBus;
use super::helper::resolve_helper_path;
use super::lines::LineBuffer;
use super::shutdown::terminate_child;
use super::{
    OperationEvent, OperationOutcome, OperationType, REGENERATE_GRUB, REGENERATE_INITRAMFS,
    REMOVE_KMS_HOOK,
};
use crate::config::OperationConfig;
use crate::error::OperationError;
use crate::packages::PackageQuery;
use crate::runner::CommandRunner;

/// How long output is still collected once the child has exited
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

const READ_CHUNK_SIZE: usize = 4096;

struct ActiveOperation {
    id: u64,
    operation: OperationType,
    cancel: Option<oneshot::Sender<()>>,
    /// Flips to true after the terminal event was emitted
    done: watch::Receiver<bool>,
}

struct Inner {
    slot: Mutex<Option<ActiveOperation>>,
    events: EventBus,
    next_id: AtomicU64,
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<ActiveOperation>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, id: u64) {
        let mut slot = self.lock_slot();
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
        }
    }

    fn emit_line(&self, operation: OperationType, line: String) {
        debug!("[{}] {}", operation, line);
        self.events.emit(OperationEvent::Output { operation, line });
    }
}

/// Starts, tracks and cancels privileged operations
///
/// Clones share the same slot and subscribers. Start methods spawn tokio
/// tasks and must be called from within a runtime; they run the
/// precondition queries synchronously.
pub struct Orchestrator<R: CommandRunner> {
    inner: Arc<Inner>,
    query: Arc<PackageQuery<R>>,
    config: OperationConfig,
}

impl<R: CommandRunner> Clone for Orchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            query: Arc::clone(&self.query),
            config: self.config.clone(),
        }
    }
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(config: OperationConfig, query: Arc<PackageQuery<R>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                events: EventBus::default(),
                next_id: AtomicU64::new(1),
            }),
            query,
            config,
        }
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OperationEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_operation(&self) -> OperationType {
        self.inner
            .lock_slot()
            .as_ref()
            .map_or(OperationType::None, |active| active.operation)
    }

    pub fn is_operation_running(&self) -> bool {
        self.current_operation() != OperationType::None
    }

    pub fn query(&self) -> &PackageQuery<R> {
        &self.query
    }

    // ------------------------------------------------------------------------
    // Package operations
    // ------------------------------------------------------------------------

    /// `pacman -S` through the privileged helper
    pub fn install_packages(&self, packages: &[String]) -> Result<(), OperationError> {
        self.ensure_idle()?;
        ensure_packages(packages)?;
        self.ensure_unlocked()?;
        self.ensure_network()?;
        let helper = resolve_helper_path(&self.config)?;

        self.launch(
            OperationType::PacmanInstall,
            OsStr::new(&self.config.escalation_tool),
            privileged_args(&helper, "install", packages),
        )
    }

    /// `pacman -R` through the privileged helper
    pub fn remove_packages(&self, packages: &[String]) -> Result<(), OperationError> {
        self.remove_as(OperationType::PacmanRemove, packages)
    }

    /// Build and install with the AUR helper, as the invoking user
    pub fn install_aur_packages(&self, packages: &[String]) -> Result<(), OperationError> {
        self.ensure_idle()?;
        ensure_packages(packages)?;
        self.ensure_unlocked()?;
        self.ensure_network()?;
        let aur_helper = self.query.find_aur_helper().ok_or_else(|| {
            OperationError::NoAurHelper(self.query.config().aur_helpers.join(", "))
        })?;

        self.launch(
            OperationType::AurInstall,
            OsStr::new(&aur_helper),
            aur_install_args(packages),
        )
    }

    /// Installed AUR packages are ordinary local packages, so this is the
    /// privileged removal under its own operation type
    pub fn remove_aur_packages(&self, packages: &[String]) -> Result<(), OperationError> {
        self.remove_as(OperationType::AurRemove, packages)
    }

    fn remove_as(&self, operation: OperationType, packages: &[String]) -> Result<(), OperationError> {
        self.ensure_idle()?;
        ensure_packages(packages)?;
        self.ensure_unlocked()?;
        let helper = resolve_helper_path(&self.config)?;

        self.launch(
            operation,
            OsStr::new(&self.config.escalation_tool),
            privileged_args(&helper, "remove", packages),
        )
    }

    // ------------------------------------------------------------------------
    // Maintenance operations
    // ------------------------------------------------------------------------

    pub fn remove_kms_hook(&self) -> Result<(), OperationError> {
        self.maintenance(OperationType::RemoveKmsHook, REMOVE_KMS_HOOK)
    }

    pub fn regenerate_initramfs(&self) -> Result<(), OperationError> {
        self.maintenance(OperationType::RegenerateInitramfs, REGENERATE_INITRAMFS)
    }

    pub fn regenerate_grub_config(&self) -> Result<(), OperationError> {
        self.maintenance(OperationType::RegenerateGrubConfig, REGENERATE_GRUB)
    }

    fn maintenance(&self, operation: OperationType, command: &str) -> Result<(), OperationError> {
        self.ensure_idle()?;
        let helper = resolve_helper_path(&self.config)?;

        self.launch(
            operation,
            OsStr::new(&self.config.escalation_tool),
            privileged_args(&helper, command, &[]),
        )
    }

    // ------------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------------

    /// Stop the running operation and wait for its terminal event.
    ///
    /// SIGTERM first, SIGKILL after the grace period. No-op when idle.
    pub async fn cancel(&self) {
        let (cancel, mut done) = {
            let mut slot = self.inner.lock_slot();
            match slot.as_mut() {
                Some(active) => (active.cancel.take(), active.done.clone()),
                None => {
                    debug!("Cancel requested while idle");
                    return;
                }
            }
        };

        if let Some(tx) = cancel {
            info!("Cancel requested");
            let _ = tx.send(());
        }
        let _ = done.wait_for(|finished| *finished).await;
    }

    // ------------------------------------------------------------------------
    // Preconditions
    // ------------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<(), OperationError> {
        match self.current_operation() {
            OperationType::None => Ok(()),
            running => Err(OperationError::AlreadyRunning(running)),
        }
    }

    fn ensure_unlocked(&self) -> Result<(), OperationError> {
        if self.query.is_package_manager_locked() {
            return Err(OperationError::PackageManagerLocked(
                self.query.config().lock_file.clone(),
            ));
        }
        Ok(())
    }

    fn ensure_network(&self) -> Result<(), OperationError> {
        if !self.query.is_network_available() {
            return Err(OperationError::NoNetwork);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Process lifecycle
    // ------------------------------------------------------------------------

    fn launch(
        &self,
        operation: OperationType,
        program: &OsStr,
        args: Vec<OsString>,
    ) -> Result<(), OperationError> {
        let mut slot = self.inner.lock_slot();
        if let Some(active) = slot.as_ref() {
            return Err(OperationError::AlreadyRunning(active.operation));
        }

        info!(
            "Starting {}: {} {}",
            operation,
            program.to_string_lossy(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let spawned = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                drop(slot);
                let message = if operation.is_privileged() {
                    format!(
                        "Failed to start {}: {}. Make sure the privilege-escalation tool and the privileged helper are installed.",
                        program.to_string_lossy(),
                        e
                    )
                } else {
                    format!("Failed to start AUR helper {}: {}", program.to_string_lossy(), e)
                };
                warn!("{}", message);
                self.inner.events.emit(OperationEvent::Finished {
                    operation,
                    outcome: OperationOutcome::FailedToStart,
                    message,
                });
                return Ok(());
            }
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(false);
        *slot = Some(ActiveOperation {
            id,
            operation,
            cancel: Some(cancel_tx),
            done: done_rx,
        });
        drop(slot);

        self.inner.events.emit(OperationEvent::Started { operation });

        tokio::spawn(supervise(
            Arc::clone(&self.inner),
            Supervised {
                id,
                operation,
                child,
                cancel_rx,
                done_tx,
                grace: self.config.kill_grace(),
            },
        ));
        Ok(())
    }
}

struct Supervised {
    id: u64,
    operation: OperationType,
    child: Child,
    cancel_rx: oneshot::Receiver<()>,
    done_tx: watch::Sender<bool>,
    grace: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn supervise(inner: Arc<Inner>, task: Supervised) {
    let Supervised {
        id,
        operation,
        mut child,
        mut cancel_rx,
        done_tx,
        grace,
    } = task;

    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_pipe(stdout, Stream::Stdout, chunk_tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_pipe(stderr, Stream::Stderr, chunk_tx.clone())));
    }
    drop(chunk_tx);

    let mut stdout_lines = LineBuffer::new();
    let mut stderr_lines = LineBuffer::new();
    let mut route = |stream: Stream, chunk: Vec<u8>| {
        let buffer = match stream {
            Stream::Stdout => &mut stdout_lines,
            Stream::Stderr => &mut stderr_lines,
        };
        for line in buffer.push(&chunk) {
            inner.emit_line(operation, line);
        }
    };

    let exited = {
        let run = async {
            loop {
                tokio::select! {
                    status = child.wait() => break status,
                    Some((stream, chunk)) = chunk_rx.recv() => route(stream, chunk),
                }
            }
        };
        tokio::select! {
            biased;
            Ok(()) = &mut cancel_rx => None,
            status = run => Some(status),
        }
    };

    let outcome = match exited {
        Some(Ok(status)) => OperationOutcome::from_status(status),
        Some(Err(e)) => {
            warn!("Failed to reap {}: {}", operation, e);
            OperationOutcome::Crashed
        }
        None => {
            info!("Canceling {}", operation);
            if let Err(e) = terminate_child(&mut child, grace).await {
                warn!("Failed to terminate {}: {}", operation, e);
            }
            OperationOutcome::Canceled
        }
    };

    // Background processes left behind by the child may keep the pipes open
    let drained = timeout(OUTPUT_DRAIN_TIMEOUT, async {
        while let Some((stream, chunk)) = chunk_rx.recv().await {
            route(stream, chunk);
        }
    })
    .await;
    if drained.is_err() {
        debug!("{}: output pipes still open after exit, detaching", operation);
    }

    for reader in &readers {
        reader.abort();
    }
    while let Ok((stream, chunk)) = chunk_rx.try_recv() {
        route(stream, chunk);
    }
    for line in [stdout_lines.finish(), stderr_lines.finish()].into_iter().flatten() {
        inner.emit_line(operation, line);
    }

    inner.release(id);

    let message = outcome.message(operation);
    if outcome.is_success() {
        info!("{}", message);
    } else {
        warn!("{}", message);
    }
    inner.events.emit(OperationEvent::Finished {
        operation,
        outcome,
        message,
    });
    done_tx.send_replace(true);
}

async fn forward_pipe<P>(mut pipe: P, stream: Stream, tx: mpsc::UnboundedSender<(Stream, Vec<u8>)>)
where
    P: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send((stream, buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("{:?} read error: {}", stream, e);
                break;
            }
        }
    }
}

/// `[helper, command, packages...]` for the escalation wrapper
fn privileged_args(helper: &Path, command: &str, packages: &[String]) -> Vec<OsString> {
    let mut args = vec![helper.as_os_str().to_os_string(), OsString::from(command)];
    args.extend(packages.iter().map(OsString::from));
    args
}

fn aur_install_args(packages: &[String]) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-S", "--noconfirm", "--needed"]
        .iter()
        .map(OsString::from)
        .collect();
    args.extend(packages.iter().map(OsString::from));
    args
}

fn ensure_packages(packages: &[String]) -> Result<(), OperationError> {
    if packages.is_empty() {
        return Err(OperationError::NoPackages);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_privileged_args() {
        let args = privileged_args(
            Path::new("/usr/lib/rscn-drivers/rscn-drivers-helper"),
            "install",
            &pkgs(&["nvidia-dkms", "nvidia-utils"]),
        );
        assert_eq!(
            args,
            vec![
                "/usr/lib/rscn-drivers/rscn-drivers-helper",
                "install",
                "nvidia-dkms",
                "nvidia-utils"
            ]
        );

        let args = privileged_args(Path::new("/h"), "regenerate-grub", &[]);
        assert_eq!(args, vec!["/h", "regenerate-grub"]);
    }

    #[test]
    fn test_maintenance_subcommands_match_operation_types() {
        let pairs = [
            (OperationType::RemoveKmsHook, REMOVE_KMS_HOOK),
            (OperationType::RegenerateInitramfs, REGENERATE_INITRAMFS),
            (OperationType::RegenerateGrubConfig, REGENERATE_GRUB),
        ];
        for (operation, command) in pairs {
            assert_eq!(operation.helper_command(), Some(command));
        }
        assert_eq!(OperationType::PacmanInstall.helper_command(), None);
    }

    #[test]
    fn test_aur_install_args() {
        assert_eq!(
            aur_install_args(&pkgs(&["nvidia-470xx-dkms"])),
            vec!["-S", "--noconfirm", "--needed", "nvidia-470xx-dkms"]
        );
    }

    #[test]
    fn test_empty_package_list_rejected() {
        assert_eq!(ensure_packages(&[]), Err(OperationError::NoPackages));
        assert_eq!(ensure_packages(&pkgs(&["mesa"])), Ok(()));
    }
}

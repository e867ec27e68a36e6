//! Operation lifecycle events and their fan-out to subscribers.

use serde::{Deserialize, Serialize};
use std::process::ExitStatus;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::OperationType;

/// How a started operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    Succeeded,
    /// Exit 126: the user closed the authentication dialog
    AuthorizationDismissed,
    /// Exit 127: authentication failed or the helper is missing
    AuthorizationFailed,
    ExitCode(i32),
    /// Killed by a signal or not reapable
    Crashed,
    FailedToStart,
    Canceled,
}

impl OperationOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => OperationOutcome::Succeeded,
            Some(126) => OperationOutcome::AuthorizationDismissed,
            Some(127) => OperationOutcome::AuthorizationFailed,
            Some(code) => OperationOutcome::ExitCode(code),
            None => OperationOutcome::Crashed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded)
    }

    /// The single user-facing message of a terminal event
    ///
    /// `FailedToStart` messages name the program and are built at the
    /// spawn site instead.
    pub fn message(&self, operation: OperationType) -> String {
        match self {
            OperationOutcome::Succeeded => format!("{} completed successfully", operation),
            OperationOutcome::AuthorizationDismissed => "Authorization dismissed by user".to_string(),
            OperationOutcome::AuthorizationFailed => {
                "Authorization failed or privileged helper not found".to_string()
            }
            OperationOutcome::ExitCode(code) => format!("{} failed with exit code {}", operation, code),
            OperationOutcome::Crashed => format!("{} crashed unexpectedly", operation),
            OperationOutcome::FailedToStart => format!("{} failed to start", operation),
            OperationOutcome::Canceled => "Operation canceled by user".to_string(),
        }
    }
}

/// One step of an operation's lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationEvent {
    Started {
        operation: OperationType,
    },
    Output {
        operation: OperationType,
        line: String,
    },
    /// Always the last event of an operation
    Finished {
        operation: OperationType,
        outcome: OperationOutcome,
        message: String,
    },
}

impl OperationEvent {
    pub fn operation(&self) -> OperationType {
        match self {
            OperationEvent::Started { operation }
            | OperationEvent::Output { operation, .. }
            | OperationEvent::Finished { operation, .. } => *operation,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, OperationEvent::Finished { .. })
    }
}

/// Delivers every event to every live subscriber, in emission order
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OperationEvent>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<OperationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: OperationEvent) {
        // Dropped receivers are pruned here
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

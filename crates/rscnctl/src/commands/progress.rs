//! Following a started operation on the terminal.

use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use tokio::sync::mpsc::UnboundedReceiver;

use rscn_common::{CommandRunner, OperationEvent, OperationOutcome, Orchestrator};

/// Print events until the terminal one. Ctrl-C cancels the operation.
pub(crate) async fn follow<R: CommandRunner>(
    orchestrator: &Orchestrator<R>,
    events: &mut UnboundedReceiver<OperationEvent>,
) -> Result<OperationOutcome> {
    let mut canceling = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(OperationEvent::Started { operation }) => {
                    println!("{} {}", "→".cyan(), operation.to_string().bold());
                }
                Some(OperationEvent::Output { line, .. }) => {
                    println!("  {}", line);
                }
                Some(OperationEvent::Finished { outcome, message, .. }) => {
                    if outcome.is_success() {
                        println!("{} {}", "✓".green(), message);
                    } else {
                        println!("{} {}", "✗".red(), message);
                    }
                    return Ok(outcome);
                }
                None => bail!("Operation event stream closed unexpectedly"),
            },
            _ = tokio::signal::ctrl_c(), if !canceling => {
                canceling = true;
                eprintln!("{}", "Canceling...".yellow());
                orchestrator.cancel().await;
            }
        }
    }
}

//! SIGTERM then SIGKILL shutdown of an operation's child process.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Stop `child` and reap it.
///
/// 1. Return at once if it already exited
/// 2. SIGTERM, then wait up to `grace`
/// 3. SIGKILL and wait for reaping
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    let Some(pid) = child.id() else {
        return child.wait().await;
    };

    debug!("Sending SIGTERM to pid {}", pid);
    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        if e == Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    warn!("pid {} ignored SIGTERM for {:?}, sending SIGKILL", pid, grace);
    child.kill().await?;
    child.wait().await
}

//! Command Runner
//!
//! Every synchronous system query goes through the [`CommandRunner`] trait so
//! the hardware scanner and package queries can be exercised without a real
//! system.
//!
//! ## Usage
//!
//! Production code uses [`SystemRunner`] which spawns real processes.
//! Test code uses [`FakeCommandRunner`] with pre-configured responses.

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often a running command is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Merged output: stdout followed by stderr
    pub output: String,
    /// Exit code, `None` if the process could not be spawned, was killed by
    /// a signal, or timed out
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Successful result with the given output
    pub fn ok(output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit_code: Some(0),
            timed_out: false,
        }
    }

    /// Result with a non-zero exit code
    pub fn failed(exit_code: i32, output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit_code: Some(exit_code),
            timed_out: false,
        }
    }

    /// Result of a command that never produced an exit code
    pub fn not_started() -> Self {
        Self::default()
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external program and captures its output.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, waiting at most `timeout` for it to finish.
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutput;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutput {
        (**self).run(program, args, timeout)
    }
}

/// Full command line used as the lookup key for fakes and in log lines
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

// ============================================================================
// System Runner (Production)
// ============================================================================

/// Runs real processes through `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandOutput {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!("Failed to spawn '{}': {}", command_line(program, args), e);
                return CommandOutput::not_started();
            }
        };

        let (chunk_tx, chunk_rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_pipe_reader(stdout, Pipe::Stdout, chunk_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pipe_reader(stderr, Pipe::Stderr, chunk_tx.clone());
        }
        drop(chunk_tx);

        let deadline = Instant::now() + timeout;
        let exit_code = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status.code(),
                Ok(None) if Instant::now() >= deadline => {
                    warn!(
                        "Command timed out after {:?}: {}",
                        timeout,
                        command_line(program, args)
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    // Readers may still be blocked on pipes held by grandchildren,
                    // so they are left detached instead of joined.
                    return CommandOutput {
                        output: String::new(),
                        exit_code: None,
                        timed_out: true,
                    };
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!("Failed to wait for '{}': {}", command_line(program, args), e);
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
            }
        };

        let output = collect_output(&chunk_rx, deadline);

        debug!(
            "'{}' exited with {:?} ({} bytes of output)",
            command_line(program, args),
            exit_code,
            output.len()
        );

        CommandOutput {
            output,
            exit_code,
            timed_out: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn spawn_pipe_reader<P: Read + Send + 'static>(mut pipe: P, which: Pipe, tx: Sender<(Pipe, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((which, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
}

/// Stdout followed by stderr, gathered until both pipes close or the
/// deadline passes
///
/// A background process started by the command can hold the pipes open
/// long after the command itself exited; its readers are left detached.
fn collect_output(rx: &Receiver<(Pipe, Vec<u8>)>, deadline: Instant) -> String {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Pipe::Stdout, chunk)) => stdout.extend_from_slice(&chunk),
            Ok((Pipe::Stderr, chunk)) => stderr.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => {
                debug!("Output pipes still open at the deadline, detaching readers");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let mut output = String::from_utf8_lossy(&stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&stderr));
    output
}

// ============================================================================
// Fake Runner (Testing)
// ============================================================================

/// Fake runner for deterministic testing
///
/// Responses are keyed by the full command line (`"pacman -Q mesa"`).
/// Anything not configured answers like a missing command (exit 127).
///
/// ## Example
///
/// ```rust,ignore
/// let fake = FakeCommandRunner::new()
///     .respond("pacman -Q mesa", CommandOutput::ok("mesa 24.1.0-1\n"));
///
/// assert!(fake.run("pacman", &["-Q", "mesa"], timeout).success());
/// assert_eq!(fake.call_count("pacman -Q mesa"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeCommandRunner {
    responses: Arc<Mutex<HashMap<String, CommandOutput>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`FakeCommandRunner::set_response`]
    pub fn respond(self, command_line: &str, output: CommandOutput) -> Self {
        self.set_response(command_line, output);
        self
    }

    pub fn set_response(&self, command_line: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(command_line.to_string(), output);
    }

    /// Number of times a command line was run
    pub fn call_count(&self, command_line: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(command_line)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }
}

impl CommandRunner for FakeCommandRunner {
    fn run(&self, program: &str, args: &[&str], _timeout: Duration) -> CommandOutput {
        let key = command_line(program, args);
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_insert(0) += 1;

        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(127, &format!("{}: command not found", program)))
    }
}

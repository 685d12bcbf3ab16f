// Run a helper command with captured I/O and a bounded run time. The child is
// placed in its own process group so a timeout kills the whole group.

use crate::error::PalError;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::io::{Read, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the watchdog checks the child.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Split a command line on whitespace, honouring double quotes.
pub fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in command.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

struct Pipes {
    writer: JoinHandle<()>,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
}

impl Pipes {
    /// Wait for the child's pipes to close; returns (stdout, stderr).
    fn join(self) -> Result<(Vec<u8>, Vec<u8>), PalError> {
        let _ = self.writer.join();
        let stdout = self
            .stdout
            .join()
            .map_err(|_| PalError::InternalError("stdout reader panicked".into()))?;
        let stderr = self
            .stderr
            .join()
            .map_err(|_| PalError::InternalError("stderr reader panicked".into()))?;
        Ok((stdout, stderr))
    }
}

fn spawn(program: &str, args: &[String]) -> std::io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
}

/// Hand the child's pipes to I/O threads: one writes `stdin`, two collect output.
fn start_pipes(child: &mut Child, stdin: &str) -> Result<Pipes, PalError> {
    let (Some(mut child_stdin), Some(mut child_stdout), Some(mut child_stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(PalError::InternalError("child pipes not captured".into()));
    };

    let input = stdin.to_owned();
    let writer = thread::spawn(move || {
        // The child may exit without reading; a broken pipe is fine.
        let _ = child_stdin.write_all(input.as_bytes());
    });
    let stdout = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = child_stdout.read_to_end(&mut buf);
        buf
    });
    let stderr = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = child_stderr.read_to_end(&mut buf);
        buf
    });
    Ok(Pipes { writer, stdout, stderr })
}

/// Kill the child's process group, reap the child and join its I/O threads.
fn abort(child: &mut Child, pipes: Pipes) {
    let pid = child.id() as i32;
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::warn!(error = %e, pid, "killpg failed; killing child only");
        let _ = child.kill();
    }
    let _ = child.wait();
    let _ = pipes.join();
}

/// Run `command`, feed it `stdin`, and wait at most `timeout`.
///
/// A non-zero exit is not an error: the caller inspects `status`. Spawn or
/// pipe failures and timeouts are.
pub fn run(command: &str, stdin: &str, timeout: Duration) -> Result<ProcessOutput, PalError> {
    let args = split_command(command);
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| PalError::InternalError("empty command".into()))?;

    let mut child = spawn(program, rest).map_err(|e| PalError::from_io(program, e))?;
    tracing::debug!(command = %command, pid = child.id(), "spawned helper process");
    let pipes = start_pipes(&mut child, stdin)?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                abort(&mut child, pipes);
                tracing::warn!(command = %command, timeout_ms = timeout.as_millis() as u64, "helper process timed out");
                return Err(PalError::ProcessTimeout {
                    command: command.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "waiting for helper process failed");
                abort(&mut child, pipes);
                return Err(PalError::from_io(program, e));
            }
        }
    };

    let (stdout, stderr) = pipes.join()?;
    let code = status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0));

    Ok(ProcessOutput {
        status: code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

//! Helpers for running child processes with bounded, interleaved output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// stdout and stderr interleaved in write order.
    pub combined: Vec<u8>,
    pub truncated: usize,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Lossy UTF-8 text of the captured output plus a truncation notice.
    pub fn text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.combined).into_owned();
        if self.truncated > 0 {
            text.push_str(&format!("\n[output truncated {} bytes]\n", self.truncated));
        }
        text
    }
}

/// Run a command to completion, capturing stdout and stderr through one pipe.
///
/// Both streams share a single pipe so the captured bytes keep the order the
/// child wrote them. The pipe is drained on a reader thread while the child
/// runs; `output_limit_bytes` bounds what is kept in memory (the rest is
/// read and discarded). There is no timeout: the call returns when the child
/// exits.
#[instrument(skip_all, fields(output_limit_bytes))]
pub fn run_command_combined(mut cmd: Command, output_limit_bytes: usize) -> Result<CommandOutput> {
    let (reader, writer) = std::io::pipe().context("create output pipe")?;
    let stderr_writer = writer.try_clone().context("clone output pipe")?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(stderr_writer));

    debug!("spawning child process");
    let start = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };
    // The command still owns the parent's copies of the write ends; drop it so
    // the reader sees EOF once the child (and its descendants) exit.
    drop(cmd);

    let reader_handle = thread::spawn(move || read_stream_limited(reader, output_limit_bytes));

    let status = child.wait().context("wait for command")?;
    let (combined, truncated) = join_output(reader_handle).context("join output")?;
    let elapsed = start.elapsed();

    if truncated > 0 {
        warn!(truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), elapsed_ms = elapsed.as_millis() as u64, "command finished");
    Ok(CommandOutput {
        status,
        combined,
        truncated,
        elapsed,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

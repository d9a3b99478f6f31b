//! FFmpeg process management
//!
//! Two pitfalls shape this module:
//!
//! 1. OS pipe buffers are ~64KB. Piping both stdout and stderr but only
//!    reading stdout deadlocks once ffmpeg fills its stderr buffer, so a
//!    dedicated thread drains stderr concurrently.
//! 2. Encoders fork helper processes. The child is therefore placed in its
//!    own process group on unix, and cancellation signals the whole group —
//!    terminating only the direct child can leave encoder helpers running.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A spawned encode process with its stderr drained in the background.
///
/// Read progress from [`take_stdout`](Self::take_stdout), then either
/// [`wait_with_output`](Self::wait_with_output) for the exit status or
/// [`terminate_group`](Self::terminate_group) to cancel.
pub struct EncodeProcess {
    child: Child,
    stderr_thread: Option<JoinHandle<String>>,
}

impl EncodeProcess {
    /// Spawn with piped stdout/stderr, in its own process group on unix.
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        info!(command = ?cmd, "Spawning encode process");

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New group: the group id equals the child pid, and a signal to
            // -pid reaches every helper the encoder forks
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().context("Failed to spawn encode process")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture encode process stderr"))?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(|l| l.ok()) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        Ok(Self {
            child,
            stderr_thread: Some(stderr_thread),
        })
    }

    /// Take stdout for the progress reader. Returns `None` if already taken.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Wait for exit and collect the drained stderr.
    pub fn wait_with_output(mut self) -> Result<(ExitStatus, String)> {
        let status = self.child.wait().context("Failed to wait for encode process")?;
        let stderr = self.join_stderr();

        if status.success() {
            info!(exit_code = status.code(), "Encode process completed");
            debug!(stderr_output = %stderr, "Encode process stderr");
        } else {
            error!(
                exit_code = status.code(),
                stderr_output = %stderr,
                "Encode process failed"
            );
        }

        Ok((status, stderr))
    }

    /// Signal the process group to terminate, wait out the grace period,
    /// force-kill on timeout. Reaps the child either way.
    pub fn terminate_group(mut self, grace: Duration) -> Result<()> {
        #[cfg(unix)]
        {
            let pgid = self.child.id() as i32;
            warn!(pgid, "Terminating encode process group");
            unsafe {
                libc::kill(-pgid, libc::SIGTERM);
            }

            let deadline = Instant::now() + grace;
            loop {
                match self.child.try_wait().context("Failed to poll encode process")? {
                    Some(status) => {
                        debug!(exit_code = status.code(), "Encode process group exited");
                        break;
                    }
                    None if Instant::now() >= deadline => {
                        warn!(pgid, "Grace period expired, killing encode process group");
                        unsafe {
                            libc::kill(-pgid, libc::SIGKILL);
                        }
                        self.child.wait().context("Failed to reap encode process")?;
                        break;
                    }
                    None => thread::sleep(Duration::from_millis(50)),
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = grace;
            warn!(pid = self.child.id(), "Killing encode process");
            let _ = self.child.kill();
            self.child.wait().context("Failed to reap encode process")?;
        }

        self.join_stderr();
        Ok(())
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Extract the most meaningful line from an ffmpeg stderr dump.
///
/// Prefers the last line mentioning an error, otherwise the last line that
/// is not a progress counter.
pub fn format_encode_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown encode error".to_string())
}

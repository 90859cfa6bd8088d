// SPDX-License-Identifier: MIT

//! Subprocess Supervisor: spawns a child process under two
//! independent timers, enforces cancellation safety through a global
//! inflight table, and maps exit status to the error taxonomy.

pub mod provider;

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ksi_core::{ErrorCode, KsiError, RequestId};

pub use provider::{ClaudeCli, GeminiCli, Provider};

/// Cap on how much of a stream this supervisor retains in memory before
/// truncating. Not spec-mandated as a number;
/// chosen generously for LLM CLI output.
pub const DEFAULT_STREAM_BUFFER_CAP: usize = 1 << 20;

/// Which timer fired, distinguishing a stalled child from a runaway one
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCause {
    Progress,
    Overall,
}

/// One subprocess invocation.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub request_id: RequestId,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: std::path::PathBuf,
    pub env: HashMap<String, String>,
    pub progress_timeout: Duration,
    /// Attempt-timeout schedule; the last entry
    /// is also used as the overall timeout for the final attempt.
    pub attempt_timeouts: Vec<Duration>,
}

#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub timed_out: Option<TimeoutCause>,
}

struct InflightHandle {
    cancel: CancellationToken,
    /// Signaled exactly once, after this attempt's child has actually been
    /// terminated (or has exited on its own). `cancel`/`drain_all` await
    /// this so they only return once no process for the request is alive
    ///.
    terminated: Arc<tokio::sync::Notify>,
}

/// One instance is shared (behind an `Arc`) across every handler that
/// can spawn a subprocess; `inflight` is the cancellation-safe table that
/// lets `cancel`/`drain_all` guarantee no tracked child outlives them.
pub struct Supervisor {
    inflight: Mutex<HashMap<RequestId, InflightHandle>>,
    max_inflight: usize,
    kill_grace: Duration,
}

impl Supervisor {
    pub fn new(max_inflight: usize, kill_grace: Duration) -> Arc<Self> {
        Arc::new(Self { inflight: Mutex::new(HashMap::new()), max_inflight, kill_grace })
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_inflight(&self, request_id: &RequestId) -> bool {
        self.inflight.lock().contains_key(request_id)
    }

    /// Runs the retry schedule in `request.attempt_timeouts`. A progress
    /// timeout on a non-final attempt is retried after a short backoff; an
    /// overall timeout, a non-progress exit, or the final attempt's
    /// timeout is returned as-is.
    pub async fn spawn(&self, request: SpawnRequest) -> Result<SpawnOutcome, KsiError> {
        if self.inflight_count() >= self.max_inflight {
            return Err(KsiError::new(
                ErrorCode::ServiceUnavailable,
                "maximum inflight subprocess count reached",
            ));
        }

        let schedule =
            if request.attempt_timeouts.is_empty() { vec![Duration::from_secs(300)] } else { request.attempt_timeouts.clone() };

        let last = schedule.len() - 1;
        for (i, overall_timeout) in schedule.iter().enumerate() {
            let attempt = self.run_attempt(&request, *overall_timeout).await?;
            let should_retry = i < last && attempt.timed_out == Some(TimeoutCause::Progress);
            if !should_retry {
                return Ok(attempt);
            }
            warn!(request_id = %request.request_id, attempt = i, "progress timeout, retrying");
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        unreachable!("schedule is non-empty, loop always returns on its last iteration")
    }

    /// Cancel an inflight request: signals cancellation and waits for
    /// `run_attempt` to finish terminate-then-kill before returning, so the
    /// child is confirmed dead by the time this call resolves. A no-op if
    /// the request is unknown or already finished.
    pub async fn cancel(&self, request_id: &RequestId) {
        let handle = self.inflight.lock().remove(request_id);
        if let Some(handle) = handle {
            let terminated = handle.terminated.notified();
            handle.cancel.cancel();
            terminated.await;
        }
    }

    /// Terminate-then-kill every inflight child, waiting for each to be
    /// confirmed dead before returning.
    pub async fn drain_all(&self) {
        let handles: Vec<InflightHandle> = self.inflight.lock().drain().map(|(_, h)| h).collect();
        let waits: Vec<_> = handles
            .iter()
            .map(|h| {
                let notified = h.terminated.notified();
                h.cancel.cancel();
                notified
            })
            .collect();
        for wait in waits {
            wait.await;
        }
    }

    async fn run_attempt(
        &self,
        request: &SpawnRequest,
        overall_timeout: Duration,
    ) -> Result<SpawnOutcome, KsiError> {
        let start = Instant::now();

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .current_dir(&request.cwd)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(map_spawn_error)?;
        let pid = child.id().ok_or_else(|| {
            KsiError::new(ErrorCode::ConnectionError, "child process exited before it could be tracked")
        })?;

        let cancel = CancellationToken::new();
        let terminated = Arc::new(tokio::sync::Notify::new());
        self.inflight.lock().insert(
            request.request_id,
            InflightHandle { cancel: cancel.clone(), terminated: terminated.clone() },
        );

        let last_output = Arc::new(Mutex::new(Instant::now()));
        let stdout_task = match child.stdout.take() {
            Some(stdout) => spawn_reader(stdout, last_output.clone()),
            None => tokio::spawn(async { String::new() }),
        };
        let stderr_task = match child.stderr.take() {
            Some(stderr) => spawn_reader(stderr, last_output.clone()),
            None => tokio::spawn(async { String::new() }),
        };

        let exit = self.race(&mut child, &cancel, &last_output, overall_timeout, request.progress_timeout).await;

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        self.inflight.lock().remove(&request.request_id);

        let duration = start.elapsed();
        let result = match exit {
            AttemptEnd::Exited(status) => {
                info!(request_id = %request.request_id, ?status, "subprocess exited");
                Ok(SpawnOutcome { stdout, stderr, exit_code: status.code(), duration, timed_out: None })
            }
            AttemptEnd::TimedOut(cause) => {
                self.terminate_then_kill(&mut child, pid).await;
                Ok(SpawnOutcome { stdout, stderr, exit_code: None, duration, timed_out: Some(cause) })
            }
            AttemptEnd::Canceled => {
                self.terminate_then_kill(&mut child, pid).await;
                Err(KsiError::new(ErrorCode::ServiceUnavailable, "subprocess request canceled"))
            }
        };
        terminated.notify_one();
        result
    }

    async fn race(
        &self,
        child: &mut tokio::process::Child,
        cancel: &CancellationToken,
        last_output: &Arc<Mutex<Instant>>,
        overall_timeout: Duration,
        progress_timeout: Duration,
    ) -> AttemptEnd {
        let overall_sleep = tokio::time::sleep(overall_timeout);
        tokio::pin!(overall_sleep);
        let mut progress_interval = tokio::time::interval(Duration::from_millis(200));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return AttemptEnd::Canceled,
                status = child.wait() => {
                    return match status {
                        Ok(status) => AttemptEnd::Exited(status),
                        Err(_) => AttemptEnd::TimedOut(TimeoutCause::Overall),
                    };
                }
                _ = &mut overall_sleep => return AttemptEnd::TimedOut(TimeoutCause::Overall),
                _ = progress_interval.tick() => {
                    if last_output.lock().elapsed() >= progress_timeout {
                        return AttemptEnd::TimedOut(TimeoutCause::Progress);
                    }
                }
            }
        }
    }

    async fn terminate_then_kill(&self, child: &mut tokio::process::Child, pid: u32) {
        let nix_pid = Pid::from_raw(pid as i32);
        if signal::kill(nix_pid, Signal::SIGTERM).is_err() {
            // Already exited between the race ending and this signal.
            let _ = child.wait().await;
            return;
        }
        let grace = tokio::time::sleep(self.kill_grace);
        tokio::pin!(grace);
        tokio::select! {
            _ = child.wait() => return,
            _ = &mut grace => {}
        }
        if let Err(e) = child.kill().await {
            warn!(pid, error = %e, "failed to send kill signal to subprocess");
        }
        let _ = child.wait().await;
    }
}

enum AttemptEnd {
    Exited(std::process::ExitStatus),
    TimedOut(TimeoutCause),
    Canceled,
}

fn spawn_reader<R>(
    stream: R,
    last_output: Arc<Mutex<Instant>>,
) -> tokio::task::JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    *last_output.lock() = Instant::now();
                    if buf.len() < DEFAULT_STREAM_BUFFER_CAP {
                        buf.push_str(&line);
                    }
                }
                Err(_) => break,
            }
        }
        if buf.len() >= DEFAULT_STREAM_BUFFER_CAP {
            buf.push_str("...[truncated]");
        }
        buf
    })
}

/// Maps a spawn failure to the error taxonomy. Exit-code mapping from a
/// successful spawn (i.e. the process ran) belongs to the caller, which
/// has the stderr content; this only covers the spawn-failure path
/// (executable missing etc).
fn map_spawn_error(err: std::io::Error) -> KsiError {
    match err.kind() {
        std::io::ErrorKind::NotFound => {
            KsiError::new(ErrorCode::ConnectionError, "executable not found").with_details(err.to_string())
        }
        _ => KsiError::new(ErrorCode::ConnectionError, "failed to spawn subprocess").with_details(err.to_string()),
    }
}

/// Maps a completed process's exit status to the error taxonomy: exit 0
/// is success (no error), signal-killed maps to `SERVICE_UNAVAILABLE`, a
/// nonzero exit with stderr content maps to `BAD_REQUEST`.
pub fn map_exit_status(outcome: &SpawnOutcome) -> Option<KsiError> {
    if let Some(cause) = outcome.timed_out {
        let message = match cause {
            TimeoutCause::Progress => "subprocess produced no output within the progress timeout",
            TimeoutCause::Overall => "subprocess exceeded its overall timeout",
        };
        return Some(KsiError::new(ErrorCode::Timeout, message));
    }
    match outcome.exit_code {
        Some(0) => None,
        Some(_) if !outcome.stderr.trim().is_empty() => {
            Some(KsiError::new(ErrorCode::BadRequest, "subprocess exited with an error").with_details(
                outcome.stderr.chars().take(4096).collect::<String>(),
            ))
        }
        Some(code) => Some(KsiError::new(ErrorCode::BadRequest, format!("subprocess exited with code {code}"))),
        None => Some(KsiError::new(ErrorCode::ServiceUnavailable, "subprocess terminated by signal")),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

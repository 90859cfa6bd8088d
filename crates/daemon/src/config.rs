// SPDX-License-Identifier: MIT

//! Daemon-wide configuration, resolved once at startup from `KSI_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ksi_wire::DEFAULT_MAX_FRAME_BYTES;

use crate::bus::subscription::DEFAULT_OFFLINE_QUEUE_CAPACITY;
use crate::bus::DEFAULT_HISTORY_SIZE;
use ksi_core::DEFAULT_TRANSFORMER_DEPTH_CAP;

/// Default attempt-timeout schedule for the subprocess supervisor's retry
/// strategy: `[300s, 900s, 1800s]`.
pub const DEFAULT_ATTEMPT_TIMEOUTS: &[Duration] =
    &[Duration::from_secs(300), Duration::from_secs(900), Duration::from_secs(1800)];

/// Default progress-stall timeout.
pub const DEFAULT_PROGRESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Default terminate-then-kill grace period.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Default bound on concurrently running subprocesses.
pub const DEFAULT_MAX_INFLIGHT_SUBPROCESSES: usize = 16;

/// Default shutdown drain window for the message bus.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory root.
    pub data_dir: PathBuf,
    /// Unix socket path; defaults to `<data_dir>/sockets/ksid.sock`.
    pub socket_path: PathBuf,
    pub max_frame_bytes: usize,
    pub history_size: usize,
    pub offline_queue_capacity: usize,
    pub transformer_depth_cap: u32,
    pub progress_timeout: Duration,
    pub overall_timeout: Duration,
    pub attempt_timeouts: Vec<Duration>,
    pub kill_grace: Duration,
    pub max_inflight_subprocesses: usize,
    pub drain_timeout: Duration,
    /// Orphan sandbox GC age threshold.
    pub orphan_age: Duration,
    /// Loopback port for an optional secondary TCP listener, from
    /// `KSI_TCP_PORT`. Unset by default — the Unix socket is the only
    /// transport unless explicitly opted into.
    pub tcp_port: Option<u16>,
    /// Token TCP clients must present on their first request, from
    /// `KSI_AUTH_TOKEN`. If `tcp_port` is set but this is `None`, any TCP
    /// client is accepted — intended for local-network testing only, never
    /// for exposing the daemon beyond a trusted host.
    pub auth_token: Option<String>,
}

impl Config {
    /// Resolve configuration from the environment, falling back to the
    /// documented defaults.
    pub fn from_env() -> Self {
        let data_dir = env_path("KSI_DATA_DIR").unwrap_or_else(default_data_dir);
        let socket_path =
            env_path("KSI_SOCKET_PATH").unwrap_or_else(|| data_dir.join("sockets/ksid.sock"));
        Self {
            socket_path,
            max_frame_bytes: env_usize("KSI_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
            history_size: env_usize("KSI_HISTORY_SIZE", DEFAULT_HISTORY_SIZE),
            offline_queue_capacity: env_usize(
                "KSI_OFFLINE_QUEUE_CAPACITY",
                DEFAULT_OFFLINE_QUEUE_CAPACITY,
            ),
            transformer_depth_cap: env_usize(
                "KSI_TRANSFORMER_DEPTH_CAP",
                DEFAULT_TRANSFORMER_DEPTH_CAP as usize,
            ) as u32,
            progress_timeout: env_duration_ms("KSI_PROGRESS_TIMEOUT_MS", DEFAULT_PROGRESS_TIMEOUT),
            overall_timeout: env_duration_ms(
                "KSI_OVERALL_TIMEOUT_MS",
                DEFAULT_ATTEMPT_TIMEOUTS[DEFAULT_ATTEMPT_TIMEOUTS.len() - 1],
            ),
            attempt_timeouts: DEFAULT_ATTEMPT_TIMEOUTS.to_vec(),
            kill_grace: env_duration_ms("KSI_KILL_GRACE_MS", DEFAULT_KILL_GRACE),
            max_inflight_subprocesses: env_usize(
                "KSI_MAX_INFLIGHT_SUBPROCESSES",
                DEFAULT_MAX_INFLIGHT_SUBPROCESSES,
            ),
            drain_timeout: env_duration_ms("KSI_DRAIN_TIMEOUT_MS", DEFAULT_DRAIN_TIMEOUT),
            orphan_age: Duration::from_secs(ksi_core::DEFAULT_ORPHAN_AGE_SECS),
            tcp_port: std::env::var("KSI_TCP_PORT").ok().and_then(|v| v.parse().ok()),
            auth_token: std::env::var("KSI_AUTH_TOKEN").ok().filter(|s| !s.is_empty()),
            data_dir,
        }
    }

    pub fn sandbox_root(&self) -> PathBuf {
        self.data_dir.join("sandbox")
    }

    pub fn conversations_dir(&self) -> PathBuf {
        self.data_dir.join("conversations")
    }

    pub fn responses_dir(&self) -> PathBuf {
        self.data_dir.join("responses")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("permissions/profiles")
    }

    /// Create every directory this config's paths imply. Idempotent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(self.sandbox_root().join("agents"))?;
        std::fs::create_dir_all(self.sandbox_root().join("shared"))?;
        for name in ksi_core::GLOBAL_SHARED_RESOURCES {
            std::fs::create_dir_all(self.sandbox_root().join("_shared").join(name))?;
        }
        std::fs::create_dir_all(self.conversations_dir())?;
        std::fs::create_dir_all(self.responses_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.profiles_dir())?;
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("ksi");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".local/state/ksi")
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Log filter directive: `KSI_LOG`, falling back to `RUST_LOG`.
pub fn log_filter() -> String {
    std::env::var("KSI_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
pub fn for_tests(root: &Path) -> Config {
    Config {
        data_dir: root.to_path_buf(),
        socket_path: root.join("sockets/ksid.sock"),
        max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        history_size: DEFAULT_HISTORY_SIZE,
        offline_queue_capacity: DEFAULT_OFFLINE_QUEUE_CAPACITY,
        transformer_depth_cap: DEFAULT_TRANSFORMER_DEPTH_CAP,
        progress_timeout: DEFAULT_PROGRESS_TIMEOUT,
        overall_timeout: Duration::from_secs(60),
        attempt_timeouts: DEFAULT_ATTEMPT_TIMEOUTS.to_vec(),
        kill_grace: Duration::from_millis(200),
        max_inflight_subprocesses: DEFAULT_MAX_INFLIGHT_SUBPROCESSES,
        drain_timeout: Duration::from_secs(1),
        orphan_age: Duration::from_secs(ksi_core::DEFAULT_ORPHAN_AGE_SECS),
        tcp_port: None,
        auth_token: None,
    }
}

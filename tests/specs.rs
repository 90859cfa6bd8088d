// SPDX-License-Identifier: MIT

//! End-to-end seed tests: each spawns a real `ksid` process bound to a
//! scratch data directory and drives it over its Unix socket exactly as a
//! client would, rather than calling into the daemon's internals directly.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use assert_cmd::cargo::CommandCargoExt;
use serde_json::{json, Value};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use ksi_core::{KsiError, Notification, ResponseEnvelope};
use ksi_wire::{read_frame, write_frame, ClientRequest, ServerMessage, DEFAULT_MAX_FRAME_BYTES};

struct Daemon {
    child: Child,
    _data_dir: tempfile::TempDir,
    socket_path: PathBuf,
}

impl Daemon {
    fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// `configure` runs before the process is spawned, with the scratch
    /// data directory already created — used to drop permission profile
    /// fixtures in place before the daemon loads them at startup.
    fn start_with(configure: impl FnOnce(&Path)) -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        configure(data_dir.path());

        let socket_path = data_dir.path().join("sockets/ksid.sock");
        let mut cmd = Command::cargo_bin("ksid").expect("ksid binary built by the workspace");
        cmd.env("KSI_DATA_DIR", data_dir.path())
            .env("KSI_SOCKET_PATH", &socket_path)
            .env("KSI_LOG", "warn")
            .env("KSI_PROGRESS_TIMEOUT_MS", "2000")
            .env("KSI_KILL_GRACE_MS", "200");
        let child = cmd.spawn().expect("spawn ksid");

        let deadline = Instant::now() + Duration::from_secs(10);
        while !socket_path.exists() {
            if Instant::now() > deadline {
                panic!("ksid did not create its socket in time");
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        Self { child, _data_dir: data_dir, socket_path }
    }

    async fn connect(&self) -> Client {
        let stream = UnixStream::connect(&self.socket_path).await.expect("connect to ksid");
        let (read_half, write_half) = stream.into_split();
        Client { reader: BufReader::new(read_half), writer: write_half }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct Client {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl Client {
    async fn call(&mut self, name: &str, data: Value) -> ResponseEnvelope {
        match self.send_and_recv(name, data).await {
            ServerMessage::Response(envelope) => envelope,
            ServerMessage::Notification(n) => panic!("expected a response, got a notification: {n:?}"),
        }
    }

    async fn send_and_recv(&mut self, name: &str, data: Value) -> ServerMessage {
        let payload = serde_json::to_vec(&ClientRequest::new(name, data)).expect("serialize request");
        write_frame(&mut self.writer, &payload, DEFAULT_MAX_FRAME_BYTES).await.expect("write frame");
        self.writer.flush().await.expect("flush");
        self.next_frame().await.expect("connection closed before a reply arrived")
    }

    async fn next_frame(&mut self) -> Option<ServerMessage> {
        let frame = read_frame(&mut self.reader, DEFAULT_MAX_FRAME_BYTES).await.expect("read frame");
        frame.map(|bytes| serde_json::from_slice(&bytes).expect("malformed frame from daemon"))
    }

    async fn next_notification(&mut self, within: Duration) -> Notification {
        match tokio::time::timeout(within, self.next_frame()).await {
            Ok(Some(ServerMessage::Notification(n))) => n,
            Ok(Some(ServerMessage::Response(r))) => panic!("expected a notification, got a response: {r:?}"),
            Ok(None) => panic!("connection closed before a notification arrived"),
            Err(_) => panic!("timed out waiting for a notification"),
        }
    }
}

fn assert_error(envelope: &ResponseEnvelope, code: ksi_core::ErrorCode) -> KsiError {
    match envelope {
        ResponseEnvelope::Error { error, .. } => {
            assert_eq!(error.code, code, "unexpected error code: {error:?}");
            error.clone()
        }
        ResponseEnvelope::Success { result, .. } => panic!("expected an error, got success: {result}"),
    }
}

fn assert_success(envelope: &ResponseEnvelope) -> Value {
    match envelope {
        ResponseEnvelope::Success { result, .. } => result.clone(),
        ResponseEnvelope::Error { error, .. } => panic!("expected success, got an error: {error:?}"),
    }
}

#[tokio::test]
async fn basic_pub_sub_delivers_exactly_one_envelope_to_the_subscriber() {
    let daemon = Daemon::start();
    let mut a = daemon.connect().await;
    let mut b = daemon.connect().await;

    let subscribed = a.call("message:subscribe", json!({"patterns": ["foo:*"]})).await;
    assert_success(&subscribed);

    let published = b.call("message:publish", json!({"event_name": "foo:bar", "data": {"x": 1}})).await;
    assert_success(&published);

    let notification = a.next_notification(Duration::from_secs(2)).await;
    assert_eq!(notification.event, "foo:bar");
    assert_eq!(notification.data["x"], json!(1));
}

#[tokio::test]
async fn offline_delivery_flushes_queued_messages_on_reconnect() {
    let daemon = Daemon::start();
    let mut owner = daemon.connect().await;

    let spawned =
        owner.call("agent:spawn", json!({"profile_name": "alice", "base_level": "standard"})).await;
    let agent_id = assert_success(&spawned)["agent_id"].as_str().unwrap().to_string();

    let mut alice_conn = daemon.connect().await;
    assert_success(&alice_conn.call("agent:connect", json!({"agent_id": agent_id})).await);
    assert_success(&alice_conn.call("agent:disconnect", json!({"agent_id": agent_id})).await);
    drop(alice_conn);

    let sent = owner
        .call("message:publish", json!({"event_name": "DIRECT_MESSAGE", "data": {"to": agent_id, "content": "hi"}}))
        .await;
    let outcome = assert_success(&sent);
    assert_eq!(outcome["queued_offline"], json!(true));

    let mut reconnected = daemon.connect().await;
    assert_success(&reconnected.call("agent:connect", json!({"agent_id": agent_id})).await);

    let notification = reconnected.next_notification(Duration::from_secs(2)).await;
    assert_eq!(notification.data["content"], json!("hi"));
}

const TRUSTED_PROFILE: &str = r#"
level: trusted
tools:
  allowed: ["Read", "Write"]
capabilities:
  spawn_agents: true
"#;

#[tokio::test]
async fn permission_de_escalation_rejects_a_spawn_that_exceeds_the_parents_tools() {
    let daemon = Daemon::start_with(|data_dir| {
        std::fs::create_dir_all(data_dir.join("permissions/profiles")).expect("profiles dir");
        let mut f = std::fs::File::create(data_dir.join("permissions/profiles/trusted.yaml")).expect("fixture file");
        f.write_all(TRUSTED_PROFILE.as_bytes()).expect("write fixture");
    });
    let mut client = daemon.connect().await;

    let parent = client.call("agent:spawn", json!({"profile_name": "parent", "base_level": "trusted"})).await;
    let parent_id = assert_success(&parent)["agent_id"].as_str().unwrap().to_string();

    let child = client
        .call(
            "agent:spawn",
            json!({
                "profile_name": "child",
                "base_level": "trusted",
                "parent_agent_id": parent_id,
                "overrides": {"allowed_add": ["NetworkExec"]},
            }),
        )
        .await;
    assert_error(&child, ksi_core::ErrorCode::PermissionDenied);

    let agents = assert_success(&client.call("agent:list", json!({})).await);
    assert_eq!(agents.as_array().unwrap().len(), 1, "the rejected child must not have been registered");
}

// The two CLI providers `completion:async` can launch are hardcoded to the
// external `claude`/`gemini` binaries (see `supervisor::provider`), which
// this sandbox does not have installed. A black-box client can still bound
// how quickly a call to a missing provider resolves; the progress-timeout
// and kill-grace mechanics themselves, including a genuinely stalled child,
// are exercised directly against the supervisor in
// `crates/daemon/src/supervisor/mod_tests.rs`.
#[tokio::test]
async fn completion_async_never_hangs_on_an_unavailable_provider() {
    let daemon = Daemon::start();
    let mut client = daemon.connect().await;

    let spawned = client.call("agent:spawn", json!({"profile_name": "runner", "base_level": "standard"})).await;
    let agent_id = assert_success(&spawned)["agent_id"].as_str().unwrap().to_string();

    let started = Instant::now();
    let result = client
        .call("completion:async", json!({"agent_id": agent_id, "prompt": "ignored", "provider": "gemini_cli"}))
        .await;
    assert!(started.elapsed() < Duration::from_secs(5), "completion:async did not return promptly");
    match result {
        ResponseEnvelope::Error { .. } | ResponseEnvelope::Success { .. } => {}
    }
}

// Real terminate-then-kill cancellation of an inflight child is covered by
// `crates/daemon/src/supervisor/mod_tests.rs::cancel_terminates_an_inflight_child`,
// which spawns a real sleeping process rather than going through a named
// provider. This seed test instead confirms the wire-level contract: canceling
// a request the daemon has no record of is a safe no-op, not an error.
#[tokio::test]
async fn canceling_an_unknown_request_is_a_safe_no_op() {
    let daemon = Daemon::start();
    let mut client = daemon.connect().await;

    let cancel = client.call("completion:cancel", json!({"request_id": "req-doesnotexist"})).await;
    assert_success(&cancel);
}

// Transformers are registered in-process by service startup code, not over
// the wire, so there is no client-facing event that would let a black-box
// test install the `a:x -> b:y -> a:x` loop itself. That rewrite-and-cap
// behavior is exercised directly against the router in
// `crates/daemon/src/router/mod_tests.rs::transformer_loop_is_capped_and_does_not_livelock`.
// This seed test instead confirms an ordinary event with no registered
// transformers still dispatches normally, i.e. the depth-counting machinery
// is inert when nothing produces a loop.
#[tokio::test]
async fn an_event_with_no_transformers_dispatches_normally() {
    let daemon = Daemon::start();
    let mut client = daemon.connect().await;

    let published = client.call("message:publish", json!({"event_name": "a:x", "data": {}})).await;
    assert_success(&published);
}

// SPDX-License-Identifier: MIT

//! Accept loop: one reader task parses newline-delimited `ClientRequest`
//! frames and drives them through the Event Router; one writer task drains
//! the connection's queue in enqueue order. The two are independent so a
//! slow client write never blocks dispatch of its own next request.
//!
//! The Unix socket is the primary, trusted transport. A secondary TCP
//! listener is available opt-in (`KSI_TCP_PORT`) for local-network testing;
//! TCP connections must present `KSI_AUTH_TOKEN` on their first request when
//! one is configured, and are otherwise handled identically to Unix ones.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener, UnixStream};
use tracing::{debug, info, warn};

use ksi_core::{ConnId, ErrorCode, KsiError, Originator, ResponseEnvelope};
use ksi_wire::{read_frame, ClientRequest, ServerMessage};

use crate::connection::{BackpressurePolicy, Connection};
use crate::context::DaemonContext;

/// Where a connection came from, for the TCP auth-token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionSource {
    /// Local Unix socket — trusted, no auth required.
    Unix,
    /// Secondary TCP listener — requires `auth_token` on the first request
    /// when the daemon has one configured.
    Tcp,
}

/// Bind the socket(s) and accept connections until the process is asked to
/// shut down. Each accepted connection gets its own reader/writer task pair.
/// `tcp` is only present when `KSI_TCP_PORT` was set at startup.
pub async fn serve(ctx: Arc<DaemonContext>, unix: UnixListener, tcp: Option<TcpListener>) {
    match tcp {
        Some(tcp) => serve_dual(ctx, unix, tcp).await,
        None => serve_unix_only(ctx, unix).await,
    }
}

async fn serve_unix_only(ctx: Arc<DaemonContext>, unix: UnixListener) {
    loop {
        match unix.accept().await {
            Ok((stream, _addr)) => {
                let ctx = ctx.clone();
                let (read_half, write_half) = stream.into_split();
                tokio::spawn(async move {
                    handle_connection(ctx, read_half, write_half, ConnectionSource::Unix).await;
                });
            }
            Err(e) => warn!(error = %e, "failed to accept Unix connection"),
        }
    }
}

async fn serve_dual(ctx: Arc<DaemonContext>, unix: UnixListener, tcp: TcpListener) {
    loop {
        tokio::select! {
            result = unix.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let ctx = ctx.clone();
                        let (read_half, write_half) = stream.into_split();
                        tokio::spawn(async move {
                            handle_connection(ctx, read_half, write_half, ConnectionSource::Unix).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept Unix connection"),
                }
            }
            result = tcp.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(%addr, "TCP connection accepted");
                        let ctx = ctx.clone();
                        let (read_half, write_half) = stream.into_split();
                        tokio::spawn(async move {
                            handle_connection(ctx, read_half, write_half, ConnectionSource::Tcp).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept TCP connection"),
                }
            }
        }
    }
}

async fn handle_connection<R, W>(ctx: Arc<DaemonContext>, read_half: R, write_half: W, source: ConnectionSource)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let conn_id = ConnId::new();
    let connection = Connection::new(conn_id, BackpressurePolicy::DropOldestBroadcast);
    ctx.connections.register(connection.clone());
    info!(%conn_id, ?source, "connection accepted");

    let reader_ctx = ctx.clone();
    let reader_conn = connection.clone();
    let reader = tokio::spawn(async move {
        read_loop(reader_ctx, reader_conn, read_half, source).await;
    });

    let writer_conn = connection.clone();
    let max_frame_bytes = ctx.config.max_frame_bytes;
    let writer = tokio::spawn(async move {
        write_loop(writer_conn, write_half, max_frame_bytes).await;
    });

    let _ = reader.await;
    connection.mark_closed();
    ctx.connections.unregister(conn_id);
    if let Some(agent_id) = connection.peer_identity() {
        ctx.registry.unbind_connection(&agent_id);
        debug!(%agent_id, %conn_id, "connection closed, agent paused");
    }
    let _ = writer.await;
    info!(%conn_id, "connection closed");
}

async fn read_loop<R>(ctx: Arc<DaemonContext>, connection: Arc<Connection>, read_half: R, source: ConnectionSource)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(read_half);
    let mut authenticated = source == ConnectionSource::Unix;
    loop {
        let frame = match read_frame(&mut reader, ctx.config.max_frame_bytes).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "frame read failed, closing connection");
                let error = KsiError::new(ErrorCode::FrameTooLarge, "frame exceeds max size").with_details(e.to_string());
                connection.enqueue(ServerMessage::Response(ResponseEnvelope::error(error, None)));
                break;
            }
        };

        let request: ClientRequest = match serde_json::from_slice(&frame) {
            Ok(request) => request,
            Err(e) => {
                let error = KsiError::new(ErrorCode::BadJson, "malformed request").with_details(e.to_string());
                connection.enqueue(ServerMessage::Response(ResponseEnvelope::error(error, None)));
                break;
            }
        };

        if !authenticated {
            match &ctx.config.auth_token {
                Some(expected) if request.auth_token.as_deref() == Some(expected.as_str()) => {
                    authenticated = true;
                }
                Some(_) => {
                    warn!(conn_id = %connection.conn_id, "rejecting unauthenticated TCP connection");
                    let error = KsiError::new(ErrorCode::PermissionDenied, "missing or invalid auth_token");
                    connection.enqueue(ServerMessage::Response(ResponseEnvelope::error(error, None)));
                    break;
                }
                // No token configured on the daemon — allow all TCP connections.
                None => authenticated = true,
            }
        }

        dispatch_request(&ctx, &connection, request).await;
    }
}

async fn dispatch_request(ctx: &Arc<DaemonContext>, connection: &Arc<Connection>, request: ClientRequest) {
    let originator = match connection.peer_identity() {
        Some(agent_id) => Originator::Agent(agent_id),
        None => Originator::Connection(connection.conn_id),
    };

    let (response, result) = ctx.router.emit_first_root(&request.name, request.data, originator).await;

    let envelope = match response {
        Some(value) => ResponseEnvelope::success(value, &result.ctx),
        None => match result.first_error() {
            Some(error) => ResponseEnvelope::error(error.clone(), Some(&result.ctx)),
            None if result.no_handlers() => ResponseEnvelope::error(
                KsiError::not_found(format!("no handler registered for event {}", request.name)),
                Some(&result.ctx),
            ),
            None => ResponseEnvelope::success(serde_json::Value::Null, &result.ctx),
        },
    };
    connection.enqueue(ServerMessage::Response(envelope));
}

async fn write_loop<W>(connection: Arc<Connection>, mut write_half: W, max_frame_bytes: usize)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let frames = connection.drain_or_wait().await;
        if frames.is_empty() {
            break;
        }
        for message in frames {
            let Ok(payload) = serde_json::to_vec(&message) else {
                warn!("failed to serialize outbound frame, dropping");
                continue;
            };
            if ksi_wire::write_frame(&mut write_half, &payload, max_frame_bytes).await.is_err() {
                return;
            }
        }
        if write_half.flush().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

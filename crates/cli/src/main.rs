// SPDX-License-Identifier: MIT

//! `ksi` — a thin client for the daemon's Unix socket. Sends one event and
//! prints the response, or subscribes to a set of patterns and streams
//! notifications until interrupted.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use ksi_core::{KsiError, Notification, ResponseEnvelope};
use ksi_wire::{read_frame, write_frame, ClientRequest, ServerMessage, DEFAULT_MAX_FRAME_BYTES};

#[derive(Parser)]
#[command(name = "ksi", about = "Command-line client for ksid")]
struct Cli {
    /// Path to the daemon's Unix socket. Defaults to `KSI_SOCKET_PATH`, then
    /// `<data dir>/sockets/ksid.sock`.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Send one event and print its response.
    Call {
        /// Colon-delimited event name, e.g. `agent:spawn`.
        name: String,
        /// JSON payload; defaults to `{}`.
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Subscribe to one or more patterns and stream notifications.
    Subscribe {
        /// Patterns to subscribe to, e.g. `agent:*` or `**`.
        patterns: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ksi: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), KsiError> {
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);
    let stream = UnixStream::connect(&socket_path).await.map_err(|e| {
        KsiError::new(ksi_core::ErrorCode::ConnectionError, format!("cannot connect to {}", socket_path.display()))
            .with_details(e.to_string())
    })?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    match cli.command {
        Command::Call { name, data } => {
            let data: Value = serde_json::from_str(&data)
                .map_err(|e| KsiError::new(ksi_core::ErrorCode::BadJson, "malformed --data").with_details(e.to_string()))?;
            send(&mut write_half, &ClientRequest::new(name, data)).await?;
            let frame = recv(&mut reader).await?.ok_or_else(|| {
                KsiError::new(ksi_core::ErrorCode::ConnectionError, "connection closed before a response arrived")
            })?;
            match frame {
                ServerMessage::Response(envelope) => print_response(&envelope, cli.format),
                ServerMessage::Notification(n) => print_notification(&n, cli.format),
            }
        }
        Command::Subscribe { patterns } => {
            let data = serde_json::json!({ "patterns": patterns });
            send(&mut write_half, &ClientRequest::new("message:subscribe", data)).await?;
            let frame = recv(&mut reader).await?;
            if let Some(ServerMessage::Response(envelope)) = frame {
                if let ResponseEnvelope::Error { error, .. } = envelope {
                    return Err(error);
                }
            }
            loop {
                match recv(&mut reader).await? {
                    Some(ServerMessage::Notification(n)) => print_notification(&n, cli.format),
                    Some(ServerMessage::Response(envelope)) => print_response(&envelope, cli.format),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

async fn send(write_half: &mut tokio::net::unix::OwnedWriteHalf, request: &ClientRequest) -> Result<(), KsiError> {
    let payload = serde_json::to_vec(request).unwrap_or_default();
    write_frame(write_half, &payload, DEFAULT_MAX_FRAME_BYTES)
        .await
        .map_err(|e| KsiError::new(ksi_core::ErrorCode::ConnectionError, "failed to write request").with_details(e.to_string()))?;
    write_half
        .flush()
        .await
        .map_err(|e| KsiError::new(ksi_core::ErrorCode::ConnectionError, "failed to flush request").with_details(e.to_string()))
}

async fn recv(
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
) -> Result<Option<ServerMessage>, KsiError> {
    let frame = read_frame(reader, DEFAULT_MAX_FRAME_BYTES)
        .await
        .map_err(|e| KsiError::new(ksi_core::ErrorCode::ConnectionError, "failed to read frame").with_details(e.to_string()))?;
    match frame {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| KsiError::new(ksi_core::ErrorCode::BadJson, "malformed frame from daemon").with_details(e.to_string())),
        None => Ok(None),
    }
}

fn print_response(envelope: &ResponseEnvelope, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(envelope).unwrap_or_default()),
        OutputFormat::Text => match envelope {
            ResponseEnvelope::Success { result, .. } => println!("{}", serde_json::to_string_pretty(result).unwrap_or_default()),
            ResponseEnvelope::Error { error, .. } => eprintln!("error: {error}"),
        },
    }
}

fn print_notification(notification: &Notification, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(notification).unwrap_or_default()),
        OutputFormat::Text => println!("{}: {}", notification.event, serde_json::to_string(&notification.data).unwrap_or_default()),
    }
}

fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("KSI_SOCKET_PATH") {
        return PathBuf::from(path);
    }
    let data_dir = std::env::var("KSI_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("ksi");
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".local/state/ksi")
    });
    data_dir.join("sockets/ksid.sock")
}

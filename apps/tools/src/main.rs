use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use shared::{
    domain::{CommandType, DeviceView, EngineStatus, LockState, OnlineState},
    error::ApiError,
    protocol::{CommandAck, CommandRequest, MemoryEntryPayload, MemorySource, StatusBoard},
};

#[derive(Parser, Debug)]
#[command(name = "fleetctl", about = "Operate the fleet dashboard from a terminal")]
struct Cli {
    #[arg(long, env = "FLEET_DASHBOARD_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every configured vehicle with its engine status.
    Status,
    /// Cut the engine of a vehicle.
    Lock { device_id: String },
    /// Re-enable the engine of a vehicle.
    Unlock { device_id: String },
    /// Send any command type the vehicle's dialect supports.
    Send { device_id: String, command_type: String },
    /// Dump the remembered lock states.
    Memory,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let http = Client::new();
    let server_url = cli.server_url.trim_end_matches('/');

    match cli.command {
        Command::Status => {
            let response = http
                .get(format!("{server_url}/api/get_devices_status"))
                .send()
                .await
                .context("dashboard unreachable")?;
            let board: StatusBoard = decode(response).await?;
            for (name, view) in board.iter() {
                println!("{}", status_line(name, view));
            }
        }
        Command::Lock { device_id } => {
            send(&http, server_url, device_id, CommandType::Stop.as_str()).await?;
        }
        Command::Unlock { device_id } => {
            send(&http, server_url, device_id, CommandType::Resume.as_str()).await?;
        }
        Command::Send {
            device_id,
            command_type,
        } => {
            send(&http, server_url, device_id, &command_type).await?;
        }
        Command::Memory => {
            let response = http
                .get(format!("{server_url}/api/command_memory"))
                .send()
                .await
                .context("dashboard unreachable")?;
            let entries: Vec<MemoryEntryPayload> = decode(response).await?;
            if entries.is_empty() {
                println!("no remembered lock states");
            }
            for entry in entries {
                println!(
                    "{:<8} {:<13} {:<8} {}",
                    entry.device_id,
                    lock_label(entry.state),
                    source_label(entry.source),
                    entry.updated_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

async fn send(
    http: &Client,
    server_url: &str,
    device_id: String,
    command_type: &str,
) -> Result<()> {
    let response = http
        .post(format!("{server_url}/api/send_command"))
        .json(&CommandRequest {
            device_id,
            command_type: command_type.to_string(),
        })
        .send()
        .await
        .context("dashboard unreachable")?;
    let ack: CommandAck = decode(response).await?;
    if !ack.is_accepted() {
        bail!(
            "tracking service refused command (status {}): {}",
            ack.status,
            ack.message
        );
    }
    println!("command sent: {}", ack.message);
    Ok(())
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        if let Ok(error) = serde_json::from_slice::<ApiError>(&body) {
            bail!("{status} ({:?}): {}", error.code, error.message);
        }
        bail!("{status}: {}", String::from_utf8_lossy(&body));
    }
    serde_json::from_slice(&body).context("unexpected dashboard response")
}

fn lock_label(state: LockState) -> &'static str {
    match state {
        LockState::Locked => "locked",
        LockState::Unlocked => "unlocked",
    }
}

fn source_label(source: MemorySource) -> &'static str {
    match source {
        MemorySource::Command => "command",
        MemorySource::Motion => "motion",
    }
}

fn status_line(name: &str, view: &DeviceView) -> String {
    let online = match view.online {
        OnlineState::Online => "online",
        OnlineState::Ack => "ack",
        OnlineState::Offline => "offline",
    };
    let engine = match view.engine_status {
        EngineStatus::Locked => "LOCKED",
        EngineStatus::Unlocked => "unlocked",
        EngineStatus::InUse => "moving",
    };
    let position = match (view.lat, view.lng) {
        (Some(lat), Some(lng)) => format!("{lat:.5},{lng:.5}"),
        _ => "no fix".to_string(),
    };
    format!(
        "{name:<18} id={:<6} {online:<8} {engine:<9} {:>6.1} km/h  {position}",
        view.id, view.speed
    )
}

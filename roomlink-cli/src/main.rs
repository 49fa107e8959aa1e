use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use roomlink_core::utils::DEFAULT_STUN_ADDR;
use roomlink_session::{
    CompletedFile, IceServerConfig, OutgoingFile, RelayConfig, SessionConfig, SessionEvent,
    SessionHandle, SessionManager, TransportConfig, WebRtcTransport, WsRelay,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roomlink")]
#[command(about = "Chat and share files with everyone in a room, peer to peer")]
struct Cli {
    #[arg(long, value_name = "URL", help = "Relay WebSocket endpoint")]
    relay: String,

    #[arg(long, value_name = "CODE", help = "Room to join (the relay assigns one if omitted)")]
    room: Option<String>,

    #[arg(long, default_value = ".", value_name = "DIR", help = "Where received files are written")]
    output_dir: PathBuf,

    #[arg(long = "stun", value_name = "URL", help = "STUN server (repeatable)")]
    stun: Vec<String>,

    #[arg(long, default_value_t = 2000, value_name = "MS", help = "Relay reconnect delay")]
    reconnect_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;

    let mut transport_config = TransportConfig::default();
    if !cli.stun.is_empty() {
        transport_config.ice_servers = vec![IceServerConfig::stun(cli.stun.clone())];
    }
    let config = SessionConfig {
        transport: transport_config.clone(),
        ..SessionConfig::default()
    };

    let transport =
        WebRtcTransport::new(transport_config).context("Failed to set up WebRTC transport")?;
    let relay_config = RelayConfig {
        reconnect_delay: Duration::from_millis(cli.reconnect_ms),
        ..RelayConfig::new(&cli.relay)
    };
    let (relay, relay_rx) = WsRelay::connect(relay_config);

    let (manager, handle, events) =
        SessionManager::new(config, Arc::new(transport), Arc::new(relay), relay_rx);
    let session = tokio::spawn(manager.run());

    println!("{}", "📡 Connecting to relay...".cyan());
    println!("   {}", cli.relay.dimmed());
    if cli.stun.is_empty() {
        println!("   stun: {}", DEFAULT_STUN_ADDR.dimmed());
    }
    if let Some(room) = &cli.room {
        handle.join_room(room.clone()).await?;
    }
    print_help();

    let printer = tokio::spawn(print_events(events, cli.output_dir.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = run_line(&handle, line).await {
            eprintln!("{} {e:#}", "error:".red().bold());
        }
        if line == "/quit" {
            break;
        }
    }

    handle.shutdown().await.ok();
    session.await.context("Session task panicked")?;
    printer.abort();
    Ok(())
}

fn print_help() {
    println!("{}", "Type a line to chat. Commands:".bold());
    println!("   /file <path>   send a file to everyone");
    println!("   /join <code>   join another room");
    println!("   /peers         list peers");
    println!("   /quit          leave");
}

async fn run_line(handle: &SessionHandle, line: &str) -> Result<()> {
    if let Some(path) = line.strip_prefix("/file ") {
        let file = OutgoingFile::from_path(path.trim())
            .await
            .with_context(|| format!("Failed to open {path}"))?;
        println!(
            "{} {} ({})",
            "📦 Sending".cyan(),
            file.name.bold(),
            human_size(file.size)
        );
        handle.broadcast_file(file).await?;
    } else if let Some(code) = line.strip_prefix("/join ") {
        handle.join_room(code.trim()).await?;
    } else if line == "/peers" {
        print_peers(handle);
    } else if line == "/help" {
        print_help();
    } else if line != "/quit" {
        handle.broadcast_text(line).await?;
    }
    Ok(())
}

fn print_peers(handle: &SessionHandle) {
    let snapshot = handle.snapshot();
    match &snapshot.room {
        Some(room) => println!(
            "room {} as {}",
            room.room_code.bold(),
            room.local_name.bold()
        ),
        None => println!("{}", "not in a room yet".yellow()),
    }
    if snapshot.peers.is_empty() {
        println!("   (no peers)");
    }
    for (id, peer) in &snapshot.peers {
        println!(
            "   {} {} queued={} receiving={}{}",
            id.to_string().bold(),
            peer.status,
            peer.queued,
            peer.incoming_transfers,
            if peer.channel_open { "" } else { " (no channel)" }
        );
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<SessionEvent>, output_dir: PathBuf) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::RoomJoined(room) => {
                println!(
                    "{} room {} as {}",
                    "✨ Joined".green().bold(),
                    room.room_code.bold(),
                    room.local_name.bold()
                );
            }
            SessionEvent::PeerStatusChanged { peer, status } => {
                println!("   {} {}", peer.to_string().dimmed(), status);
            }
            SessionEvent::PeerRemoved { peer } => {
                println!("   {} left", peer.to_string().dimmed());
            }
            SessionEvent::ChatReceived { peer, message } => {
                let sender = if message.sender.is_empty() {
                    peer.to_string()
                } else {
                    message.sender
                };
                println!("{}: {}", sender.cyan().bold(), message.message);
            }
            SessionEvent::IncomingFileStarted {
                sender,
                filename,
                size,
                ..
            } => {
                println!(
                    "{} {} from {} ({})",
                    "📥 Receiving".cyan(),
                    filename.bold(),
                    sender,
                    human_size(size)
                );
            }
            SessionEvent::IncomingFileProgress { .. } => {}
            SessionEvent::IncomingFileCompleted { file, .. } => {
                match save_file(&output_dir, &file).await {
                    Ok(path) => println!("{} {}", "✅ Saved".green(), path.display()),
                    Err(e) => eprintln!("{} {e:#}", "error:".red().bold()),
                }
            }
            SessionEvent::IncomingFileFailed { reason, .. } => {
                println!("{} {}", "❌ Incoming file failed:".red(), reason);
            }
            SessionEvent::OutgoingFileProgress { .. } => {}
            SessionEvent::OutgoingFileCompleted { peer, .. } => {
                println!("   sent to {}", peer.to_string().dimmed());
            }
            SessionEvent::OutgoingFileFailed { peer, reason, .. } => {
                println!("{} {}: {}", "❌ Send failed for".red(), peer, reason);
            }
        }
    }
}

/// Writes under `dir`, never outside it, without overwriting older files.
async fn save_file(dir: &Path, file: &CompletedFile) -> Result<PathBuf> {
    let name = Path::new(&file.filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| file.transfer_id.to_string());

    let mut path = dir.join(&name);
    let mut n = 1;
    while tokio::fs::try_exists(&path).await.unwrap_or(false) {
        path = dir.join(format!("{n}-{name}"));
        n += 1;
    }

    tokio::fs::write(&path, &file.data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

use clap::Parser;
use log::{error, info};
use server::config::{RoomConfig, ServerConfig};
use server::network::{Server, ServerMessage};
use shared::{DEFAULT_MAX_PARTICIPANTS, DEFAULT_ROOM_NAME, DEFAULT_TICK_MS, MOVE_SPEED};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Name of the shared room clients must ask for
    #[arg(short, long, default_value = DEFAULT_ROOM_NAME)]
    room: String,

    /// Maximum number of participants in the room
    #[arg(short, long, default_value_t = DEFAULT_MAX_PARTICIPANTS)]
    max_participants: usize,

    /// Simulation tick interval in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Distance moved per tick at full deflection
    #[arg(short, long, default_value_t = MOVE_SPEED)]
    speed: f32,

    /// Seconds of silence before a session is dropped
    #[arg(long, default_value = "5")]
    timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_address: format!("{}:{}", args.host, args.port),
            room: RoomConfig {
                name: args.room,
                max_participants: args.max_participants,
                speed: args.speed,
            },
            tick_interval: Duration::from_millis(args.tick_ms),
            client_timeout: Duration::from_secs(args.timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    let server = Server::bind(config).await?;
    let handle = server.handle();

    let server_task = tokio::spawn(server.run());

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = handle.send(ServerMessage::Shutdown);
        }
    }

    Ok(())
}

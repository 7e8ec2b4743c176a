use clap::Parser;
use client::animation::clip_for;
use client::input::{InputManager, KeySample};
use client::mirror::{Mirror, MirrorEvent};
use client::network::{NetworkEvent, NetworkHandle};
use client::rendering::Renderer;
use client::{ClientConfig, ClientGameState};
use log::{debug, error, info};
use macroquad::prelude::*;
use shared::{DEFAULT_ROOM_NAME, INTERPOLATION_FACTOR};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Room to join
    #[arg(short, long, default_value = DEFAULT_ROOM_NAME)]
    room: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,

    /// Fraction of the remaining distance covered per frame
    #[arg(short = 'i', long, default_value_t = INTERPOLATION_FACTOR)]
    interpolation: f32,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        ClientConfig {
            server: args.server,
            room: args.room,
            width: args.width,
            height: args.height,
            interpolation_factor: args.interpolation,
            ..ClientConfig::default()
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Room Client".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

fn log_event(event: &MirrorEvent) {
    match event {
        MirrorEvent::Joined(identity) => info!("Participant {} appeared", identity),
        MirrorEvent::Left(identity) => info!("Participant {} left", identity),
        MirrorEvent::ActionChanged { identity, from, to } => debug!(
            "Participant {} animation {} -> {}",
            identity,
            clip_for(*from),
            clip_for(*to)
        ),
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ClientConfig::from(Args::parse());
    info!("Connecting to {} (room {:?})", config.server, config.room);
    info!("Controls: arrows to move/jump, Space low attack, X high attack");

    let mut network = match NetworkHandle::connect(&config) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start networking: {}", e);
            return;
        }
    };
    let mut state = ClientGameState::new(Mirror::new(config.interpolation_factor));
    let mut input = InputManager::new();
    let mut renderer = Renderer::new(config.width, config.height);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        for event in network.poll() {
            let events = match event {
                NetworkEvent::Packet(packet) => state.handle_packet(packet),
                NetworkEvent::Closed(reason) => state.disconnect(reason),
            };
            events.iter().for_each(log_event);
        }

        state.mirror.interpolate();

        if state.is_joined() {
            if let Some(intent) = input.update(KeySample::from_keyboard()) {
                if let Err(e) = network.send_intent(intent) {
                    error!("Failed to send input: {}", e);
                }
            }
        }

        renderer.render(&state);
        next_frame().await;
    }

    network.shutdown();
}

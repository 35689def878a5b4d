use clap::Parser;
use client::game::{ClickOutcome, ClientGameState};
use client::input::{InputEvent, InputManager};
use client::network::{NetworkEvent, NetworkHandle};
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use shared::Packet;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "900")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "640")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Chess".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: click to select and move, Enter to chat, F5 twice to reset, R to reconnect");

    let mut state = ClientGameState::new();
    let mut input = InputManager::new();
    let mut renderer = Renderer::new(args.width, args.height);

    let mut network = match NetworkHandle::connect(args.server.clone(), None) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start network thread: {}", e);
            return;
        }
    };

    loop {
        for event in network.poll() {
            match event {
                NetworkEvent::Packet(packet) => state.apply_packet(packet),
                NetworkEvent::Closed { reason } => state.connection_lost(reason),
            }
        }

        state.expire_reset_request(Instant::now());

        let flipped = state.my_color() == Some(shared::Color::Black);
        let layout = renderer.layout(flipped);

        for event in input.update(&layout) {
            match event {
                InputEvent::SquareClicked(square) => {
                    if let ClickOutcome::Propose { from, to } = state.click_square(square) {
                        info!("Proposing move {} -> {}", from, to);
                        network.send(Packet::Move { from, to });
                    }
                }
                InputEvent::ResetRequested => {
                    if state.request_reset(Instant::now()) {
                        info!("Requesting a new game");
                        network.send(Packet::ResetGame);
                    }
                }
                InputEvent::ReconnectRequested => {
                    if state.disconnected.is_some() {
                        info!("Reconnecting to {}", args.server);
                        state.prepare_reconnect();
                        match NetworkHandle::connect(args.server.clone(), state.token) {
                            Ok(handle) => network = handle,
                            Err(e) => {
                                state.connection_lost(format!("reconnect failed: {}", e))
                            }
                        }
                    }
                }
                InputEvent::ChatSubmitted(message) => {
                    network.send(Packet::Chat { message });
                }
            }
        }

        renderer.render(&state, input.chat(), &layout);

        next_frame().await;
    }
}

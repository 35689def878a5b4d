use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, ServerError, ServerMessage};
use std::time::Duration;

/// Authoritative server for two-player networked chess
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Seconds a disconnected player's seat stays reserved (0 frees it immediately)
    #[arg(long, default_value = "0")]
    reconnect_grace_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        max_clients: args.max_clients,
        reconnect_grace: Duration::from_secs(args.reconnect_grace_secs),
        ..ServerConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}

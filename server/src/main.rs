use clap::Parser;
use log::info;
use server::config::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use server::network::Server;
use std::time::Duration;

/// Main-method of the card server.
/// Parses command-line arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = DEFAULT_HOST)]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Number of session slots
        #[clap(long, default_value = "10")]
        max_sessions: usize,
        /// Number of room slots
        #[clap(long, default_value = "7")]
        max_rooms: usize,
        /// Seconds of silence before a connection is dropped
        #[clap(long, default_value = "10")]
        heartbeat_timeout: u64,
        /// Seconds a dropped player may take to reconnect
        #[clap(long, default_value = "120")]
        reconnect_timeout: u64,
        /// Seconds between sweeper passes
        #[clap(long, default_value = "5")]
        sweep_interval: u64,
        /// Shuffle the deck before dealing
        #[clap(long)]
        shuffle: bool,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_sessions: args.max_sessions,
        max_rooms: args.max_rooms,
        sweep_interval: Duration::from_secs(args.sweep_interval.max(1)),
        heartbeat_timeout: Duration::from_secs(args.heartbeat_timeout),
        reconnect_timeout: Duration::from_secs(args.reconnect_timeout),
        shuffle_deck: args.shuffle,
    };

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

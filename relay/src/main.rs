use clap::Parser;
use log::{error, info};
use protocol::BincodeCodec;
use relay::actions::HandlerTables;
use relay::config::RelayConfig;
use relay::controller::ConnectController;
use relay::model::RelayServer;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments for the relay server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// IP address to bind the connect port and session ports to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Public port answering the connect handshake
    #[clap(short, long, default_value = "27888")]
    port: u16,
    /// Sent messages each session keeps for replay
    #[clap(long, default_value = "64")]
    resend_cache: usize,
    /// Recent messages repeated in every datagram
    #[clap(long, default_value = "5")]
    messages_per_datagram: usize,
    /// Entries in each game-data cache
    #[clap(long, default_value = "256")]
    game_data_cache: usize,
    /// Maximum number of logged-in users
    #[clap(long, default_value = "100")]
    max_users: usize,
    /// Longest username accepted at login
    #[clap(long, default_value = "31")]
    max_username_length: usize,
    /// Seconds of silence before a user is logged out
    #[clap(long, default_value = "190")]
    keep_alive_timeout: u64,
    /// Usernames whose game activity is hidden from other players
    #[clap(long = "stealth", value_delimiter = ',')]
    stealth_users: Vec<String>,
    /// Enable looking-for-game reports
    #[clap(long)]
    looking_for_game: bool,
    /// Seconds a new game waits before it is reported
    #[clap(long, default_value = "15")]
    looking_for_game_delay: u64,
    /// Handle suffixes that are never reported
    #[clap(long = "block-suffix", value_delimiter = ',')]
    blocked_suffixes: Vec<String>,
    /// Name shown in looking-for-game reports
    #[clap(long, default_value = "v086 relay")]
    server_name: String,
}

impl From<Args> for RelayConfig {
    fn from(args: Args) -> Self {
        RelayConfig {
            host: args.host,
            connect_port: args.port,
            resend_cache_capacity: args.resend_cache,
            messages_per_datagram: args.messages_per_datagram,
            game_data_cache_capacity: args.game_data_cache,
            max_users: args.max_users,
            max_username_length: args.max_username_length,
            keep_alive_timeout: Duration::from_secs(args.keep_alive_timeout),
            stealth_users: args.stealth_users,
            looking_for_game_enabled: args.looking_for_game,
            looking_for_game_delay: Duration::from_secs(args.looking_for_game_delay),
            looking_for_game_blocked_suffixes: args.blocked_suffixes,
            server_name: args.server_name,
            ..RelayConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        println!("Tip: Set RUST_LOG=info to see relay logs, or RUST_LOG=debug for per-message detail");
    }

    let config = RelayConfig::from(Args::parse());
    config.validate()?;

    let server = RelayServer::new(config);
    let controller = ConnectController::bind(
        server,
        Arc::new(HandlerTables::standard()),
        Arc::new(BincodeCodec),
    )
    .await?;
    info!("Relay ready on {}", controller.local_addr()?);

    tokio::select! {
        result = controller.run() => {
            if let Err(e) = result {
                error!("Connect controller stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

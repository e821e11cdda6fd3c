use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3025")]
    port: u16,

    /// Milliseconds between two world broadcasts
    #[arg(short, long, default_value_t = shared::SERVER_TICK_MS)]
    tick_ms: u64,

    /// Largest accepted client message in bytes
    #[arg(long, default_value_t = shared::MAX_REPORT_SIZE)]
    max_message_size: usize,

    /// Milliseconds a new client has to acknowledge its id
    #[arg(long, default_value_t = shared::ACK_TIMEOUT_MS)]
    ack_timeout_ms: u64,

    /// Milliseconds allowed for writing one broadcast to a client
    #[arg(long, default_value_t = server::config::WRITE_TIMEOUT_MS)]
    write_timeout_ms: u64,

    /// Broadcasts a client may lag behind before it is dropped
    #[arg(long, default_value_t = server::config::OUTBOX_CAPACITY)]
    outbox_capacity: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            listen_addr: format!("{}:{}", args.host, args.port),
            tick_interval: Duration::from_millis(args.tick_ms),
            max_message_size: args.max_message_size,
            ack_timeout: Duration::from_millis(args.ack_timeout_ms),
            write_timeout: Duration::from_millis(args.write_timeout_ms),
            outbox_capacity: args.outbox_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let server = Server::bind(ServerConfig::from(args)).await?;
    let shutdown = server.shutdown_token();
    let server_handle = tokio::spawn(server.run());

    tokio::select! {
        result = server_handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.cancel();
        }
    }

    Ok(())
}

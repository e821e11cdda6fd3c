use clap::Parser;
use client::config::ClientConfig;
use client::input::{InputEvent, InputSender};
use client::network::Client;
use log::{info, warn};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = shared::DEFAULT_SERVER_ADDR)]
    server: String,

    /// Milliseconds between two position reports
    #[arg(short, long, default_value_t = shared::CLIENT_TICK_MS)]
    tick_ms: u64,

    /// Input events buffered per tick before new ones are dropped
    #[arg(long, default_value_t = shared::INPUT_CAPACITY)]
    input_capacity: usize,

    /// Largest accepted world broadcast in bytes
    #[arg(long, default_value_t = shared::MAX_SNAPSHOT_SIZE)]
    max_message_size: usize,

    /// Milliseconds to wait for the server to assign an id
    #[arg(long, default_value_t = shared::ACK_TIMEOUT_MS)]
    ack_timeout_ms: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        ClientConfig {
            server_addr: args.server,
            tick_interval: Duration::from_millis(args.tick_ms),
            max_message_size: args.max_message_size,
            input_capacity: args.input_capacity,
            ack_timeout: Duration::from_millis(args.ack_timeout_ms),
        }
    }
}

/// Turns every non-whitespace byte on stdin into a key event.
///
/// Runs on its own thread since reading stdin blocks; `done` fires at EOF.
fn read_keys(input: InputSender, done: oneshot::Sender<()>) {
    let mut stdin = std::io::stdin().lock();
    let mut buffer = [0u8; 64];

    loop {
        let len = match stdin.read(&mut buffer) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) => {
                warn!("Error reading stdin: {}", e);
                break;
            }
        };
        for &byte in buffer[..len].iter().filter(|b| !b.is_ascii_whitespace()) {
            input.push(InputEvent::Key(byte));
        }
    }
    let _ = done.send(());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Starting client...");
    info!("Controls: type w/a/s/d followed by Enter to move");

    let client = Client::connect(ClientConfig::from(args)).await?;
    let handle = client.start();
    let (keys_done, keys) = oneshot::channel();
    let input = handle.input();
    thread::spawn(move || read_keys(input, keys_done));

    tokio::select! {
        _ = handle.closed() => {}
        _ = keys => info!("Input closed"),
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, disconnecting..."),
    }

    handle.shutdown().await;
    Ok(())
}

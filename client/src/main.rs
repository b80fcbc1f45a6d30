use clap::Parser;
use client::commands::help_text;
use client::input::InputReader;
use client::known_hosts;
use client::session::Session;
use log::{info, warn};
use peer::{Host, Peer, PeerConfig};
use shared::{RoomId, DEFAULT_MAX_ATTEMPTS};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serverless room-based chat over UDP", long_about = None)]
struct Args {
    /// Local address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Local port to listen on (0 picks a free port)
    #[arg(short = 'p', long, default_value = "0")]
    port: u16,

    /// Room to join at startup
    #[arg(short = 'r', long, allow_hyphen_values = true)]
    room: Option<RoomId>,

    /// File the known hosts are loaded from and saved to
    #[arg(short = 'k', long, default_value = known_hosts::DEFAULT_PATH)]
    known_hosts: PathBuf,

    /// Extra host to know about, as ip:port:room (repeatable)
    #[arg(short = 'a', long = "add", value_name = "IP:PORT:ROOM")]
    add: Vec<Host>,

    /// Transmissions per frame before a host is given up on
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Milliseconds to wait for each acknowledgment
    #[arg(long, default_value = "500")]
    ack_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = PeerConfig::default()
        .with_bind_addr(SocketAddr::new(args.host, args.port))
        .with_max_attempts(args.max_attempts)
        .with_ack_timeout(Duration::from_millis(args.ack_timeout_ms));

    let (peer, events) = Peer::bind(config).await?;
    info!("Listening on {}", peer.local_addr());

    let known = known_hosts::load(&args.known_hosts)?;
    let seeded = peer.seed_hosts(known.into_iter().chain(args.add));
    info!("{} known hosts", seeded);

    let mut session = Session::new(peer, args.known_hosts);
    if let Some(room) = args.room {
        if let Err(e) = session.switch_room(room).await {
            warn!("Could not join room {}: {}", room, e);
        }
    }

    println!("Listening on port {}", session.peer().local_port());
    println!("{}", help_text());

    session.run(InputReader::stdin(), events).await
}

use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use dht_bridge::{AnnounceFlags, Dht, Id};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// info_hash to annouce a peer on
    infohash: String,
    /// Port to announce, the engine's own port is used if missing
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let info_hash = Id::from_str(cli.infohash.as_str()).expect("invalid infohash");

    let dht = Dht::local();

    println!("\nAnnouncing peer on an infohash: {} ...\n", cli.infohash);

    match cli.port {
        Some(port) => dht.announce_peer(info_hash, port, AnnounceFlags::SEED),
        None => dht.announce(info_hash),
    }
    .expect("announce_peer failed");

    let start = Instant::now();

    let peers = dht
        .get_peers(info_hash, Duration::from_secs(2))
        .expect("get_peers failed");

    println!(
        "Got {} peers in {:?} seconds",
        peers.len(),
        start.elapsed().as_secs_f32()
    );
    for peer in peers {
        println!("   {}", peer);
    }
}

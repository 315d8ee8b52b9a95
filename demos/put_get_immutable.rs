use std::time::{Duration, Instant};

use dht_bridge::{Dht, Item};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Value to store on the DHT
    value: String,
    /// Seconds to wait for the lookup
    #[arg(short, long, default_value_t = 2)]
    timeout: u64,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let cli = Cli::parse();

    let dht = Dht::local();

    let item = Item::bytes(cli.value.as_bytes());

    println!("\nStoring immutable data: {} ...\n", cli.value);

    let target = dht.put_immutable(&item).expect("put immutable failed");

    println!("Stored immutable data as {}", target);

    let start = Instant::now();

    match dht
        .get_immutable(target, Duration::from_secs(cli.timeout))
        .expect("get immutable failed")
    {
        Some(item) => println!(
            "Got immutable data: {:?} in {:?} seconds",
            item,
            start.elapsed().as_secs_f32()
        ),
        None => println!(
            "Found nothing in {:?} seconds",
            start.elapsed().as_secs_f32()
        ),
    }
}

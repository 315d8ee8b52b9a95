use std::time::{Duration, Instant, SystemTime};

use dht_bridge::{Dht, Item, KeyPair, MutableItem};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Value to store on the DHT
    value: String,
    /// Optional salt, to store more than one item under the same key
    #[arg(short, long)]
    salt: Option<String>,
    /// Hex encoded 32 bytes seed to derive the key pair from.
    /// A random key pair is generated if missing.
    #[arg(long)]
    seed: Option<String>,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let cli = Cli::parse();

    let keypair = match cli.seed {
        Some(seed) => KeyPair::from_seed(&from_hex(&seed)),
        None => KeyPair::generate(),
    };
    let salt = cli.salt.as_deref().map(str::as_bytes);

    let dht = Dht::local();

    println!(
        "\nStoring mutable data: \"{}\" for public_key: {} ...\n",
        cli.value,
        to_hex(keypair.public_key())
    );

    let seq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("time drift")
        .as_micros() as i64;

    let item = MutableItem::new(&keypair, Item::bytes(cli.value.as_bytes()), seq, salt)
        .expect("invalid mutable item");

    let target = dht.put_mutable(&item).expect("put mutable failed");

    println!("Stored mutable data as {} with seq {}", target, seq);

    let start = Instant::now();

    match dht
        .get_mutable(keypair.public_key(), salt, Duration::from_secs(2))
        .expect("get mutable failed")
    {
        Some(item) => println!(
            "Got mutable data: {:?} seq {} in {:?} seconds",
            item.value(),
            item.seq(),
            start.elapsed().as_secs_f32()
        ),
        None => println!(
            "Found nothing in {:?} seconds",
            start.elapsed().as_secs_f32()
        ),
    }
}

fn from_hex(s: &str) -> [u8; 32] {
    if s.len() != 64 {
        panic!("Seed should be 64 hex characters");
    }

    let mut bytes = [0; 32];

    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..(i * 2) + 2], 16).expect("Invalid hex character");
    }

    bytes
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

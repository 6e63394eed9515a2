// `spike-server secret`: generate a random value for SPIKE_SECRET.

use colored::Colorize;
use rand::RngCore;

pub fn run() -> anyhow::Result<()> {
    let secret = generate_secret();

    println!();
    println!("Add the following to your environment:");
    println!();
    println!("{}", "# Session token signing secret".dimmed());
    println!("{}", format!("SPIKE_SECRET={secret}").green());
    println!();

    Ok(())
}

/// 32 random bytes, hex encoded.
fn generate_secret() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

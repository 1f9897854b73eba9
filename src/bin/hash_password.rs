use std::io::{self, Write};
use std::process;

use clap::Parser;

use wpsync_server::auth::PasswordGate;

/// Emit the Argon2 hash to configure as `WPSYNC_PASSWORD_HASH`.
#[derive(Parser, Debug)]
#[command(name = "hash-password", about = "Hash the shared endpoint password")]
struct Args {
    /// Plaintext password to hash.
    #[arg(long)]
    password: String,
}

fn fail(message: String) -> ! {
    let _ = writeln!(io::stderr(), "error: {message}");
    process::exit(1);
}

fn main() {
    let args = Args::parse();

    let gate = match PasswordGate::new() {
        Ok(gate) => gate,
        Err(err) => fail(format!("argon2 init failed: {err}")),
    };

    match gate.hash(&args.password) {
        Ok(hash) => println!("{hash}"),
        Err(err) => fail(format!("hashing failed: {err}")),
    }
}

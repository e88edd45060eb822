//! Password hashing utility for Warden
//!
//! Generates Argon2id hashes for seeding principals (for example the
//! `BOOTSTRAP_ADMIN_PASSWORD_HASH` setting) without storing plaintext anywhere.
//! Uses the same `PASSWORD_HASH_*` work factor as the server.
//!
//! Usage:
//!   cargo run --bin hash-password
//!   cargo run --bin hash-password "MySecurePassword123!"

use anyhow::{bail, Context};
use std::env;
use std::io::{self, Write};
use warden_api::{
    auth::password::{hash_password, validate_password_strength},
    Config,
};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let params = Config::from_env().context("Invalid configuration")?.hashing;

    let password = if let Some(pwd) = env::args().nth(1) {
        pwd
    } else {
        // Stdin keeps the password out of the process list
        print!("Enter password to hash: ");
        io::stdout().flush()?;

        let mut password = String::new();
        io::stdin().read_line(&mut password)?;
        password.trim_end_matches(['\r', '\n']).to_string()
    };

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    if let Err(e) = validate_password_strength(&password) {
        eprintln!("Warning: {e}");
    }

    let password_hash = hash_password(&password, params)?;

    println!();
    println!(
        "Argon2id (m={}, t={}, p={}):",
        params.memory_kib, params.iterations, params.parallelism
    );
    println!("{password_hash}");

    Ok(())
}

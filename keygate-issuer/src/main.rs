//! Keygate license issuer
//!
//! Admin-only tool that holds the signing secret and mints license keys.
//! Never ship this binary or its secret with the application.
//!
//! Usage:
//!   keygate-issuer keygen
//!   keygate-issuer public-key
//!   keygate-issuer generate --type trial [--bound-id DEVICE_ID]
//!   keygate-issuer list [--json]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keygate_issuer::{read_secret, write_secret, Generator, IssuerConfig};
use keygate_license::{IssuerKey, LicenseType};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keygate-issuer")]
#[command(about = "Keygate offline license key issuer")]
struct Args {
    /// Path to the issuer config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new signing secret and print its public key
    Keygen,
    /// Print the public key to embed in the application config
    PublicKey,
    /// Issue a new license key
    Generate {
        /// License type: trial, monthly or yearly
        #[arg(short = 't', long = "type")]
        license_type: LicenseType,

        /// Restrict the key to the device reporting this identifier
        #[arg(short, long)]
        bound_id: Option<String>,
    },
    /// List every key issued so far
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = match &args.config {
        Some(path) => IssuerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => IssuerConfig::default(),
    };

    match args.command {
        Command::Keygen => {
            let issuer = IssuerKey::generate();
            write_secret(&config.secret_key_path, &issuer)
                .context("Failed to write issuer secret")?;
            info!("Secret written to {}", config.secret_key_path.display());
            println!("{}", issuer.verifier().to_base64());
        }
        Command::PublicKey => {
            let issuer =
                read_secret(&config.secret_key_path).context("Failed to load issuer secret")?;
            println!("{}", issuer.verifier().to_base64());
        }
        Command::Generate {
            license_type,
            bound_id,
        } => {
            let generator = Generator::open(&config).context("Failed to open issuer")?;
            let key = generator
                .generate(license_type, bound_id.as_deref())
                .context("Failed to generate key")?;
            println!("{key}");
        }
        Command::List { json } => {
            let generator = Generator::open(&config).context("Failed to open issuer")?;
            let entries = generator.list().context("Failed to read registry")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!(
                        "{}  {:<8}  {:<15}  {}",
                        entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.license_type.map(|t| t.as_str()).unwrap_or("-"),
                        format!("{:?}", entry.outcome),
                        entry.key
                    );
                }
            }
        }
    }

    Ok(())
}

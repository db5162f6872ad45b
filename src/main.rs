#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use skypromo::bsky::BskyClient;
use skypromo::{Config, run};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Scheduled Bluesky promo repost/like bot",
    long_about = None
)]
struct Cli {
    /// Fetch and filter only; commit no actions and leave state untouched.
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging (also settable via SKYPROMO_DEBUG).
    #[arg(short, long)]
    verbose: bool,

    /// Override the state file path from the environment.
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pin the process-level CryptoProvider so rustls does not have to
    // guess between ring and aws-lc-rs.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }

    let level = if cli.verbose || config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let client = BskyClient::login(&config.service, &config.identifier, &config.password).await?;
    info!(did = client.did(), handle = client.handle(), "✅ logged in");

    let own_did = client.did().to_string();
    run::execute(&client, &own_did, &config, cli.dry_run).await?;
    Ok(())
}

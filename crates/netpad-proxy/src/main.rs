//! `netpad-proxy` binary entrypoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netpad_proxy::config::mask_secret;
use netpad_proxy::{
    serve, CredentialKey, CredentialStore, FileCredentialStore, Forwarder, HttpTransport,
    ProxyConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// Local proxy between Claude Code and a NetPad server
#[derive(Parser, Debug)]
#[command(name = "netpad-proxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the proxy (default)
    Serve {
        /// Port to listen on (overrides PORT and the stored port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage stored NetPad credentials
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show stored values (API key masked)
    Show,
    /// Set a value: netpadUrl, apiKey or port
    Set { key: String, value: String },
    /// Remove all stored values
    Clear,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to proxy-friendly info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = FileCredentialStore::at_default_location()
        .context("failed to locate the netpad-proxy config file")?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => run_serve(store, port).await,
        Commands::Config { command } => run_config(&store, command),
    }
}

async fn run_serve(store: FileCredentialStore, port: Option<u16>) -> Result<()> {
    let mut config = ProxyConfig::from_store(&store)?;
    if let Some(port) = port {
        config.port = port;
    }

    if store.target()?.is_none() {
        tracing::warn!(
            path = %store.path().display(),
            "no NetPad API key configured; run `netpad-proxy config set apiKey <key>`"
        );
    }

    let transport = HttpTransport::new(Duration::from_secs(config.request_timeout_secs))
        .context("failed to build HTTP client")?;
    let forwarder = Forwarder::new(Arc::new(store), Arc::new(transport));
    serve(config, forwarder).await
}

fn run_config(store: &FileCredentialStore, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            println!("config file: {}", store.path().display());
            for key in CredentialKey::ALL {
                let value = match (key, store.get(key)?) {
                    (_, None) => "(not set)".to_string(),
                    (CredentialKey::ApiKey, Some(v)) => mask_secret(&v),
                    (_, Some(v)) => v,
                };
                println!("{}: {}", key, value);
            }
        }
        ConfigCommands::Set { key, value } => {
            let key: CredentialKey = key.parse()?;
            store.set(key, &value)?;
            println!("{} saved to {}", key, store.path().display());
        }
        ConfigCommands::Clear => {
            store.clear()?;
            println!("cleared {}", store.path().display());
        }
    }
    Ok(())
}

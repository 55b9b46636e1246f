use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use bazaar_node::{config, logging, node};
use bazaar_types::NodeAddress;
use config::NodeConfig;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(about = "Bazaar - P2P escrow trading node", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a seed node for other peers to bootstrap from
    Seed {
        /// Address to listen on as HOSTNAME:PORT; port chosen
        /// automatically when omitted
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run a peer bootstrapping from a seed node
    Peer {
        /// Seed node address as HOSTNAME:PORT
        #[arg(short, long)]
        seed: String,
    },

    /// Write a default configuration file
    Init {
        /// Output directory for the configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Generate a new key ring
    Keygen {
        /// Output file for the signing key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        NodeConfig::from_file(path)?
    } else if Path::new("./bazaar-config.toml").exists() {
        NodeConfig::from_file(Path::new("./bazaar-config.toml"))?
    } else {
        NodeConfig::default()
    };
    config.apply_env_overrides();

    logging::init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Seed { listen } => {
            let listen_addr: NodeAddress = listen
                .as_deref()
                .unwrap_or("localhost:0")
                .parse()
                .context("invalid listen address")?;
            if let Err(e) = node::run_seed(config, listen_addr).await {
                logging::test_log("SETUP_FAILED");
                return Err(e);
            }
            Ok(())
        }

        Commands::Peer { seed } => {
            let seed_addr: NodeAddress = seed.parse().context("invalid seed address")?;
            if let Err(e) = node::run_peer(config, seed_addr).await {
                logging::test_log("SETUP_FAILED");
                return Err(e);
            }
            Ok(())
        }

        Commands::Init { output } => {
            std::fs::create_dir_all(&output)?;
            let config_path = output.join("bazaar-config.toml");
            NodeConfig::default().save_to_file(&config_path)?;
            info!(path = ?config_path, "Configuration saved");
            Ok(())
        }

        Commands::Keygen { output } => {
            let key_ring = bazaar_crypto::KeyRing::generate();
            if let Some(path) = output {
                std::fs::write(&path, key_ring.signing.to_bytes())?;
                info!(path = ?path, "Signing key saved");
            }
            println!(
                "Signing public key:    {}",
                key_ring.pub_key_ring().signing_pub_key
            );
            println!(
                "Encryption public key: {}",
                key_ring.pub_key_ring().encryption_pub_key.to_hex()
            );
            Ok(())
        }
    }
}

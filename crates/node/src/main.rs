//! # L2 Core Node
//!
//! Main entry point for the L2 Core ledger node.
//!
//! This binary provides:
//! - Node operation (block cycle, persistence)
//! - Local chain initialization with genesis validators
//! - Encrypted keystore management and offline transaction signing

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use l2core::{Node, DEFAULT_CONFIG_FILE, DEFAULT_KEYSTORE_DIR};
use l2core_config::{Config, GenesisAccount, GenesisValidator};
use l2core_core::{MockPublicChain, PublicChainClient};
use l2core_crypto::{Keystore, PrivateKey};
use l2core_types::{AccountId, Amount, RawTransaction, Transaction, TxKind, ValidatorId};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

/// Default environment variable holding the keystore passphrase
const PASSPHRASE_ENV: &str = "L2CORE_PASSPHRASE";

/// L2 Core node and tools
#[derive(Parser, Debug)]
#[command(name = "l2core")]
#[command(author = "L2 Core Team")]
#[command(version)]
#[command(about = "L2 Core node - stake-weighted permissioned ledger")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: text, json, or compact (start defaults to [logging] format)
    #[arg(long)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
    Compact,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the node
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Data directory (overrides config file)
        #[arg(short, long)]
        data_dir: Option<String>,
    },

    /// Initialize a local chain: validator keystores and a config with genesis
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Number of genesis validators
        #[arg(long, default_value = "1")]
        validators: u32,

        /// Genesis balance of each validator owner
        #[arg(long, default_value = "1000000")]
        balance: String,

        /// Self-stake bonded by each genesis validator
        #[arg(long, default_value = "10000")]
        stake: String,

        /// Environment variable holding the keystore passphrase
        #[arg(long, default_value = PASSPHRASE_ENV)]
        passphrase_env: String,
    },

    /// Key management commands
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    /// Transaction commands
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },

    /// Show version information
    Version,
}

#[derive(clap::Subcommand, Debug)]
enum KeysCommands {
    /// Generate a new key into an encrypted keystore
    Generate {
        /// Output file path (default: <keystore>/<account>.json)
        #[arg(short, long)]
        output: Option<String>,

        /// Keystore directory
        #[arg(long, default_value = DEFAULT_KEYSTORE_DIR)]
        keystore: String,

        /// Environment variable holding the keystore passphrase
        #[arg(long, default_value = PASSPHRASE_ENV)]
        passphrase_env: String,
    },

    /// Show the account and public key of a keystore
    Show {
        /// Keystore file
        path: String,

        /// Environment variable holding the keystore passphrase
        #[arg(long, default_value = PASSPHRASE_ENV)]
        passphrase_env: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum TxCommands {
    /// Sign a transaction offline and print it as JSON for submission
    Sign {
        /// Keystore file of the sender
        #[arg(long)]
        key: String,

        /// transfer, delegate or register_validator
        #[arg(long)]
        kind: String,

        /// Recipient account (transfer) or validator id
        #[arg(long)]
        to: String,

        /// Amount in the smallest unit
        #[arg(long)]
        amount: String,

        /// Unix milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<u64>,

        /// Environment variable holding the keystore passphrase
        #[arg(long, default_value = PASSPHRASE_ENV)]
        passphrase_env: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = cli.verbose;
    let log_format = cli.log_format;
    let default_tracing = || init_tracing(verbose, log_format.unwrap_or(LogFormat::Text), "info");

    match cli.command {
        Commands::Start { config, data_dir } => {
            let mut config = Config::load(Path::new(&config))
                .with_context(|| format!("loading {}", config))?;
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            let format = match log_format {
                Some(format) => format,
                None => LogFormat::from_str(&config.logging.format, true)
                    .map_err(|e| anyhow!("invalid log format: {}", e))?,
            };
            init_tracing(verbose, format, &config.logging.level);
            handle_start(config).await
        }
        Commands::Init {
            output,
            validators,
            balance,
            stake,
            passphrase_env,
        } => {
            default_tracing();
            handle_init(&output, validators, &balance, &stake, &passphrase_env)
        }
        Commands::Keys { command } => {
            default_tracing();
            handle_keys(command)
        }
        Commands::Tx { command } => {
            default_tracing();
            handle_tx(command)
        }
        Commands::Version => handle_version(),
    }
}

fn init_tracing(verbose: u8, format: LogFormat, level: &str) {
    let filter = match verbose {
        0 => format!("{level},l2core={level}"),
        1 => "info,l2core=debug".to_string(),
        2 => "debug,l2core=debug".to_string(),
        _ => "trace,l2core=trace".to_string(),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(env_filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(env_filter)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(fmt::layer().compact())
                .with(env_filter)
                .init();
        }
    }
}

async fn handle_start(config: Config) -> Result<()> {
    info!(version = l2core::VERSION, "Starting L2 Core");

    warn!(
        endpoint = %config.chain_client.endpoint,
        "public chain calls are served by the in-memory client"
    );
    let chain: Arc<dyn PublicChainClient> = Arc::new(MockPublicChain::new());

    let node = Node::new(config, chain)?;
    node.run().await?;
    Ok(())
}

fn handle_init(
    output: &str,
    validators: u32,
    balance: &str,
    stake: &str,
    passphrase_env: &str,
) -> Result<()> {
    if validators == 0 {
        bail!("at least one genesis validator is required");
    }
    let passphrase = read_passphrase(passphrase_env)?;
    let output = PathBuf::from(output);
    let keystore_dir = output.join("keystore");
    std::fs::create_dir_all(&keystore_dir)?;

    let mut config = Config::default();
    config.storage.data_dir = output.join("data").to_string_lossy().into_owned();

    for i in 0..validators {
        let key = PrivateKey::random();
        let account = key.account_id();
        let path = keystore_dir.join(format!("validator_{}.json", i));
        Keystore::encrypt(&key, passphrase.as_bytes())?.save(&path)?;
        info!(key = %path.display(), account = %account, "Generated validator key {}", i);

        config.genesis.accounts.push(GenesisAccount {
            address: account.to_hex(),
            balance: balance.to_string(),
        });
        config.genesis.validators.push(GenesisValidator {
            id: format!("validator-{}", i),
            owner: account.to_hex(),
            self_stake: stake.to_string(),
        });
        if i == 0 {
            config.registry.admins.push(account.to_hex());
        }
    }

    config.validate()?;
    let config_path = output.join(DEFAULT_CONFIG_FILE);
    config.save(&config_path)?;
    info!(path = %config_path.display(), "Wrote configuration");

    println!("Chain initialized successfully!");
    println!("  Config: {}", config_path.display());
    println!("  Keystores: {}", keystore_dir.display());
    println!("  Validators: {}", validators);
    println!("  Admin: {}", config.registry.admins[0]);

    Ok(())
}

fn handle_keys(command: KeysCommands) -> Result<()> {
    match command {
        KeysCommands::Generate {
            output,
            keystore,
            passphrase_env,
        } => {
            let passphrase = read_passphrase(&passphrase_env)?;
            let key = PrivateKey::random();
            let account = key.account_id();
            let path = match output {
                Some(path) => PathBuf::from(path),
                None => {
                    std::fs::create_dir_all(&keystore)?;
                    Path::new(&keystore).join(format!("{}.json", account.to_hex()))
                }
            };
            Keystore::encrypt(&key, passphrase.as_bytes())?.save(&path)?;

            println!("Account:    {}", account);
            println!("Public key: {}", key.public_key().to_hex_compressed());
            println!("Keystore:   {}", path.display());
            Ok(())
        }
        KeysCommands::Show {
            path,
            passphrase_env,
        } => {
            let keystore = Keystore::load(&path)?;
            println!("Account:    {}", keystore.account);
            match std::env::var(&passphrase_env) {
                Ok(passphrase) => {
                    let passphrase = Zeroizing::new(passphrase);
                    let key = keystore.decrypt(passphrase.as_bytes())?;
                    println!("Public key: {}", key.public_key().to_hex_compressed());
                }
                Err(_) => warn!(env = %passphrase_env, "passphrase not set, public key not shown"),
            }
            Ok(())
        }
    }
}

fn handle_tx(command: TxCommands) -> Result<()> {
    match command {
        TxCommands::Sign {
            key,
            kind,
            to,
            amount,
            timestamp,
            passphrase_env,
        } => {
            let passphrase = read_passphrase(&passphrase_env)?;
            let key = Keystore::load(&key)?.decrypt(passphrase.as_bytes())?;
            let sender = key.account_id();
            let amount: Amount = amount
                .parse()
                .map_err(|_| anyhow!("invalid amount: {}", amount))?;
            let timestamp = timestamp.unwrap_or_else(unix_millis);

            let tx = match kind.parse::<TxKind>()? {
                TxKind::Transfer => {
                    Transaction::transfer(sender, to.parse::<AccountId>()?, amount, timestamp)
                }
                TxKind::Delegate => {
                    Transaction::delegate(sender, ValidatorId::new(to)?, amount, timestamp)
                }
                TxKind::RegisterValidator => {
                    Transaction::register_validator(sender, ValidatorId::new(to)?, amount, timestamp)
                }
            };
            let signed = key.sign_transaction(tx)?;
            let raw = RawTransaction::from(&signed);

            println!("{}", serde_json::to_string_pretty(&raw)?);
            info!(tx_hash = %signed.hash(), "transaction signed");
            Ok(())
        }
    }
}

fn handle_version() -> Result<()> {
    println!("l2core {}", l2core::VERSION);
    Ok(())
}

fn read_passphrase(env: &str) -> Result<Zeroizing<String>> {
    let passphrase = std::env::var(env)
        .map(Zeroizing::new)
        .map_err(|_| anyhow!("set {} to the keystore passphrase", env))?;
    if passphrase.is_empty() {
        bail!("{} is empty", env);
    }
    Ok(passphrase)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

//! Solana transaction pipeline CLI
//!
//! - `keygen`: new Ed25519 identity, printed as address plus 64-byte JSON array
//! - `enroll --step initialize|submit`: enrollment program flow over PDAs
//! - `transfer`: SPL token transfer between associated token accounts
//!
//! `--dry-run` swaps the RPC transport for the in-memory loopback ledger.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tx_pipeline::config::Config;
use tx_pipeline::metrics::metrics;
use tx_pipeline::programs::token;
use tx_pipeline::rpc_manager::{LedgerTransport, LoopbackLedger, RpcTransport};
use tx_pipeline::tx_builder::{keygen, MessageVersion};
use tx_pipeline::wallet::WalletManager;
use tx_pipeline::{Pipeline, SubmissionResult, TransactionPlan};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "PIPELINE_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Run against the in-memory ledger instead of the configured cluster
    #[arg(long)]
    dry_run: bool,

    /// Print Prometheus metrics after the command finishes
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new keypair
    Keygen {
        /// Also write the JSON array to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Print the secret as base58 instead of a JSON array
        #[arg(long)]
        base58: bool,
    },

    /// Run one step of the enrollment program
    Enroll {
        #[arg(long, value_enum)]
        step: EnrollStep,

        /// Overrides `enrollment.github`
        #[arg(long)]
        github: Option<String>,
    },

    /// Transfer SPL tokens to the configured recipient
    Transfer {
        /// Overrides `transfer.amount` (base units)
        #[arg(long)]
        amount: Option<u64>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EnrollStep {
    Initialize,
    Submit,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.json_logs) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(2);
    }

    let print_metrics = args.print_metrics;
    let result = run(args).await;

    if print_metrics {
        print!("{}", metrics().encode_text());
    }

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Configuration, wallet and pipeline shared by the network commands
struct Session {
    config: Config,
    wallet: WalletManager,
    pipeline: Pipeline,
}

impl Session {
    fn open(config_path: &str, dry_run: bool) -> Result<Self> {
        let config = load_config(config_path)?;
        config.validate().context("Invalid configuration")?;

        info!("Loading wallet from: {}", config.wallet.keypair_path);
        let wallet = WalletManager::from_file(&config.wallet.keypair_path)
            .context("Failed to load wallet")?;
        info!(address = %wallet.pubkey(), "Wallet loaded");

        let transport: Arc<dyn LedgerTransport> = if dry_run {
            warn!("Dry run: submitting to the in-memory ledger");
            Arc::new(LoopbackLedger::new())
        } else {
            Arc::new(RpcTransport::new(
                config.network.rpc_url.clone(),
                config.network.ws_url.clone(),
                config.network.commitment,
            ))
        };
        info!(endpoint = transport.endpoint(), "Transport ready");
        let pipeline = Pipeline::new(transport, config.submit_options());

        Ok(Self {
            config,
            wallet,
            pipeline,
        })
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let (session, outcome) = match args.command {
        Command::Keygen { output, base58 } => return run_keygen(output.as_deref(), base58),
        Command::Enroll { step, github } => {
            let session = Session::open(&args.config, args.dry_run)?;
            let github = github.unwrap_or_else(|| session.config.enrollment.github.clone());
            let outcome = run_enroll(&session, step, &github).await?;
            (session, outcome)
        }
        Command::Transfer { amount } => {
            let session = Session::open(&args.config, args.dry_run)?;
            let amount = amount.unwrap_or(session.config.transfer.amount);
            let outcome = run_transfer(&session, amount).await?;
            (session, outcome)
        }
    };

    let signature = outcome.into_result()?;
    println!("Success! Check out your TX here:");
    println!("{}", session.config.explorer_url(&signature));
    Ok(())
}

fn run_keygen(output: Option<&str>, base58: bool) -> Result<()> {
    let material = keygen::generate().context("Failed to generate key material")?;
    println!("You've generated a new Solana wallet: {}", material.address());

    if let Some(path) = output {
        WalletManager::write_json(&material, path)?;
        println!("Keypair written to {}", path);
    } else if base58 {
        println!("{}", WalletManager::to_base58(&material));
    } else {
        let bytes = material.to_keypair_bytes();
        println!("{}", serde_json::to_string(&bytes.to_vec())?);
    }
    Ok(())
}

async fn run_enroll(session: &Session, step: EnrollStep, github: &str) -> Result<SubmissionResult> {
    let Session {
        config,
        wallet,
        pipeline,
    } = session;
    let program = config.enrollment_program()?;
    let user = wallet.pubkey();
    let account = program.enrollment_account(&user)?;
    info!(account = %account.address, bump = account.bump, "Enrollment account derived");

    match step {
        EnrollStep::Initialize => {
            if github.is_empty() {
                anyhow::bail!("A github handle is required for initialize (enrollment.github or --github)");
            }
            let plan = TransactionPlan::new("enroll-initialize", wallet.keypair())
                .with_version(MessageVersion::v0())
                .with_instruction(program.initialize(github, &user)?);
            Ok(pipeline.run(&plan).await?)
        }
        EnrollStep::Submit => {
            let mint = keygen::generate()?.to_signer()?;
            info!(mint = %mint.pubkey(), "Generated mint keypair");
            let plan = TransactionPlan::new("enroll-submit", wallet.keypair())
                .with_version(MessageVersion::v0())
                .with_instruction(program.submit_ts(&user, &mint.pubkey())?)
                .with_signer(&mint);
            Ok(pipeline.run(&plan).await?)
        }
    }
}

async fn run_transfer(session: &Session, amount: u64) -> Result<SubmissionResult> {
    let Session {
        config,
        wallet,
        pipeline,
    } = session;
    let (mint, recipient) = config.transfer_accounts()?;
    info!(%mint, %recipient, amount, "Transferring tokens");

    let plan = TransactionPlan::new("transfer", wallet.keypair())
        .with_instructions(token::transfer_plan(&wallet.pubkey(), &mint, &recipient, amount)?);
    Ok(pipeline.run(&plan).await?)
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "tx_pipeline=debug,info"
    } else {
        "tx_pipeline=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }
    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Ok(Config::from_env())
    }
}

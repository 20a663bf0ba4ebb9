mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliContext;
use flip_core::CoreError;
use flip_game::WagerError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coinflip")]
#[command(about = "Coin-flip wagers settled on a Solana-style ledger")]
#[command(version)]
struct Cli {
    /// Data directory for wallets and the payout queue
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management commands
    #[command(subcommand)]
    Wallet(commands::WalletCommands),

    /// Stake on heads or tails
    Flip(commands::FlipArgs),

    /// Show the stake menu and which entries the wallet can afford
    Menu {
        /// Wallet name
        wallet: String,
        /// Use an in-process ledger with demo funds
        #[arg(long)]
        offline: bool,
    },

    /// Inspect queued and submitted payouts
    #[command(subcommand)]
    Payouts(commands::PayoutCommands),

    /// Run the settlement service that holds the platform key
    Serve {
        /// Address to listen on
        #[arg(long, default_value = flip_game::service::DEFAULT_BIND)]
        bind: String,
        /// Leave payout retries to a separate 'coinflip worker'
        #[arg(long)]
        no_worker: bool,
    },

    /// Retry and confirm queued payouts until interrupted
    Worker {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "coinflip={},flip_core={},flip_game={},tower_http={}",
            log_level, log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(config::default_data_dir);
    let ctx = CliContext::open(data_dir).await?;

    let result = match cli.command {
        Commands::Wallet(cmd) => commands::handle_wallet_command(cmd, &ctx).await,
        Commands::Flip(args) => commands::handle_flip_command(args, &ctx).await,
        Commands::Menu { wallet, offline } => {
            commands::handle_menu_command(&wallet, offline, &ctx).await
        }
        Commands::Payouts(cmd) => commands::handle_payouts_command(cmd, &ctx).await,
        Commands::Serve { bind, no_worker } => {
            commands::handle_serve_command(bind, no_worker, &ctx).await
        }
        Commands::Worker { once } => commands::handle_worker_command(once, &ctx).await,
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn report_error(e: &anyhow::Error) {
    let core = e
        .downcast_ref::<CoreError>()
        .or_else(|| match e.downcast_ref::<WagerError>() {
            Some(WagerError::Core(core)) => Some(core),
            _ => None,
        });

    match core {
        Some(CoreError::WalletNotFound { name }) => {
            eprintln!("Error: Wallet '{}' not found", name);
            eprintln!("Use 'coinflip wallet list' to see available wallets");
        }
        Some(CoreError::InsufficientFunds { need, available }) => {
            eprintln!("Error: Insufficient funds");
            eprintln!("Need: {} lamports, Available: {} lamports", need, available);
        }
        Some(CoreError::Config(msg)) => {
            eprintln!("Configuration error: {}", msg);
        }
        _ => {
            eprintln!("Error: {:#}", e);
        }
    }
}

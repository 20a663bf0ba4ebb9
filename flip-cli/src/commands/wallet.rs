use super::{prompt_new_password, prompt_password};
use crate::config::CliContext;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Password;
use flip_core::{LocalWallet, WalletManager};
use std::sync::Arc;

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet with a fresh key
    Create {
        /// Wallet name
        name: String,
    },
    /// Import a wallet from a secret key
    Import {
        /// Wallet name
        name: String,
        /// Base58 secret key or JSON byte array (will prompt if not provided)
        #[arg(short, long)]
        secret: Option<String>,
    },
    /// List all wallets
    List,
    /// Show the wallet's public address
    Address {
        /// Wallet name
        name: String,
    },
    /// Fetch the wallet's balance from the ledger
    Balance {
        /// Wallet name
        name: String,
    },
}

pub async fn handle_wallet_command(cmd: WalletCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let network = ctx.network()?;
    let ledger = ctx.rpc_ledger(&network)?;
    let manager = ctx.wallet_manager(network.cluster, ledger.clone());

    match cmd {
        WalletCommands::Create { name } => {
            let password = prompt_new_password()?;

            println!("Creating wallet '{}'...", name);
            let wallet = manager.create_wallet(&name, &password).await?;

            println!("Wallet created successfully!");
            println!();
            println!("Wallet Details:");
            println!("  Name: {}", wallet.name());
            println!("  ID: {}", wallet.id());
            println!("  Cluster: {:?}", wallet.cluster());
            println!("  Address: {}", wallet.pubkey());
            println!();
            println!(
                "The key is stored encrypted in {}. Fund the address before flipping.",
                ctx.data_dir().display()
            );
        }

        WalletCommands::Import { name, secret } => {
            let secret = match secret {
                Some(s) => s,
                None => Password::new().with_prompt("Enter secret key").interact()?,
            };
            let password = prompt_new_password()?;

            println!("Importing wallet '{}'...", name);
            let wallet = manager.import_wallet(&name, &secret, &password).await?;

            println!("Wallet imported successfully!");
            println!("  Name: {}", wallet.name());
            println!("  ID: {}", wallet.id());
            println!("  Address: {}", wallet.pubkey());
        }

        WalletCommands::List => {
            let wallets = manager.list_wallets().await?;

            if wallets.is_empty() {
                println!("No wallets found.");
                println!("Create a new wallet with: coinflip wallet create <name>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Address", "Cluster", "Created"]);

            for wallet in wallets {
                table.add_row(vec![
                    wallet.name,
                    wallet.pubkey.to_string(),
                    format!("{:?}", wallet.cluster),
                    wallet.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }

            println!("{}", table);
        }

        WalletCommands::Address { name } => {
            let info = manager.wallet_info(&name).await?;
            println!("{}", info.pubkey);
        }

        WalletCommands::Balance { name } => {
            let info = manager.wallet_info(&name).await?;
            let balance = ledger.get_balance(&info.pubkey).await?;

            println!("Balance for wallet '{}':", info.name);
            println!("  {} SOL ({} lamports)", balance, balance.to_lamports());
        }
    }

    Ok(())
}

/// Unlock a stored wallet, prompting for its password
pub(crate) async fn unlock(
    manager: &WalletManager,
    name: &str,
) -> anyhow::Result<Arc<LocalWallet>> {
    // Fail on an unknown name before asking for a password
    manager.wallet_info(name).await?;
    let password = prompt_password(name)?;
    Ok(manager.load_wallet(name, &password).await?)
}

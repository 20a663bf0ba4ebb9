use crate::config::CliContext;
use anyhow::Context;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use flip_core::storage::PayoutStore;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum PayoutCommands {
    /// Show recent payouts, newest first
    List {
        /// Number of payouts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one payout in detail
    Status {
        /// Payout ID
        id: String,
        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
        /// Ask the settlement service instead of the local database
        #[arg(long)]
        remote: bool,
    },
}

pub async fn handle_payouts_command(cmd: PayoutCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let storage = ctx.storage();
    let store = PayoutStore::new(&storage);

    match cmd {
        PayoutCommands::List { limit } => {
            let payouts = store.list(limit).await?;

            if payouts.is_empty() {
                println!("No payouts recorded.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Winner", "Amount (SOL)", "Status", "Attempts", "Created"]);

            for payout in payouts {
                table.add_row(vec![
                    payout.id.to_string(),
                    payout.winner.to_string(),
                    payout.amount.to_string(),
                    payout.status.to_string(),
                    payout.attempts.to_string(),
                    payout.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
            }

            println!("{}", table);
        }

        PayoutCommands::Status { id, json, remote } => {
            let payout_id =
                Uuid::parse_str(&id).with_context(|| format!("'{}' is not a payout ID", id))?;
            let payout = if remote {
                let network = ctx.network()?;
                ctx.remote_settlement(&network)?
                    .payout_status(payout_id)
                    .await?
            } else {
                store
                    .get(&payout_id)
                    .await?
                    .ok_or(flip_game::WagerError::PayoutNotFound(payout_id))?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&payout)?);
                return Ok(());
            }

            println!("Payout {}", payout.id);
            println!("  Status: {}", payout.status);
            println!("  Winner: {}", payout.winner);
            println!("  Stake: {} SOL", payout.stake);
            println!("  Amount: {} SOL", payout.amount);
            if let Some(stake_tx) = &payout.stake_signature {
                println!("  Stake transaction: {}", stake_tx);
            }
            if let Some(signature) = &payout.payout_signature {
                println!("  Payout transaction: {}", signature);
            }
            println!("  Attempts: {}", payout.attempts);
            if let Some(error) = &payout.last_error {
                println!("  Last error: {}", error);
            }
            if !payout.status.is_terminal() {
                println!(
                    "  Next attempt: {}",
                    payout.next_attempt_at.format("%Y-%m-%d %H:%M:%S")
                );
                println!("  The payout worker of 'coinflip serve' or 'coinflip worker' retries it");
            }
        }
    }

    Ok(())
}

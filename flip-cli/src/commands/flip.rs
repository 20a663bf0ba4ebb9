use super::wallet::unlock;
use crate::config::CliContext;
use anyhow::Context;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use flip_core::storage::Storage;
use flip_core::{Amount, Cluster, Keypair, Ledger, LocalWallet, MemoryLedger, LAMPORTS_PER_SOL};
use flip_game::{
    stake_options, CommittedCoin, LocalCoin, OutcomeSource, RoundOracle, Settlement,
    SettlementAuthority, SettlementConfig, Side, SigningContext, Stake, SubmitterConfig,
    WagerPhase, WagerReport, WagerResult, WagerSubmitter,
};
use std::sync::Arc;

/// Demo funds credited to both sides in `--offline` mode
const OFFLINE_PLAYER_FUNDS: Amount = Amount::from_lamports(5 * LAMPORTS_PER_SOL);
const OFFLINE_PLATFORM_FUNDS: Amount = Amount::from_lamports(50 * LAMPORTS_PER_SOL);

#[derive(Args)]
pub struct FlipArgs {
    /// Wallet name
    pub wallet: String,
    /// Stake in SOL, one of the menu amounts
    pub stake: String,
    /// heads or tails
    pub side: String,
    /// Use an in-process ledger with demo funds
    #[arg(long)]
    pub offline: bool,
    /// Use a commit-reveal round instead of a local coin
    #[arg(long)]
    pub committed: bool,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Everything a wager needs, wired for one network mode
struct Session {
    wallet: Arc<LocalWallet>,
    ledger: Arc<dyn Ledger>,
    settlement: Arc<dyn Settlement>,
    oracle: Arc<dyn RoundOracle>,
    config: SubmitterConfig,
    online: bool,
}

async fn online_session(ctx: &CliContext, wallet_name: &str) -> anyhow::Result<Session> {
    let network = ctx.network()?;
    let ledger = ctx.rpc_ledger(&network)?;
    let manager = ctx.wallet_manager(network.cluster, ledger.clone());
    let wallet = unlock(&manager, wallet_name).await?;

    let config = SubmitterConfig::from_network(&network)?;
    let remote = ctx.remote_settlement(&network)?;

    // the stake must go where the service pays from
    let platform = remote
        .platform_address()
        .await
        .with_context(|| format!("reaching the settlement service at {}", remote.base_url()))?;
    if platform != config.platform {
        anyhow::bail!(
            "settlement service at {} pays from {}, but the platform wallet is {}",
            remote.base_url(),
            platform,
            config.platform
        );
    }

    Ok(Session {
        wallet,
        ledger,
        settlement: remote.clone(),
        oracle: remote,
        config,
        online: true,
    })
}

async fn offline_session(ctx: &CliContext, wallet_name: &str) -> anyhow::Result<Session> {
    let ledger = Arc::new(MemoryLedger::new());
    let manager = ctx.wallet_manager(Cluster::Localnet, ledger.clone());
    let wallet = unlock(&manager, wallet_name).await?;

    let signer = SigningContext::new(Keypair::generate());
    ledger.set_balance(wallet.pubkey(), OFFLINE_PLAYER_FUNDS);
    ledger.set_balance(signer.address(), OFFLINE_PLATFORM_FUNDS);

    // payouts from a throwaway platform never touch the real queue
    let storage = Arc::new(Storage::in_memory().await?);
    let authority =
        SettlementAuthority::new(signer, ledger.clone(), storage, SettlementConfig::default())?;
    let config = SubmitterConfig::new(authority.platform_address());

    tracing::info!(
        "Offline mode: {} SOL credited to '{}', platform {} holds {} SOL",
        OFFLINE_PLAYER_FUNDS,
        wallet.name(),
        authority.platform_address(),
        OFFLINE_PLATFORM_FUNDS
    );

    let authority = Arc::new(authority);
    Ok(Session {
        wallet,
        ledger,
        settlement: authority.clone(),
        oracle: authority,
        config,
        online: false,
    })
}

pub async fn handle_flip_command(args: FlipArgs, ctx: &CliContext) -> anyhow::Result<()> {
    let stake: Stake = args.stake.parse()?;
    let side: Side = args.side.parse()?;

    let session = if args.offline {
        offline_session(ctx, &args.wallet).await?
    } else {
        online_session(ctx, &args.wallet).await?
    };

    let outcomes: Arc<dyn OutcomeSource> = if args.committed {
        Arc::new(CommittedCoin::new(session.oracle.clone()))
    } else {
        Arc::new(LocalCoin)
    };

    let submitter = WagerSubmitter::new(
        session.wallet.clone(),
        session.ledger.clone(),
        session.settlement.clone(),
        outcomes,
        session.config,
    );

    let balance = submitter.refresh_balance().await?;
    println!(
        "Wallet '{}' ({}) holds {} SOL",
        session.wallet.name(),
        session.wallet.pubkey(),
        balance
    );

    submitter.select_stake(stake)?;
    submitter.select_prediction(side)?;

    if !args.yes {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Stake {} SOL on {}? A win pays {} SOL.",
                stake,
                side,
                stake.payout_amount()
            ))
            .default(false)
            .interact()?;

        if !confirm {
            println!("Wager cancelled.");
            return Ok(());
        }
    }

    let mut views = submitter.subscribe();
    let progress = tokio::spawn(async move {
        let mut last = WagerPhase::Idle;
        while views.changed().await.is_ok() {
            let phase = views.borrow_and_update().phase;
            if phase != last && phase != WagerPhase::Idle {
                println!("  {}", describe(phase));
            }
            last = phase;
        }
    });

    let report = submitter.submit_wager().await?;
    progress.abort();

    print_report(&report, session.online);
    Ok(())
}

fn describe(phase: WagerPhase) -> &'static str {
    match phase {
        WagerPhase::Idle => "Idle",
        WagerPhase::StakeSubmitted => "Stake sent, waiting for confirmation...",
        WagerPhase::StakeConfirmed => "Stake confirmed, flipping...",
        WagerPhase::OutcomeDrawn => "Coin landed",
        WagerPhase::PayoutRequested => "Requesting payout...",
        WagerPhase::PayoutAcknowledged => "Payout submitted",
    }
}

fn print_report(report: &WagerReport, online: bool) {
    println!();
    if let Some(signature) = &report.stake_signature {
        println!("Stake transaction: {}", signature);
    }
    if let Some(outcome) = report.outcome {
        println!("You picked {}, the coin landed {}", report.prediction, outcome);
    }
    println!("{}", report.message);

    match &report.result {
        WagerResult::Won(receipt) => {
            println!("  Payout ID: {}", receipt.payout_id);
            println!("  Amount: {} SOL", receipt.amount);
            if let Some(signature) = &receipt.signature {
                println!("  Payout transaction: {}", signature);
            }
        }
        WagerResult::PayoutDelayed { payout_id } if online => {
            println!("  Track it with: coinflip payouts status --remote {}", payout_id);
        }
        _ => {}
    }
}

pub async fn handle_menu_command(
    wallet_name: &str,
    offline: bool,
    ctx: &CliContext,
) -> anyhow::Result<()> {
    let balance = if offline {
        OFFLINE_PLAYER_FUNDS
    } else {
        let network = ctx.network()?;
        let ledger = ctx.rpc_ledger(&network)?;
        let manager = ctx.wallet_manager(network.cluster, ledger.clone());
        let info = manager.wallet_info(wallet_name).await?;
        ledger.get_balance(&info.pubkey).await?
    };

    println!("Balance: {} SOL", balance);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Stake (SOL)", "Payout on win (SOL)", "Available"]);

    for option in stake_options(Some(balance), false) {
        table.add_row(vec![
            (option.stake.index() + 1).to_string(),
            option.stake.to_string(),
            option.stake.payout_amount().to_string(),
            if option.enabled { "yes" } else { "no" }.to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

use crate::config::CliContext;
use flip_game::PayoutWorker;
use std::sync::Arc;

pub async fn handle_worker_command(once: bool, ctx: &CliContext) -> anyhow::Result<()> {
    let network = ctx.network()?;
    let ledger = ctx.rpc_ledger(&network)?;
    let authority = flip_game::authority_from_env(&network, ledger, ctx.storage())?;
    let worker = PayoutWorker::new(Arc::new(authority));

    if once {
        let report = worker.run_once().await?;
        println!(
            "Confirmed: {}, requeued: {}, resubmitted: {}, failed: {}",
            report.confirmed, report.requeued, report.resubmitted, report.failed
        );
        return Ok(());
    }

    println!("Payout worker running, press Ctrl-C to stop.");
    worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    Ok(())
}

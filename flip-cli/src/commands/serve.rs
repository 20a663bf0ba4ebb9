use crate::config::CliContext;
use anyhow::Context;
use flip_game::{service, PayoutWorker};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Only this command and `worker` load the platform key
pub async fn handle_serve_command(
    bind: String,
    no_worker: bool,
    ctx: &CliContext,
) -> anyhow::Result<()> {
    let network = ctx.network()?;
    let ledger = ctx.rpc_ledger(&network)?;
    let authority = Arc::new(flip_game::authority_from_env(&network, ledger, ctx.storage())?);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding the settlement service to {}", bind))?;
    let worker = (!no_worker).then(|| PayoutWorker::new(authority.clone()));

    println!(
        "Settlement service for {} on http://{}, press Ctrl-C to stop.",
        authority.platform_address(),
        listener.local_addr()?
    );
    if worker.is_none() {
        println!("Payout worker disabled; run 'coinflip worker' to retry queued payouts.");
    }

    let (stop_tx, stop_rx) = watch::channel(false);

    let serving = async {
        let served = service::serve(listener, authority.clone(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
            }
        })
        .await;
        let _ = stop_tx.send(true);
        served
    };

    let working = async {
        match &worker {
            Some(worker) => worker.run(stopped(stop_rx)).await,
            None => Ok(()),
        }
    };

    let (served, worked) = tokio::join!(serving, working);
    served?;
    worked?;

    tracing::info!("Settlement service stopped");
    Ok(())
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

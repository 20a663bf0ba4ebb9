use flip_core::{
    Amount, Cluster, CommitmentLevel, Ledger, MemoryLedger, Pubkey, WalletManager,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create temp dir
    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    // In-process ledger, nothing leaves this machine
    let ledger = Arc::new(MemoryLedger::new());
    let manager = WalletManager::new(temp_dir.path(), Cluster::Localnet, ledger.clone()).await?;

    println!("Creating wallet...");
    let wallet = manager.create_wallet("example-wallet", "example-password").await?;

    println!("Wallet created!");
    println!("Wallet ID: {}", wallet.id());
    println!("Address: {}", wallet.pubkey());

    ledger.set_balance(wallet.pubkey(), Amount::from_sol_str("2")?);
    println!("\nBalance: {} SOL", wallet.balance().await?);

    // Send some of it away and wait for confirmation
    let recipient = Pubkey::new([42u8; 32]);
    let signature = wallet.transfer(recipient, Amount::from_sol_str("0.5")?).await?;
    println!("\nTransfer sent: {}", signature);

    ledger
        .await_confirmation(&signature, CommitmentLevel::Confirmed, Duration::from_secs(5))
        .await?;
    println!("Transfer confirmed");
    println!("Balance: {} SOL", wallet.balance().await?);

    // List wallets
    let wallets = manager.list_wallets().await?;
    println!("\nAvailable wallets: {:?}", wallets.iter().map(|w| &w.name).collect::<Vec<_>>());

    println!("\nExample completed successfully!");

    Ok(())
}

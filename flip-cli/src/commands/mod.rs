pub mod flip;
pub mod payouts;
pub mod serve;
pub mod wallet;
pub mod worker;

pub use flip::{handle_flip_command, handle_menu_command, FlipArgs};
pub use payouts::{handle_payouts_command, PayoutCommands};
pub use serve::handle_serve_command;
pub use wallet::{handle_wallet_command, WalletCommands};
pub use worker::handle_worker_command;

use dialoguer::Password;

pub(crate) fn prompt_password(wallet: &str) -> anyhow::Result<String> {
    Ok(Password::new()
        .with_prompt(format!("Password for wallet '{}'", wallet))
        .interact()?)
}

pub(crate) fn prompt_new_password() -> anyhow::Result<String> {
    Ok(Password::new()
        .with_prompt("Choose a wallet password")
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?)
}

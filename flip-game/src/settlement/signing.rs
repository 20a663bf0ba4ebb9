use crate::error::{Result, WagerError};
use flip_core::{Blockhash, Keypair, Pubkey, SignedTransfer, TransferInstruction};
use std::fmt;

pub const ENV_PLATFORM_SECRET: &str = "FLIP_PLATFORM_SECRET";

/// Owner of the platform key. Built once, handed to the authority, never cloned.
pub struct SigningContext {
    keypair: Keypair,
}

impl SigningContext {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Base58 secret or JSON byte array
    pub fn from_secret(encoded: &str) -> Result<Self> {
        Ok(Self::new(Keypair::parse_secret(encoded)?))
    }

    pub fn from_env(expected: Option<Pubkey>) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), expected)
    }

    /// Load the secret and check it controls `expected` when one is configured
    pub fn from_lookup<F>(lookup: F, expected: Option<Pubkey>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let encoded = lookup(ENV_PLATFORM_SECRET)
            .ok_or_else(|| WagerError::config(format!("{} is not set", ENV_PLATFORM_SECRET)))?;
        let context = Self::from_secret(&encoded)?;

        if let Some(expected) = expected {
            if context.address() != expected {
                return Err(WagerError::config(format!(
                    "{} controls {}, but the platform wallet is {}",
                    ENV_PLATFORM_SECRET,
                    context.address(),
                    expected
                )));
            }
        }

        Ok(context)
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub(crate) fn sign(
        &self,
        instruction: TransferInstruction,
        recent_blockhash: Blockhash,
    ) -> Result<SignedTransfer> {
        Ok(SignedTransfer::sign(instruction, recent_blockhash, &self.keypair)?)
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("address", &self.address())
            .field("secret", &"<redacted>")
            .finish()
    }
}

use crate::error::{Result, WagerError};
use flip_core::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed stake menu, in lamports: 0.1, 0.2, 0.3, 0.5, 1, 1.3, 1.5, 2 SOL
const MENU: [Amount; 8] = [
    Amount::from_lamports(100_000_000),
    Amount::from_lamports(200_000_000),
    Amount::from_lamports(300_000_000),
    Amount::from_lamports(500_000_000),
    Amount::from_lamports(1_000_000_000),
    Amount::from_lamports(1_300_000_000),
    Amount::from_lamports(1_500_000_000),
    Amount::from_lamports(2_000_000_000),
];

/// Payout is twice the stake minus a 3% house fee
const PAYOUT_NUMERATOR: u64 = 197;
const PAYOUT_DENOMINATOR: u64 = 100;

/// A wager amount. Only menu entries can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "Amount", try_from = "Amount")]
pub struct Stake(Amount);

impl Stake {
    pub fn menu() -> impl Iterator<Item = Stake> {
        MENU.into_iter().map(Stake)
    }

    pub fn from_index(index: usize) -> Option<Stake> {
        MENU.get(index).copied().map(Stake)
    }

    pub fn from_lamports(lamports: u64) -> Result<Stake> {
        Self::from_amount(Amount::from_lamports(lamports))
    }

    pub fn from_amount(amount: Amount) -> Result<Stake> {
        if MENU.contains(&amount) {
            Ok(Stake(amount))
        } else {
            Err(WagerError::input_rejected(format!(
                "{} SOL is not on the stake menu",
                amount
            )))
        }
    }

    /// "0.3", "1", "1.50"
    pub fn from_sol_str(s: &str) -> Result<Stake> {
        Self::from_amount(Amount::from_sol_str(s)?)
    }

    pub fn amount(&self) -> Amount {
        self.0
    }

    pub fn lamports(&self) -> u64 {
        self.0.to_lamports()
    }

    pub fn index(&self) -> usize {
        MENU.iter().position(|a| *a == self.0).unwrap_or_default()
    }

    /// What the settlement side transfers on a win
    pub fn payout_amount(&self) -> Amount {
        self.0.mul_ratio(PAYOUT_NUMERATOR, PAYOUT_DENOMINATOR)
    }

    /// Winnings as announced to the player
    pub fn announced_winnings(&self) -> Amount {
        self.0 + self.0
    }
}

impl fmt::Display for Stake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Stake {
    type Err = WagerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_sol_str(s)
    }
}

impl From<Stake> for Amount {
    fn from(stake: Stake) -> Amount {
        stake.0
    }
}

impl TryFrom<Amount> for Stake {
    type Error = WagerError;

    fn try_from(amount: Amount) -> Result<Self> {
        Self::from_amount(amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Heads => Side::Tails,
            Side::Tails => Side::Heads,
        }
    }

    /// 0 is heads, 1 is tails
    pub fn from_bit(bit: u8) -> Side {
        if bit & 1 == 0 {
            Side::Heads
        } else {
            Side::Tails
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Heads => "heads",
            Side::Tails => "tails",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = WagerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "heads" | "head" | "h" => Ok(Side::Heads),
            "tails" | "tail" | "t" => Ok(Side::Tails),
            other => Err(WagerError::input_rejected(format!(
                "prediction must be heads or tails, got '{}'",
                other
            ))),
        }
    }
}

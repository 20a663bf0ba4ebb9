use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Indivisible units per whole native token
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const SOL_DECIMALS: usize = 9;

/// An amount of native currency, stored in lamports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_lamports(lamports: u64) -> Self {
        Self(lamports)
    }

    pub const fn to_lamports(self) -> u64 {
        self.0
    }

    /// Parse a decimal SOL amount ("0.3", "1.25") without going through floats.
    /// Digits past the ninth decimal place are floored away.
    pub fn from_sol_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        let digits_ok = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_ok(whole) || !digits_ok(frac) {
            return Err(CoreError::config(format!("Invalid SOL amount: '{}'", s)));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| CoreError::config(format!("SOL amount out of range: '{}'", s)))?
        };

        let mut frac_digits: String = frac.chars().take(SOL_DECIMALS).collect();
        while frac_digits.len() < SOL_DECIMALS {
            frac_digits.push('0');
        }
        let frac: u64 = frac_digits
            .parse()
            .map_err(|_| CoreError::config(format!("Invalid SOL amount: '{}'", s)))?;

        whole
            .checked_mul(LAMPORTS_PER_SOL)
            .and_then(|l| l.checked_add(frac))
            .map(Self)
            .ok_or_else(|| CoreError::config(format!("SOL amount out of range: '{}'", s)))
    }

    pub fn to_sol(self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }

    /// `self * numerator / denominator`, floored
    pub fn mul_ratio(self, numerator: u64, denominator: u64) -> Self {
        let scaled = self.0 as u128 * numerator as u128 / denominator as u128;
        Self(scaled.min(u64::MAX as u128) as u64)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    /// SOL with trailing zeros trimmed: `2`, `0.6`, `1.97`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / LAMPORTS_PER_SOL;
        let frac = self.0 % LAMPORTS_PER_SOL;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let frac = format!("{:09}", frac);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

macro_rules! base58_bytes {
    ($name:ident, $len:expr, $what:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    CoreError::InvalidAddress(format!(
                        "{} must be {} bytes, got {}",
                        $what,
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                let bytes = bs58::decode(s.trim()).into_vec().map_err(|e| {
                    CoreError::InvalidAddress(format!("Invalid {} '{}': {}", $what, s, e))
                })?;
                Self::from_slice(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

base58_bytes!(Pubkey, 32, "public key");
base58_bytes!(TxSignature, 64, "transaction signature");
base58_bytes!(Blockhash, 32, "blockhash");

impl Pubkey {
    /// The native transfer program, all-zero key
    pub const SYSTEM_PROGRAM: Pubkey = Pubkey([0u8; 32]);
}

/// Durability requested when waiting on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl CommitmentLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentLevel::Processed => "processed",
            CommitmentLevel::Confirmed => "confirmed",
            CommitmentLevel::Finalized => "finalized",
        }
    }
}

impl Default for CommitmentLevel {
    fn default() -> Self {
        CommitmentLevel::Confirmed
    }
}

impl FromStr for CommitmentLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "processed" => Ok(CommitmentLevel::Processed),
            "confirmed" => Ok(CommitmentLevel::Confirmed),
            "finalized" => Ok(CommitmentLevel::Finalized),
            other => Err(CoreError::config(format!(
                "Unknown commitment level: {}",
                other
            ))),
        }
    }
}

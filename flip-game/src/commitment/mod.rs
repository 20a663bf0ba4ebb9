pub mod scheme;

pub use scheme::{CommitmentScheme, RoundCommitment, RoundReveal};

use crate::stake::Side;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SEED_SIZE: usize = 32;

/// sha256 hash commitment, hex encoded
pub struct HashCommitment;

impl CommitmentScheme for HashCommitment {
    type Secret = [u8];
    type Commitment = String;

    fn commit(secret: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hex::encode(hasher.finalize())
    }

    fn verify(commitment: &String, secret: &[u8]) -> bool {
        Self::commit(secret).eq_ignore_ascii_case(commitment)
    }
}

/// Random seed for either side of a round
pub fn generate_seed() -> Vec<u8> {
    let mut seed = vec![0u8; SEED_SIZE];
    rand::thread_rng().fill_bytes(&mut seed);
    seed
}

/// Low bit of sha256(server_seed || client_seed)
pub fn outcome_from_seeds(server_seed: &[u8], client_seed: &[u8]) -> Side {
    let mut hasher = Sha256::new();
    hasher.update(server_seed);
    hasher.update(client_seed);
    let digest = hasher.finalize();
    Side::from_bit(digest[digest.len() - 1])
}

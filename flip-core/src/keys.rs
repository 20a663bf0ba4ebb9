use crate::error::{CoreError, Result};
use crate::types::Pubkey;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use std::fmt;

/// An ed25519 keypair. `Debug` never prints the secret half.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Accepts either a 32-byte seed or the 64-byte `seed || public` layout
    /// used by ledger keygen tools. For the 64-byte form the public half must
    /// match the seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            32 => {
                let seed: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| CoreError::InvalidKey("bad seed length".to_string()))?;
                Ok(Self::from_seed(&seed))
            }
            64 => {
                let full: [u8; 64] = bytes
                    .try_into()
                    .map_err(|_| CoreError::InvalidKey("bad keypair length".to_string()))?;
                let signing = SigningKey::from_keypair_bytes(&full).map_err(|e| {
                    CoreError::InvalidKey(format!("public half does not match secret: {}", e))
                })?;
                Ok(Self { signing })
            }
            n => Err(CoreError::InvalidKey(format!(
                "secret key must be 32 or 64 bytes, got {}",
                n
            ))),
        }
    }

    pub fn from_base58_string(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| CoreError::InvalidKey(format!("secret is not base58: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    /// `[12, 250, ...]` as written to keypair files
    pub fn from_json_bytes(encoded: &str) -> Result<Self> {
        let bytes: Vec<u8> = serde_json::from_str(encoded.trim())
            .map_err(|e| CoreError::InvalidKey(format!("secret is not a JSON byte array: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    /// Decode a secret in either textual format
    pub fn parse_secret(encoded: &str) -> Result<Self> {
        if encoded.trim_start().starts_with('[') {
            Self::from_json_bytes(encoded)
        } else {
            Self::from_base58_string(encoded)
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    /// `seed || public`, the layout keygen tools write
    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing.to_keypair_bytes()
    }

    pub fn to_base58_string(&self) -> String {
        bs58::encode(self.to_keypair_bytes()).into_string()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .field("secret", &"<redacted>")
            .finish()
    }
}

pub fn verify_signature(pubkey: &Pubkey, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(pubkey.as_bytes()) else {
        return false;
    };
    key.verify(message, &Signature::from_bytes(signature)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_formats_agree() {
        let keypair = Keypair::generate();
        let full = keypair.to_keypair_bytes();

        let b58 = bs58::encode(full).into_string();
        let json = serde_json::to_string(&full.to_vec()).unwrap();

        assert_eq!(Keypair::parse_secret(&b58).unwrap().pubkey(), keypair.pubkey());
        assert_eq!(Keypair::parse_secret(&json).unwrap().pubkey(), keypair.pubkey());
        assert_eq!(
            Keypair::from_secret_bytes(&full[..32]).unwrap().pubkey(),
            keypair.pubkey()
        );
    }

    #[test]
    fn test_mismatched_public_half_rejected() {
        let a = Keypair::generate().to_keypair_bytes();
        let b = Keypair::generate().to_keypair_bytes();
        let mut spliced = [0u8; 64];
        spliced[..32].copy_from_slice(&a[..32]);
        spliced[32..].copy_from_slice(&b[32..]);

        assert!(Keypair::from_secret_bytes(&spliced).is_err());
        assert!(Keypair::from_secret_bytes(&[1u8; 10]).is_err());
    }

    #[test]
    fn test_sign_verify() {
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"flip");
        assert!(verify_signature(&keypair.pubkey(), b"flip", &sig));
        assert!(!verify_signature(&keypair.pubkey(), b"flop", &sig));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let keypair = Keypair::generate();
        let rendered = format!("{:?}", keypair);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&bs58::encode(keypair.to_keypair_bytes()).into_string()));
    }
}

use crate::error::{CoreError, Result};
use crate::keys::Keypair;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ChaCha20Poly1305 for authenticated encryption
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;

/// A wallet secret sealed under a password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKey {
    pub version: u32,
    pub encryption_method: String,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub encrypted_data: Vec<u8>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

/// Encrypt a keypair with password using ChaCha20Poly1305
pub fn encrypt_keypair(keypair: &Keypair, password: &str) -> Result<EncryptedKey> {
    encrypt_data(&keypair.to_keypair_bytes(), password)
}

/// Decrypt a keypair; wrong passwords fail authentication
pub fn decrypt_keypair(sealed: &EncryptedKey, password: &str) -> Result<Keypair> {
    let bytes = decrypt_data(sealed, password)?;
    Keypair::from_secret_bytes(&bytes)
}

fn encrypt_data(data: &[u8], password: &str) -> Result<EncryptedKey> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt);

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new(&key);

    let encrypted_data = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|e| CoreError::crypto(format!("Encryption failed: {}", e)))?;

    let checksum = calculate_checksum(&encrypted_data);

    Ok(EncryptedKey {
        version: 1,
        encryption_method: "ChaCha20Poly1305".to_string(),
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        encrypted_data,
        checksum,
        created_at: Utc::now(),
    })
}

fn decrypt_data(sealed: &EncryptedKey, password: &str) -> Result<Vec<u8>> {
    if calculate_checksum(&sealed.encrypted_data) != sealed.checksum {
        return Err(CoreError::crypto("Key checksum verification failed"));
    }

    if sealed.nonce.len() != NONCE_SIZE {
        return Err(CoreError::crypto("Malformed nonce"));
    }

    let key = derive_key(password, &sealed.salt);
    let cipher = ChaCha20Poly1305::new(&key);

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.encrypted_data.as_ref())
        .map_err(|_| CoreError::crypto("Decryption failed: wrong password or corrupted key"))
}

/// Derive encryption key from password using PBKDF2
fn derive_key(password: &str, salt: &[u8]) -> Key {
    use pbkdf2::pbkdf2_hmac;

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::from_slice(&key)
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

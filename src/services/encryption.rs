//! Conversation-scoped symmetric encryption.
//!
//! The key for a participant pair is recomputed on demand from a process-wide
//! master key and the sorted pair, so either side derives identical key
//! material and nothing is ever stored. Rotating the master key makes all
//! previously stored ciphertext permanently unreadable.

use crate::error::AppError;
use crate::models::conversation::normalize_pair;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct EncryptionService {
    master_key: [u8; 32],
}

impl EncryptionService {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self { master_key }
    }

    fn conversation_key(&self, user_a: Uuid, user_b: Uuid) -> [u8; 32] {
        let (lo, hi) = normalize_pair(user_a, user_b);
        let mut info = [0u8; 32];
        info[..16].copy_from_slice(lo.as_bytes());
        info[16..].copy_from_slice(hi.as_bytes());

        let hk = Hkdf::<Sha256>::new(None, &self.master_key);
        let mut key = [0u8; 32];
        hk.expand(&info, &mut key)
            .expect("HKDF expand must succeed for 32 byte output");
        key
    }

    /// Encrypt plaintext for the conversation between the two participants.
    /// Empty plaintext is encrypted like any other so media-only messages
    /// keep a uniform ciphertext column.
    ///
    /// Output format: base64(nonce || AES-256-GCM ciphertext).
    pub fn encrypt(
        &self,
        plaintext: &str,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<String, AppError> {
        let mut key = self.conversation_key(user_a, user_b);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| AppError::Encryption("AES-GCM encryption failed".into()))?;
        key.zeroize();

        let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(packed))
    }

    /// Decrypt stored ciphertext. Never fails across the component boundary:
    /// malformed input, truncation, corruption, or a key mismatch all yield
    /// None and the caller decides how to degrade.
    pub fn decrypt(&self, ciphertext: &str, user_a: Uuid, user_b: Uuid) -> Option<String> {
        let packed = STANDARD.decode(ciphertext).ok()?;
        if packed.len() < NONCE_LEN {
            return None;
        }

        let mut key = self.conversation_key(user_a, user_b);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&packed[..NONCE_LEN]), &packed[NONCE_LEN..])
            .ok();
        key.zeroize();

        String::from_utf8(plaintext?).ok()
    }
}

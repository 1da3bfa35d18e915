// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Password sealing for stored subscriptions.
//!
//! Passwords are sealed with AES-256-GCM under a key derived as
//! `SHA-256(secret)`. The stored form is `base64(nonce || ciphertext || tag)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::SyncError;

const NONCE_LEN: usize = 12;

/// Seals and opens subscription passwords with the server-wide key.
#[derive(Clone)]
pub struct PasswordCipher {
    cipher: Aes256Gcm,
}

impl PasswordCipher {
    /// Derives the key from the server-wide secret.
    pub fn new(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    /// Seals a plaintext password.
    pub fn seal(&self, plaintext: &str) -> Result<String, SyncError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| SyncError::Config(format!("Failed to seal password: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Opens a sealed password.
    ///
    /// Fails with [`SyncError::Decrypt`] when the blob is malformed or was
    /// sealed under a different key.
    pub fn open(&self, sealed: &str) -> Result<String, SyncError> {
        let blob = STANDARD
            .decode(sealed)
            .map_err(|e| SyncError::Decrypt(format!("invalid ciphertext encoding: {e}")))?;
        if blob.len() <= NONCE_LEN {
            return Err(SyncError::Decrypt("invalid ciphertext: too short".to_string()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SyncError::Decrypt("invalid ciphertext".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| SyncError::Decrypt("password is not valid UTF-8".to_string()))
    }
}

impl std::fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCipher").finish_non_exhaustive()
    }
}

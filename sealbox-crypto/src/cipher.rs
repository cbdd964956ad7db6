//! Authenticated symmetric encryption.
//!
//! ChaCha20-Poly1305 producing opaque tokens of the form
//! `nonce(12) || ciphertext || tag(16)`. Tokens are atomic: callers store
//! and transport them as single byte strings and never touch the nonce or
//! tag individually. Any corruption makes decryption fail instead of
//! returning garbage.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::SymmetricKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

/// ChaCha20-Poly1305 nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypts `plaintext` under `key`, returning an opaque token.
///
/// A fresh random nonce is generated per call, so encrypting the same
/// plaintext twice yields different tokens.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut token = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    token.extend_from_slice(&nonce);
    token.extend_from_slice(&ciphertext);
    Ok(token)
}

/// Decrypts a token produced by [`encrypt`].
///
/// Fails with [`CryptoError::DecryptionFailed`] if the token is truncated,
/// was produced under a different key, or was tampered with.
pub fn decrypt(key: &SymmetricKey, token: &[u8]) -> CryptoResult<Vec<u8>> {
    if token.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }
    let (nonce, ciphertext) = token.split_at(NONCE_SIZE);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = SymmetricKey::random();
        let token = encrypt(&key, b"attack at dawn").unwrap();
        assert_eq!(decrypt(&key, &token).unwrap(), b"attack at dawn");
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let key = SymmetricKey::random();
        let token = encrypt(&key, b"").unwrap();
        assert_eq!(decrypt(&key, &token).unwrap(), b"");
    }

    #[test]
    fn wrong_key_fails() {
        let token = encrypt(&SymmetricKey::random(), b"secret").unwrap();
        let result = decrypt(&SymmetricKey::random(), &token);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn tampered_token_fails() {
        let key = SymmetricKey::random();
        let mut token = encrypt(&key, b"secret").unwrap();
        let last = token.len() - 1;
        token[last] ^= 0xFF;
        assert!(matches!(
            decrypt(&key, &token),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn truncated_token_fails() {
        let key = SymmetricKey::random();
        assert!(matches!(
            decrypt(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1]),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn each_encrypt_produces_different_token() {
        let key = SymmetricKey::random();
        let t1 = encrypt(&key, b"same plaintext").unwrap();
        let t2 = encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(t1, t2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn encrypt_decrypt_always_roundtrips(
                data in proptest::collection::vec(any::<u8>(), 0..512)
            ) {
                let key = SymmetricKey::random();
                let token = encrypt(&key, &data).unwrap();
                prop_assert_eq!(decrypt(&key, &token).unwrap(), data);
            }
        }
    }
}

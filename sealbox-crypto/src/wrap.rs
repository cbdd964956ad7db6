//! Asymmetric key wrapping for SSH identities.
//!
//! Parses OpenSSH-format key material and uses the underlying RSA keys to
//! wrap/unwrap a [`SymmetricKey`] (RSA-OAEP with SHA-256) and to
//! sign/verify byte strings (RSA-PSS with SHA-256). Each identity can
//! recover the container's master key independently of the password.
//!
//! Only `ssh-rsa` keys are accepted: OAEP needs an RSA modulus, and the
//! padding parameters here must stay fixed for envelopes to remain
//! openable across versions.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{SymmetricKey, KEY_SIZE};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// A parsed OpenSSH public key, able to wrap keys and verify signatures.
#[derive(Clone, Debug)]
pub struct PublicIdentity {
    key: RsaPublicKey,
    comment: String,
    encoded: String,
}

impl PublicIdentity {
    /// Parses a single-line OpenSSH public key (`ssh-rsa AAAA... comment`).
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let text = text.trim();
        let public = ssh_key::PublicKey::from_openssh(text)
            .map_err(|e| CryptoError::BadPublicKey(e.to_string()))?;

        let rsa = match public.key_data() {
            ssh_key::public::KeyData::Rsa(rsa) => rsa,
            other => {
                return Err(CryptoError::UnsupportedKeyType(
                    other.algorithm().to_string(),
                ))
            }
        };
        let key =
            RsaPublicKey::try_from(rsa).map_err(|e| CryptoError::BadPublicKey(e.to_string()))?;

        Ok(Self {
            key,
            comment: public.comment().to_string(),
            encoded: text.to_string(),
        })
    }

    /// The key's comment field, conventionally `user@host`.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The original single-line OpenSSH encoding.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Wraps a symmetric key under this public key (RSA-OAEP, SHA-256).
    pub fn wrap_key(&self, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        self.key
            .encrypt(
                &mut rand::rngs::OsRng,
                Oaep::new::<Sha256>(),
                key.as_bytes(),
            )
            .map_err(|e| CryptoError::Wrap(e.to_string()))
    }

    /// Verifies an RSA-PSS signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let signature =
            Signature::try_from(signature).map_err(|_| CryptoError::BadSignature)?;
        VerifyingKey::<Sha256>::new(self.key.clone())
            .verify(message, &signature)
            .map_err(|_| CryptoError::BadSignature)
    }
}

/// A parsed (and decrypted, if necessary) OpenSSH private key.
pub struct PrivateIdentity {
    key: RsaPrivateKey,
}

impl PrivateIdentity {
    /// Parses an OpenSSH private key, decrypting it when a passphrase is
    /// given.
    ///
    /// Fails with [`CryptoError::BadPrivateKey`] on malformed input,
    /// [`CryptoError::PassphraseRequired`] when the key is encrypted and no
    /// passphrase was supplied, and [`CryptoError::WrongPassphrase`] when
    /// decryption fails.
    pub fn parse(text: &str, passphrase: Option<&str>) -> CryptoResult<Self> {
        let private = ssh_key::PrivateKey::from_openssh(text)
            .map_err(|e| CryptoError::BadPrivateKey(e.to_string()))?;

        let private = if private.is_encrypted() {
            let passphrase = passphrase.ok_or(CryptoError::PassphraseRequired)?;
            private
                .decrypt(passphrase)
                .map_err(|_| CryptoError::WrongPassphrase)?
        } else {
            private
        };

        let rsa = match private.key_data() {
            ssh_key::private::KeypairData::Rsa(rsa) => rsa,
            other => {
                let algorithm = other
                    .algorithm()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(CryptoError::UnsupportedKeyType(algorithm));
            }
        };
        let key = RsaPrivateKey::try_from(rsa)
            .map_err(|e| CryptoError::BadPrivateKey(e.to_string()))?;

        Ok(Self { key })
    }

    /// Unwraps a symmetric key wrapped by [`PublicIdentity::wrap_key`].
    pub fn unwrap_key(&self, wrapped: &[u8]) -> CryptoResult<SymmetricKey> {
        let plaintext = self
            .key
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| CryptoError::Unwrap)?;

        if plaintext.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: plaintext.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&plaintext);
        Ok(SymmetricKey::from_bytes(bytes))
    }

    /// Signs `message` with RSA-PSS (SHA-256).
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new(self.key.clone());
        let signature = signing_key.sign_with_rng(&mut rand::rngs::OsRng, message);
        Ok(signature.to_vec())
    }
}

impl std::fmt::Debug for PrivateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateIdentity(..)")
    }
}

//! Optional auth-section signature guard.
//!
//! An Ed25519 keypair generated at container creation: the public half is
//! stored raw, the private half wrapped by the master key, and the
//! signature covers the stable auth core (`master_iv`,
//! `encrypted_master_data_key`, `challenge`, `signature`,
//! `signer_public_key`). The HMAC challenge check remains the
//! authoritative master-key gate; this guard is an independent,
//! composable hardening layer, and containers without it still open.
//!
//! `users` entries are NOT covered: identity removal runs without the
//! master key and could not re-sign, and every wrapped key is already
//! authenticated individually by the challenge check after unwrap.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;

use sealbox_crypto::{decrypt, encrypt, SymmetricKey};

use crate::error::{ContainerError, ContainerResult};
use crate::format::{AuthSection, Container};

/// The signed subset of the auth section, in canonical JSON form.
#[derive(Serialize)]
struct SignedCore {
    master_iv: Vec<u8>,
    encrypted_master_data_key: Vec<u8>,
    challenge: Vec<u8>,
    signature: Vec<u8>,
    signer_public_key: Vec<u8>,
}

fn canonical_core(auth: &AuthSection, signer_public_key: &[u8]) -> ContainerResult<Vec<u8>> {
    let core = SignedCore {
        master_iv: auth.master_iv.clone(),
        encrypted_master_data_key: auth.encrypted_master_data_key.clone(),
        challenge: auth.challenge.clone(),
        signature: auth.signature.clone(),
        signer_public_key: signer_public_key.to_vec(),
    };
    serde_json::to_vec(&core).map_err(|e| ContainerError::Storage(e.to_string()))
}

/// Generates the guard keypair for a fresh container and signs it.
pub fn install(container: &mut Container, master_key: &SymmetricKey) -> ContainerResult<()> {
    let signing = SigningKey::generate(&mut rand::rngs::OsRng);

    container.auth.signer_public_key = Some(signing.verifying_key().to_bytes().to_vec());
    container.auth.encrypted_signer_key = Some(encrypt(master_key, &signing.to_bytes())?);

    sign(container, master_key)
}

/// Re-signs the auth core. No-op when the guard is not installed.
pub fn sign(container: &mut Container, master_key: &SymmetricKey) -> ContainerResult<()> {
    let (Some(public), Some(encrypted_signer)) = (
        container.auth.signer_public_key.clone(),
        container.auth.encrypted_signer_key.clone(),
    ) else {
        return Ok(());
    };

    let signer_bytes = decrypt(master_key, &encrypted_signer)?;
    let signer_bytes: [u8; 32] = signer_bytes
        .try_into()
        .map_err(|_| ContainerError::Malformed("signer key length".to_string()))?;
    let signing = SigningKey::from_bytes(&signer_bytes);

    let message = canonical_core(&container.auth, &public)?;
    container.auth_signature = Some(signing.sign(&message).to_bytes().to_vec());
    Ok(())
}

/// Verifies the guard when present.
///
/// Absent guard fields are fine (the guard is optional); an installed
/// guard with a missing or mismatching signature means the auth section
/// was tampered with and fails as [`ContainerError::InvalidSignature`].
pub fn verify(container: &Container) -> ContainerResult<()> {
    let Some(public) = &container.auth.signer_public_key else {
        return Ok(());
    };
    let Some(signature) = &container.auth_signature else {
        return Err(ContainerError::InvalidSignature);
    };

    let public: [u8; 32] = public
        .as_slice()
        .try_into()
        .map_err(|_| ContainerError::Malformed("signer public key length".to_string()))?;
    let verifying = VerifyingKey::from_bytes(&public)
        .map_err(|_| ContainerError::Malformed("signer public key".to_string()))?;
    let signature =
        Signature::from_slice(signature).map_err(|_| ContainerError::InvalidSignature)?;

    let message = canonical_core(&container.auth, &public)?;
    verifying
        .verify(&message, &signature)
        .map_err(|_| ContainerError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guarded_container(master_key: &SymmetricKey) -> Container {
        let mut container = Container {
            version: crate::format::CONTAINER_VERSION.to_string(),
            ..Container::default()
        };
        container.auth.master_iv = vec![1u8; 32];
        container.auth.challenge = vec![2u8; 32];
        container.auth.signature = vec![3u8; 32];
        install(&mut container, master_key).unwrap();
        container
    }

    #[test]
    fn install_then_verify() {
        let key = SymmetricKey::random();
        let container = guarded_container(&key);
        verify(&container).unwrap();
    }

    #[test]
    fn verify_without_guard_is_ok() {
        let container = Container::default();
        verify(&container).unwrap();
    }

    #[test]
    fn tampered_core_fails() {
        let key = SymmetricKey::random();
        let mut container = guarded_container(&key);
        container.auth.challenge[0] ^= 0xFF;
        assert!(matches!(
            verify(&container),
            Err(ContainerError::InvalidSignature)
        ));
    }

    #[test]
    fn stripped_signature_fails() {
        let key = SymmetricKey::random();
        let mut container = guarded_container(&key);
        container.auth_signature = None;
        assert!(matches!(
            verify(&container),
            Err(ContainerError::InvalidSignature)
        ));
    }

    #[test]
    fn users_changes_do_not_invalidate() {
        let key = SymmetricKey::random();
        let mut container = guarded_container(&key);
        container
            .auth
            .users
            .insert("alice@example".to_string(), Default::default());
        verify(&container).unwrap();
    }

    #[test]
    fn resign_with_wrong_master_key_fails() {
        let key = SymmetricKey::random();
        let mut container = guarded_container(&key);
        let result = sign(&mut container, &SymmetricKey::random());
        assert!(result.is_err());
    }
}

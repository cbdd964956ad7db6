//! Unlock capabilities.
//!
//! A capability binds one container engine to one already-resolved
//! credential and exposes just `decrypt`/`encrypt`. The session manager
//! works against this trait and never learns whether unlocking uses a
//! password or an identity.

use std::fs;
use std::path::Path;

use zeroize::Zeroizing;

use sealbox_container::{ContainerEngine, IdentityRegistry};
use sealbox_crypto::KdfParams;

use crate::error::SessionResult;

/// Decrypt/encrypt capability bound to one container and one credential.
pub trait UnlockCapability: Send + Sync {
    /// Decrypts the container's payload.
    fn decrypt(&self) -> SessionResult<Vec<u8>>;

    /// Re-encrypts the contents of `staged` into the container.
    fn encrypt(&self, staged: &Path) -> SessionResult<()>;

    /// Stable identifier of the protected container; the advisory lock
    /// path derives from it.
    fn target(&self) -> &Path;
}

/// Password-path capability.
pub struct PasswordUnlock {
    engine: ContainerEngine,
    password: Zeroizing<String>,
    params: KdfParams,
}

impl PasswordUnlock {
    pub fn new(engine: ContainerEngine, password: impl Into<String>, params: KdfParams) -> Self {
        Self {
            engine,
            password: Zeroizing::new(password.into()),
            params,
        }
    }
}

impl UnlockCapability for PasswordUnlock {
    fn decrypt(&self) -> SessionResult<Vec<u8>> {
        Ok(self.engine.read(&self.password, &self.params)?)
    }

    fn encrypt(&self, staged: &Path) -> SessionResult<()> {
        let plaintext = fs::read(staged)?;
        Ok(self.engine.write(&plaintext, &self.password, &self.params)?)
    }

    fn target(&self) -> &Path {
        self.engine.filename()
    }
}

/// Identity-path capability (SSH private key).
pub struct IdentityUnlock {
    engine: ContainerEngine,
    auth_id: String,
    private_key: Zeroizing<String>,
    passphrase: Option<Zeroizing<String>>,
}

impl IdentityUnlock {
    pub fn new(
        engine: ContainerEngine,
        auth_id: impl Into<String>,
        private_key: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            engine,
            auth_id: auth_id.into(),
            private_key: Zeroizing::new(private_key.into()),
            passphrase: passphrase.map(Zeroizing::new),
        }
    }

    fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_ref().map(|p| p.as_str())
    }
}

impl UnlockCapability for IdentityUnlock {
    fn decrypt(&self) -> SessionResult<Vec<u8>> {
        let registry = IdentityRegistry::new(&self.engine);
        Ok(registry.read(&self.auth_id, &self.private_key, self.passphrase())?)
    }

    fn encrypt(&self, staged: &Path) -> SessionResult<()> {
        let plaintext = fs::read(staged)?;
        let registry = IdentityRegistry::new(&self.engine);
        Ok(registry.write(
            &plaintext,
            &self.auth_id,
            &self.private_key,
            self.passphrase(),
        )?)
    }

    fn target(&self) -> &Path {
        self.engine.filename()
    }
}

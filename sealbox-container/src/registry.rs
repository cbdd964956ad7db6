//! Multi-identity access, layered on the container engine.
//!
//! Each registered identity holds its own RSA-OAEP-wrapped copy of the
//! master key, so adding or removing one is O(1) and never touches the
//! payload or any other identity. Removing an identity does not rotate
//! the master data key: a retained copy of an old container file remains
//! decryptable by the removed identity. That is a documented property of
//! the envelope scheme, not something this registry tries to fix.

use std::collections::BTreeMap;

use tracing::info;

use sealbox_crypto::{decrypt, encrypt, KdfParams, SymmetricKey};
use sealbox_crypto::{PrivateIdentity, PublicIdentity};

use crate::engine::{check_master_key_signature, ContainerEngine};
use crate::error::{ContainerError, ContainerResult};
use crate::format::{Container, SshIdentity};
use crate::authsign;

/// Identity operations bound to one engine.
///
/// Registry mutations are expected to run outside any open edit session;
/// the registry itself takes no lock on the container.
pub struct IdentityRegistry<'a> {
    engine: &'a ContainerEngine,
}

impl<'a> IdentityRegistry<'a> {
    pub fn new(engine: &'a ContainerEngine) -> Self {
        Self { engine }
    }

    /// Registers a public key under `auth_id` (default: the key comment).
    ///
    /// The password path must verify first; the wrapped key stored here is
    /// therefore always a proven master key. Fails with
    /// [`ContainerError::AlreadyPresent`] before any mutation when the id
    /// already carries an ssh record - a failed add never changes the
    /// container.
    pub fn add_identity(
        &self,
        password: &str,
        public_key: &str,
        auth_id: Option<&str>,
        params: &KdfParams,
    ) -> ContainerResult<String> {
        let mut container = self.engine.load()?;
        authsign::verify(&container)?;

        let master_key = self.engine.get_master_key(&container, password, params)?;
        let identity = PublicIdentity::parse(public_key)?;

        let auth_id = match auth_id {
            Some(id) => id.to_string(),
            None => default_auth_id(&identity)?,
        };

        let already = container
            .auth
            .users
            .get(&auth_id)
            .is_some_and(|record| record.ssh.is_some());
        if already {
            return Err(ContainerError::AlreadyPresent(auth_id));
        }

        let encrypted_master_key = identity.wrap_key(&master_key)?;
        container
            .auth
            .users
            .entry(auth_id.clone())
            .or_default()
            .ssh = Some(SshIdentity {
            public_key: identity.encoded().to_string(),
            encrypted_master_key,
        });

        self.engine.dump(&container)?;
        info!(auth_id = %auth_id, file = %self.engine.filename().display(), "identity added");
        Ok(auth_id)
    }

    /// Removes `auth_id`'s ssh record; prunes the outer record when it
    /// holds nothing else, so no empty stubs leak into listings.
    pub fn remove_identity(&self, auth_id: &str) -> ContainerResult<()> {
        let mut container = self.engine.load()?;

        match container.auth.users.get_mut(auth_id) {
            Some(record) if record.ssh.is_some() => {
                record.ssh = None;
                if record.is_empty() {
                    container.auth.users.remove(auth_id);
                }
            }
            _ => return Err(ContainerError::NotFound(auth_id.to_string())),
        }

        self.engine.dump(&container)?;
        info!(auth_id = %auth_id, file = %self.engine.filename().display(), "identity removed");
        Ok(())
    }

    /// Lists registered identities as `auth_id -> public key text`.
    /// Read-only; no master key involved.
    pub fn list_identities(&self) -> ContainerResult<BTreeMap<String, String>> {
        let container = self.engine.load()?;
        Ok(container
            .auth
            .users
            .iter()
            .filter_map(|(auth_id, record)| {
                record
                    .ssh
                    .as_ref()
                    .map(|ssh| (auth_id.clone(), ssh.public_key.clone()))
            })
            .collect())
    }

    /// Recovers the master key through an identity's private key.
    ///
    /// The recovered key runs through the same challenge/signature check
    /// as the password path: a wrapped key must be proven authentic, not
    /// merely parseable, before the cipher layer may see it.
    pub fn recover_master_key(
        &self,
        container: &Container,
        auth_id: &str,
        private_key: &str,
        passphrase: Option<&str>,
    ) -> ContainerResult<SymmetricKey> {
        let private = PrivateIdentity::parse(private_key, passphrase)?;

        let wrapped = container
            .auth
            .users
            .get(auth_id)
            .and_then(|record| record.ssh.as_ref())
            .ok_or_else(|| ContainerError::NotRegistered(auth_id.to_string()))?;

        let master_key = private.unwrap_key(&wrapped.encrypted_master_key)?;
        check_master_key_signature(&container.auth, &master_key)?;
        Ok(master_key)
    }

    /// Decrypts the payload through an identity.
    pub fn read(
        &self,
        auth_id: &str,
        private_key: &str,
        passphrase: Option<&str>,
    ) -> ContainerResult<Vec<u8>> {
        let container = self.engine.load()?;
        authsign::verify(&container)?;

        let master_key = self.recover_master_key(&container, auth_id, private_key, passphrase)?;
        let data_key = self.engine.unwrap_data_key(&container, &master_key)?;
        Ok(decrypt(&data_key, &container.data)?)
    }

    /// Replaces the payload through an identity.
    pub fn write(
        &self,
        data: &[u8],
        auth_id: &str,
        private_key: &str,
        passphrase: Option<&str>,
    ) -> ContainerResult<()> {
        let mut container = self.engine.load()?;
        authsign::verify(&container)?;

        let master_key = self.recover_master_key(&container, auth_id, private_key, passphrase)?;
        let data_key = self.engine.unwrap_data_key(&container, &master_key)?;
        container.data = encrypt(&data_key, data)?;
        self.engine.dump(&container)
    }
}

/// Derives the default auth id from the key comment (`user@host` by SSH
/// convention).
fn default_auth_id(identity: &PublicIdentity) -> ContainerResult<String> {
    let comment = identity.comment().trim();
    if comment.is_empty() {
        return Err(ContainerError::NoAuthId);
    }
    Ok(comment.to_string())
}

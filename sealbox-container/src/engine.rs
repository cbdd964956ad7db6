//! The container engine.
//!
//! Every public operation is a fresh load/verify/mutate/store cycle - no
//! unlocked state is cached between calls. The only state machine is the
//! implicit "unverified key -> verified key -> usable" gate enforced by
//! [`ContainerEngine::get_master_key`].

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tracing::{debug, info};

use sealbox_crypto::{decrypt, derive_key, encrypt, KdfParams, Salt, SymmetricKey};
use sealbox_crypto::{CryptoError, KEY_SIZE, SALT_SIZE};

use crate::authsign;
use crate::error::{ContainerError, ContainerResult};
use crate::format::{AuthSection, Container, CONTAINER_VERSION};
use crate::storage::StorageSupport;

type HmacSha256 = Hmac<Sha256>;

/// Size of the master-key check probe in bytes.
pub const CHALLENGE_SIZE: usize = 32;

/// Engine bound to one container file through a storage support.
pub struct ContainerEngine {
    support: Box<dyn StorageSupport>,
}

impl ContainerEngine {
    pub fn new(support: Box<dyn StorageSupport>) -> Self {
        Self { support }
    }

    /// Path of the underlying container file.
    pub fn filename(&self) -> &std::path::Path {
        self.support.filename()
    }

    /// True when the container file exists on disk.
    pub fn exists(&self) -> bool {
        self.support.is_exist()
    }

    /// Creates a new container with an empty payload.
    ///
    /// Fails with [`ContainerError::AlreadyExists`] unless `force`; with
    /// `force` any prior content is discarded.
    pub fn create(&self, password: &str, force: bool, params: &KdfParams) -> ContainerResult<()> {
        if !force && self.support.is_exist() {
            return Err(ContainerError::AlreadyExists(
                self.filename().display().to_string(),
            ));
        }

        let container = build_container(password, b"", params)?;
        self.support.dump(&container)?;

        info!(file = %self.filename().display(), "container created");
        Ok(())
    }

    /// Loads the container and gates on the version tag before anything
    /// else is interpreted.
    pub fn load(&self) -> ContainerResult<Container> {
        let container = self.support.load()?;
        container.check_version()?;
        Ok(container)
    }

    pub(crate) fn dump(&self, container: &Container) -> ContainerResult<()> {
        self.support.dump(container)
    }

    /// Derives the master key from `password` and proves it against the
    /// stored challenge/signature.
    ///
    /// This is the single gate between "some bytes derived from a
    /// password" and "a key the cipher layer may trust". A wrong password
    /// fails here with [`ContainerError::InvalidSignature`], never deeper
    /// down as silently garbled plaintext.
    pub fn get_master_key(
        &self,
        container: &Container,
        password: &str,
        params: &KdfParams,
    ) -> ContainerResult<SymmetricKey> {
        let salt = salt_from(&container.auth.master_iv)?;
        let master_key = derive_key(password, &salt, params);
        check_master_key_signature(&container.auth, &master_key)?;
        Ok(master_key)
    }

    /// Verified master key, then unwrap of the master data key.
    pub fn get_master_data_key(
        &self,
        container: &Container,
        password: &str,
        params: &KdfParams,
    ) -> ContainerResult<SymmetricKey> {
        let master_key = self.get_master_key(container, password, params)?;
        self.unwrap_data_key(container, &master_key)
    }

    /// Unwraps the master data key with an already-verified master key.
    pub(crate) fn unwrap_data_key(
        &self,
        container: &Container,
        master_key: &SymmetricKey,
    ) -> ContainerResult<SymmetricKey> {
        let bytes = decrypt(master_key, &container.auth.encrypted_master_data_key)?;
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            }
            .into());
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(SymmetricKey::from_bytes(key))
    }

    /// Decrypts and returns the payload using the password path.
    pub fn read(&self, password: &str, params: &KdfParams) -> ContainerResult<Vec<u8>> {
        let container = self.load()?;
        authsign::verify(&container)?;

        let data_key = self.get_master_data_key(&container, password, params)?;
        Ok(decrypt(&data_key, &container.data)?)
    }

    /// Replaces the payload and re-persists the container; everything
    /// else is left unchanged.
    pub fn write(&self, data: &[u8], password: &str, params: &KdfParams) -> ContainerResult<()> {
        let mut container = self.load()?;
        authsign::verify(&container)?;

        let data_key = self.get_master_data_key(&container, password, params)?;
        container.data = encrypt(&data_key, data)?;
        self.support.dump(&container)?;

        debug!(file = %self.filename().display(), bytes = data.len(), "payload written");
        Ok(())
    }
}

/// Builds a fresh container structure around `payload`.
fn build_container(
    password: &str,
    payload: &[u8],
    params: &KdfParams,
) -> ContainerResult<Container> {
    let salt = Salt::random();
    let master_data_key = SymmetricKey::random();
    let master_key = derive_key(password, &salt, params);

    let encrypted_master_data_key = encrypt(&master_key, master_data_key.as_bytes())?;
    let data = encrypt(&master_data_key, payload)?;

    let mut auth = AuthSection {
        master_iv: salt.as_bytes().to_vec(),
        encrypted_master_data_key,
        ..AuthSection::default()
    };
    set_master_key_signature(&mut auth, &master_key);

    let mut container = Container {
        version: CONTAINER_VERSION.to_string(),
        auth,
        data,
        auth_signature: None,
    };
    authsign::install(&mut container, &master_key)?;

    Ok(container)
}

/// Stores a fresh challenge and its HMAC under `master_key`.
pub(crate) fn set_master_key_signature(auth: &mut AuthSection, master_key: &SymmetricKey) {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut challenge);

    let mut mac = HmacSha256::new_from_slice(master_key.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(&challenge);

    auth.challenge = challenge.to_vec();
    auth.signature = mac.finalize().into_bytes().to_vec();
}

/// Proves a candidate master key against the stored challenge/signature.
pub(crate) fn check_master_key_signature(
    auth: &AuthSection,
    master_key: &SymmetricKey,
) -> ContainerResult<()> {
    let mut mac = HmacSha256::new_from_slice(master_key.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(&auth.challenge);

    // Constant-time comparison; callers learn pass/fail, nothing else.
    mac.verify_slice(&auth.signature)
        .map_err(|_| ContainerError::InvalidSignature)
}

fn salt_from(master_iv: &[u8]) -> ContainerResult<Salt> {
    if master_iv.len() != SALT_SIZE {
        return Err(ContainerError::Malformed(format!(
            "master_iv must be {SALT_SIZE} bytes, found {}",
            master_iv.len()
        )));
    }
    let mut bytes = [0u8; SALT_SIZE];
    bytes.copy_from_slice(master_iv);
    Ok(Salt::from_bytes(bytes))
}

//! The persisted container structure.
//!
//! One top-level mapping with `version`, `auth` and `data`. Binary fields
//! are carried as base64url strings so the JSON encoding stays text-safe;
//! the packed encoding just stores the same strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ContainerError, ContainerResult};

/// Container format version written by this engine.
pub const CONTAINER_VERSION: &str = "1";

/// The persisted, versioned container structure.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub auth: AuthSection,

    /// Payload wrapped by the master data key (authenticated-cipher token).
    #[serde(default, with = "b64")]
    pub data: Vec<u8>,

    /// Signature of the optional auth-section guard; lives outside `auth`
    /// so it is not part of the bytes it signs.
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub auth_signature: Option<Vec<u8>>,
}

impl Container {
    /// Rejects containers this engine does not understand.
    ///
    /// Must be called before any other field is interpreted; an unknown
    /// version is a hard failure, never a best-effort parse.
    pub fn check_version(&self) -> ContainerResult<()> {
        if self.version != CONTAINER_VERSION {
            return Err(ContainerError::UnsupportedVersion(self.version.clone()));
        }
        Ok(())
    }
}

/// Everything needed to reconstruct and validate the master key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthSection {
    /// KDF salt, 32 random bytes, generated once at creation.
    #[serde(default, with = "b64")]
    pub master_iv: Vec<u8>,

    /// Master data key wrapped by the master key.
    #[serde(default, with = "b64")]
    pub encrypted_master_data_key: Vec<u8>,

    /// Registered identities, keyed by auth id (e.g. `user@host`).
    #[serde(default)]
    pub users: BTreeMap<String, IdentityRecord>,

    /// Random probe bytes for the master-key check.
    #[serde(default, with = "b64")]
    pub challenge: Vec<u8>,

    /// HMAC-SHA256 of `challenge` under the master key.
    #[serde(default, with = "b64")]
    pub signature: Vec<u8>,

    /// Public half of the optional auth-section signature guard.
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub signer_public_key: Option<Vec<u8>>,

    /// Private half of the guard, wrapped by the master key.
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub encrypted_signer_key: Option<Vec<u8>>,
}

/// Per-auth-id identity record. The `ssh` sub-record is present exactly
/// when that identity can unwrap the master key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshIdentity>,
}

impl IdentityRecord {
    /// True when no access method remains and the record can be pruned.
    pub fn is_empty(&self) -> bool {
        self.ssh.is_none()
    }
}

/// An SSH identity able to recover the master key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SshIdentity {
    /// The original single-line OpenSSH public key text.
    pub public_key: String,

    /// Master key wrapped under that public key (RSA-OAEP).
    #[serde(with = "b64")]
    pub encrypted_master_key: Vec<u8>,
}

/// base64url (de)serialization for binary fields.
pub(crate) mod b64 {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        URL_SAFE
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// base64url (de)serialization for optional binary fields.
pub(crate) mod b64_opt {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&URL_SAFE.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => URL_SAFE
                .decode(text.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_version_rejected() {
        let container = Container {
            version: "99".to_string(),
            ..Container::default()
        };
        assert!(matches!(
            container.check_version(),
            Err(ContainerError::UnsupportedVersion(v)) if v == "99"
        ));
    }

    #[test]
    fn binary_fields_serialize_as_base64url_text() {
        let container = Container {
            version: CONTAINER_VERSION.to_string(),
            data: vec![0xFF, 0xFE, 0xFD],
            ..Container::default()
        };
        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&container).unwrap()).unwrap();
        assert!(json["data"].is_string());
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let mut container = Container {
            version: CONTAINER_VERSION.to_string(),
            data: b"token".to_vec(),
            ..Container::default()
        };
        container.auth.master_iv = vec![7u8; 32];
        container.auth.users.insert(
            "alice@example".to_string(),
            IdentityRecord {
                ssh: Some(SshIdentity {
                    public_key: "ssh-rsa AAAA alice@example".to_string(),
                    encrypted_master_key: vec![1, 2, 3],
                }),
            },
        );

        let bytes = serde_json::to_vec(&container).unwrap();
        let back: Container = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(back.version, container.version);
        assert_eq!(back.data, container.data);
        assert_eq!(back.auth.master_iv, container.auth.master_iv);
        assert_eq!(
            back.auth.users["alice@example"]
                .ssh
                .as_ref()
                .unwrap()
                .encrypted_master_key,
            vec![1, 2, 3]
        );
    }
}

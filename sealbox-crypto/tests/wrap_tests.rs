use sealbox_crypto::wrap::{PrivateIdentity, PublicIdentity};
use sealbox_crypto::{CryptoError, SymmetricKey};

const RSA_PUBLIC: &str = include_str!("fixtures/id_rsa.pub");
const RSA_PRIVATE: &str = include_str!("fixtures/id_rsa");
const RSA_PROTECTED_PUBLIC: &str = include_str!("fixtures/id_rsa_protected.pub");
const RSA_PROTECTED_PRIVATE: &str = include_str!("fixtures/id_rsa_protected");
const RSA_PASSPHRASE: &str = "opensesame";
const ED25519_PUBLIC: &str = include_str!("fixtures/id_ed25519.pub");
const ED25519_PRIVATE: &str = include_str!("fixtures/id_ed25519");

#[test]
fn parse_public_key_extracts_comment() {
    let identity = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    assert_eq!(identity.comment(), "alice@example");
}

#[test]
fn parse_public_key_keeps_encoding() {
    let identity = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    assert_eq!(identity.encoded(), RSA_PUBLIC.trim());
}

#[test]
fn garbage_public_key_rejected() {
    let result = PublicIdentity::parse("not an ssh key at all");
    assert!(matches!(result, Err(CryptoError::BadPublicKey(_))));
}

#[test]
fn ed25519_public_key_rejected_as_unsupported() {
    let result = PublicIdentity::parse(ED25519_PUBLIC);
    assert!(matches!(result, Err(CryptoError::UnsupportedKeyType(_))));
}

#[test]
fn ed25519_private_key_rejected_as_unsupported() {
    let result = PrivateIdentity::parse(ED25519_PRIVATE, None);
    assert!(matches!(result, Err(CryptoError::UnsupportedKeyType(_))));
}

#[test]
fn wrap_unwrap_roundtrip() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let private = PrivateIdentity::parse(RSA_PRIVATE, None).unwrap();

    let key = SymmetricKey::random();
    let wrapped = public.wrap_key(&key).unwrap();
    let unwrapped = private.unwrap_key(&wrapped).unwrap();

    assert_eq!(unwrapped.as_bytes(), key.as_bytes());
}

#[test]
fn each_wrap_produces_different_envelope() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let key = SymmetricKey::random();

    // OAEP is randomized
    assert_ne!(public.wrap_key(&key).unwrap(), public.wrap_key(&key).unwrap());
}

#[test]
fn unwrap_with_wrong_private_key_fails() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let wrong_private =
        PrivateIdentity::parse(RSA_PROTECTED_PRIVATE, Some(RSA_PASSPHRASE)).unwrap();

    let wrapped = public.wrap_key(&SymmetricKey::random()).unwrap();
    assert!(matches!(
        wrong_private.unwrap_key(&wrapped),
        Err(CryptoError::Unwrap)
    ));
}

#[test]
fn unwrap_tampered_envelope_fails() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let private = PrivateIdentity::parse(RSA_PRIVATE, None).unwrap();

    let mut wrapped = public.wrap_key(&SymmetricKey::random()).unwrap();
    wrapped[0] ^= 0xFF;
    assert!(private.unwrap_key(&wrapped).is_err());
}

#[test]
fn encrypted_private_key_needs_passphrase() {
    let result = PrivateIdentity::parse(RSA_PROTECTED_PRIVATE, None);
    assert!(matches!(result, Err(CryptoError::PassphraseRequired)));
}

#[test]
fn encrypted_private_key_wrong_passphrase() {
    let result = PrivateIdentity::parse(RSA_PROTECTED_PRIVATE, Some("nope"));
    assert!(matches!(result, Err(CryptoError::WrongPassphrase)));
}

#[test]
fn encrypted_private_key_unlocks_and_unwraps() {
    let public = PublicIdentity::parse(RSA_PROTECTED_PUBLIC).unwrap();
    let private =
        PrivateIdentity::parse(RSA_PROTECTED_PRIVATE, Some(RSA_PASSPHRASE)).unwrap();

    let key = SymmetricKey::random();
    let wrapped = public.wrap_key(&key).unwrap();
    assert_eq!(private.unwrap_key(&wrapped).unwrap().as_bytes(), key.as_bytes());
}

#[test]
fn sign_verify_roundtrip() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let private = PrivateIdentity::parse(RSA_PRIVATE, None).unwrap();

    let signature = private.sign(b"auth section bytes").unwrap();
    public.verify(b"auth section bytes", &signature).unwrap();
}

#[test]
fn verify_rejects_wrong_message() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let private = PrivateIdentity::parse(RSA_PRIVATE, None).unwrap();

    let signature = private.sign(b"auth section bytes").unwrap();
    assert!(matches!(
        public.verify(b"different bytes", &signature),
        Err(CryptoError::BadSignature)
    ));
}

#[test]
fn verify_rejects_signature_from_other_key() {
    let public = PublicIdentity::parse(RSA_PUBLIC).unwrap();
    let other =
        PrivateIdentity::parse(RSA_PROTECTED_PRIVATE, Some(RSA_PASSPHRASE)).unwrap();

    let signature = other.sign(b"auth section bytes").unwrap();
    assert!(matches!(
        public.verify(b"auth section bytes", &signature),
        Err(CryptoError::BadSignature)
    ));
}

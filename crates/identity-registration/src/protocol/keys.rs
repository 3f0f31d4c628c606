//! Key material decoding and proof-of-possession verification.
//!
//! All key and signature fields use standard base64 with canonical padding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, SignatureError, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use sha2::{Digest, Sha256};

/// Decode a fixed-length base64 field.
pub fn decode_fixed<const N: usize>(field: &str, value: &str) -> Result<[u8; N], String> {
    if value.is_empty() {
        return Err(format!("{} is empty", field));
    }

    let bytes = STANDARD
        .decode(value)
        .map_err(|e| format!("{} is not valid base64: {}", field, e))?;

    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("{} must be {} bytes, got {}", field, N, b.len()))
}

/// Decode an identity key and check it is an Ed25519 point.
pub fn decode_identity_key(value: &str) -> Result<VerifyingKey, String> {
    let bytes = decode_fixed::<PUBLIC_KEY_LENGTH>("identityKey", value)?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| "identityKey is not a valid Ed25519 public key".to_string())
}

/// Decode a signed prekey.
pub fn decode_signed_pre_key(value: &str) -> Result<[u8; PUBLIC_KEY_LENGTH], String> {
    decode_fixed("signedPreKey", value)
}

/// Decode a detached Ed25519 signature.
pub fn decode_signature(value: &str) -> Result<Signature, String> {
    let bytes = decode_fixed::<SIGNATURE_LENGTH>("signature", value)?;
    Ok(Signature::from_bytes(&bytes))
}

/// Check that `signature` is the identity key's signature over the signed
/// prekey bytes.
pub fn verify_pre_key_signature(
    identity_key: &VerifyingKey,
    signed_pre_key: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    identity_key.verify_strict(signed_pre_key, signature)
}

/// Short, log-safe fingerprint of a public key.
pub fn fingerprint(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(&digest[..8])
}

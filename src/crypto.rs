//! Key material for the Ed25519 2020 signature suite
//!
//! Keys are exported the way `Ed25519VerificationKey2020` documents carry
//! them: multibase base58btc over a multicodec-prefixed byte string.

use ed25519_dalek::{SigningKey, VerifyingKey};
use multibase::Base;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

use crate::error::{ApiError, ApiResult};
use crate::types::{KeyPair, KeyType};

/// Multicodec prefix of an Ed25519 public key
const ED25519_PUB_CODEC: [u8; 2] = [0xed, 0x01];
/// Multicodec prefix of an Ed25519 private key (seed followed by public key)
const ED25519_PRIV_CODEC: [u8; 2] = [0x80, 0x26];

const ID_LENGTH: usize = 28;

/// Generate a key pair for the given signature suite.
///
/// No persistence happens here, the caller stores the result.
pub fn create_key_pair(key_type: &str) -> ApiResult<KeyPair> {
    let key_type: KeyType = key_type.parse().map_err(|_| {
        ApiError::improper_payload(format!(
            "Invalid key type {key_type}, expected '{}'.",
            KeyType::Ed25519VerificationKey2020
        ))
    })?;

    match key_type {
        KeyType::Ed25519VerificationKey2020 => {
            let signing_key = SigningKey::generate(&mut OsRng);
            Ok(KeyPair {
                key_type,
                public: encode_public_key(&signing_key.verifying_key()),
                private: encode_private_key(&signing_key),
            })
        }
    }
}

pub fn encode_public_key(key: &VerifyingKey) -> String {
    let mut bytes = ED25519_PUB_CODEC.to_vec();
    bytes.extend_from_slice(key.as_bytes());
    multibase::encode(Base::Base58Btc, bytes)
}

pub fn encode_private_key(key: &SigningKey) -> String {
    let mut bytes = ED25519_PRIV_CODEC.to_vec();
    bytes.extend_from_slice(&key.to_keypair_bytes());
    multibase::encode(Base::Base58Btc, bytes)
}

pub fn decode_public_key(encoded: &str) -> ApiResult<VerifyingKey> {
    let bytes = decode_multicodec(encoded, ED25519_PUB_CODEC)?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ApiError::internal("Ed25519 public key must be 32 bytes"))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ApiError::internal(e.to_string()))
}

/// Decode stored private key material. Also checks that the embedded public
/// half belongs to the seed.
pub fn decode_private_key(encoded: &str) -> ApiResult<SigningKey> {
    let bytes = decode_multicodec(encoded, ED25519_PRIV_CODEC)?;
    let bytes: [u8; 64] = bytes
        .try_into()
        .map_err(|_| ApiError::internal("Ed25519 private key must be 64 bytes"))?;
    SigningKey::from_keypair_bytes(&bytes).map_err(|e| ApiError::internal(e.to_string()))
}

fn decode_multicodec(encoded: &str, codec: [u8; 2]) -> ApiResult<Vec<u8>> {
    let (base, bytes) = multibase::decode(encoded)
        .map_err(|e| ApiError::internal(format!("Invalid multibase key: {e}")))?;
    if base != Base::Base58Btc {
        return Err(ApiError::internal("Key material must be base58btc encoded"));
    }
    match bytes.strip_prefix(&codec[..]) {
        Some(rest) => Ok(rest.to_vec()),
        None => Err(ApiError::internal("Unexpected multicodec prefix on key material")),
    }
}

/// Random 28 character alphanumeric token, used for record ids and proof challenges
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, Verifier};

    #[test]
    fn test_create_key_pair() {
        let pair = create_key_pair("Ed25519VerificationKey2020").unwrap();
        // base58btc multibase prefix, and the well known `z6Mk` for ed25519 public keys
        assert!(pair.public.starts_with("z6Mk"));
        assert!(pair.private.starts_with('z'));

        let signing_key = decode_private_key(&pair.private).unwrap();
        let verifying_key = decode_public_key(&pair.public).unwrap();
        assert_eq!(signing_key.verifying_key(), verifying_key);

        let signature = signing_key.sign(b"hello");
        assert!(verifying_key.verify(b"hello", &signature).is_ok());
    }

    #[test]
    fn test_create_key_pair_is_fresh() {
        let a = create_key_pair("Ed25519VerificationKey2020").unwrap();
        let b = create_key_pair("Ed25519VerificationKey2020").unwrap();
        assert_ne!(a.public, b.public);
        assert_ne!(a.private, b.private);
    }

    #[test]
    fn test_unsupported_key_type() {
        let err = create_key_pair("RsaVerificationKey2018").unwrap_err();
        assert_eq!(err.code(), "improper-payload");
        assert!(err.to_string().contains("RsaVerificationKey2018"));
    }

    #[test]
    fn test_public_key_is_not_a_private_key() {
        let pair = create_key_pair("Ed25519VerificationKey2020").unwrap();
        assert!(decode_private_key(&pair.public).is_err());
        assert!(decode_public_key(&pair.private).is_err());
    }

    #[test]
    fn test_generate_id() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a.len(), 28);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}

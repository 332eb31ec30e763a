//! Signing and verifying presentations with `Ed25519Signature2020` proofs
//!
//! The `jws` field holds a detached, unencoded-payload JWS
//! (`<header>..<signature>`). The signed bytes are the SHA-256 of the
//! canonical proof options followed by the SHA-256 of the canonical
//! presentation without its proof.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::crypto::{decode_private_key, decode_public_key};
use crate::did::key_document;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    Credential, Key, KeyDocument, Presentation, Proof, ProofPurpose, ProofType, WebDid,
};

const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";

/// Everything needed to sign on behalf of one key. Lives for a single
/// issuance and is never persisted.
pub struct SigningContext {
    pub document: KeyDocument,
    signing_key: SigningKey,
}

impl SigningContext {
    pub fn verification_method(&self) -> &WebDid {
        &self.document.assertion_method[0].id
    }
}

/// Bind a stored key to its `did:web` identity for one signing call.
pub fn build_signing_context(key: &Key, domain: &str) -> ApiResult<SigningContext> {
    let document = key_document(key, domain, true);
    let signing_key = decode_private_key(&key.private)?;

    if decode_public_key(&key.public)? != signing_key.verifying_key() {
        return Err(ApiError::internal(format!(
            "Stored key {} has mismatched public and private halves",
            key.id
        )));
    }

    Ok(SigningContext {
        document,
        signing_key,
    })
}

/// Check every credential against the credential shape. The first offending
/// credential is reported by its position in the input.
pub fn parse_credentials(credentials: &[Value]) -> ApiResult<Vec<Credential>> {
    credentials
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let credential: Credential = serde_json::from_value(value.clone()).map_err(|e| {
                ApiError::improper_payload(format!("Credential {index} is malformed: {e}"))
            })?;

            let typed = match &credential.kind {
                Value::String(s) => s == "VerifiableCredential",
                Value::Array(types) => types
                    .iter()
                    .any(|t| t.as_str() == Some("VerifiableCredential")),
                _ => false,
            };
            if !typed {
                return Err(ApiError::improper_payload(format!(
                    "Credential {index} is malformed: its type must include 'VerifiableCredential'"
                )));
            }

            Ok(credential)
        })
        .collect()
}

/// Build and sign a presentation of `credentials` for `holder`.
///
/// Fails before signing anything if a credential is malformed.
pub fn sign_presentation(
    context: &SigningContext,
    credentials: &[Value],
    id: WebDid,
    holder: WebDid,
    challenge: String,
) -> ApiResult<Presentation> {
    let verifiable_credential = parse_credentials(credentials)?;

    let mut presentation = Presentation {
        context: vec![json!(CREDENTIALS_CONTEXT), json!(ED25519_2020_CONTEXT)],
        id,
        kind: json!(["VerifiablePresentation"]),
        holder,
        verifiable_credential,
        proof: Proof {
            proof_type: ProofType::Ed25519Signature2020,
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            proof_purpose: ProofPurpose::Authentication,
            verification_method: context.verification_method().clone(),
            challenge: Some(challenge),
            domain: None,
            jws: String::new(),
        },
        extra: Map::new(),
    };

    let header = encoded_header();
    let message = signing_input(&header, &presentation)?;
    let signature = context.signing_key.sign(&message);
    presentation.proof.jws = format!("{header}..{}", BASE64URL.encode(signature.to_bytes()));

    Ok(presentation)
}

/// Check the proof on `presentation` against a multibase public key.
pub fn verify_presentation(presentation: &Presentation, public_key: &str) -> ApiResult<()> {
    let verifying_key: VerifyingKey = decode_public_key(public_key)?;

    let (header, signature) = presentation
        .proof
        .jws
        .split_once("..")
        .ok_or_else(|| ApiError::improper_payload("The proof is not a detached JWS"))?;
    if header != encoded_header() {
        return Err(ApiError::improper_payload("Unsupported JWS header"));
    }

    let signature = BASE64URL
        .decode(signature)
        .map_err(|e| ApiError::improper_payload(format!("Invalid JWS signature: {e}")))?;
    let signature: [u8; 64] = signature
        .try_into()
        .map_err(|_| ApiError::improper_payload("Ed25519 signature must be 64 bytes"))?;

    let message = signing_input(header, presentation)?;
    verifying_key
        .verify(&message, &Signature::from_bytes(&signature))
        .map_err(|_| ApiError::precondition("The presentation proof does not verify"))
}

fn encoded_header() -> String {
    let header = json!({"alg": "EdDSA", "b64": false, "crit": ["b64"]});
    BASE64URL.encode(header.to_string())
}

fn signing_input(header: &str, presentation: &Presentation) -> ApiResult<Vec<u8>> {
    let mut options = to_object(&presentation.proof)?;
    options.remove("jws");
    options.insert("@context".into(), json!(presentation.context));

    let mut document = to_object(presentation)?;
    document.remove("proof");

    let mut message = header.as_bytes().to_vec();
    message.push(b'.');
    message.extend_from_slice(&canonical_digest(&Value::Object(options))?);
    message.extend_from_slice(&canonical_digest(&Value::Object(document))?);
    Ok(message)
}

fn to_object<T: Serialize>(value: &T) -> ApiResult<Map<String, Value>> {
    match serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::internal("expected a JSON object")),
    }
}

fn canonical_digest(value: &Value) -> ApiResult<[u8; 32]> {
    let canonical =
        canonical_json::to_string(value).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Sha256::digest(canonical.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::create_key_pair;
    use crate::types::KeyType;

    fn test_key() -> Key {
        let pair = create_key_pair("Ed25519VerificationKey2020").unwrap();
        Key {
            id: "key1".into(),
            name: "signer".into(),
            key_type: KeyType::Ed25519VerificationKey2020,
            created: "2024-01-01T00:00:00Z".into(),
            public: pair.public,
            private: pair.private,
        }
    }

    fn credential(subject: Value) -> Value {
        json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential", "CourseCompletion"],
            "issuer": "did:web:school.example",
            "issuanceDate": "2022-05-01T00:00:00Z",
            "credentialSubject": subject,
            "proof": {"type": "Ed25519Signature2020", "jws": "abc"}
        })
    }

    fn sign(key: &Key, credentials: &[Value]) -> ApiResult<Presentation> {
        let context = build_signing_context(key, "vp.example")?;
        sign_presentation(
            &context,
            credentials,
            "did:web:vp.example:presentations:p1".into(),
            "did:web:alice.example".into(),
            "challenge1".into(),
        )
    }

    #[test]
    fn test_signing_context() {
        let key = test_key();
        let context = build_signing_context(&key, "vp.example").unwrap();
        assert_eq!(context.verification_method(), "did:web:vp.example:keys:key1");
        assert_eq!(context.document.id, "did:web:vp.example:keys:key1");
        assert_eq!(context.document.authentication.len(), 1);
    }

    #[test]
    fn test_signing_context_rejects_mismatched_halves() {
        let mut key = test_key();
        key.public = test_key().public;
        assert!(build_signing_context(&key, "vp.example").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let key = test_key();
        let credentials = vec![
            credential(json!({"id": "did:web:alice.example", "course": "Rust"})),
            credential(json!({"id": "did:web:alice.example", "grade": "A"})),
        ];

        let presentation = sign(&key, &credentials).unwrap();
        assert_eq!(presentation.holder, "did:web:alice.example");
        assert_eq!(presentation.kind, json!(["VerifiablePresentation"]));
        assert_eq!(presentation.proof.proof_purpose, ProofPurpose::Authentication);
        assert_eq!(presentation.proof.challenge.as_deref(), Some("challenge1"));
        assert_eq!(
            presentation.proof.verification_method,
            "did:web:vp.example:keys:key1"
        );
        assert!(presentation.proof.jws.contains(".."));

        let embedded: Vec<Value> = presentation
            .verifiable_credential
            .iter()
            .map(|c| serde_json::to_value(c).unwrap())
            .collect();
        assert_eq!(embedded, credentials);

        verify_presentation(&presentation, &key.public).unwrap();
    }

    #[test]
    fn test_tampering_breaks_the_proof() {
        let key = test_key();
        let mut presentation =
            sign(&key, &[credential(json!({"id": "did:web:alice.example"}))]).unwrap();

        presentation.holder = "did:web:mallory.example".into();
        let err = verify_presentation(&presentation, &key.public).unwrap_err();
        assert_eq!(err.code(), "precondition-failed");
    }

    #[test]
    fn test_wrong_key_does_not_verify() {
        let presentation =
            sign(&test_key(), &[credential(json!({"id": "did:web:alice.example"}))]).unwrap();
        assert!(verify_presentation(&presentation, &test_key().public).is_err());
    }

    #[test]
    fn test_malformed_credential_fails_closed() {
        let key = test_key();
        let mut broken = credential(json!({"name": "Bob"}));
        broken.as_object_mut().unwrap().remove("issuer");

        let err = sign(&key, &[credential(json!({"name": "Alice"})), broken]).unwrap_err();
        assert_eq!(err.code(), "improper-payload");
        assert!(err.to_string().contains("Credential 1"));
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_credential_must_be_verifiable() {
        let mut value = credential(json!({"name": "Alice"}));
        value["type"] = json!(["SomethingElse"]);
        let err = parse_credentials(&[value]).unwrap_err();
        assert!(err.to_string().contains("VerifiableCredential"));

        let err = parse_credentials(&[json!("not an object")]).unwrap_err();
        assert!(err.to_string().contains("Credential 0"));
    }
}

//! `did:web` resolution and key documents
//!
//! A `did:web` identifier names a host and an optional path:
//! `did:web:example.com` lives at `https://example.com/.well-known/did.json`,
//! `did:web:example.com:templates:abc` at `https://example.com/templates/abc/did.json`.
//! A port is written percent-encoded in the host segment (`localhost%3A4242`).

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::error::ApiError;
use crate::types::{Key, KeyDocument, VerificationMethod, WebDid};

const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";

#[derive(Debug, thiserror::Error)]
pub enum DidError {
    #[error("{0} is not a valid did:web identifier")]
    InvalidDid(String),
    #[error("Could not resolve DID {0}.")]
    NotFound(String),
    #[error("Could not resolve DID {did}: {source}")]
    Fetch {
        did: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Could not resolve DID {did}: {reason}")]
    InvalidDocument { did: String, reason: String },
}

impl From<DidError> for ApiError {
    fn from(err: DidError) -> Self {
        match err {
            DidError::NotFound(_) => ApiError::EntityNotFound(err.to_string()),
            DidError::InvalidDid(_) => ApiError::ImproperPayload(err.to_string()),
            DidError::Fetch { ref source, .. } if source.is_timeout() => {
                ApiError::BackendTimeout(err.to_string())
            }
            DidError::Fetch { .. } | DidError::InvalidDocument { .. } => {
                ApiError::BackendUnreachable(err.to_string())
            }
        }
    }
}

/// Characters that would let a host or path segment escape its position in the URL
const RESERVED: &[char] = &['/', '?', '#', '@', '\\', ' '];

/// Build the location of the document a `did:web` identifier points at.
pub fn did_web_url(did: &str, scheme: &str) -> Result<Url, DidError> {
    let invalid = || DidError::InvalidDid(did.to_string());

    let specific = did.strip_prefix("did:web:").ok_or_else(invalid)?;
    let mut segments = specific.split(':');
    let host = segments
        .next()
        .filter(|h| !h.is_empty() && !h.contains(RESERVED))
        .ok_or_else(invalid)?
        .replace("%3A", ":")
        .replace("%3a", ":");

    let path: Vec<&str> = segments.collect();
    if path.iter().any(|s| s.is_empty() || s.contains(RESERVED)) {
        return Err(invalid());
    }

    let mut url = Url::parse(&format!("{scheme}://{host}/")).map_err(|_| invalid())?;
    if url.host_str().is_none() {
        return Err(invalid());
    }

    let path = if path.is_empty() {
        vec![".well-known"]
    } else {
        path
    };
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(path)
        .push("did.json");

    Ok(url)
}

/// Resolves `did:web` identifiers over HTTP
#[derive(Clone)]
pub struct DidResolver {
    client: Client,
    scheme: String,
}

impl DidResolver {
    pub fn with_client(client: Client, scheme: impl Into<String>) -> Self {
        Self {
            client,
            scheme: scheme.into(),
        }
    }

    /// Fetch the document for `did`.
    ///
    /// Only a 404/410 from the document host counts as "not found". Transport
    /// failures and malformed documents come back as distinct errors.
    pub async fn resolve(&self, did: &str) -> Result<Value, DidError> {
        let url = did_web_url(did, &self.scheme)?;
        tracing::debug!("Resolving {} via {}", did, url);

        let fetch_err = |source| DidError::Fetch {
            did: did.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(fetch_err)?;
        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(DidError::NotFound(did.to_string()))
            }
            status if !status.is_success() => {
                return Err(DidError::InvalidDocument {
                    did: did.to_string(),
                    reason: format!("document host answered {status}"),
                })
            }
            _ => {}
        }

        let document: Value = resp.json().await.map_err(fetch_err)?;
        match document.get("id").and_then(Value::as_str) {
            Some(id) if id == did => Ok(document),
            Some(id) => Err(DidError::InvalidDocument {
                did: did.to_string(),
                reason: format!("document describes {id}"),
            }),
            None => Err(DidError::InvalidDocument {
                did: did.to_string(),
                reason: "document has no id".into(),
            }),
        }
    }
}

pub fn key_did(domain: &str, key_id: &str) -> WebDid {
    format!("did:web:{domain}:keys:{key_id}")
}

pub fn presentation_did(domain: &str, id: &str) -> WebDid {
    format!("did:web:{domain}:presentations:{id}")
}

pub fn template_did(domain: &str, id: &str) -> WebDid {
    format!("did:web:{domain}:templates:{id}")
}

/// DID document for `key`, controlled by `did:web:<domain>`.
///
/// `with_private` embeds the private half into the `authentication` and
/// `assertionMethod` entries. That form is only ever built in memory to
/// drive a signature and must not be stored or returned.
pub fn key_document(key: &Key, domain: &str, with_private: bool) -> KeyDocument {
    let did = key_did(domain, &key.id);
    let method = VerificationMethod {
        id: did.clone(),
        key_type: key.key_type,
        controller: format!("did:web:{domain}"),
        public_key_multibase: key.public.clone(),
        private_key_multibase: with_private.then(|| key.private.clone()),
    };

    KeyDocument {
        context: vec![DID_CONTEXT.into(), ED25519_2020_CONTEXT.into()],
        id: did,
        authentication: vec![method.clone()],
        assertion_method: vec![method],
    }
}

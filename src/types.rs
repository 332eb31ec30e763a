//! Core types shared by the generator, renderer, registry and template store
//!
//! Wire names follow the JSON-LD vocabulary (`@context`, `credentialSubject`,
//! `publicKeyMultibase`, ...), so most structs carry serde renames.

use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Entity;

/// A `did:web` identifier
pub type WebDid = String;

/// Identifier of a stored key
pub type KeyId = String;

/// URL of a downstream service
pub type Url = String;

// ============ Envelope ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Success envelope: `{meta: {status}, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    pub fn with_status(status: StatusCode, data: T) -> Self {
        Self {
            meta: Meta {
                status: status.as_u16(),
            },
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Body of a successful delete: sent with HTTP 200, `meta.status` is 204
    pub fn no_content() -> Self {
        Self {
            meta: Meta {
                status: StatusCode::NO_CONTENT.as_u16(),
            },
            data: None,
        }
    }
}

/// Failure envelope: `{meta: {status}, error: {code, message}}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub meta: Meta,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            meta: Meta {
                status: status.as_u16(),
            },
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Either envelope, as received from a downstream service
#[derive(Debug, Deserialize)]
pub struct IncomingEnvelope {
    pub meta: Meta,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

// ============ Keys ============

/// Signature suites a key can be generated for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyType {
    Ed25519VerificationKey2020,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519VerificationKey2020 => "Ed25519VerificationKey2020",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ed25519VerificationKey2020" => Ok(KeyType::Ed25519VerificationKey2020),
            _ => Err(()),
        }
    }
}

/// Suite-encoded key material
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub key_type: KeyType,
    pub public: String,
    pub private: String,
}

/// Stored signing key. Only the generator's store ever holds `private`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub created: String,
    pub public: String,
    pub private: String,
}

/// Key as returned to API callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub id: KeyId,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub created: String,
    pub public: String,
}

impl From<&Key> for KeyInfo {
    fn from(k: &Key) -> Self {
        Self {
            id: k.id.clone(),
            name: k.name.clone(),
            key_type: k.key_type,
            created: k.created.clone(),
            public: k.public.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    /// Checked by the key material provider, so an unsupported suite is named in the error
    #[serde(rename = "type")]
    pub key_type: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKeyRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

// ============ DID documents ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: WebDid,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub controller: WebDid,
    pub public_key_multibase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_multibase: Option<String>,
}

/// DID document describing a single key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: WebDid,
    pub authentication: Vec<VerificationMethod>,
    pub assertion_method: Vec<VerificationMethod>,
}

// ============ Applications ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateConfiguration {
    pub id: WebDid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEndpoint {
    pub api: Url,
}

/// Tenant configuration: which template to render, which services to call, which keys sign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub template: TemplateConfiguration,
    pub renderer: ServiceEndpoint,
    pub registry: ServiceEndpoint,
    pub keys: Vec<KeyId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    pub template: TemplateConfiguration,
    pub renderer: ServiceEndpoint,
    pub registry: ServiceEndpoint,
    pub keys: Vec<KeyId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateApplicationRequest {
    pub name: Option<String>,
    pub template: Option<TemplateConfiguration>,
    pub renderer: Option<ServiceEndpoint>,
    pub registry: Option<ServiceEndpoint>,
    pub keys: Option<Vec<KeyId>>,
}

/// Body of `POST /applications/{id}/issue`
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRequest {
    /// Checked against the credential shape while signing
    pub credentials: Vec<Value>,
    /// Passed through to the renderer, which owns the set of formats
    pub output: String,
    pub holder: WebDid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedPresentation {
    pub certificate: Value,
    pub presentation: Presentation,
}

// ============ Credentials & presentations ============

/// Externally issued credential. Only `credentialSubject` is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    #[serde(rename = "type")]
    pub kind: Value,
    pub issuer: Value,
    #[serde(rename = "issuanceDate")]
    pub issuance_date: String,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: Map<String, Value>,
    pub proof: Value,
    /// Everything else, `id` included, carried as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    /// `credentialSubject.id`, when it is a string
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProofType {
    Ed25519Signature2020,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    Authentication,
    AssertionMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: ProofType,
    pub created: String,
    pub proof_purpose: ProofPurpose,
    pub verification_method: WebDid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub jws: String,
}

/// Signed bundle of credentials addressed to a holder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Presentation {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    pub id: WebDid,
    #[serde(rename = "type")]
    pub kind: Value,
    pub holder: WebDid,
    #[serde(rename = "verifiableCredential")]
    pub verifiable_credential: Vec<Credential>,
    pub proof: Proof,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubjectQuery {
    pub subject: Option<String>,
}

// ============ Templates & rendering ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
    Ejs,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Htm,
}

/// Template body as sent to the renderer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub template: String,
    pub renderer: TemplateEngine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// Template as held by the template store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateRecord {
    pub id: String,
    #[serde(flatten)]
    pub body: Template,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub template: Template,
    pub data: Map<String, Value>,
    pub output: OutputFormat,
}

// ============ Store entities ============

impl Entity for Key {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Application {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Presentation {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for TemplateRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

// ============ Misc ============

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::crypto::{create_key_pair, generate_id};
use crate::did::key_document;
use crate::error::{ApiError, ApiResult};
use crate::issuer::Issuer;
use crate::store::{find, position, JsonStore};
use crate::types::*;

/// Document persisted by the generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorData {
    #[serde(default)]
    pub keys: Vec<Key>,
    #[serde(default)]
    pub applications: Vec<Application>,
}

pub struct GeneratorState {
    store: JsonStore<GeneratorData>,
    issuer: Issuer,
    pub config: Config,
}

fn key_not_found() -> ApiError {
    ApiError::not_found("A key with the specified ID does not exist.")
}

fn application_not_found() -> ApiError {
    ApiError::not_found("An application with the specified ID does not exist.")
}

/// Every listed key must exist, and there must be at least one to sign with.
fn check_keys(keys: &[KeyId], stored: &[Key]) -> ApiResult<()> {
    if keys.is_empty() {
        return Err(ApiError::improper_payload(
            "An application needs at least one key to sign presentations with.",
        ));
    }
    match keys.iter().find(|id| find(stored, id).is_none()) {
        Some(missing) => Err(ApiError::not_found(format!(
            "A keypair with the ID {missing} was not found."
        ))),
        None => Ok(()),
    }
}

impl GeneratorState {
    pub async fn open(config: Config) -> anyhow::Result<Arc<Self>> {
        let store = JsonStore::open(config.database_path()).await?;
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> anyhow::Result<Arc<Self>> {
        Self::with_store(config, JsonStore::in_memory())
    }

    fn with_store(config: Config, store: JsonStore<GeneratorData>) -> anyhow::Result<Arc<Self>> {
        let issuer = Issuer::new(&config)?;
        Ok(Arc::new(Self {
            store,
            issuer,
            config,
        }))
    }

    // ============ Keys ============

    pub async fn list_keys(&self, name: Option<&str>) -> Vec<KeyInfo> {
        self.store
            .read(|d| {
                d.keys
                    .iter()
                    .filter(|k| name.map_or(true, |n| k.name == n))
                    .map(KeyInfo::from)
                    .collect()
            })
            .await
    }

    pub async fn create_key(&self, req: CreateKeyRequest) -> ApiResult<KeyInfo> {
        let pair = create_key_pair(&req.key_type)?;
        let key = Key {
            id: generate_id(),
            name: req.name,
            key_type: pair.key_type,
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            public: pair.public,
            private: pair.private,
        };
        let info = KeyInfo::from(&key);

        self.store
            .write(|d| {
                d.keys.push(key);
                Ok(())
            })
            .await?;

        tracing::info!("Created {} key {} ({})", info.key_type, info.id, info.name);
        Ok(info)
    }

    pub async fn get_key(&self, id: &str) -> ApiResult<KeyInfo> {
        self.store
            .read(|d| find(&d.keys, id).map(KeyInfo::from))
            .await
            .ok_or_else(key_not_found)
    }

    pub async fn rename_key(&self, id: &str, req: UpdateKeyRequest) -> ApiResult<KeyInfo> {
        let info = self
            .store
            .write(|d| {
                let index = position(&d.keys, id).ok_or_else(key_not_found)?;
                d.keys[index].name = req.name;
                Ok(KeyInfo::from(&d.keys[index]))
            })
            .await?;

        tracing::info!("Renamed key {} to {}", info.id, info.name);
        Ok(info)
    }

    /// Refused while any application still lists the key.
    pub async fn delete_key(&self, id: &str) -> ApiResult<()> {
        self.store
            .write(|d| {
                let index = position(&d.keys, id).ok_or_else(key_not_found)?;
                if let Some(app) = d.applications.iter().find(|a| a.keys.iter().any(|k| k == id)) {
                    tracing::warn!("Refusing to delete key {} used by {}", id, app.id);
                    return Err(ApiError::precondition(format!(
                        "This key is being used by the application {}. Please unlink the key from the application before deleting it.",
                        app.name
                    )));
                }
                d.keys.remove(index);
                Ok(())
            })
            .await?;

        tracing::info!("Deleted key {}", id);
        Ok(())
    }

    /// Public DID document of a stored key
    pub async fn key_document(&self, id: &str) -> ApiResult<KeyDocument> {
        self.store
            .read(|d| find(&d.keys, id).map(|k| key_document(k, &self.config.domain, false)))
            .await
            .ok_or_else(key_not_found)
    }

    // ============ Applications ============

    pub async fn list_applications(&self, name: Option<&str>) -> Vec<Application> {
        self.store
            .read(|d| {
                d.applications
                    .iter()
                    .filter(|a| name.map_or(true, |n| a.name == n))
                    .cloned()
                    .collect()
            })
            .await
    }

    pub async fn create_application(&self, req: CreateApplicationRequest) -> ApiResult<Application> {
        let app = Application {
            id: generate_id(),
            name: req.name,
            template: req.template,
            renderer: req.renderer,
            registry: req.registry,
            keys: req.keys,
        };

        let app = self
            .store
            .write(|d| {
                check_keys(&app.keys, &d.keys)?;
                d.applications.push(app.clone());
                Ok(app)
            })
            .await?;

        tracing::info!("Created application {} ({})", app.id, app.name);
        Ok(app)
    }

    pub async fn get_application(&self, id: &str) -> ApiResult<Application> {
        self.store
            .read(|d| find(&d.applications, id).cloned())
            .await
            .ok_or_else(application_not_found)
    }

    /// Apply the fields present in `req`, keeping the application at its position.
    pub async fn update_application(
        &self,
        id: &str,
        req: UpdateApplicationRequest,
    ) -> ApiResult<Application> {
        let app = self
            .store
            .write(|d| {
                let index = position(&d.applications, id).ok_or_else(application_not_found)?;
                let mut app = d.applications[index].clone();

                if let Some(name) = req.name {
                    app.name = name;
                }
                if let Some(template) = req.template {
                    app.template = template;
                }
                if let Some(renderer) = req.renderer {
                    app.renderer = renderer;
                }
                if let Some(registry) = req.registry {
                    app.registry = registry;
                }
                if let Some(keys) = req.keys {
                    check_keys(&keys, &d.keys)?;
                    app.keys = keys;
                }

                d.applications[index] = app.clone();
                Ok(app)
            })
            .await?;

        tracing::info!("Updated application {}", app.id);
        Ok(app)
    }

    pub async fn delete_application(&self, id: &str) -> ApiResult<()> {
        self.store
            .write(|d| {
                let index = position(&d.applications, id).ok_or_else(application_not_found)?;
                d.applications.remove(index);
                Ok(())
            })
            .await?;

        tracing::info!("Deleted application {}", id);
        Ok(())
    }

    // ============ Issuance ============

    /// Issue a presentation for an application, signed with its first key.
    ///
    /// The store is only read up front; no lock is held across the outbound calls.
    pub async fn issue(&self, app_id: &str, req: IssueRequest) -> ApiResult<IssuedPresentation> {
        let (app, key) = self
            .store
            .read(|d| {
                let app = find(&d.applications, app_id)
                    .cloned()
                    .ok_or_else(application_not_found)?;
                let key_id = app.keys.first().ok_or_else(|| {
                    ApiError::not_found(format!("The application {} has no keys.", app.id))
                })?;
                let key = find(&d.keys, key_id).cloned().ok_or_else(|| {
                    ApiError::not_found(format!("A keypair with the ID {key_id} was not found."))
                })?;
                Ok::<_, ApiError>((app, key))
            })
            .await?;

        tracing::debug!("Issuing for application {} with key {}", app.id, key.id);
        self.issuer.issue_presentation(&app, &key, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Service;

    fn state() -> Arc<GeneratorState> {
        let mut config = Config::for_service(Service::Generator);
        config.domain = "vp.example".into();
        GeneratorState::in_memory(config).unwrap()
    }

    async fn create_key(state: &GeneratorState, name: &str) -> KeyInfo {
        state
            .create_key(CreateKeyRequest {
                name: name.into(),
                key_type: "Ed25519VerificationKey2020".into(),
            })
            .await
            .unwrap()
    }

    fn app_request(keys: Vec<KeyId>) -> CreateApplicationRequest {
        CreateApplicationRequest {
            name: "Course certificates".into(),
            template: TemplateConfiguration {
                id: "did:web:templates.example:templates:t1".into(),
            },
            renderer: ServiceEndpoint {
                api: "http://renderer.example".into(),
            },
            registry: ServiceEndpoint {
                api: "http://registry.example".into(),
            },
            keys,
        }
    }

    fn issue_request() -> IssueRequest {
        IssueRequest {
            credentials: vec![],
            output: "htm".into(),
            holder: "did:web:alice.example".into(),
        }
    }

    #[tokio::test]
    async fn test_key_lifecycle() {
        let state = state();
        let key = create_key(&state, "signer").await;
        create_key(&state, "other").await;

        assert_eq!(state.list_keys(None).await.len(), 2);
        let named = state.list_keys(Some("signer")).await;
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].id, key.id);

        let renamed = state
            .rename_key(&key.id, UpdateKeyRequest { name: "renamed".into() })
            .await
            .unwrap();
        assert_eq!(renamed.name, "renamed");
        assert_eq!(renamed.public, key.public);
        // still first
        assert_eq!(state.list_keys(None).await[0].id, key.id);

        state.delete_key(&key.id).await.unwrap();
        let err = state.get_key(&key.id).await.unwrap_err();
        assert_eq!(err.code(), "entity-not-found");
    }

    #[tokio::test]
    async fn test_unsupported_key_type() {
        let err = state()
            .create_key(CreateKeyRequest {
                name: "rsa".into(),
                key_type: "RsaVerificationKey2018".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "improper-payload");
        assert!(err.to_string().contains("RsaVerificationKey2018"));
    }

    #[tokio::test]
    async fn test_key_document_has_no_private_material() {
        let state = state();
        let key = create_key(&state, "signer").await;
        let doc = state.key_document(&key.id).await.unwrap();

        assert_eq!(doc.id, format!("did:web:vp.example:keys:{}", key.id));
        assert_eq!(doc.assertion_method[0].public_key_multibase, key.public);
        assert!(doc.authentication[0].private_key_multibase.is_none());
        assert!(!serde_json::to_string(&doc).unwrap().contains("privateKeyMultibase"));
    }

    #[tokio::test]
    async fn test_referenced_key_cannot_be_deleted() {
        let state = state();
        let used = create_key(&state, "used").await;
        let unused = create_key(&state, "unused").await;
        let app = state
            .create_application(app_request(vec![used.id.clone()]))
            .await
            .unwrap();

        let err = state.delete_key(&used.id).await.unwrap_err();
        assert_eq!(err.code(), "precondition-failed");
        assert!(err.to_string().contains(&app.name));
        assert!(state.get_key(&used.id).await.is_ok());

        state.delete_key(&unused.id).await.unwrap();

        state.delete_application(&app.id).await.unwrap();
        state.delete_key(&used.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_application_key_validation() {
        let state = state();

        let err = state
            .create_application(app_request(vec!["missing".into()]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "entity-not-found");
        assert!(err.to_string().contains("missing"));

        let err = state.create_application(app_request(vec![])).await.unwrap_err();
        assert_eq!(err.code(), "improper-payload");

        assert!(state.list_applications(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_application_in_place() {
        let state = state();
        let k1 = create_key(&state, "k1").await;
        let k2 = create_key(&state, "k2").await;
        let first = state
            .create_application(app_request(vec![k1.id.clone()]))
            .await
            .unwrap();
        let second = state
            .create_application(app_request(vec![k1.id.clone()]))
            .await
            .unwrap();

        let updated = state
            .update_application(
                &first.id,
                UpdateApplicationRequest {
                    name: Some("Renamed".into()),
                    keys: Some(vec![k2.id.clone(), k1.id.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.keys, vec![k2.id.clone(), k1.id.clone()]);
        assert_eq!(updated.template, first.template);

        let apps = state.list_applications(None).await;
        assert_eq!(apps[0].id, first.id);
        assert_eq!(apps[1].id, second.id);
        assert_eq!(state.list_applications(Some("Renamed")).await.len(), 1);

        let err = state
            .update_application(
                &first.id,
                UpdateApplicationRequest {
                    keys: Some(vec!["nope".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "entity-not-found");
        assert_eq!(state.get_application(&first.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_issue_for_unknown_application() {
        let err = state().issue("nope", issue_request()).await.unwrap_err();
        assert_eq!(err.code(), "entity-not-found");
    }

    #[tokio::test]
    async fn test_issue_with_vanished_key() {
        let state = state();
        let key = create_key(&state, "signer").await;
        let app = state
            .create_application(app_request(vec![key.id.clone()]))
            .await
            .unwrap();

        // bypass the reference check to simulate a corrupted document
        state
            .store
            .write(|d| {
                d.keys.clear();
                Ok(())
            })
            .await
            .unwrap();

        let err = state.issue(&app.id, issue_request()).await.unwrap_err();
        assert_eq!(err.code(), "entity-not-found");
        assert!(err.to_string().contains(&key.id));
    }
}

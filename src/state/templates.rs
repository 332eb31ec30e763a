use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::crypto::generate_id;
use crate::did::template_did;
use crate::error::{ApiError, ApiResult};
use crate::render::compile_schema;
use crate::store::{find, JsonStore};
use crate::types::{Template, TemplateRecord};

const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Document persisted by the template store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateData {
    #[serde(default)]
    pub templates: Vec<TemplateRecord>,
}

pub struct TemplateStoreState {
    store: JsonStore<TemplateData>,
    pub config: Config,
}

fn template_not_found() -> ApiError {
    ApiError::not_found("A template with the specified ID does not exist.")
}

impl TemplateStoreState {
    pub async fn open(config: Config) -> anyhow::Result<Arc<Self>> {
        let store = JsonStore::open(config.database_path()).await?;
        Ok(Arc::new(Self { store, config }))
    }

    pub fn in_memory(config: Config) -> Arc<Self> {
        Arc::new(Self {
            store: JsonStore::in_memory(),
            config,
        })
    }

    pub async fn list(&self) -> Vec<TemplateRecord> {
        self.store.read(|d| d.templates.clone()).await
    }

    /// Register a template. A schema that does not compile is refused here
    /// rather than at render time.
    pub async fn create(&self, template: Template) -> ApiResult<TemplateRecord> {
        if let Some(schema) = &template.schema {
            compile_schema(schema)?;
        }

        let record = TemplateRecord {
            id: generate_id(),
            body: template,
        };
        let record = self
            .store
            .write(|d| {
                d.templates.push(record.clone());
                Ok(record)
            })
            .await?;

        tracing::info!("Stored template {}", record.id);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> ApiResult<TemplateRecord> {
        self.store
            .read(|d| find(&d.templates, id).cloned())
            .await
            .ok_or_else(template_not_found)
    }

    /// The document `did:web:<domain>:templates:<id>` resolves to
    pub async fn did_document(&self, id: &str) -> ApiResult<Value> {
        let record = self.get(id).await?;

        let body = match serde_json::to_value(&record.body) {
            Ok(Value::Object(body)) => body,
            _ => return Err(ApiError::internal("Could not serialize the template")),
        };

        let mut document = Map::new();
        document.insert("@context".into(), json!([DID_CONTEXT]));
        document.extend(body);
        document.insert(
            "id".into(),
            Value::String(template_did(&self.config.domain, &record.id)),
        );
        Ok(Value::Object(document))
    }
}

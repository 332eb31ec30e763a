use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::store::{find, position, JsonStore};
use crate::types::Presentation;

/// Document persisted by the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryData {
    #[serde(default)]
    pub presentations: Vec<Presentation>,
}

pub struct RegistryState {
    store: JsonStore<RegistryData>,
    pub config: Config,
}

fn presentation_not_found() -> ApiError {
    ApiError::not_found("A presentation with the specified ID does not exist.")
}

impl RegistryState {
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

    /// All presentations, or those where any credential's subject is `subject`.
    pub async fn list(&self, subject: Option<&str>) -> Vec<Presentation> {
        self.store
            .read(|d| {
                d.presentations
                    .iter()
                    .filter(|p| match subject {
                        Some(s) => p
                            .verifiable_credential
                            .iter()
                            .any(|c| c.subject_id() == Some(s)),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .await
    }

    /// Store a presentation and hand it back unchanged.
    pub async fn create(&self, presentation: Presentation) -> ApiResult<Presentation> {
        let stored = self
            .store
            .write(|d| {
                d.presentations.push(presentation.clone());
                Ok(presentation)
            })
            .await?;

        tracing::info!("Registered presentation {}", stored.id);
        Ok(stored)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Presentation> {
        self.store
            .read(|d| find(&d.presentations, id).cloned())
            .await
            .ok_or_else(presentation_not_found)
    }

    /// Replace the presentation stored under `id`, keeping its position.
    pub async fn update(&self, id: &str, presentation: Presentation) -> ApiResult<Presentation> {
        let updated = self
            .store
            .write(|d| {
                let index = position(&d.presentations, id).ok_or_else(presentation_not_found)?;
                d.presentations[index] = presentation.clone();
                Ok(presentation)
            })
            .await?;

        tracing::info!("Updated presentation {}", id);
        Ok(updated)
    }
}

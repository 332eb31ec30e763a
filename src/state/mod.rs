//! Per-service application state
//!
//! Each service owns one [`JsonStore`](crate::store::JsonStore) document plus
//! whatever it needs to talk to other services.

mod generator;
mod registry;
mod templates;

pub use generator::{GeneratorData, GeneratorState};
pub use registry::{RegistryData, RegistryState};
pub use templates::{TemplateData, TemplateStoreState};

use crate::config::Config;
use crate::types::HealthResponse;

pub fn health(config: &Config) -> HealthResponse {
    HealthResponse {
        status: "healthy".into(),
        service: config.service.name().into(),
        version: config.version.clone(),
    }
}

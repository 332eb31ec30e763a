use vp_service::api;
use vp_service::config::{Config, Service};
use vp_service::server;
use vp_service::state::{GeneratorState, RegistryState, TemplateStoreState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing();

    let config = Config::from_env()?;
    tracing::info!("Starting {} v{}", config.service, config.version);
    tracing::info!("Host: {}:{}", config.host, config.port);
    tracing::info!("Domain: {}", config.domain);

    let router = match config.service {
        Service::Generator => {
            tracing::info!("Database: {:?}", config.database_path());
            api::create_generator_router(GeneratorState::open(config.clone()).await?)
        }
        Service::Registry => {
            tracing::info!("Database: {:?}", config.database_path());
            api::create_registry_router(RegistryState::open(config.clone()).await?)
        }
        Service::TemplateStore => {
            tracing::info!("Database: {:?}", config.database_path());
            api::create_template_router(TemplateStoreState::open(config.clone()).await?)
        }
        Service::Renderer => api::create_renderer_router(config.clone()),
    };

    server::serve(&config, router).await
}

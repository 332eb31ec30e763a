use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which of the services this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Generator,
    Renderer,
    Registry,
    TemplateStore,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Generator => "generator",
            Service::Renderer => "renderer",
            Service::Registry => "registry",
            Service::TemplateStore => "template-store",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generator" => Ok(Service::Generator),
            "renderer" => Ok(Service::Renderer),
            "registry" => Ok(Service::Registry),
            "template-store" | "templates" => Ok(Service::TemplateStore),
            other => Err(format!(
                "unknown service '{other}', expected generator, renderer, registry or template-store"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service: Service,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Domain used when minting `did:web` identifiers for keys, presentations and templates
    pub domain: String,
    /// Scheme used to fetch `did:web` documents
    pub did_web_scheme: String,
    /// Bound on every outbound call (renderer, registry, DID documents)
    pub outbound_timeout: Duration,
    /// Bound on every inbound request
    pub request_timeout: Duration,
    pub version: String,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// An unparsable `SERVICE` is a startup error; every other variable falls
    /// back to its default.
    pub fn from_env() -> anyhow::Result<Self> {
        let service = match env::var("SERVICE") {
            Ok(s) => s.parse().map_err(anyhow::Error::msg)?,
            Err(_) => Service::Generator,
        };

        Ok(Self {
            service,
            ..Self::for_service(service)
        })
    }

    /// Environment defaults for a given service, ignoring `SERVICE`.
    pub fn for_service(service: Service) -> Self {
        Self {
            service,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4242),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            domain: env::var("DOMAIN").unwrap_or_else(|_| "localhost".into()),
            did_web_scheme: env::var("DID_WEB_SCHEME").unwrap_or_else(|_| "https".into()),
            outbound_timeout: Duration::from_secs(
                env::var("OUTBOUND_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// The JSON document holding this service's records
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.service.name()))
    }
}

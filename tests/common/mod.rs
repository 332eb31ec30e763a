#![allow(dead_code)]

use std::path::Path;

use axum::Router;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use vp_service::api;
use vp_service::config::{Config, Service};
use vp_service::state::{GeneratorState, RegistryState, TemplateStoreState};

/// Test client for API calls
pub struct TestClient {
    pub base_url: String,
    pub client: Client,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn patch<T: serde::Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .patch(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send request")
    }
}

pub fn test_config(service: Service, data_dir: &Path) -> Config {
    let mut config = Config::for_service(service);
    config.host = "127.0.0.1".into();
    config.port = 0;
    config.data_dir = data_dir.to_path_buf();
    config.domain = "vp.test".into();
    config.did_web_scheme = "http".into();
    config.outbound_timeout = std::time::Duration::from_secs(5);
    config
}

async fn serve(listener: TcpListener, router: Router) -> String {
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    format!("http://{}", addr)
}

async fn bind() -> TcpListener {
    TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind")
}

/// Serve an arbitrary router, such as a stand-in for a downstream service.
/// Returns the client and the bound port.
pub async fn spawn_router(router: Router) -> (TestClient, u16) {
    let listener = bind().await;
    let port = listener.local_addr().expect("Failed to get local addr").port();
    let url = serve(listener, router).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    (TestClient::new(url), port)
}

pub async fn spawn_generator(dir: &Path) -> TestClient {
    let state = GeneratorState::open(test_config(Service::Generator, dir))
        .await
        .expect("Failed to open generator state");
    let url = serve(bind().await, api::create_generator_router(state)).await;
    TestClient::new(url)
}

pub async fn spawn_renderer(dir: &Path) -> TestClient {
    let router = api::create_renderer_router(test_config(Service::Renderer, dir));
    TestClient::new(serve(bind().await, router).await)
}

pub async fn spawn_registry(dir: &Path) -> TestClient {
    let state = RegistryState::open(test_config(Service::Registry, dir))
        .await
        .expect("Failed to open registry state");
    TestClient::new(serve(bind().await, api::create_registry_router(state)).await)
}

/// The template store mints `did:web` ids under its own address, so the
/// port has to be known before the router is built.
pub async fn spawn_template_store(dir: &Path) -> (TestClient, String) {
    let listener = bind().await;
    let port = listener.local_addr().expect("Failed to get local addr").port();

    let mut config = test_config(Service::TemplateStore, dir);
    config.domain = format!("127.0.0.1%3A{port}");
    let domain = config.domain.clone();

    let state = TemplateStoreState::open(config)
        .await
        .expect("Failed to open template store state");
    let url = serve(listener, api::create_template_router(state)).await;
    (TestClient::new(url), domain)
}

/// All four services wired together
pub struct Stack {
    pub generator: TestClient,
    pub renderer: TestClient,
    pub registry: TestClient,
    pub templates: TestClient,
    pub template_domain: String,
    _dir: TempDir,
}

impl Stack {
    pub async fn start() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");

        let generator = spawn_generator(dir.path()).await;
        let renderer = spawn_renderer(dir.path()).await;
        let registry = spawn_registry(dir.path()).await;
        let (templates, template_domain) = spawn_template_store(dir.path()).await;

        // Give servers time to start
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self {
            generator,
            renderer,
            registry,
            templates,
            template_domain,
            _dir: dir,
        }
    }

    /// Store a template and return its `did:web` id.
    pub async fn create_template(&self, template: Value) -> String {
        let resp = self.templates.post("/templates", &template).await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        let id = body["data"]["id"].as_str().unwrap();
        format!("did:web:{}:templates:{}", self.template_domain, id)
    }

    /// Create a key and return the created record.
    pub async fn create_key(&self, name: &str) -> Value {
        let resp = self
            .generator
            .post(
                "/keys",
                &json!({"name": name, "type": "Ed25519VerificationKey2020"}),
            )
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    /// Create an application pointing at this stack's renderer and registry.
    pub async fn create_application(&self, template_id: &str, keys: &[&str]) -> Value {
        self.create_application_with(
            template_id,
            keys,
            &self.renderer.base_url,
            &self.registry.base_url,
        )
        .await
    }

    pub async fn create_application_with(
        &self,
        template_id: &str,
        keys: &[&str],
        renderer: &str,
        registry: &str,
    ) -> Value {
        let resp = self
            .generator
            .post(
                "/applications",
                &json!({
                    "name": "Course certificates",
                    "template": {"id": template_id},
                    "renderer": {"api": renderer},
                    "registry": {"api": registry},
                    "keys": keys,
                }),
            )
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    pub async fn registered_presentations(&self) -> Vec<Value> {
        let body: Value = self.registry.get("/presentations").await.json().await.unwrap();
        body["data"].as_array().cloned().unwrap_or_default()
    }
}

pub fn credential(subject: Value) -> Value {
    json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "id": "urn:uuid:3978344f-8596-4c3a-a978-8fcaba3903c5",
        "type": ["VerifiableCredential", "CourseCompletionCredential"],
        "issuer": "did:web:school.example",
        "issuanceDate": "2022-05-01T10:00:00Z",
        "credentialSubject": subject,
        "proof": {
            "type": "Ed25519Signature2020",
            "created": "2022-05-01T10:00:00Z",
            "proofPurpose": "assertionMethod",
            "verificationMethod": "did:web:school.example#key-1",
            "proofValue": "z58DAdFfa9SkqZMVPxAQpic7ndSayn1PzZs6ZjWp1CktyGesjuTSwRdoWhAfGFCF5bppETSTojQCrfFPP2oumHKtz"
        }
    })
}

pub fn certificate_template() -> Value {
    json!({
        "template": "<h1><%= data.name %></h1><p><%= data.course %></p>",
        "renderer": "ejs",
        "schema": {
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "course": {"type": "string"}
            },
            "required": ["name"]
        }
    })
}

//! Presentation issuance pipeline
//!
//! Sign locally, then resolve the template, render, and register. Every
//! step runs in order on the calling task; the renderer is always called
//! before the registry.

use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::crypto::generate_id;
use crate::did::{presentation_did, DidResolver};
use crate::error::{ApiError, ApiResult};
use crate::proof::{build_signing_context, sign_presentation};
use crate::types::{
    Application, Credential, IncomingEnvelope, IssueRequest, IssuedPresentation, Key, Template,
};

/// Outbound side of the generator: DID resolution plus the renderer and
/// registry calls, all sharing one bounded HTTP client.
#[derive(Clone)]
pub struct Issuer {
    client: Client,
    resolver: DidResolver,
    domain: String,
}

impl Issuer {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.outbound_timeout)
            .connect_timeout(config.outbound_timeout)
            .build()?;

        Ok(Self {
            resolver: DidResolver::with_client(client.clone(), config.did_web_scheme.clone()),
            client,
            domain: config.domain.clone(),
        })
    }

    /// Sign `req.credentials` with `key`, render them through the
    /// application's template and register the presentation.
    pub async fn issue_presentation(
        &self,
        app: &Application,
        key: &Key,
        req: IssueRequest,
    ) -> ApiResult<IssuedPresentation> {
        let context = build_signing_context(key, &self.domain)?;
        let id = presentation_did(&self.domain, &generate_id());
        let presentation =
            sign_presentation(&context, &req.credentials, id, req.holder, generate_id())?;
        tracing::debug!(
            "Signed presentation {} with {}",
            presentation.id,
            presentation.proof.verification_method
        );

        let template = self.resolve_template(&app.template.id).await?;
        let data = assemble_render_data(&presentation.verifiable_credential);

        let render = RenderCall {
            template: &template,
            data: &data,
            output: &req.output,
        };
        let certificate = self
            .post(&endpoint(&app.renderer.api, "render"), &render)
            .await?;
        tracing::debug!("Rendered presentation {}", presentation.id);

        self.post(&endpoint(&app.registry.api, "presentations"), &presentation)
            .await?;
        tracing::info!(
            "Issued presentation {} for application {}",
            presentation.id,
            app.id
        );

        Ok(IssuedPresentation {
            certificate,
            presentation,
        })
    }

    async fn resolve_template(&self, did: &str) -> ApiResult<Template> {
        let document = self.resolver.resolve(did).await?;
        serde_json::from_value(document).map_err(|e| {
            ApiError::BackendUnreachable(format!("{did} does not describe a template: {e}"))
        })
    }

    /// POST `body` and unwrap the response envelope. Error envelopes are
    /// re-raised with the downstream status, code and message.
    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> ApiResult<Value> {
        let resp = self.client.post(url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        let envelope: IncomingEnvelope = serde_json::from_str(&text).map_err(|_| {
            ApiError::BackendUnreachable(format!(
                "{url} answered {status} without a response envelope"
            ))
        })?;

        if let Some(error) = envelope.error {
            tracing::warn!("{} failed with {}: {}", url, error.code, error.message);
            return Err(ApiError::proxied(
                envelope.meta.status,
                error.code,
                error.message,
            ));
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

#[derive(Serialize)]
struct RenderCall<'a> {
    template: &'a Template,
    data: &'a Map<String, Value>,
    output: &'a str,
}

fn endpoint(api: &str, path: &str) -> String {
    format!("{}/{}", api.trim_end_matches('/'), path)
}

/// Merge every `credentialSubject` into one object. Later credentials
/// overwrite same-named fields of earlier ones.
pub fn assemble_render_data(credentials: &[Credential]) -> Map<String, Value> {
    credentials
        .iter()
        .flat_map(|c| c.credential_subject.iter())
        .fold(Map::new(), |mut data, (k, v)| {
            data.insert(k.clone(), v.clone());
            data
        })
}

//! HTTP surface of the four services
//!
//! Every response is wrapped in the `{meta, data}` / `{meta, error}`
//! envelope, except the `did.json` documents which are served raw so that
//! `did:web` resolvers can read them.

mod generator;
mod registry;
mod renderer;
mod templates;

pub use generator::create_generator_router;
pub use registry::create_registry_router;
pub use renderer::create_renderer_router;
pub use templates::create_template_router;

use axum::{
    extract::FromRequest,
    http::{header, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ApiError;

pub const LD_JSON: &str = "application/ld+json";

/// JSON body extractor whose rejections use the error envelope
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct Payload<T>(pub T);

/// Serve `document` as JSON-LD without an envelope.
fn ld_json<T: Serialize>(document: T) -> Response {
    let mut response = Json(document).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(LD_JSON));
    response
}

async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("The route {method} {} was not found.", uri.path()))
}

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::{route_not_found, Payload};
use crate::config::Config;
use crate::error::ApiError;
use crate::render;
use crate::state;
use crate::types::{ApiResponse, RenderRequest};

/// The renderer keeps no records, so its only state is the configuration.
pub fn create_renderer_router(config: Config) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/render", post(render_template))
        .fallback(route_not_found)
        .with_state(Arc::new(config))
}

async fn health(State(config): State<Arc<Config>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state::health(&config)))
}

async fn render_template(
    Payload(req): Payload<RenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rendered = render::render(&req)?;
    Ok(Json(ApiResponse::ok(rendered)))
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use super::{ld_json, route_not_found, Payload};
use crate::error::ApiError;
use crate::state::{self, TemplateStoreState};
use crate::types::{ApiResponse, Template};

pub fn create_template_router(state: Arc<TemplateStoreState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/:id", get(get_template))
        .route("/templates/:id/did.json", get(template_did_document))
        .fallback(route_not_found)
        .with_state(state)
}

async fn health(State(state): State<Arc<TemplateStoreState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state::health(&state.config)))
}

async fn list_templates(State(state): State<Arc<TemplateStoreState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.list().await))
}

async fn create_template(
    State(state): State<Arc<TemplateStoreState>>,
    Payload(template): Payload<Template>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.create(template).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::created(record))))
}

async fn get_template(
    State(state): State<Arc<TemplateStoreState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.get(&id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

async fn template_did_document(
    State(state): State<Arc<TemplateStoreState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state.did_document(&id).await?;
    Ok(ld_json(document))
}

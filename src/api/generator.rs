use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::{ld_json, route_not_found, Payload};
use crate::error::ApiError;
use crate::state::{self, GeneratorState};
use crate::types::*;

pub fn create_generator_router(state: Arc<GeneratorState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Keys
        .route("/keys", get(list_keys).post(create_key))
        .route(
            "/keys/:id",
            get(get_key).patch(update_key).delete(delete_key),
        )
        .route("/keys/:id/did.json", get(key_did_document))
        // Applications
        .route("/applications", get(list_applications).post(create_application))
        .route(
            "/applications/:id",
            get(get_application)
                .patch(update_application)
                .delete(delete_application),
        )
        .route("/applications/:id/issue", post(issue))
        .fallback(route_not_found)
        .with_state(state)
}

async fn health(State(state): State<Arc<GeneratorState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state::health(&state.config)))
}

// ============ Keys ============

async fn list_keys(
    State(state): State<Arc<GeneratorState>>,
    Query(query): Query<NameQuery>,
) -> impl IntoResponse {
    let keys = state.list_keys(query.name.as_deref()).await;
    Json(ApiResponse::ok(keys))
}

async fn create_key(
    State(state): State<Arc<GeneratorState>>,
    Payload(req): Payload<CreateKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state.create_key(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::created(key))))
}

async fn get_key(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state.get_key(&id).await?;
    Ok(Json(ApiResponse::ok(key)))
}

async fn update_key(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
    Payload(req): Payload<UpdateKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state.rename_key(&id, req).await?;
    Ok(Json(ApiResponse::ok(key)))
}

async fn delete_key(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.delete_key(&id).await?;
    Ok(Json(ApiResponse::no_content()))
}

async fn key_did_document(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state.key_document(&id).await?;
    Ok(ld_json(document))
}

// ============ Applications ============

async fn list_applications(
    State(state): State<Arc<GeneratorState>>,
    Query(query): Query<NameQuery>,
) -> impl IntoResponse {
    let apps = state.list_applications(query.name.as_deref()).await;
    Json(ApiResponse::ok(apps))
}

async fn create_application(
    State(state): State<Arc<GeneratorState>>,
    Payload(req): Payload<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.create_application(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::created(app))))
}

async fn get_application(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.get_application(&id).await?;
    Ok(Json(ApiResponse::ok(app)))
}

async fn update_application(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
    Payload(req): Payload<UpdateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.update_application(&id, req).await?;
    Ok(Json(ApiResponse::ok(app)))
}

async fn delete_application(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.delete_application(&id).await?;
    Ok(Json(ApiResponse::no_content()))
}

/// The issuance pipeline: sign, render, register
async fn issue(
    State(state): State<Arc<GeneratorState>>,
    Path(id): Path<String>,
    Payload(req): Payload<IssueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.issue(&id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::created(issued))))
}

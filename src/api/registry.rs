use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use super::{route_not_found, Payload};
use crate::error::ApiError;
use crate::state::{self, RegistryState};
use crate::types::{ApiResponse, Presentation, SubjectQuery};

pub fn create_registry_router(state: Arc<RegistryState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/presentations",
            get(list_presentations).post(create_presentation),
        )
        .route(
            "/presentations/:id",
            get(get_presentation).put(update_presentation),
        )
        .fallback(route_not_found)
        .with_state(state)
}

async fn health(State(state): State<Arc<RegistryState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state::health(&state.config)))
}

async fn list_presentations(
    State(state): State<Arc<RegistryState>>,
    Query(query): Query<SubjectQuery>,
) -> impl IntoResponse {
    let presentations = state.list(query.subject.as_deref()).await;
    Json(ApiResponse::ok(presentations))
}

async fn create_presentation(
    State(state): State<Arc<RegistryState>>,
    Payload(presentation): Payload<Presentation>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = state.create(presentation).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::created(stored))))
}

async fn get_presentation(
    State(state): State<Arc<RegistryState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let presentation = state.get(&id).await?;
    Ok(Json(ApiResponse::ok(presentation)))
}

async fn update_presentation(
    State(state): State<Arc<RegistryState>>,
    Path(id): Path<String>,
    Payload(presentation): Payload<Presentation>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.update(&id, presentation).await?;
    Ok(Json(ApiResponse::ok(updated)))
}

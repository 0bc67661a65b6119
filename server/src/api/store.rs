//! The server doubles as a remote session store for clients that persist over
//! HTTP (`SOUSCHEF_SESSION_STORE=http:<url>` points here).

use crate::api::{ApiError, ApiJson, ErrorResponse};
use crate::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use souschef_core::SessionPatch;
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoreStatusResponse {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/session-store", get(load).post(save))
}

#[utoipa::path(
    get,
    path = "/api/session-store",
    tag = "session-store",
    responses(
        (status = 200, description = "Saved snapshot, or null when nothing is saved", body = Option<SessionPatch>),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn load(State(state): State<AppState>) -> Result<Json<Option<SessionPatch>>, ApiError> {
    Ok(Json(state.store.load().await?))
}

#[utoipa::path(
    post,
    path = "/api/session-store",
    tag = "session-store",
    request_body = SessionPatch,
    responses(
        (status = 200, description = "Snapshot merged and saved", body = StoreStatusResponse),
        (status = 400, description = "Snapshot rejected", body = ErrorResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn save(
    State(state): State<AppState>,
    ApiJson(patch): ApiJson<SessionPatch>,
) -> Result<Json<StoreStatusResponse>, ApiError> {
    let merged = state.store.merge(patch).await?;
    tracing::debug!(
        store = %state.store.describe(),
        step = merged.current_step_index,
        timers = merged.active_timers.len(),
        "session snapshot saved"
    );
    Ok(Json(StoreStatusResponse {
        status: "ok".to_string(),
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(load, save),
    components(schemas(StoreStatusResponse, SessionPatch))
)]
pub struct ApiDoc;

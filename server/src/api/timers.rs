use crate::api::session::session_from_body;
use crate::api::{ApiError, ApiJson, ErrorResponse};
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use souschef_core::{create_timer, Session, Timer, ValidationError};
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimerRequest {
    /// Positive number of seconds; fractions round up
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub duration_seconds: Option<Value>,
    #[serde(default)]
    pub label: Option<String>,
    /// When present, the new timer is appended to this session
    #[serde(default)]
    #[schema(value_type = Option<Session>)]
    pub session: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateTimerResponse {
    pub success: bool,
    pub timer: Timer,
    /// `null` when no session was supplied
    pub session: Option<Session>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/timers", post(create))
}

/// Whole seconds from a JSON number, rejecting anything that is not positive.
pub(crate) fn duration_from_body(raw: Option<&Value>) -> Result<i64, ValidationError> {
    let seconds = raw
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite() && *s > 0.0)
        .ok_or(ValidationError::NonPositiveDuration)?;
    Ok(seconds.ceil() as i64)
}

#[utoipa::path(
    post,
    path = "/api/timers",
    tag = "timers",
    request_body = CreateTimerRequest,
    responses(
        (status = 200, description = "Timer created", body = CreateTimerResponse),
        (status = 400, description = "durationSeconds missing or not positive", body = ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTimerRequest>,
) -> Result<Json<CreateTimerResponse>, ApiError> {
    let duration = duration_from_body(request.duration_seconds.as_ref())?;
    let now = state.clock.now_ms();

    let (timer, session) = match request.session.filter(|v| !v.is_null()) {
        Some(raw) => {
            let (session, _) = session_from_body(Some(raw))?;
            let (next, timer) = session.set_timer(duration, request.label.as_deref(), now)?;
            (timer, Some(next))
        }
        None => (create_timer(duration, request.label.as_deref(), now)?, None),
    };

    tracing::debug!(id = %timer.id, seconds = timer.duration_seconds, "timer created");
    Ok(Json(CreateTimerResponse {
        success: true,
        timer,
        session,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(create),
    components(schemas(CreateTimerRequest, CreateTimerResponse, Timer))
)]
pub struct ApiDoc;

//! Stateless session endpoints: the caller sends its session in the body and
//! gets the transformed session back. Nothing is stored.

use crate::api::{ApiError, ApiJson, ErrorResponse};
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use souschef_core::{Session, TimerView, ValidationError};
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SessionRequest {
    #[serde(default)]
    #[schema(value_type = Option<Session>)]
    pub session: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoToStepRequest {
    #[serde(default)]
    #[schema(value_type = Option<Session>)]
    pub session: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub step_index: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStepResponse {
    pub current_step: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StepsResponse {
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimersResponse {
    pub timers: Vec<TimerView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/session/advance", post(advance))
        .route("/api/session/go-to-step", post(go_to_step))
        .route("/api/session/current-step", post(current_step))
        .route("/api/session/steps", post(steps))
        .route("/api/session/state", post(session_state))
        .route("/api/session/timers", post(timers))
}

/// Parse the body's `session`, which must be a JSON object.
pub(crate) fn session_from_body(raw: Option<Value>) -> Result<(Session, Value), ApiError> {
    let raw = raw
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::bad_request("Missing session"))?;
    if !raw.is_object() {
        return Err(ApiError::bad_request("Invalid session structure"));
    }
    let session: Session = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::bad_request(format!("Invalid session structure: {}", e)))?;
    session.validate_timers()?;
    Ok((session, raw))
}

/// Endpoints that act on the current step need the index spelled out.
fn require_step_index(raw: &Value) -> Result<(), ValidationError> {
    match raw.get("currentStepIndex") {
        Some(v) if v.is_u64() => Ok(()),
        _ => Err(ValidationError::InvalidStepIndex),
    }
}

#[utoipa::path(
    post,
    path = "/api/session/advance",
    tag = "session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session moved to the next step", body = SessionResponse),
        (status = 400, description = "No recipe, no steps, invalid index or already at the last step", body = ErrorResponse)
    )
)]
pub async fn advance(
    ApiJson(request): ApiJson<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (session, raw) = session_from_body(request.session)?;
    session.require_recipe()?;
    require_step_index(&raw)?;

    let next = session.advance_checked()?;
    tracing::debug!(
        from = session.current_step_index,
        to = next.current_step_index,
        "advanced session"
    );
    Ok(Json(SessionResponse { session: next }))
}

#[utoipa::path(
    post,
    path = "/api/session/go-to-step",
    tag = "session",
    request_body = GoToStepRequest,
    responses(
        (status = 200, description = "Session moved to the requested step", body = SessionResponse),
        (status = 400, description = "No recipe, no steps, or stepIndex not an integer in range", body = ErrorResponse)
    )
)]
pub async fn go_to_step(
    ApiJson(request): ApiJson<GoToStepRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (session, _) = session_from_body(request.session)?;
    let total = session.require_recipe()?.total_steps();

    let index = match request.step_index {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => f as i64,
                _ => return Err(ApiError::bad_request("stepIndex must be an integer")),
            },
        },
        _ => {
            return Err(ApiError::bad_request(
                "Missing or invalid stepIndex. Must be a number.",
            ))
        }
    };

    let next = session.go_to(index, total)?;
    Ok(Json(SessionResponse { session: next }))
}

#[utoipa::path(
    post,
    path = "/api/session/current-step",
    tag = "session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Text of the current step", body = CurrentStepResponse),
        (status = 400, description = "No recipe, no steps or invalid currentStepIndex", body = ErrorResponse)
    )
)]
pub async fn current_step(
    ApiJson(request): ApiJson<SessionRequest>,
) -> Result<Json<CurrentStepResponse>, ApiError> {
    let (session, raw) = session_from_body(request.session)?;
    session.require_recipe()?;
    require_step_index(&raw)?;

    Ok(Json(CurrentStepResponse {
        current_step: session.current_step()?.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/session/steps",
    tag = "session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Every step of the session's recipe", body = StepsResponse),
        (status = 400, description = "No recipe or no steps", body = ErrorResponse)
    )
)]
pub async fn steps(
    ApiJson(request): ApiJson<SessionRequest>,
) -> Result<Json<StepsResponse>, ApiError> {
    let (session, _) = session_from_body(request.session)?;
    let steps = session.require_recipe()?.steps.clone();
    Ok(Json(StepsResponse { steps }))
}

#[utoipa::path(
    post,
    path = "/api/session/state",
    tag = "session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "The validated session", body = Session),
        (status = 400, description = "Missing or malformed session", body = ErrorResponse)
    )
)]
pub async fn session_state(
    ApiJson(request): ApiJson<SessionRequest>,
) -> Result<Json<Session>, ApiError> {
    let (session, _) = session_from_body(request.session)?;
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/api/session/timers",
    tag = "session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Active timers with remaining time", body = TimersResponse),
        (status = 400, description = "Missing or malformed session", body = ErrorResponse)
    )
)]
pub async fn timers(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SessionRequest>,
) -> Result<Json<TimersResponse>, ApiError> {
    let (session, _) = session_from_body(request.session)?;
    let now = state.clock.now_ms();
    let timers = session
        .active_timers
        .iter()
        .map(|t| TimerView::at(t, now))
        .collect();
    Ok(Json(TimersResponse { timers }))
}

#[derive(OpenApi)]
#[openapi(
    paths(advance, go_to_step, current_step, steps, session_state, timers),
    components(schemas(
        SessionRequest,
        GoToStepRequest,
        SessionResponse,
        CurrentStepResponse,
        StepsResponse,
        TimersResponse,
        Session,
        TimerView,
    ))
)]
pub struct ApiDoc;

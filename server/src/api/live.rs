//! Endpoints that drive the server-side session actor.

use crate::api::timers::duration_from_body;
use crate::api::{ApiError, ApiJson, ErrorResponse};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use souschef_core::{parse_recipe_url, CommandIntent, Session, Timer, TimerView};
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoadRecipeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CommandRequest {
    /// A finalized voice transcript
    pub transcript: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandResponse {
    /// `advance`, `repeat`, `setTimer` or `unrecognized`; null for a blank transcript
    pub intent: Option<String>,
    /// What the assistant says back
    pub response: Option<String>,
    pub session: Session,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveTimerRequest {
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub duration_seconds: Option<Value>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveTimerResponse {
    pub timer: Timer,
    pub session: Session,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveTimersResponse {
    pub timers: Vec<TimerView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/live/session", get(session))
        .route("/api/live/recipe", post(load_recipe))
        .route("/api/live/command", post(command))
        .route("/api/live/advance", post(advance))
        .route("/api/live/back", post(back))
        .route("/api/live/repeat", post(repeat))
        .route("/api/live/timers", get(list_timers).post(set_timer))
}

fn intent_name(intent: &CommandIntent) -> &'static str {
    match intent {
        CommandIntent::Advance => "advance",
        CommandIntent::Repeat => "repeat",
        CommandIntent::SetTimer(_) => "setTimer",
        CommandIntent::Unrecognized(_) => "unrecognized",
    }
}

#[utoipa::path(
    get,
    path = "/api/live/session",
    tag = "live",
    responses(
        (status = 200, description = "Current live session", body = Session)
    )
)]
pub async fn session(State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.live.snapshot().await?))
}

#[utoipa::path(
    post,
    path = "/api/live/recipe",
    tag = "live",
    request_body = LoadRecipeRequest,
    responses(
        (status = 200, description = "Recipe loaded; session restarted at step 0", body = Session),
        (status = 400, description = "Missing, invalid or unreachable URL", body = ErrorResponse),
        (status = 422, description = "No recipe found on the page", body = ErrorResponse)
    )
)]
pub async fn load_recipe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoadRecipeRequest>,
) -> Result<Json<Session>, ApiError> {
    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing URL"))?;

    let recipe = parse_recipe_url(state.client.as_ref(), url, &state.hosts).await?;
    Ok(Json(state.live.load_recipe(recipe).await?))
}

#[utoipa::path(
    post,
    path = "/api/live/command",
    tag = "live",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Transcript interpreted and applied", body = CommandResponse),
        (status = 400, description = "The command could not be applied", body = ErrorResponse)
    )
)]
pub async fn command(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state.live.transcript(request.transcript).await?;
    Ok(Json(CommandResponse {
        intent: outcome.intent.as_ref().map(|i| intent_name(i).to_string()),
        response: outcome.response,
        session: outcome.session,
    }))
}

#[utoipa::path(
    post,
    path = "/api/live/advance",
    tag = "live",
    operation_id = "live_advance",
    responses(
        (status = 200, description = "Moved forward, or stayed on the last step", body = Session),
        (status = 400, description = "No recipe loaded", body = ErrorResponse)
    )
)]
pub async fn advance(State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.live.advance().await?))
}

#[utoipa::path(
    post,
    path = "/api/live/back",
    tag = "live",
    responses(
        (status = 200, description = "Moved back, or stayed on the first step", body = Session),
        (status = 400, description = "No recipe loaded", body = ErrorResponse)
    )
)]
pub async fn back(State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.live.go_back().await?))
}

#[utoipa::path(
    post,
    path = "/api/live/repeat",
    tag = "live",
    responses(
        (status = 200, description = "Current step marked as repeated", body = Session),
        (status = 400, description = "No recipe loaded", body = ErrorResponse)
    )
)]
pub async fn repeat(State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.live.repeat().await?))
}

#[utoipa::path(
    get,
    path = "/api/live/timers",
    tag = "live",
    responses(
        (status = 200, description = "Active timers with remaining time", body = LiveTimersResponse)
    )
)]
pub async fn list_timers(
    State(state): State<AppState>,
) -> Result<Json<LiveTimersResponse>, ApiError> {
    Ok(Json(LiveTimersResponse {
        timers: state.live.timers().await?,
    }))
}

#[utoipa::path(
    post,
    path = "/api/live/timers",
    tag = "live",
    request_body = LiveTimerRequest,
    responses(
        (status = 200, description = "Timer started", body = LiveTimerResponse),
        (status = 400, description = "durationSeconds missing or not positive", body = ErrorResponse)
    )
)]
pub async fn set_timer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LiveTimerRequest>,
) -> Result<Json<LiveTimerResponse>, ApiError> {
    let duration = duration_from_body(request.duration_seconds.as_ref())?;
    let (session, timer) = state.live.set_timer(duration, request.label).await?;
    Ok(Json(LiveTimerResponse { timer, session }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        session,
        load_recipe,
        command,
        advance,
        back,
        repeat,
        list_timers,
        set_timer
    ),
    components(schemas(
        LoadRecipeRequest,
        CommandRequest,
        CommandResponse,
        LiveTimerRequest,
        LiveTimerResponse,
        LiveTimersResponse,
    ))
)]
pub struct ApiDoc;

use crate::api::{ApiError, ApiJson, ErrorResponse};
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use souschef_core::{parse_recipe_url, Recipe};
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ParseRecipeRequest {
    /// Recipe page to fetch
    #[serde(default)]
    pub url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/parse-recipe", post(parse_recipe))
}

#[utoipa::path(
    post,
    path = "/api/parse-recipe",
    tag = "recipes",
    request_body = ParseRecipeRequest,
    responses(
        (status = 200, description = "Recipe extracted", body = Recipe),
        (status = 400, description = "Missing, invalid or disallowed URL, or the page could not be fetched", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 422, description = "No ingredients or steps found on the page", body = ErrorResponse)
    )
)]
pub async fn parse_recipe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ParseRecipeRequest>,
) -> Result<Json<Recipe>, ApiError> {
    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing URL"))?;

    let recipe = parse_recipe_url(state.client.as_ref(), url, &state.hosts)
        .await
        .inspect_err(|e| tracing::info!(url, error = %e, "recipe parse failed"))?;

    tracing::info!(
        url,
        title = %recipe.title,
        ingredients = recipe.ingredients.len(),
        steps = recipe.steps.len(),
        "recipe parsed"
    );
    Ok(Json(recipe))
}

#[derive(OpenApi)]
#[openapi(
    paths(parse_recipe),
    components(schemas(ParseRecipeRequest, Recipe))
)]
pub struct ApiDoc;

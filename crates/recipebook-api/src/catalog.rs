use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    response::IntoResponse,
};
use axum_extra::extract::{Query, QueryRejection};
use recipebook_db::IngredientFilter;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

/// GET /tags
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags = run_db(&state, |db| db.list_tags()).await?;
    Ok(Json(tags))
}

/// GET /tags/{id}
pub async fn get_tag(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    let tag = run_db(&state, move |db| db.get_tag(id))
        .await?
        .ok_or(ApiError::NotFound("Tag"))?;
    Ok(Json(tag))
}

/// GET /ingredients?name=<prefix>
pub async fn list_ingredients(
    State(state): State<AppState>,
    query: Result<Query<IngredientQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = IngredientFilter { name: query.name };
    let ingredients = run_db(&state, move |db| db.list_ingredients(&filter)).await?;
    Ok(Json(ingredients))
}

/// GET /ingredients/{id}
pub async fn get_ingredient(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    let ingredient = run_db(&state, move |db| db.get_ingredient(id))
        .await?
        .ok_or(ApiError::NotFound("Ingredient"))?;
    Ok(Json(ingredient))
}

use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::{Query, QueryRejection};
use recipebook_db::filters::parse_flag;
use recipebook_db::{RecipeFilter, RecipeList};
use recipebook_types::api::RecipeDraft;
use recipebook_types::shopping::{SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_FILENAME};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::Requester;
use crate::state::{AppState, run_db};

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

impl RecipeQuery {
    fn into_filter(self) -> Result<RecipeFilter, ApiError> {
        Ok(RecipeFilter {
            tags: self.tags,
            author: self.author,
            is_favorited: flag("is_favorited", self.is_favorited)?,
            is_in_shopping_cart: flag("is_in_shopping_cart", self.is_in_shopping_cart)?,
        })
    }
}

fn flag(name: &str, raw: Option<String>) -> Result<Option<bool>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_flag(&raw).map(Some).ok_or_else(|| {
            ApiError::MalformedPayload(format!("{} must be a boolean, got '{}'", name, raw))
        }),
    }
}

/// GET /recipes?tags=..&tags=..&author=..&is_favorited=..&is_in_shopping_cart=..
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    query: Result<Query<RecipeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let recipes = run_db(&state, move |db| db.list_recipes(&filter, requester.id())).await?;
    Ok(Json(recipes))
}

/// GET /recipes/{id}
pub async fn get_recipe(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(recipe_id) = path?;
    let recipe = run_db(&state, move |db| db.get_recipe(recipe_id, requester.id()))
        .await?
        .ok_or(ApiError::NotFound("Recipe"))?;
    Ok(Json(recipe))
}

/// POST /recipes
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    payload: Result<Json<RecipeDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let author = requester.require()?;
    let Json(draft) = payload?;
    let recipe = run_db(&state, move |db| db.create_recipe(author, &draft)).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// PATCH /recipes/{id}
pub async fn update_recipe(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
    payload: Result<Json<RecipeDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(recipe_id) = path?;
    let user = requester.require()?;
    let Json(draft) = payload?;
    let recipe = run_db(&state, move |db| db.update_recipe(user, recipe_id, &draft)).await?;
    Ok(Json(recipe))
}

/// DELETE /recipes/{id}
pub async fn delete_recipe(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<StatusCode, ApiError> {
    let Path(recipe_id) = path?;
    let user = requester.require()?;
    run_db(&state, move |db| db.delete_recipe(user, recipe_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_to(
    state: AppState,
    list: RecipeList,
    requester: Requester,
    recipe_id: Uuid,
) -> Result<impl IntoResponse, ApiError> {
    let user = requester.require()?;
    let short = run_db(&state, move |db| db.add_to_list(list, user, recipe_id)).await?;
    Ok((StatusCode::CREATED, Json(short)))
}

async fn remove_from(
    state: AppState,
    list: RecipeList,
    requester: Requester,
    recipe_id: Uuid,
) -> Result<StatusCode, ApiError> {
    let user = requester.require()?;
    run_db(&state, move |db| db.remove_from_list(list, user, recipe_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/{id}/favorite
pub async fn favorite(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(recipe_id) = path?;
    add_to(state, RecipeList::Favorites, requester, recipe_id).await
}

/// DELETE /recipes/{id}/favorite
pub async fn unfavorite(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<StatusCode, ApiError> {
    let Path(recipe_id) = path?;
    remove_from(state, RecipeList::Favorites, requester, recipe_id).await
}

/// POST /recipes/{id}/shopping_cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(recipe_id) = path?;
    add_to(state, RecipeList::ShoppingCart, requester, recipe_id).await
}

/// DELETE /recipes/{id}/shopping_cart
pub async fn remove_from_cart(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<StatusCode, ApiError> {
    let Path(recipe_id) = path?;
    remove_from(state, RecipeList::ShoppingCart, requester, recipe_id).await
}

/// GET /recipes/download_shopping_cart — the aggregated list as a text attachment.
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let user = requester.require()?;
    let list = run_db(&state, move |db| db.build_shopping_list(user)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, SHOPPING_LIST_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SHOPPING_LIST_FILENAME),
            ),
        ],
        list,
    ))
}

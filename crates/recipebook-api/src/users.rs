use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{Query, QueryRejection};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::Requester;
use crate::state::{AppState, run_db};

#[derive(Debug, Default, Deserialize)]
pub struct RecipesLimitQuery {
    /// Caps the recipes embedded in each author card.
    pub recipes_limit: Option<u32>,
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let users = run_db(&state, move |db| db.list_users(requester.id())).await?;
    Ok(Json(users))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = path?;
    let user = run_db(&state, move |db| db.get_user_profile(id, requester.id()))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user))
}

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let id = requester.require()?;
    let user = run_db(&state, move |db| db.get_user_profile(id, Some(id)))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user))
}

/// GET /users/subscriptions?recipes_limit=<n>
pub async fn subscriptions(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    query: Result<Query<RecipesLimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = requester.require()?;
    let Query(query) = query?;
    let subs = run_db(&state, move |db| {
        db.list_subscriptions(user, query.recipes_limit)
    })
    .await?;
    Ok(Json(subs))
}

/// POST /users/{id}/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
    query: Result<Query<RecipesLimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(author) = path?;
    let follower = requester.require()?;
    let Query(query) = query?;
    let card = run_db(&state, move |db| {
        db.follow_user(follower, author, query.recipes_limit)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// DELETE /users/{id}/subscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    Extension(requester): Extension<Requester>,
) -> Result<StatusCode, ApiError> {
    let Path(author) = path?;
    let follower = requester.require()?;
    run_db(&state, move |db| db.unfollow_user(follower, author)).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::identify;
use crate::state::AppState;
use crate::{catalog, recipes, users};

/// All API routes. Every route passes through `identify`; handlers that need
/// an authenticated user check for it themselves.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/tags", get(catalog::list_tags))
        .route("/tags/{id}", get(catalog::get_tag))
        .route("/ingredients", get(catalog::list_ingredients))
        .route("/ingredients/{id}", get(catalog::get_ingredient))
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me))
        .route("/users/subscriptions", get(users::subscriptions))
        .route("/users/{id}", get(users::get_user))
        .route(
            "/users/{id}/subscribe",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route(
            "/recipes",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite",
            post(recipes::favorite).delete(recipes::unfavorite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .layer(middleware::from_fn_with_state(state.clone(), identify))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

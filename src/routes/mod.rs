//! HTTP route handlers for the Foodgram API.
//!
//! - `users`: registration, profiles, password change
//! - `auth`: token login and logout
//! - `subscriptions`: following authors
//! - `catalogue`: tags and ingredients
//! - `recipes`: recipe CRUD and list filters
//! - `favorites`: favorites and shopping cart membership
//! - `download`: shopping list export
//! - `health`: probes, metrics and build info

pub mod auth;
pub mod catalogue;
pub mod download;
pub mod favorites;
pub mod health;
pub mod recipes;
pub mod subscriptions;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{middleware, state::AppState};

/// The `/api` routes without any middleware.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/", get(users::list_users).post(users::register))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(subscriptions::list_subscriptions))
        .route("/api/users/{id}/", get(users::get_user))
        .route(
            "/api/users/{id}/subscribe/",
            post(subscriptions::subscribe).delete(subscriptions::unsubscribe),
        )
        .route("/api/auth/token/login/", post(auth::login))
        .route("/api/auth/token/logout/", post(auth::logout))
        .route("/api/tags/", get(catalogue::list_tags))
        .route("/api/tags/{id}/", get(catalogue::get_tag))
        .route("/api/ingredients/", get(catalogue::list_ingredients))
        .route("/api/ingredients/{id}/", get(catalogue::get_ingredient))
        .route("/api/recipes/", get(recipes::list_recipes).post(recipes::create_recipe))
        .route("/api/recipes/download_shopping_cart/", get(download::download_shopping_cart))
        .route(
            "/api/recipes/{id}/",
            get(recipes::get_recipe).patch(recipes::update_recipe).delete(recipes::delete_recipe),
        )
        .route(
            "/api/recipes/{id}/favorite/",
            post(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart/",
            post(favorites::add_to_cart).delete(favorites::remove_from_cart),
        )
}

/// The full application: API, probes and the middleware stack.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .merge(api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(middleware::validation::max_body_size()))
        .layer(from_fn(middleware::validation::validate_request_middleware))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}

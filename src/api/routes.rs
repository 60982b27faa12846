use axum::{
    http::Method,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{auth_middleware, AuthService};
use crate::ordering::LinkOrdering;
use crate::storage::Storage;

use super::handlers::{
    best_color, create_link, delete_link, get_profile, health_check, list_links, reorder_links,
    set_link_active, suggest_colors, update_link, update_profile, validate_colors, AppState,
};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    ordering: Arc<LinkOrdering>,
    auth_service: Arc<AuthService>,
) -> Router {
    let state = Arc::new(AppState { ordering, storage });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let protected_routes = Router::new()
        .route("/links", get(list_links).post(create_link))
        .route("/links/order", put(reorder_links))
        .route("/links/{id}", patch(update_link).delete(delete_link))
        .route("/links/{id}/active", put(set_link_active))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/colors/suggest", post(suggest_colors))
        .route("/colors/best", post(best_color))
        .route("/colors/validate", post(validate_colors))
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", protected_routes)
        .layer(cors)
}

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::storage::Storage;

use super::handlers::{follow_link, health_check, public_profile, PublicState};
use super::middleware::record_request_start;

pub fn create_public_router(storage: Arc<dyn Storage>) -> Router {
    let state = Arc::new(PublicState { storage });

    Router::new()
        .route("/", get(health_check))
        .route("/l/{id}", get(follow_link))
        .route("/{username}", get(public_profile))
        .layer(middleware::from_fn(record_request_start))
        .with_state(state)
}

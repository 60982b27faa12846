use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::middleware::RequestStart;
use crate::models::PublicProfile;
use crate::storage::Storage;

pub struct PublicState {
    pub storage: Arc<dyn Storage>,
}

/// Profile page data: the profile plus its active links in position order
pub async fn public_profile(
    State(state): State<Arc<PublicState>>,
    Path(username): Path<String>,
) -> Response {
    let username = username.to_ascii_lowercase();

    let profile = match state.storage.get_profile_by_username(&username).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return (StatusCode::NOT_FOUND, "Profile not found").into_response(),
        Err(e) => {
            error!(username = %username, error = %e, "failed to load profile");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let links = match state.storage.list_links(&profile.owner_id).await {
        Ok(links) => links,
        Err(e) => {
            error!(owner_id = %profile.owner_id, error = %e, "failed to load links");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let links: Vec<_> = links.into_iter().filter(|l| l.is_active).collect();
    let slider = links.iter().filter(|l| l.appear_in_slider).cloned().collect();

    Json(PublicProfile {
        profile,
        links,
        slider,
    })
    .into_response()
}

/// Count a visit and send the visitor on to the link's URL
pub async fn follow_link(
    State(state): State<Arc<PublicState>>,
    Path(link_id): Path<String>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
) -> Response {
    let link = match state.storage.get_link(&link_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(e) => {
            error!(link_id = %link_id, error = %e, "failed to load link");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    if !link.is_active {
        return (StatusCode::GONE, "This link has been deactivated").into_response();
    }

    if let Err(err) = state.storage.increment_clicks(&link_id, 1).await {
        warn!(link_id = %link_id, error = %err, "failed to record click");
    }

    debug!(
        link_id = %link_id,
        elapsed_ms = request_start.elapsed().as_millis() as u64,
        "link followed"
    );
    Redirect::temporary(&link.url).into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

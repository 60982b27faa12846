use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use validator::{Validate, ValidationErrors};

use crate::auth::CurrentOwner;
use crate::color::{self, ColorSuggestion, ThemeValidation, AA_NORMAL_TEXT, DEFAULT_SUGGESTION_COUNT};
use crate::models::{Link, LinkUpdate, NewLink, Profile, ProfileUpdate, ReorderRequest, ToggleActiveRequest};
use crate::ordering::{LinkOrdering, OrderingError};
use crate::storage::{Storage, StorageError};

/// Theme colors assumed for a profile that has not picked its own
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";
pub const DEFAULT_TEXT_COLOR: &str = "#000000";

pub struct AppState {
    pub ordering: Arc<LinkOrdering>,
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            errors: Vec::new(),
        }),
    )
}

fn unprocessable(message: &str, errors: Vec<String>) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: message.to_string(),
            errors,
        }),
    )
}

fn internal_error() -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

impl From<OrderingError> for ErrorResponse {
    fn from(err: OrderingError) -> Self {
        Self {
            error: err.to_string(),
            errors: Vec::new(),
        }
    }
}

fn ordering_error(err: OrderingError) -> ApiError {
    match err {
        OrderingError::ValidationFailed(_) => (StatusCode::UNPROCESSABLE_ENTITY, Json(err.into())),
        OrderingError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "Link not found"),
        OrderingError::InvalidInput(_) => (StatusCode::BAD_REQUEST, Json(err.into())),
        // Already logged where it was raised
        OrderingError::StorageFailure(_) => internal_error(),
    }
}

fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages
}

/// Load a link on behalf of `owner`; links of other owners do not exist for them
async fn owned_link(state: &AppState, owner: &CurrentOwner, link_id: &str) -> ApiResult<Link> {
    let link = state.ordering.get(link_id).await.map_err(ordering_error)?;
    if link.owner_id != owner.0 {
        return Err(api_error(StatusCode::NOT_FOUND, "Link not found"));
    }
    Ok(link)
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
) -> ApiResult<Json<Vec<Link>>> {
    state
        .ordering
        .list(&owner.0)
        .await
        .map(Json)
        .map_err(ordering_error)
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
    Json(payload): Json<NewLink>,
) -> ApiResult<(StatusCode, Json<Link>)> {
    let link = state
        .ordering
        .append(&owner.0, payload)
        .await
        .map_err(ordering_error)?;
    info!(owner_id = %owner.0, link_id = %link.id, "link created");
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn reorder_links(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
    Json(payload): Json<ReorderRequest>,
) -> ApiResult<StatusCode> {
    state
        .ordering
        .reorder(&owner.0, &payload.ids)
        .await
        .map_err(ordering_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
    Path(link_id): Path<String>,
    Json(payload): Json<LinkUpdate>,
) -> ApiResult<Json<Link>> {
    owned_link(&state, &owner, &link_id).await?;
    state
        .ordering
        .edit(&link_id, payload)
        .await
        .map(Json)
        .map_err(ordering_error)
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
    Path(link_id): Path<String>,
) -> ApiResult<StatusCode> {
    owned_link(&state, &owner, &link_id).await?;
    state
        .ordering
        .remove(&link_id)
        .await
        .map_err(ordering_error)?;
    info!(owner_id = %owner.0, link_id = %link_id, "link deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_link_active(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
    Path(link_id): Path<String>,
    Json(payload): Json<ToggleActiveRequest>,
) -> ApiResult<Json<Link>> {
    owned_link(&state, &owner, &link_id).await?;
    state
        .ordering
        .toggle_active(&link_id, payload.active)
        .await
        .map(Json)
        .map_err(ordering_error)
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
) -> ApiResult<Json<Profile>> {
    match state.storage.get_profile(&owner.0).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Profile not found")),
        Err(e) => {
            error!(owner_id = %owner.0, error = %e, "failed to load profile");
            Err(internal_error())
        }
    }
}

/// Theme check for a profile update, `None` when no color is being set
fn check_profile_theme(update: &ProfileUpdate) -> Option<ThemeValidation> {
    if update.background_color.is_none()
        && update.text_color.is_none()
        && update.title_color.is_none()
    {
        return None;
    }

    let background = update
        .background_color
        .as_deref()
        .unwrap_or(DEFAULT_BACKGROUND_COLOR);
    let text = update.text_color.as_deref().unwrap_or(DEFAULT_TEXT_COLOR);
    let title = update.title_color.as_deref().unwrap_or(text);
    Some(color::validate_theme(background, text, title))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<CurrentOwner>,
    Json(mut payload): Json<ProfileUpdate>,
) -> ApiResult<Json<Profile>> {
    payload.username = payload.username.trim().to_ascii_lowercase();

    let mut errors = match payload.validate() {
        Ok(()) => Vec::new(),
        Err(e) => validation_messages(&e),
    };
    errors.extend(payload.social_errors());
    if !errors.is_empty() {
        return Err(unprocessable("Invalid profile", errors));
    }

    if let Some(theme) = check_profile_theme(&payload) {
        if !theme.is_valid {
            return Err(unprocessable("Theme colors are not accessible", theme.errors));
        }
    }

    match state.storage.upsert_profile(&owner.0, &payload).await {
        Ok(profile) => Ok(Json(profile)),
        Err(StorageError::Conflict) => Err(api_error(
            StatusCode::CONFLICT,
            "Username is already taken",
        )),
        Err(e) => {
            error!(owner_id = %owner.0, error = %e, "failed to save profile");
            Err(internal_error())
        }
    }
}

fn default_count() -> usize {
    DEFAULT_SUGGESTION_COUNT
}

fn default_target_ratio() -> f64 {
    AA_NORMAL_TEXT
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    pub background: String,
    pub preferred: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_target_ratio")]
    pub target_ratio: f64,
}

#[derive(Deserialize)]
pub struct BestColorRequest {
    pub background: String,
    pub preferred: String,
}

#[derive(Serialize)]
pub struct BestColorResponse {
    pub color: String,
}

#[derive(Deserialize)]
pub struct ValidateThemeRequest {
    pub background: String,
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn suggest_colors(Json(payload): Json<SuggestRequest>) -> Json<Vec<ColorSuggestion>> {
    Json(color::suggest(
        &payload.background,
        &payload.preferred,
        payload.count,
        payload.target_ratio,
    ))
}

pub async fn best_color(Json(payload): Json<BestColorRequest>) -> Json<BestColorResponse> {
    Json(BestColorResponse {
        color: color::best_accessible_color(&payload.background, &payload.preferred),
    })
}

pub async fn validate_colors(Json(payload): Json<ValidateThemeRequest>) -> Json<ThemeValidation> {
    let title = payload.title.as_deref().unwrap_or(&payload.text);
    Json(color::validate_theme(&payload.background, &payload.text, title))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_is_only_checked_when_colors_change() {
        let update = ProfileUpdate {
            username: "ada".into(),
            ..ProfileUpdate::default()
        };
        assert!(check_profile_theme(&update).is_none());

        let update = ProfileUpdate {
            username: "ada".into(),
            text_color: Some("#eeeeee".into()),
            ..ProfileUpdate::default()
        };
        let theme = check_profile_theme(&update).unwrap();
        assert!(!theme.is_valid);
        assert_eq!(theme.errors.len(), 2);
    }

    #[test]
    fn ordering_errors_map_to_status_codes() {
        let status = |e| ordering_error(e).0;
        assert_eq!(
            status(OrderingError::ValidationFailed("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(OrderingError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(OrderingError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(OrderingError::StorageFailure(anyhow::anyhow!("db down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

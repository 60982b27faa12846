//! Link ordering
//!
//! Keeps every owner's link positions unique and contiguous (`0..n`) across
//! append, remove and reorder. Contiguity is enforced by the storage layer
//! inside a single transaction per operation; this layer validates input,
//! retries lost append races and maps storage errors for callers.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use rand::RngExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::color::Color;
use crate::models::{Link, LinkUpdate, NewLink};
use crate::storage::{Storage, StorageError};

const LINK_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const LINK_ID_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("link not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    StorageFailure(#[source] anyhow::Error),
}

pub type OrderingResult<T> = Result<T, OrderingError>;

pub struct LinkOrdering {
    storage: Arc<dyn Storage>,
    append_max_attempts: u32,
}

impl LinkOrdering {
    pub fn new(storage: Arc<dyn Storage>, append_max_attempts: u32) -> Self {
        Self {
            storage,
            append_max_attempts: append_max_attempts.max(1),
        }
    }

    /// Create a link at the end of the owner's list.
    ///
    /// Losing a race against a concurrent append (or drawing a taken id)
    /// surfaces as a storage conflict; the insert is retried with a fresh id
    /// and a freshly read max position until the attempt budget runs out.
    pub async fn append(&self, owner_id: &str, link: NewLink) -> OrderingResult<Link> {
        let link = normalize_new_link(link);
        link.validate()
            .map_err(|e| OrderingError::ValidationFailed(e.to_string()))?;

        for attempt in 1..=self.append_max_attempts {
            let id = generate_link_id();
            match self.storage.insert_link(&id, owner_id, &link).await {
                Ok(created) => {
                    debug!(owner_id = %owner_id, link_id = %created.id, position = created.position, "link appended");
                    return Ok(created);
                }
                Err(StorageError::Conflict) => {
                    debug!(owner_id = %owner_id, attempt, "position or id conflict on append, retrying");
                }
                Err(e) => return Err(storage_failure("failed to append link", e)),
            }
        }

        warn!(
            owner_id = %owner_id,
            attempts = self.append_max_attempts,
            "giving up on append after repeated conflicts"
        );
        Err(storage_failure(
            "failed to append link",
            anyhow!(
                "position still contended after {} attempts",
                self.append_max_attempts
            ),
        ))
    }

    /// Delete a link; every sibling after it moves up one position in the same transaction
    pub async fn remove(&self, link_id: &str) -> OrderingResult<()> {
        match self.storage.delete_link(link_id).await {
            Ok(deleted) => {
                debug!(owner_id = %deleted.owner_id, link_id = %link_id, "link removed");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(OrderingError::NotFound(link_id.to_string())),
            Err(e) => Err(storage_failure("failed to remove link", e)),
        }
    }

    /// Assign position `i` to `ordered_ids[i]`.
    ///
    /// `ordered_ids` must be the owner's complete link set; partial or
    /// padded lists are rejected and nothing moves.
    pub async fn reorder(&self, owner_id: &str, ordered_ids: &[String]) -> OrderingResult<()> {
        let mut seen = HashSet::with_capacity(ordered_ids.len());
        if let Some(dup) = ordered_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(OrderingError::InvalidInput(format!(
                "link id '{dup}' appears more than once"
            )));
        }

        match self.storage.reorder_links(owner_id, ordered_ids).await {
            Ok(()) => {
                debug!(owner_id = %owner_id, count = ordered_ids.len(), "links reordered");
                Ok(())
            }
            Err(StorageError::LinkSetMismatch) => Err(OrderingError::InvalidInput(
                "ids must list every one of the owner's links exactly once".to_string(),
            )),
            Err(e) => Err(storage_failure("failed to reorder links", e)),
        }
    }

    /// Flip the active flag; position is untouched
    pub async fn toggle_active(&self, link_id: &str, active: bool) -> OrderingResult<Link> {
        match self.storage.set_link_active(link_id, active).await {
            Ok(link) => Ok(link),
            Err(StorageError::NotFound) => Err(OrderingError::NotFound(link_id.to_string())),
            Err(e) => Err(storage_failure("failed to toggle link", e)),
        }
    }

    pub async fn edit(&self, link_id: &str, update: LinkUpdate) -> OrderingResult<Link> {
        let update = normalize_link_update(update);
        update
            .validate()
            .map_err(|e| OrderingError::ValidationFailed(e.to_string()))?;
        for color in [&update.background_color, &update.text_color] {
            if let Some(Some(value)) = color {
                value
                    .parse::<Color>()
                    .map_err(|e| OrderingError::ValidationFailed(e.to_string()))?;
            }
        }

        match self.storage.update_link(link_id, &update).await {
            Ok(link) => Ok(link),
            Err(StorageError::NotFound) => Err(OrderingError::NotFound(link_id.to_string())),
            Err(e) => Err(storage_failure("failed to edit link", e)),
        }
    }

    pub async fn get(&self, link_id: &str) -> OrderingResult<Link> {
        self.storage
            .get_link(link_id)
            .await
            .map_err(|e| storage_failure("failed to load link", e))?
            .ok_or_else(|| OrderingError::NotFound(link_id.to_string()))
    }

    pub async fn list(&self, owner_id: &str) -> OrderingResult<Vec<Link>> {
        self.storage
            .list_links(owner_id)
            .await
            .map_err(|e| storage_failure("failed to list links", e))
    }

    /// Rewrite an owner's positions to `0..n` keeping their current order.
    ///
    /// Returns whether anything had to change.
    pub async fn normalize(&self, owner_id: &str) -> OrderingResult<bool> {
        let links = self.list(owner_id).await?;
        if positions_are_contiguous(&links) {
            return Ok(false);
        }

        let ids: Vec<String> = links.into_iter().map(|l| l.id).collect();
        self.reorder(owner_id, &ids).await?;
        info!(owner_id = %owner_id, count = ids.len(), "link positions normalized");
        Ok(true)
    }
}

/// True when the links, sorted by position, sit at exactly `0..n`
pub fn positions_are_contiguous(links: &[Link]) -> bool {
    let mut positions: Vec<i64> = links.iter().map(|l| l.position).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(expected, &actual)| actual == expected as i64)
}

fn storage_failure(context: &str, err: impl Into<anyhow::Error>) -> OrderingError {
    let err = err.into();
    error!(error = %err, "{context}");
    OrderingError::StorageFailure(err)
}

fn generate_link_id() -> String {
    let mut rng = rand::rng();
    (0..LINK_ID_LEN)
        .map(|_| LINK_ID_ALPHABET[rng.random_range(0..LINK_ID_ALPHABET.len())] as char)
        .collect()
}

/// Bare hosts such as `example.com` are taken to mean https
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn normalize_new_link(link: NewLink) -> NewLink {
    NewLink {
        title: link.title.trim().to_string(),
        url: normalize_url(&link.url),
        description: link
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    }
}

fn normalize_link_update(update: LinkUpdate) -> LinkUpdate {
    // A blank string clears the column just like null
    let blank_clears = |field: Option<Option<String>>| {
        field.map(|value| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    };

    LinkUpdate {
        title: update.title.map(|t| t.trim().to_string()),
        url: update.url.as_deref().map(normalize_url),
        description: blank_clears(update.description),
        background_color: blank_clears(update.background_color),
        text_color: blank_clears(update.text_color),
        icon: blank_clears(update.icon),
        appear_in_slider: update.appear_in_slider,
        banner_image: blank_clears(update.banner_image),
    }
}

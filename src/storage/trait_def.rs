use crate::models::{Link, LinkUpdate, NewLink, Profile, ProfileUpdate};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A unique key (link id, owner position or username) is already taken
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("link ids do not match the owner's links")]
    LinkSetMismatch,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a link at the owner's next free position (current max + 1, or 0).
    ///
    /// Returns `Conflict` when the id or the computed position is already taken,
    /// which happens when another append for the same owner won the race.
    async fn insert_link(&self, id: &str, owner_id: &str, link: &NewLink) -> StorageResult<Link>;

    async fn get_link(&self, id: &str) -> Result<Option<Link>>;

    /// All links of an owner ordered by position
    async fn list_links(&self, owner_id: &str) -> Result<Vec<Link>>;

    /// Every owner that has at least one link
    async fn list_owner_ids(&self) -> Result<Vec<String>>;

    /// Delete a link and close the gap it leaves, in one transaction
    async fn delete_link(&self, id: &str) -> StorageResult<Link>;

    /// Assign position `i` to `ids[i]` in one transaction.
    ///
    /// `ids` must be exactly the owner's current link set, otherwise
    /// `LinkSetMismatch` is returned and nothing changes.
    async fn reorder_links(&self, owner_id: &str, ids: &[String]) -> StorageResult<()>;

    async fn set_link_active(&self, id: &str, active: bool) -> StorageResult<Link>;

    async fn update_link(&self, id: &str, update: &LinkUpdate) -> StorageResult<Link>;

    /// Add `amount` recorded visits to a link's click counter
    async fn increment_clicks(&self, id: &str, amount: u64) -> Result<()>;

    /// Create or replace an owner's profile. `Conflict` if the username belongs to someone else
    async fn upsert_profile(&self, owner_id: &str, update: &ProfileUpdate)
        -> StorageResult<Profile>;

    async fn get_profile(&self, owner_id: &str) -> Result<Option<Profile>>;

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>>;
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique_violation {
            StorageError::Conflict
        } else {
            StorageError::Other(err.into())
        }
    }
}

/// True when `ids` names every id in `current` exactly once and nothing else
pub(crate) fn same_link_set(current: &[String], ids: &[String]) -> bool {
    use std::collections::HashSet;

    if current.len() != ids.len() {
        return false;
    }
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    wanted.len() == ids.len() && current.iter().all(|id| wanted.contains(id.as_str()))
}

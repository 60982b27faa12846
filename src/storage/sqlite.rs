use crate::models::{Link, LinkUpdate, NewLink, Profile, ProfileUpdate};
use crate::storage::trait_def::{now_secs, same_link_set};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        // UNIQUE(owner_id, position) doubles as the owner lookup index
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                position INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                clicks INTEGER NOT NULL DEFAULT 0,
                background_color TEXT,
                text_color TEXT,
                icon TEXT,
                appear_in_slider INTEGER NOT NULL DEFAULT 0,
                banner_image TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (owner_id, position)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                owner_id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                name TEXT,
                bio TEXT,
                avatar TEXT,
                background_color TEXT,
                text_color TEXT,
                title_color TEXT,
                instagram TEXT,
                twitter TEXT,
                linkedin TEXT,
                youtube TEXT,
                facebook TEXT,
                tiktok TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_link(&self, id: &str, owner_id: &str, link: &NewLink) -> StorageResult<Link> {
        let now = now_secs();

        // Reading the max and inserting is one statement, SQLite runs it under the write lock
        let inserted = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (id, owner_id, title, url, description, position,
                               is_active, clicks, appear_in_slider, created_at, updated_at)
            SELECT ?, ?, ?, ?, ?, COALESCE(MAX(position), -1) + 1, 1, 0, 0, ?, ?
            FROM links
            WHERE owner_id = ?
            ON CONFLICT DO NOTHING
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&link.title)
        .bind(&link.url)
        .bind(&link.description)
        .bind(now)
        .bind(now)
        .bind(owner_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        inserted.ok_or(StorageError::Conflict)
    }

    async fn get_link(&self, id: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, owner_id, title, url, description, position, is_active, clicks,
                   background_color, text_color, icon, appear_in_slider, banner_image,
                   created_at, updated_at
            FROM links
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, owner_id: &str) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, owner_id, title, url, description, position, is_active, clicks,
                   background_color, text_color, icon, appear_in_slider, banner_image,
                   created_at, updated_at
            FROM links
            WHERE owner_id = ?
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn list_owner_ids(&self) -> Result<Vec<String>> {
        let owners = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT owner_id FROM links ORDER BY owner_id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(owners)
    }

    async fn delete_link(&self, id: &str) -> StorageResult<Link> {
        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock before anything is read
        let deleted = sqlx::query_as::<_, Link>(
            r#"
            DELETE FROM links
            WHERE id = ?
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        let now = now_secs();

        // Park the shifted rows at negative positions, then bring them down by one
        sqlx::query(
            r#"
            UPDATE links
            SET position = -position - 1, updated_at = ?
            WHERE owner_id = ? AND position > ?
            "#,
        )
        .bind(now)
        .bind(&deleted.owner_id)
        .bind(deleted.position)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE links
            SET position = -position - 2
            WHERE owner_id = ? AND position < 0
            "#,
        )
        .bind(&deleted.owner_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(deleted)
    }

    async fn reorder_links(&self, owner_id: &str, ids: &[String]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = now_secs();

        sqlx::query(
            r#"
            UPDATE links
            SET position = -position - 1, updated_at = ?
            WHERE owner_id = ?
            "#,
        )
        .bind(now)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        let current = sqlx::query_scalar::<_, String>("SELECT id FROM links WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_all(&mut *tx)
            .await?;

        if !same_link_set(&current, ids) {
            // Dropping the transaction rolls the parking update back
            return Err(StorageError::LinkSetMismatch);
        }

        for (position, id) in ids.iter().enumerate() {
            sqlx::query(
                r#"
                UPDATE links
                SET position = ?
                WHERE id = ? AND owner_id = ?
                "#,
            )
            .bind(position as i64)
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn set_link_active(&self, id: &str, active: bool) -> StorageResult<Link> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            UPDATE links
            SET is_active = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(active)
        .bind(now_secs())
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::NotFound)
    }

    async fn update_link(&self, id: &str, update: &LinkUpdate) -> StorageResult<Link> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            UPDATE links
            SET title = COALESCE(?, title),
                url = COALESCE(?, url),
                description = CASE WHEN ? THEN ? ELSE description END,
                background_color = CASE WHEN ? THEN ? ELSE background_color END,
                text_color = CASE WHEN ? THEN ? ELSE text_color END,
                icon = CASE WHEN ? THEN ? ELSE icon END,
                appear_in_slider = COALESCE(?, appear_in_slider),
                banner_image = CASE WHEN ? THEN ? ELSE banner_image END,
                updated_at = ?
            WHERE id = ?
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(&update.title)
        .bind(&update.url)
        .bind(update.description.is_some())
        .bind(update.description.clone().flatten())
        .bind(update.background_color.is_some())
        .bind(update.background_color.clone().flatten())
        .bind(update.text_color.is_some())
        .bind(update.text_color.clone().flatten())
        .bind(update.icon.is_some())
        .bind(update.icon.clone().flatten())
        .bind(update.appear_in_slider)
        .bind(update.banner_image.is_some())
        .bind(update.banner_image.clone().flatten())
        .bind(now_secs())
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::NotFound)
    }

    async fn increment_clicks(&self, id: &str, amount: u64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET clicks = clicks + ?
            WHERE id = ?
            "#,
        )
        .bind(amount as i64)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn upsert_profile(
        &self,
        owner_id: &str,
        update: &ProfileUpdate,
    ) -> StorageResult<Profile> {
        let now = now_secs();

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (owner_id, username, name, bio, avatar,
                                  background_color, text_color, title_color,
                                  instagram, twitter, linkedin, youtube, facebook, tiktok,
                                  created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (owner_id) DO UPDATE SET
                username = excluded.username,
                name = excluded.name,
                bio = excluded.bio,
                avatar = excluded.avatar,
                background_color = excluded.background_color,
                text_color = excluded.text_color,
                title_color = excluded.title_color,
                instagram = excluded.instagram,
                twitter = excluded.twitter,
                linkedin = excluded.linkedin,
                youtube = excluded.youtube,
                facebook = excluded.facebook,
                tiktok = excluded.tiktok,
                updated_at = excluded.updated_at
            RETURNING owner_id, username, name, bio, avatar,
                      background_color, text_color, title_color,
                      instagram, twitter, linkedin, youtube, facebook, tiktok,
                      created_at, updated_at
            "#,
        )
        .bind(owner_id)
        .bind(&update.username)
        .bind(&update.name)
        .bind(&update.bio)
        .bind(&update.avatar)
        .bind(&update.background_color)
        .bind(&update.text_color)
        .bind(&update.title_color)
        .bind(&update.social.instagram)
        .bind(&update.social.twitter)
        .bind(&update.social.linkedin)
        .bind(&update.social.youtube)
        .bind(&update.social.facebook)
        .bind(&update.social.tiktok)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(profile)
    }

    async fn get_profile(&self, owner_id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT owner_id, username, name, bio, avatar,
                   background_color, text_color, title_color,
                   instagram, twitter, linkedin, youtube, facebook, tiktok,
                   created_at, updated_at
            FROM profiles
            WHERE owner_id = ?
            "#,
        )
        .bind(owner_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(profile)
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT owner_id, username, name, bio, avatar,
                   background_color, text_color, title_color,
                   instagram, twitter, linkedin, youtube, facebook, tiktok,
                   created_at, updated_at
            FROM profiles
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(profile)
    }
}

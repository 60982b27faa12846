use crate::models::{Link, LinkUpdate, NewLink, Profile, ProfileUpdate};
use crate::storage::trait_def::{now_secs, same_link_set};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Serialize every position write of one owner for the rest of the transaction
async fn lock_owner(tx: &mut Transaction<'_, Postgres>, owner_id: &str) -> StorageResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(owner_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                position BIGINT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                clicks BIGINT NOT NULL DEFAULT 0,
                background_color TEXT,
                text_color TEXT,
                icon TEXT,
                appear_in_slider BOOLEAN NOT NULL DEFAULT FALSE,
                banner_image TEXT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
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
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_link(&self, id: &str, owner_id: &str, link: &NewLink) -> StorageResult<Link> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, owner_id).await?;

        let now = now_secs();
        let inserted = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (id, owner_id, title, url, description, position,
                               is_active, clicks, appear_in_slider, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, COALESCE(MAX(position), -1) + 1, TRUE, 0, FALSE, $6, $6
            FROM links
            WHERE owner_id = $2
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
        .fetch_optional(&mut *tx)
        .await?;

        let Some(inserted) = inserted else {
            return Err(StorageError::Conflict);
        };

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_link(&self, id: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, owner_id, title, url, description, position, is_active, clicks,
                   background_color, text_color, icon, appear_in_slider, banner_image,
                   created_at, updated_at
            FROM links
            WHERE id = $1
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
            WHERE owner_id = $1
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

        let owner_id = sqlx::query_scalar::<_, String>("SELECT owner_id FROM links WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound)?;

        lock_owner(&mut tx, &owner_id).await?;

        // Another writer may have removed it while we waited for the lock
        let deleted = sqlx::query_as::<_, Link>(
            r#"
            DELETE FROM links
            WHERE id = $1
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        // Non-deferred unique constraints are checked per row, so shift via negative positions
        sqlx::query(
            r#"
            UPDATE links
            SET position = -position - 1, updated_at = $3
            WHERE owner_id = $1 AND position > $2
            "#,
        )
        .bind(&deleted.owner_id)
        .bind(deleted.position)
        .bind(now_secs())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE links
            SET position = -position - 2
            WHERE owner_id = $1 AND position < 0
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
        lock_owner(&mut tx, owner_id).await?;

        let current = sqlx::query_scalar::<_, String>("SELECT id FROM links WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(&mut *tx)
            .await?;

        if !same_link_set(&current, ids) {
            return Err(StorageError::LinkSetMismatch);
        }

        sqlx::query(
            r#"
            UPDATE links
            SET position = -position - 1, updated_at = $2
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .bind(now_secs())
        .execute(&mut *tx)
        .await?;

        let positions: Vec<i64> = (0..ids.len() as i64).collect();
        sqlx::query(
            r#"
            UPDATE links
            SET position = ordered.position
            FROM UNNEST($2::text[], $3::bigint[]) AS ordered(id, position)
            WHERE links.id = ordered.id AND links.owner_id = $1
            "#,
        )
        .bind(owner_id)
        .bind(ids)
        .bind(&positions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn set_link_active(&self, id: &str, active: bool) -> StorageResult<Link> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            UPDATE links
            SET is_active = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(now_secs())
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::NotFound)
    }

    async fn update_link(&self, id: &str, update: &LinkUpdate) -> StorageResult<Link> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            UPDATE links
            SET title = COALESCE($2, title),
                url = COALESCE($3, url),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                background_color = CASE WHEN $6 THEN $7 ELSE background_color END,
                text_color = CASE WHEN $8 THEN $9 ELSE text_color END,
                icon = CASE WHEN $10 THEN $11 ELSE icon END,
                appear_in_slider = COALESCE($12, appear_in_slider),
                banner_image = CASE WHEN $13 THEN $14 ELSE banner_image END,
                updated_at = $15
            WHERE id = $1
            RETURNING id, owner_id, title, url, description, position, is_active, clicks,
                      background_color, text_color, icon, appear_in_slider, banner_image,
                      created_at, updated_at
            "#,
        )
        .bind(id)
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
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::NotFound)
    }

    async fn increment_clicks(&self, id: &str, amount: u64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET clicks = clicks + $1
            WHERE id = $2
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
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (owner_id, username, name, bio, avatar,
                                  background_color, text_color, title_color,
                                  instagram, twitter, linkedin, youtube, facebook, tiktok,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            ON CONFLICT (owner_id) DO UPDATE SET
                username = EXCLUDED.username,
                name = EXCLUDED.name,
                bio = EXCLUDED.bio,
                avatar = EXCLUDED.avatar,
                background_color = EXCLUDED.background_color,
                text_color = EXCLUDED.text_color,
                title_color = EXCLUDED.title_color,
                instagram = EXCLUDED.instagram,
                twitter = EXCLUDED.twitter,
                linkedin = EXCLUDED.linkedin,
                youtube = EXCLUDED.youtube,
                facebook = EXCLUDED.facebook,
                tiktok = EXCLUDED.tiktok,
                updated_at = EXCLUDED.updated_at
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
        .bind(now_secs())
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
            WHERE owner_id = $1
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
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(profile)
    }
}

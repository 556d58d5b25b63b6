// src/remote/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tokio::sync::broadcast;

use super::RemoteBackend;
use crate::error::RemoteError;
use crate::models::{Character, DeviceInfo, LocationInfo, LoginRecord, VoteRecord};

/// Postgres implementation of the hosted backend. Change notifications for
/// the character table go out through `pg_notify` on `channel`.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    channel: Option<String>,
}

impl PgBackend {
    pub async fn connect(database_url: &str, channel: Option<String>) -> Result<Self, RemoteError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let backend = Self { pool, channel };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), RemoteError> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url TEXT NOT NULL,
                votes BIGINT NOT NULL DEFAULT 0 CHECK (votes >= 0),
                theme_color TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                identifier TEXT NOT NULL,
                login_method TEXT NOT NULL,
                device_info JSONB NOT NULL,
                location_info JSONB,
                last_login TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // One row per identifier: the remote half of the one-vote rule.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id BIGSERIAL PRIMARY KEY,
                identifier TEXT NOT NULL UNIQUE,
                character_id TEXT NOT NULL REFERENCES characters(id),
                device_info JSONB NOT NULL,
                location_info JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Inserts `characters` when the table is empty.
    pub async fn seed_characters(&self, characters: &[Character]) -> Result<(), RemoteError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM characters")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        for character in characters {
            sqlx::query(
                r#"
                INSERT INTO characters (id, name, role, description, image_url, votes, theme_color)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&character.id)
            .bind(&character.name)
            .bind(&character.role)
            .bind(&character.description)
            .bind(&character.image_url)
            .bind(character.votes)
            .bind(&character.theme_color)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!("Seeded {} characters", characters.len());
        Ok(())
    }

    async fn notify_characters_changed(&self, character_id: &str) {
        let Some(channel) = self.channel.as_deref() else {
            return;
        };
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(character_id)
            .execute(&self.pool)
            .await
        {
            tracing::warn!("Could not notify {}: {}", channel, e);
        }
    }
}

#[async_trait]
impl RemoteBackend for PgBackend {
    async fn fetch_characters(&self) -> Result<Vec<Character>, RemoteError> {
        let characters = sqlx::query_as::<_, Character>(
            r#"
            SELECT id, name, role, description, image_url, votes, theme_color
            FROM characters
            ORDER BY votes DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(characters)
    }

    async fn insert_login(&self, record: &LoginRecord) -> Result<(), RemoteError> {
        sqlx::query(
            r#"
            INSERT INTO users (identifier, login_method, device_info, location_info, last_login)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.identifier)
        .bind(record.method.to_string())
        .bind(Json(&record.device))
        .bind(record.location.as_ref().map(Json))
        .bind(record.last_login)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_vote(&self, record: &VoteRecord) -> Result<(), RemoteError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO votes (identifier, character_id, device_info, location_info, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (identifier) DO NOTHING
            "#,
        )
        .bind(&record.identifier)
        .bind(&record.character_id)
        .bind(Json(&record.device))
        .bind(record.location.as_ref().map(Json))
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(RemoteError::Rejected(format!(
                "{} has already voted",
                record.identifier
            )));
        }

        let updated = sqlx::query("UPDATE characters SET votes = votes + 1 WHERE id = $1")
            .bind(&record.character_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(RemoteError::Rejected(format!(
                "unknown character {}",
                record.character_id
            )));
        }

        tx.commit().await?;
        self.notify_characters_changed(&record.character_id).await;
        Ok(())
    }

    async fn fetch_votes(&self) -> Result<Vec<VoteRecord>, RemoteError> {
        let rows = sqlx::query(
            r#"
            SELECT identifier, character_id, device_info, location_info, created_at
            FROM votes
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<VoteRecord, RemoteError> {
                let device: Json<DeviceInfo> = row.try_get("device_info")?;
                let location: Option<Json<LocationInfo>> = row.try_get("location_info")?;
                Ok(VoteRecord {
                    identifier: row.try_get("identifier")?,
                    character_id: row.try_get("character_id")?,
                    device: device.0,
                    location: location.map(|l| l.0),
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }

    async fn fetch_logins(&self) -> Result<Vec<LoginRecord>, RemoteError> {
        let rows = sqlx::query(
            r#"
            SELECT identifier, login_method, device_info, location_info, last_login
            FROM users
            ORDER BY last_login DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<LoginRecord, RemoteError> {
                let method: String = row.try_get("login_method")?;
                let device: Json<DeviceInfo> = row.try_get("device_info")?;
                let location: Option<Json<LocationInfo>> = row.try_get("location_info")?;
                Ok(LoginRecord {
                    identifier: row.try_get("identifier")?,
                    method: method.parse().map_err(RemoteError::Rejected)?,
                    device: device.0,
                    location: location.map(|l| l.0),
                    last_login: row.try_get::<DateTime<Utc>, _>("last_login")?,
                })
            })
            .collect()
    }

    async fn watch_characters(&self) -> Result<broadcast::Receiver<()>, RemoteError> {
        let channel = self
            .channel
            .clone()
            .ok_or(RemoteError::RealtimeUnavailable)?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&channel).await?;
        tracing::info!("Listening for character changes on {}", channel);

        let (tx, rx) = broadcast::channel(16);
        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        tracing::debug!("Character change: {}", notification.payload());
                        if tx.send(()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Realtime listener on {} stopped: {}", channel, e);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

//! PostgreSQL cat store

use crate::config::DatabaseConfig;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use cats_core::{Cat, CatStore, NewCat, Result, StorageError};
use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::OnceLock;
use uuid::Uuid;

pub const CATS_TABLE: &str = "cats";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> AnyResult<Self> {
        tracing::info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            config.host,
            config.port,
            config.name
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(config.connect_options()?)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL at {}:{}",
                    config.host, config.port
                )
            })?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, making sure the cats table exists.
    pub async fn from_pool(pool: PgPool) -> AnyResult<Self> {
        tracing::info!("PostgreSQL connection established, checking schema...");

        Self::run_migrations(&pool)
            .await
            .context("Failed to create cats table")?;

        tracing::debug!("Table presence confirmed");

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &PgPool) -> AnyResult<()> {
        // gen_random_uuid() is built in from PostgreSQL 13, pgcrypto covers older servers
        sqlx::query(r#"CREATE EXTENSION IF NOT EXISTS "pgcrypto""#)
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cats (
                id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                age INT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CatStore for PgStore {
    async fn status(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn insert(&self, cat: &NewCat) -> Result<String> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO cats (name, color, age)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&cat.name)
        .bind(&cat.color)
        .bind(cat.age)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id.to_string())
    }

    async fn select(&self, id: &str) -> Result<Cat> {
        let uuid = parse_id(id)?;

        let row: Option<CatRow> = sqlx::query_as(
            r#"
            SELECT id, name, color, age FROM cats WHERE id = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(Cat::from)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn select_all(&self, limit: i64, offset: i64) -> Result<Vec<Cat>> {
        let rows: Vec<CatRow> = sqlx::query_as(
            r#"
            SELECT id, name, color, age FROM cats
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Err(StorageError::NotFound(format!(
                "no cats at offset {}",
                offset
            )));
        }

        Ok(rows.into_iter().map(Cat::from).collect())
    }

    async fn update(&self, id: &str, cat: &NewCat) -> Result<()> {
        let uuid = parse_id(id)?;

        let result = sqlx::query(
            r#"
            UPDATE cats SET name = $1, color = $2, age = $3
            WHERE id = $4
            "#,
        )
        .bind(&cat.name)
        .bind(&cat.color)
        .bind(cat.age)
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let uuid = parse_id(id)?;

        let result = sqlx::query(
            r#"
            DELETE FROM cats WHERE id = $1
            "#,
        )
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn purge(&self, table: &str) -> Result<()> {
        if !table_name_regex().is_match(table) {
            return Err(StorageError::InvalidInput(format!(
                "invalid table name: {}",
                table
            )));
        }

        // Identifiers cannot be bound as parameters; the name was validated above.
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StorageError::Database(format!("Error purging {} table: {}", table, e))
            })?;

        tracing::info!("Purging {} table", table);

        sqlx::query(&format!(
            "ALTER SEQUENCE IF EXISTS {}_id_seq RESTART WITH 1",
            table
        ))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

/// An id that is not a UUID cannot match any row.
fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| StorageError::NotFound(id.to_string()))
}

fn map_sqlx_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound("no matching row".to_string()),
        other => StorageError::Database(other.to_string()),
    }
}

fn table_name_regex() -> &'static Regex {
    static TABLE_NAME: OnceLock<Regex> = OnceLock::new();
    TABLE_NAME.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

// Helper struct for sqlx query_as
#[derive(sqlx::FromRow)]
struct CatRow {
    id: Uuid,
    name: String,
    color: String,
    age: i32,
}

impl From<CatRow> for Cat {
    fn from(r: CatRow) -> Self {
        Cat {
            id: r.id.to_string(),
            name: r.name,
            color: r.color,
            age: r.age,
        }
    }
}

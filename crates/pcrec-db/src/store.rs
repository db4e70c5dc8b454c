//! Configuration store backed by PostgreSQL.
//!
//! # Testing
//!
//! Unit tests below cover row conversion and SQL shape only. Exercising
//! `upsert()`/`get()`/`list()` needs a live PostgreSQL instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pcrec_core::error::AppError;
use pcrec_core::models::{validate_key, ConfigEntry, Payload};
use pcrec_core::store::ConfigStore;
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use tracing::info;

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const CONFIG_COLUMNS: &str = "key, payload, updated_at";

/// DDL for the store table. `key` width matches [`pcrec_core::models::MAX_KEY_LEN`].
const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS config_store (
    id SERIAL PRIMARY KEY,
    key VARCHAR(50) NOT NULL UNIQUE,
    payload JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Repository for configuration payloads in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use pcrec_db::PgConfigStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/pc_recommender")
///     .await?;
///
/// let store = PgConfigStore::new(pool);
/// store.init_schema().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PgConfigStore {
    pool: Pool<Postgres>,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `config_store` table if it does not exist yet.
    pub async fn init_schema(&self) -> Result<(), AppError> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        info!("config_store schema ready");
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    /// Single-statement upsert: concurrent writers on one key serialize on the
    /// unique index and the last commit wins.
    async fn upsert(&self, key: &str, payload: &Payload) -> Result<ConfigEntry, AppError> {
        validate_key(key)?;

        let row: ConfigRow = sqlx::query_as(
            r#"
            INSERT INTO config_store (key, payload, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key)
            DO UPDATE SET
                payload = EXCLUDED.payload,
                updated_at = NOW()
            RETURNING key, payload, updated_at
            "#,
        )
        .bind(key)
        .bind(Json(payload))
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.into())
    }

    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        let query = format!("SELECT {} FROM config_store WHERE key = $1", CONFIG_COLUMNS);
        let row = sqlx::query_as::<_, ConfigRow>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<ConfigEntry>, AppError> {
        let query = format!("SELECT {} FROM config_store ORDER BY key ASC", CONFIG_COLUMNS);
        let rows = sqlx::query_as::<_, ConfigRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for deserializing config_store rows
#[derive(sqlx::FromRow)]
struct ConfigRow {
    key: String,
    payload: Json<Payload>,
    updated_at: DateTime<Utc>,
}

impl From<ConfigRow> for ConfigEntry {
    fn from(row: ConfigRow) -> Self {
        ConfigEntry {
            key: row.key,
            payload: row.payload.0,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcrec_core::models::MAX_KEY_LEN;
    use serde_json::json;

    #[test]
    fn test_row_into_entry() {
        let updated_at = Utc::now();
        let row = ConfigRow {
            key: "rules".to_string(),
            payload: Json(json!({"minBudget": 500}).as_object().unwrap().clone()),
            updated_at,
        };

        let entry: ConfigEntry = row.into();
        assert_eq!(entry.key, "rules");
        assert_eq!(entry.payload["minBudget"], 500);
        assert_eq!(entry.updated_at, updated_at);
    }

    #[test]
    fn test_schema_key_width_matches_validation() {
        assert!(CREATE_TABLE_SQL.contains(&format!("VARCHAR({})", MAX_KEY_LEN)));
        assert!(CREATE_TABLE_SQL.contains("UNIQUE"));
    }

    #[test]
    fn test_payload_serializes_as_object() {
        let payload = json!({"cpu": ["A", "B"]}).as_object().unwrap().clone();
        let serialized = serde_json::to_value(Json(&payload)).unwrap();
        assert!(serialized.is_object());
        assert_eq!(serialized["cpu"], json!(["A", "B"]));
    }
}

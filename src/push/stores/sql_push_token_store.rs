//! SQL implementation of PushTokenStore using sqlx
//!
//! Tokens are kept in a single table with a unique constraint on the token
//! string, so a device re-registering under another account moves the row
//! instead of duplicating it.

use crate::{PushError, PushToken, TokenRegistration};
use crate::push::stores::push_token_store::PushTokenStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

type TokenRow = (String, Option<String>, String, Option<String>, String);

/// Tokens bound per `DELETE` statement, below SQLite's host parameter limit
const DELETE_CHUNK_SIZE: usize = 500;

/// SQLite implementation of PushTokenStore
pub struct SqlitePushTokenStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqlitePushTokenStore {
    /// Creates a new SqlitePushTokenStore with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: "push_tokens".to_string(),
        }
    }

    /// Creates a new SqlitePushTokenStore with a custom table name
    pub fn with_table_name(pool: SqlitePool, table_name: String) -> Self {
        Self { pool, table_name }
    }

    /// Connects to a SQLite database and initializes the store
    pub async fn connect(url: &str) -> Result<Self, PushError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PushError::storage(&format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to connect to database: {}", e)))?;

        let store = Self::new(pool);
        store.initialize().await?;
        Ok(store)
    }

    /// Initializes the database schema
    pub async fn initialize(&self) -> Result<(), PushError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                token TEXT UNIQUE NOT NULL,
                platform TEXT,
                created_at TEXT NOT NULL
            )",
            self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to initialize database: {}", e)))?;

        Ok(())
    }

    fn row_to_token(row: TokenRow) -> Result<PushToken, PushError> {
        let (id, user_id, token, platform, created_at) = row;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| PushError::storage(&format!("Invalid created_at for token {}: {}", id, e)))?
            .with_timezone(&Utc);

        Ok(PushToken {
            id,
            user_id,
            token,
            platform,
            created_at,
        })
    }
}

#[async_trait]
impl PushTokenStore for SqlitePushTokenStore {
    async fn register(
        &self,
        user_id: Option<&str>,
        token: &str,
        platform: Option<&str>,
    ) -> Result<TokenRegistration, PushError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PushError::storage(&format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query_as::<_, (String,)>(&format!(
            "SELECT id FROM {} WHERE token = ?",
            self.table_name
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PushError::storage(&format!("Failed to look up push token: {}", e)))?;

        let outcome = if existing.is_some() {
            sqlx::query(&format!(
                "UPDATE {} SET user_id = ?, platform = ? WHERE token = ?",
                self.table_name
            ))
            .bind(user_id)
            .bind(platform)
            .bind(token)
            .execute(&mut *tx)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to update push token: {}", e)))?;
            TokenRegistration::Updated
        } else {
            sqlx::query(&format!(
                "INSERT INTO {} (id, user_id, token, platform, created_at) VALUES (?, ?, ?, ?, ?)",
                self.table_name
            ))
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(token)
            .bind(platform)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to insert push token: {}", e)))?;
            TokenRegistration::Created
        };

        tx.commit()
            .await
            .map_err(|e| PushError::storage(&format!("Failed to commit push token: {}", e)))?;

        Ok(outcome)
    }

    async fn list(&self) -> Result<Vec<PushToken>, PushError> {
        let query = format!(
            "SELECT id, user_id, token, platform, created_at FROM {} ORDER BY created_at",
            self.table_name
        );

        let rows = sqlx::query_as::<_, TokenRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to list push tokens: {}", e)))?;

        rows.into_iter().map(Self::row_to_token).collect()
    }

    async fn delete_tokens(&self, tokens: &[String]) -> Result<u64, PushError> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PushError::storage(&format!("Failed to begin transaction: {}", e)))?;

        let mut removed = 0;
        for chunk in tokens.chunks(DELETE_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("DELETE FROM {} WHERE token IN (", self.table_name));
            let mut separated = builder.separated(", ");
            for token in chunk {
                separated.push_bind(token.as_str());
            }
            separated.push_unseparated(")");

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| PushError::storage(&format!("Failed to delete push tokens: {}", e)))?;
            removed += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| PushError::storage(&format!("Failed to commit token deletion: {}", e)))?;

        Ok(removed)
    }
}

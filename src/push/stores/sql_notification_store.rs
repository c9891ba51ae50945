//! SQL implementation of NotificationStore using sqlx

use crate::{NotificationRecord, PushError};
use crate::push::stores::notification_store::NotificationStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::str::FromStr;

type NotificationRow = (String, String, String, Option<String>, String);

/// SQLite implementation of NotificationStore
pub struct SqliteNotificationStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqliteNotificationStore {
    /// Creates a new SqliteNotificationStore with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: "notifications".to_string(),
        }
    }

    /// Creates a new SqliteNotificationStore with a custom table name
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
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                sent_by TEXT,
                sent_at TEXT NOT NULL
            )",
            self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to initialize database: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    async fn insert(&self, record: NotificationRecord) -> Result<(), PushError> {
        let query = format!(
            "INSERT INTO {} (id, title, body, sent_by, sent_at) VALUES (?, ?, ?, ?, ?)",
            self.table_name
        );

        sqlx::query(&query)
            .bind(&record.id)
            .bind(&record.title)
            .bind(&record.body)
            .bind(&record.sent_by)
            .bind(record.sent_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to insert notification: {}", e)))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<NotificationRecord>, PushError> {
        let query = format!(
            "SELECT id, title, body, sent_by, sent_at FROM {} ORDER BY sent_at DESC, rowid DESC",
            self.table_name
        );

        let rows = sqlx::query_as::<_, NotificationRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PushError::storage(&format!("Failed to list notifications: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, title, body, sent_by, sent_at) in rows {
            let sent_at = DateTime::parse_from_rfc3339(&sent_at)
                .map_err(|e| PushError::storage(&format!("Invalid sent_at for notification {}: {}", id, e)))?
                .with_timezone(&Utc);

            records.push(NotificationRecord {
                id,
                title,
                body,
                sent_by,
                sent_at,
            });
        }
        Ok(records)
    }
}

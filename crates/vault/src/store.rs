//! Remote record persistence.
//!
//! The store only ever sees the `content` payload produced by the codec; it
//! never encrypts, decrypts or inspects it.

use std::time::{SystemTime, UNIX_EPOCH};

use {async_trait::async_trait, serde_json::Value};

use crate::error::VaultError;

/// Primary key of a stored record.
pub type RecordId = i64;

/// A fetched row. `content` is the column text as stored, unparsed, so one
/// damaged row never fails a whole fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub user_id: String,
    pub content: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl StoredRecord {
    /// Parse `content` as JSON.
    pub fn json(&self) -> Result<Value, VaultError> {
        Ok(serde_json::from_str(&self.content)?)
    }
}

/// Insert / update / select / delete by id, scoped by owning user.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, user_id: &str, content: &Value) -> Result<RecordId, VaultError>;
    /// Replace a record's content. Returns whether the record existed.
    async fn update(&self, id: RecordId, content: &Value) -> Result<bool, VaultError>;
    /// All records owned by `user_id`, oldest first.
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<StoredRecord>, VaultError>;
    async fn delete_by_id(&self, id: RecordId) -> Result<bool, VaultError>;
    async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<u64, VaultError>;
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    user_id: String,
    content: String,
    created_at: i64,
    updated_at: i64,
}

impl From<DocumentRow> for StoredRecord {
    fn from(r: DocumentRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            content: r.content,
            created_at: u64::try_from(r.created_at).unwrap_or_default(),
            updated_at: u64::try_from(r.updated_at).unwrap_or_default(),
        }
    }
}

fn now_ms() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

/// SQLite-backed record store over the `documents` table.
pub struct SqliteRecordStore {
    pool: sqlx::SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, user_id: &str, content: &Value) -> Result<RecordId, VaultError> {
        let now = now_ms();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO documents (user_id, content, created_at, updated_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(serde_json::to_string(content)?)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update(&self, id: RecordId, content: &Value) -> Result<bool, VaultError> {
        let result = sqlx::query("UPDATE documents SET content = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(content)?)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_all(&self, user_id: &str) -> Result<Vec<StoredRecord>, VaultError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, user_id, content, created_at, updated_at FROM documents \
             WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoredRecord::from).collect())
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<bool, VaultError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> Result<u64, VaultError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new("DELETE FROM documents WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

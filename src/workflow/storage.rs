/// SQLite persistence layer for workflow definitions
///
/// Stores persisted workflow documents verbatim, next to the few fields needed for
/// listing (name, schema version). The document text stays the single source of
/// truth; it is parsed through the codec when a workflow is instantiated.

use crate::error::Result;
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};

/// SQLite-based storage for workflow documents
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    /// SQLite connection pool for the definitions database
    pool: SqlitePool,
}

/// Stored document together with its listing fields
#[derive(Debug, Clone, Serialize)]
pub struct StoredDefinition {
    pub id: String,
    pub name: Option<String>,
    pub version: u32,
    /// Persisted document text
    pub document: String,
}

/// Listing entry, without the document body
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionMetadata {
    pub id: String,
    pub name: Option<String>,
    pub version: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the definitions table; safe to call repeatedly
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_definitions (
                id TEXT PRIMARY KEY,
                name TEXT,
                version INTEGER NOT NULL,
                document TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_workflow_definitions_name
            ON workflow_definitions(name)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new document; `false` when the identifier is already taken
    pub async fn insert_definition(&self, definition: &StoredDefinition) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO workflow_definitions (id, name, version, document) VALUES (?, ?, ?, ?)",
        )
        .bind(&definition.id)
        .bind(&definition.name)
        .bind(i64::from(definition.version))
        .bind(&definition.document)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace a document
    pub async fn save_definition(&self, definition: &StoredDefinition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_definitions (id, name, version, document, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                version = excluded.version,
                document = excluded.document,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&definition.id)
        .bind(&definition.name)
        .bind(i64::from(definition.version))
        .bind(&definition.document)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Saved workflow definition {}", definition.id);
        Ok(())
    }

    pub async fn get_definition(&self, id: &str) -> Result<Option<StoredDefinition>> {
        let row = sqlx::query(
            "SELECT id, name, version, document FROM workflow_definitions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| StoredDefinition {
            id: row.get("id"),
            name: row.get("name"),
            version: version_column(row.get("version")),
            document: row.get("document"),
        }))
    }

    /// List stored definitions, most recently updated first
    pub async fn list_definitions(&self) -> Result<Vec<DefinitionMetadata>> {
        let rows = sqlx::query(
            "SELECT id, name, version, created_at, updated_at FROM workflow_definitions ORDER BY updated_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DefinitionMetadata {
                id: row.get("id"),
                name: row.get("name"),
                version: version_column(row.get("version")),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    /// Delete a definition; `false` when it did not exist
    pub async fn delete_definition(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflow_definitions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn version_column(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn storage() -> WorkflowStorage {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = WorkflowStorage::new(pool);
        storage.init_schema().await.unwrap();
        storage
    }

    fn definition(id: &str, version: u32) -> StoredDefinition {
        StoredDefinition {
            id: id.to_string(),
            name: Some("Optimization".to_string()),
            version,
            document: format!("{{\"identifier\": \"{id}\"}}"),
        }
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let storage = storage().await;
        storage.save_definition(&definition("wf-1", 0)).await.unwrap();
        storage.save_definition(&definition("wf-1", 1)).await.unwrap();

        let stored = storage.get_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(storage.list_definitions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_refuses_a_taken_identifier() {
        let storage = storage().await;
        assert!(storage.insert_definition(&definition("wf-1", 0)).await.unwrap());
        assert!(!storage.insert_definition(&definition("wf-1", 1)).await.unwrap());

        let stored = storage.get_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn concurrent_inserts_admit_one_winner() {
        let storage = storage().await;
        let attempts = (0..8).map(|version| {
            let storage = storage.clone();
            tokio::spawn(async move { storage.insert_definition(&definition("wf-1", version)).await.unwrap() })
        });
        let mut winners = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let storage = storage().await;
        storage.save_definition(&definition("wf-1", 1)).await.unwrap();

        assert!(storage.delete_definition("wf-1").await.unwrap());
        assert!(!storage.delete_definition("wf-1").await.unwrap());
        assert!(storage.get_definition("wf-1").await.unwrap().is_none());
    }
}

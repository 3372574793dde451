//! libSQL knowledge store.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the
//! admin-uploaded markdown documents that ground every answer.
//!
//! **Access rules:**
//! - Admin tooling: read-write via [`Storage::open`]
//! - Answer-only consumers: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use kbchat_shared::{KbChatError, KnowledgeDocument, KnowledgeFile, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KbChatError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KbChatError::Storage(format!(
                "knowledge store not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        KbChatError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(KbChatError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Insert a new knowledge document. Returns the generated document ID.
    pub async fn insert_document(
        &self,
        file_name: &str,
        content: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO knowledge_documents (id, file_name, content, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), file_name, content, uploaded_at.to_rfc3339()],
            )
            .await
            .map_err(storage_err)?;

        tracing::debug!(%id, file_name, bytes = content.len(), "stored knowledge document");
        Ok(id)
    }

    /// List every document with its content, ordered by file name.
    ///
    /// Ties on `file_name` are broken by upload time and then id so the
    /// order is fully deterministic.
    pub async fn list_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, file_name, content, uploaded_at
                 FROM knowledge_documents
                 ORDER BY file_name, uploaded_at, id",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_document(&row)?);
        }
        Ok(results)
    }

    /// List `(id, file_name)` projections, ordered like [`Self::list_documents`].
    pub async fn list_files(&self) -> Result<Vec<KnowledgeFile>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, file_name FROM knowledge_documents
                 ORDER BY file_name, uploaded_at, id",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(KnowledgeFile {
                id: row.get::<String>(0).map_err(storage_err)?,
                file_name: row.get::<String>(1).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Get a single document by ID.
    pub async fn get_document(&self, id: &str) -> Result<Option<KnowledgeDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, file_name, content, uploaded_at
                 FROM knowledge_documents WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Number of stored documents.
    pub async fn count_documents(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM knowledge_documents", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)? as usize),
            None => Ok(0),
        }
    }

    /// Delete a document by ID. Fails with `NotFound` if no row matched.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute("DELETE FROM knowledge_documents WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;

        if affected == 0 {
            return Err(KbChatError::document_not_found(id));
        }
        tracing::debug!(id, "deleted knowledge document");
        Ok(())
    }
}

fn storage_err(e: libsql::Error) -> KbChatError {
    KbChatError::Storage(e.to_string())
}

/// Convert a database row to a [`KnowledgeDocument`].
fn row_to_document(row: &libsql::Row) -> Result<KnowledgeDocument> {
    Ok(KnowledgeDocument {
        id: row.get::<String>(0).map_err(storage_err)?,
        file_name: row.get::<String>(1).map_err(storage_err)?,
        content: row.get::<String>(2).map_err(storage_err)?,
        uploaded_at: {
            let s: String = row.get(3).map_err(storage_err)?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| KbChatError::Storage(format!("invalid date: {e}")))?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("kbchat_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("kbchat_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn document_crud() {
        let storage = test_storage().await;

        let id = storage
            .insert_document("faq.md", "# FAQ\nQ: A", Utc::now())
            .await
            .expect("insert document");

        let doc = storage.get_document(&id).await.expect("get document");
        let doc = doc.expect("document exists");
        assert_eq!(doc.file_name, "faq.md");
        assert_eq!(doc.content, "# FAQ\nQ: A");

        assert_eq!(storage.count_documents().await.unwrap(), 1);

        storage.delete_document(&id).await.expect("delete");
        assert_eq!(storage.count_documents().await.unwrap(), 0);
        assert!(storage.get_document(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn documents_ordered_by_file_name() {
        let storage = test_storage().await;
        for name in ["zeta.md", "alpha.md", "mid.md"] {
            storage.insert_document(name, "x", Utc::now()).await.unwrap();
        }

        let names: Vec<String> = storage
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.file_name)
            .collect();
        assert_eq!(names, ["alpha.md", "mid.md", "zeta.md"]);

        let files: Vec<String> = storage
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.file_name)
            .collect();
        assert_eq!(files, names);
    }

    #[tokio::test]
    async fn duplicate_file_names_are_allowed() {
        let storage = test_storage().await;
        let earlier = Utc::now() - Duration::seconds(10);
        let first = storage.insert_document("a.md", "old", earlier).await.unwrap();
        let second = storage.insert_document("a.md", "new", Utc::now()).await.unwrap();
        assert_ne!(first, second);

        let docs = storage.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "old");
        assert_eq!(docs[1].content, "new");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let storage = test_storage().await;
        storage.insert_document("a.md", "x", Utc::now()).await.unwrap();

        let err = storage
            .delete_document("does-not-exist")
            .await
            .expect_err("missing id");
        assert!(err.is_not_found());
        assert_eq!(storage.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let storage = test_storage().await;
        assert!(storage.list_documents().await.unwrap().is_empty());
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("kbchat_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        let id = rw.insert_document("a.md", "x", Utc::now()).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_documents().await.unwrap().len(), 1);

        let result = ro.insert_document("b.md", "y", Utc::now()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));

        let result = ro.delete_document(&id).await;
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("kbchat_missing_{}.db", Uuid::now_v7()));
        let result = Storage::open_readonly(&tmp).await;
        assert!(result.is_err());
    }
}

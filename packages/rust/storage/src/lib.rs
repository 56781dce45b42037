//! libSQL storage layer for the local copy of the status sheet.
//!
//! The [`Storage`] struct wraps a libSQL database holding one [`StatusRow`]
//! per tool, imported from the sheet the reporting automation maintains.
//!
//! **Access rules:**
//! - `toolscope status import`: read-write via [`Storage::open`]
//! - Aggregation: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use toolscope_shared::{Result, StatusRow, ToolScopeError};

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
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ToolScopeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

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
            return Err(ToolScopeError::Storage(format!(
                "status database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

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
                        ToolScopeError::Storage(format!(
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
            return Err(ToolScopeError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status rows
    // -----------------------------------------------------------------------

    /// Insert or replace the row of `row.tool_id`.
    pub async fn upsert_status_row(&self, row: &StatusRow) -> Result<()> {
        self.check_writable()?;
        upsert_on(&self.conn, row, &Utc::now().to_rfc3339()).await
    }

    /// Replace the rows of every tool in `rows` in one transaction.
    ///
    /// Returns the number of rows written.
    pub async fn import_sheet(&self, rows: &[StatusRow]) -> Result<usize> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

        for row in rows {
            if let Err(e) = upsert_on(&tx, row, &now).await {
                let _ = tx.rollback().await;
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

        tracing::info!(rows = rows.len(), "status sheet imported");
        Ok(rows.len())
    }

    /// Get the row of a tool, if the sheet has one.
    pub async fn get_status_row(&self, tool_id: &str) -> Result<Option<StatusRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tool_id, status, current_step, report_sent, direct_closed_at,
                        indirect_closed_at, updated_at
                 FROM status_rows WHERE tool_id = ?1",
                params![tool_id],
            )
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_status_row(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ToolScopeError::Storage(e.to_string())),
        }
    }

    /// List all rows, ordered by tool id.
    pub async fn list_status_rows(&self) -> Result<Vec<StatusRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tool_id, status, current_step, report_sent, direct_closed_at,
                        indirect_closed_at, updated_at
                 FROM status_rows ORDER BY tool_id",
                params![],
            )
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?
        {
            results.push(row_to_status_row(&row)?);
        }
        Ok(results)
    }

    /// Delete the row of a tool.
    pub async fn delete_status_row(&self, tool_id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM status_rows WHERE tool_id = ?1", params![tool_id])
            .await
            .map_err(|e| ToolScopeError::Storage(e.to_string()))?;
        Ok(())
    }
}

async fn upsert_on(conn: &Connection, row: &StatusRow, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO status_rows (tool_id, status, current_step, report_sent,
                                  direct_closed_at, indirect_closed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(tool_id) DO UPDATE SET
           status = excluded.status,
           current_step = excluded.current_step,
           report_sent = excluded.report_sent,
           direct_closed_at = excluded.direct_closed_at,
           indirect_closed_at = excluded.indirect_closed_at,
           updated_at = excluded.updated_at",
        params![
            row.tool_id.as_str(),
            row.status.as_str(),
            row.current_step.as_str(),
            row.report_sent.as_str(),
            row.direct_closed_at.as_str(),
            row.indirect_closed_at.as_str(),
            now,
        ],
    )
    .await
    .map_err(|e| ToolScopeError::Storage(e.to_string()))?;
    Ok(())
}

/// Convert a database row to a [`StatusRow`].
fn row_to_status_row(row: &libsql::Row) -> Result<StatusRow> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| ToolScopeError::Storage(e.to_string()))
    };

    Ok(StatusRow {
        tool_id: text(0)?,
        status: text(1)?,
        current_step: text(2)?,
        report_sent: text(3)?,
        direct_closed_at: text(4)?,
        indirect_closed_at: text(5)?,
        updated_at: {
            let s = text(6)?;
            Some(
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| ToolScopeError::Storage(format!("invalid date: {e}")))?,
            )
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn completed_row(tool_id: &str) -> StatusRow {
        StatusRow {
            tool_id: tool_id.into(),
            status: "Completed".into(),
            current_step: "Report Sent".into(),
            report_sent: "✓".into(),
            direct_closed_at: "2024-01-01".into(),
            indirect_closed_at: "2024-01-02".into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn status_row_upsert_and_query() {
        let storage = test_storage().await;

        assert!(storage.get_status_row("T-1").await.unwrap().is_none());

        storage
            .upsert_status_row(&completed_row("T-1"))
            .await
            .expect("upsert row");

        let found = storage.get_status_row("T-1").await.unwrap().unwrap();
        assert_eq!(found.report_sent, "✓");
        assert!(found.updated_at.is_some());

        let changed = StatusRow {
            indirect_closed_at: String::new(),
            ..completed_row("T-1")
        };
        storage.upsert_status_row(&changed).await.expect("upsert again");
        let found = storage.get_status_row("T-1").await.unwrap().unwrap();
        assert_eq!(found.indirect_closed_at, "");

        assert_eq!(storage.list_status_rows().await.unwrap().len(), 1);

        storage.delete_status_row("T-1").await.expect("delete");
        assert!(storage.get_status_row("T-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn import_sheet_writes_all_rows() {
        let storage = test_storage().await;
        let rows = vec![completed_row("T-2"), completed_row("T-1"), completed_row("T-2")];

        let written = storage.import_sheet(&rows).await.expect("import");
        assert_eq!(written, 3);

        let listed = storage.list_status_rows().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.tool_id.as_str()).collect();
        assert_eq!(ids, ["T-1", "T-2"]);
    }

    #[tokio::test]
    async fn unreadable_row_fails_the_listing() {
        let storage = test_storage().await;
        storage.upsert_status_row(&completed_row("T-1")).await.unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO status_rows (tool_id, updated_at) VALUES (?1, ?2)",
                params!["T-2", "yesterday"],
            )
            .await
            .unwrap();

        let err = storage.list_status_rows().await.unwrap_err();
        assert!(matches!(err, ToolScopeError::Storage(_)));
    }

    #[tokio::test]
    async fn missing_table_fails_the_listing() {
        let storage = test_storage().await;
        storage.upsert_status_row(&completed_row("T-1")).await.unwrap();
        storage.conn.execute_batch("DROP TABLE status_rows").await.unwrap();

        assert!(storage.list_status_rows().await.is_err());
        assert!(storage.get_status_row("T-1").await.is_err());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_status_row(&completed_row("T-1")).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get_status_row("T-1").await.unwrap().is_some());

        let result = ro.upsert_status_row(&completed_row("T-2")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("ts_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}

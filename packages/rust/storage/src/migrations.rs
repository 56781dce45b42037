//! SQL migration definitions for the status sheet database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: status_rows",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per tool, copied verbatim from the status sheet export
CREATE TABLE IF NOT EXISTS status_rows (
    tool_id            TEXT PRIMARY KEY,
    status             TEXT NOT NULL DEFAULT '',
    current_step       TEXT NOT NULL DEFAULT '',
    report_sent        TEXT NOT NULL DEFAULT '',
    direct_closed_at   TEXT NOT NULL DEFAULT '',
    indirect_closed_at TEXT NOT NULL DEFAULT '',
    updated_at         TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

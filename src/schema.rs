use rusqlite::{Connection, Result};

/// Initialize the journal store database schema
pub fn init_store_schema(conn: &Connection) -> Result<()> {
    // Schema version table for the journal store
    conn.execute(
        "CREATE TABLE IF NOT EXISTS store_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Check current store schema version
    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM store_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_store_schema_v1(conn)?;
        conn.execute("INSERT INTO store_schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create journal store schema version 1
fn create_store_schema_v1(conn: &Connection) -> Result<()> {
    // Table: journal_store - one JSON payload per (user, kind).
    // Rows are written with INSERT OR REPLACE, so updated_at refreshes
    // through its default on every save.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS journal_store (
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('photos', 'profile', 'last_sync')),
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, kind)
        )",
        [],
    )?;

    Ok(())
}

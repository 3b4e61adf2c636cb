use rusqlite::Connection;

use crate::error::Result;

/// Initialise the document and ticker tables.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            id          TEXT PRIMARY KEY,
            collection  TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents(collection, created_at DESC);

        CREATE TABLE IF NOT EXISTS ticker (
            id          INTEGER PRIMARY KEY CHECK (id = 1),
            text        TEXT NOT NULL,
            enabled     INTEGER NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

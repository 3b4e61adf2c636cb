use std::sync::{Mutex, MutexGuard, PoisonError};

use livecart_core::time::{format_ts, now_millis};
use livecart_core::types::TickerState;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::repository::{Collection, Filter, Repository};

/// SQLite-backed document store.
///
/// Wraps a single connection in a `Mutex`; every call is short and the
/// gateway issues at most one statement per request.
pub struct SqliteRepository {
    db: Mutex<Connection>,
}

impl SqliteRepository {
    /// Wrap an open connection, running the schema migration first.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Repository for SqliteRepository {
    #[instrument(skip(self, record))]
    fn append(&self, collection: Collection, record: Value) -> Result<Value> {
        let Value::Object(mut body) = record else {
            return Err(StoreError::InvalidRecord(
                "record must be a JSON object".to_string(),
            ));
        };

        let id = Uuid::now_v7().to_string();
        let created_at = format_ts(&now_millis());
        body.insert("id".to_string(), Value::String(id.clone()));
        body.insert("created_at".to_string(), Value::String(created_at.clone()));
        let body = Value::Object(body);

        self.conn().execute(
            "INSERT INTO documents (id, collection, body, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, collection.as_str(), body.to_string(), created_at],
        )?;
        debug!(%id, "record appended");
        Ok(body)
    }

    #[instrument(skip(self, filter))]
    fn list(&self, collection: Collection, filter: &Filter, limit: usize) -> Result<Vec<Value>> {
        let mut sql = String::from("SELECT body FROM documents WHERE collection = ?1");
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(collection.as_str().to_string())];

        for (field, value) in &filter.eq {
            if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(StoreError::InvalidFilter(format!("bad field name: {field}")));
            }
            params.push(SqlValue::Text(format!("$.{field}")));
            params.push(to_sql_value(field, value)?);
            sql.push_str(&format!(
                " AND json_extract(body, ?{}) = ?{}",
                params.len() - 1,
                params.len()
            ));
        }
        params.push(SqlValue::Integer(limit as i64));
        sql.push_str(&format!(
            " ORDER BY created_at DESC, rowid DESC LIMIT ?{}",
            params.len()
        ));

        let db = self.conn();
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            row.get::<_, String>(0)
        })?;

        let mut records = Vec::new();
        for body in rows {
            records.push(serde_json::from_str(&body?)?);
        }
        Ok(records)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let db = self.conn();
        load(&db, collection, id)
    }

    #[instrument(skip(self, patch))]
    fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Value> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidRecord("patch must be a JSON object".to_string()));
        };

        let db = self.conn();
        let Some(Value::Object(mut body)) = load(&db, collection, id)? else {
            return Err(not_found(collection, id));
        };
        merge(&mut body, patch);
        let body = Value::Object(body);

        db.execute(
            "UPDATE documents SET body = ?1 WHERE id = ?2 AND collection = ?3",
            rusqlite::params![body.to_string(), id, collection.as_str()],
        )?;
        Ok(body)
    }

    #[instrument(skip(self))]
    fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let rows_changed = self.conn().execute(
            "DELETE FROM documents WHERE id = ?1 AND collection = ?2",
            rusqlite::params![id, collection.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    fn ticker_state(&self) -> Result<TickerState> {
        let db = self.conn();
        match db.query_row("SELECT text, enabled FROM ticker WHERE id = 1", [], |row| {
            Ok(TickerState {
                text: row.get(0)?,
                enabled: row.get::<_, i64>(1)? != 0,
            })
        }) {
            Ok(state) => Ok(state),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(TickerState::default()),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    fn set_ticker_state(&self, text: &str, enabled: bool) -> Result<TickerState> {
        let now = format_ts(&now_millis());
        self.conn().execute(
            "INSERT INTO ticker (id, text, enabled, updated_at) VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at",
            rusqlite::params![text, enabled as i64, now],
        )?;
        Ok(TickerState {
            text: text.to_string(),
            enabled,
        })
    }
}

fn load(db: &Connection, collection: Collection, id: &str) -> Result<Option<Value>> {
    match db.query_row(
        "SELECT body FROM documents WHERE id = ?1 AND collection = ?2",
        rusqlite::params![id, collection.as_str()],
        |row| row.get::<_, String>(0),
    ) {
        Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Database(e)),
    }
}

fn merge(body: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        if key == "id" || key == "created_at" {
            continue;
        }
        body.insert(key, value);
    }
}

/// JSON scalars as `json_extract` returns them: booleans become 0/1.
fn to_sql_value(field: &str, value: &Value) -> Result<SqlValue> {
    match value {
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Bool(b) => Ok(SqlValue::Integer(*b as i64)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => Ok(SqlValue::Real(n.as_f64().unwrap_or_default())),
        },
        _ => Err(StoreError::InvalidFilter(format!(
            "field {field} must be compared with a scalar"
        ))),
    }
}

fn not_found(collection: Collection, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

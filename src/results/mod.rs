// # Structured-result store
//
// Materializes tabular inputs (SQL-like result sets) as real tables in an
// embedded SQLite database so callers can re-query a stored result without
// ever pulling the whole thing back into the model's context (spec §4.E).
//
// The teacher repo (`harborgrid-justin-rusty-db`) builds its own
// storage/execution/catalog engine from scratch — the right grounding for
// tiers A/B, but far too large a surface to repurpose for "create one table
// per stored result, let callers run ad-hoc SQL against it". `rusqlite` is
// the crate the retrieval pack's other storage-engine repos reach for when
// they need a real embedded SQL engine rather than hand-rolled pages, so
// this tier borrows its dependency from there (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::cancellation::CancellationToken;
use crate::error::{CacheError, Result};
use crate::reference::{Location, Reference};
use crate::sweeper::{TtlSweeper, DEFAULT_SWEEP_INTERVAL};

/// One cell of a stored row — the tagged union spec §9 calls for.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Text(b.to_string()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CellValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    CellValue::Float(f)
                } else {
                    CellValue::Text(n.to_string())
                }
            }
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    fn as_sql_text(&self) -> rusqlite::types::Value {
        match self {
            CellValue::Null => rusqlite::types::Value::Null,
            CellValue::Int(i) => rusqlite::types::Value::Text(i.to_string()),
            CellValue::Float(f) => rusqlite::types::Value::Text(f.to_string()),
            CellValue::Text(s) => rusqlite::types::Value::Text(s.clone()),
            CellValue::Blob(b) => {
                rusqlite::types::Value::Text(String::from_utf8_lossy(b).to_string())
            }
        }
    }
}

pub struct TabularInput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularInput {
    /// Parses the `{columns: [string], rows: [[value]]}` shape with
    /// case-insensitive keys. Fails with `Invalid` (NoColumns) if columns
    /// are absent or empty.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CacheError::Invalid("structured input is not a mapping".to_string()))?;

        let columns_value = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("columns"))
            .map(|(_, v)| v)
            .ok_or_else(|| CacheError::Invalid("NoColumns: columns field is missing".to_string()))?;
        let columns: Vec<String> = columns_value
            .as_array()
            .ok_or_else(|| CacheError::Invalid("columns must be an array".to_string()))?
            .iter()
            .map(|c| c.as_str().unwrap_or_default().to_string())
            .collect();
        if columns.is_empty() {
            return Err(CacheError::Invalid("NoColumns: columns array is empty".to_string()));
        }

        let rows_value = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("rows"))
            .map(|(_, v)| v);
        let rows: Vec<Vec<CellValue>> = match rows_value.and_then(|v| v.as_array()) {
            Some(arr) => arr
                .iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(CellValue::from_json).collect())
                        .unwrap_or_default()
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self { columns, rows })
    }
}

/// Maps characters outside `[A-Za-z0-9_]` to `_`, prefixes `col_` if the
/// result begins with a digit, and falls back to `fallback` if empty
/// (spec §4.E, shared identifier-sanitization rule).
pub fn sanitize_identifier(raw: &str, fallback: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if mapped.is_empty() {
        return fallback.to_string();
    }
    if mapped.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        format!("col_{mapped}")
    } else {
        mapped
    }
}

fn table_name_for(id: &str) -> String {
    format!("result_{}", sanitize_identifier(id, "id"))
}

#[derive(Debug, Clone)]
pub struct ResultMetadata {
    pub id: String,
    pub table_name: String,
    pub row_count: u64,
    pub column_count: u64,
    pub columns: Vec<String>,
    pub preview: Value,
    pub stored_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// One mutex serializes all access to the embedded database (spec §5).
pub struct ResultStore {
    conn: Mutex<Connection>,
}

impl ResultStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sql_result_metadata (
                id TEXT PRIMARY KEY,
                table_name TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                column_count INTEGER NOT NULL,
                columns_json TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                accessed_at TEXT NOT NULL,
                size_bytes INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sql_result_metadata (
                id TEXT PRIMARY KEY,
                table_name TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                column_count INTEGER NOT NULL,
                columns_json TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                accessed_at TEXT NOT NULL,
                size_bytes INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn store(&self, id: &str, data: &Value) -> Result<Reference> {
        let input = TabularInput::from_json(data)?;
        let table_name = table_name_for(id);
        let size_bytes = serde_json::to_vec(data)?.len() as u64;

        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(data)?);
        let checksum = hex::encode(hasher.finalize());

        let conn = self.conn.lock();

        let column_defs: Vec<String> = input
            .columns
            .iter()
            .map(|c| format!("\"{}\" TEXT", sanitize_identifier(c, "col")))
            .collect();
        conn.execute(&format!("DROP TABLE IF EXISTS \"{table_name}\""), [])?;
        conn.execute(
            &format!("CREATE TABLE \"{table_name}\" ({})", column_defs.join(", ")),
            [],
        )?;

        let placeholders: Vec<String> = (0..input.columns.len()).map(|_| "?".to_string()).collect();
        let insert_sql = format!(
            "INSERT INTO \"{table_name}\" VALUES ({})",
            placeholders.join(", ")
        );
        {
            let mut stmt = conn.prepare(&insert_sql)?;
            for row in &input.rows {
                let values: Vec<rusqlite::types::Value> = row.iter().map(|c| c.as_sql_text()).collect();
                stmt.execute(params_from_iter(values))?;
            }
        }

        let now = Utc::now();
        let columns_json = serde_json::to_string(&input.columns)?;
        let upsert_result = conn.execute(
            "INSERT INTO sql_result_metadata
                (id, table_name, row_count, column_count, columns_json, stored_at, accessed_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                table_name = excluded.table_name,
                row_count = excluded.row_count,
                column_count = excluded.column_count,
                columns_json = excluded.columns_json,
                stored_at = excluded.stored_at,
                accessed_at = excluded.accessed_at,
                size_bytes = excluded.size_bytes",
            rusqlite::params![
                id,
                table_name,
                input.rows.len() as i64,
                input.columns.len() as i64,
                columns_json,
                now.to_rfc3339(),
                now.to_rfc3339(),
                size_bytes as i64,
            ],
        );

        if let Err(e) = upsert_result {
            let _ = conn.execute(&format!("DROP TABLE IF EXISTS \"{table_name}\""), []);
            return Err(e.into());
        }

        Ok(Reference {
            id: id.to_string(),
            size_bytes,
            location: Location::Database,
            checksum,
            compressed: false,
            content_type: "application/sql".to_string(),
            metadata: HashMap::new(),
            stored_at: now,
        })
    }

    /// Cancelable form of [`Self::store`] (spec §5: the embedded database
    /// is one of the core's blocking points). The table and metadata row
    /// are still committed if cancellation lands mid-write; only the
    /// returned outcome becomes `Cancelled`.
    pub fn store_cancelable(&self, token: &CancellationToken, id: &str, data: &Value) -> Result<Reference> {
        token.guard(|| self.store(id, data))
    }

    /// Cancelable form of [`Self::query`].
    pub fn query_cancelable(&self, token: &CancellationToken, id: &str, sql_text: &str) -> Result<QueryResult> {
        token.guard(|| self.query(id, sql_text))
    }

    /// Runs `sql_text` against the connection. Callers are expected to
    /// reference the table by name themselves; this store never rewrites
    /// the query (spec §4.E, §9 open question on query-capability scoping).
    pub fn query(&self, id: &str, sql_text: &str) -> Result<QueryResult> {
        let conn = self.conn.lock();
        self.touch_accessed_at(&conn, id)?;

        let mut stmt = conn.prepare(sql_text)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows_out = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut row_out = Vec::with_capacity(column_names.len());
            for i in 0..column_names.len() {
                let value: rusqlite::types::Value = row.get(i)?;
                row_out.push(sql_value_to_json(value));
            }
            rows_out.push(row_out);
        }

        Ok(QueryResult {
            columns: column_names,
            rows: rows_out,
        })
    }

    fn touch_accessed_at(&self, conn: &Connection, id: &str) -> Result<()> {
        let updated = conn.execute(
            "UPDATE sql_result_metadata SET accessed_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(CacheError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn get_metadata(&self, id: &str) -> Result<ResultMetadata> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT table_name, row_count, column_count, columns_json, stored_at, accessed_at, size_bytes
             FROM sql_result_metadata WHERE id = ?1",
            [id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, i64>(6)?,
                ))
            },
        );

        let (table_name, row_count, column_count, columns_json, stored_at, accessed_at, size_bytes) = match row {
            Ok(v) => v,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(CacheError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        };

        let columns: Vec<String> = serde_json::from_str(&columns_json).unwrap_or_default();
        let preview = self
            .build_preview(&conn, &table_name, row_count as u64)
            .unwrap_or(Value::Array(Vec::new()));

        Ok(ResultMetadata {
            id: id.to_string(),
            table_name,
            row_count: row_count as u64,
            column_count: column_count as u64,
            columns,
            preview,
            stored_at: DateTime::parse_from_rfc3339(&stored_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            accessed_at: DateTime::parse_from_rfc3339(&accessed_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            size_bytes: size_bytes as u64,
        })
    }

    /// Best-effort: any read error here yields an empty preview rather
    /// than failing `GetMetadata` outright (spec §4.E).
    fn build_preview(&self, conn: &Connection, table_name: &str, row_count: u64) -> Result<Value> {
        let first_rows = query_rows(conn, &format!("SELECT * FROM \"{table_name}\" LIMIT 5"))?;
        let mut preview = serde_json::json!({
            "first5": first_rows.into_iter().map(Value::Array).collect::<Vec<_>>(),
            "last5": Value::Array(Vec::new()),
        });
        if row_count > 10 {
            let offset = row_count - 5;
            let last_rows = query_rows(
                conn,
                &format!("SELECT * FROM \"{table_name}\" LIMIT 5 OFFSET {offset}"),
            )?;
            preview["last5"] = Value::Array(last_rows.into_iter().map(Value::Array).collect());
        }
        Ok(preview)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let table_name: Option<String> = conn
            .query_row(
                "SELECT table_name FROM sql_result_metadata WHERE id = ?1",
                [id],
                |r| r.get(0),
            )
            .ok();
        if let Some(table_name) = table_name {
            conn.execute(&format!("DROP TABLE IF EXISTS \"{table_name}\""), [])?;
        }
        conn.execute("DELETE FROM sql_result_metadata WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Background TTL sweep (spec §4.E): drops tables (and metadata rows)
    /// whose `stored_at` predates `now - ttl`.
    pub fn sweep_expired(&self, ttl_seconds: u64) -> Result<()> {
        let conn = self.conn.lock();
        let cutoff = Utc::now() - Duration::seconds(ttl_seconds as i64);
        let mut stmt = conn.prepare("SELECT id, table_name, stored_at FROM sql_result_metadata")?;
        let expired: Vec<(String, String)> = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?)))?
            .filter_map(|r| r.ok())
            .filter_map(|(id, table_name, stored_at)| {
                let stored_at = DateTime::parse_from_rfc3339(&stored_at).ok()?.with_timezone(&Utc);
                if stored_at < cutoff {
                    Some((id, table_name))
                } else {
                    None
                }
            })
            .collect();
        drop(stmt);
        for (id, table_name) in expired {
            conn.execute(&format!("DROP TABLE IF EXISTS \"{table_name}\""), [])?;
            conn.execute("DELETE FROM sql_result_metadata WHERE id = ?1", [&id])?;
            tracing::debug!(id, "structured-result tier: swept expired table");
        }
        Ok(())
    }

    /// Spawns the standalone periodic TTL sweeper spec §4.E/§5 require: a
    /// background task ticking every 5 minutes and calling
    /// [`Self::sweep_expired`]. Sweep errors are logged and the loop keeps
    /// running, the same best-effort handling module G's purger uses.
    /// Stop it with `TtlSweeper::stop(sweeper).await`.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>, ttl_seconds: u64) -> TtlSweeper {
        self.spawn_ttl_sweeper_with_interval(ttl_seconds, DEFAULT_SWEEP_INTERVAL)
    }

    /// As [`Self::spawn_ttl_sweeper`], with a caller-chosen interval —
    /// tests use a short one instead of waiting 5 real minutes.
    pub fn spawn_ttl_sweeper_with_interval(
        self: &Arc<Self>,
        ttl_seconds: u64,
        interval: std::time::Duration,
    ) -> TtlSweeper {
        let store = self.clone();
        TtlSweeper::spawn(interval, move || {
            if let Err(e) = store.sweep_expired(ttl_seconds) {
                tracing::error!(error = %e, "structured-result tier: TTL sweep failed");
            }
        })
    }
}

fn sql_value_to_json(value: rusqlite::types::Value) -> Value {
    match value {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(i) => Value::from(i),
        rusqlite::types::Value::Real(f) => Value::from(f),
        rusqlite::types::Value::Text(s) => Value::String(s),
        rusqlite::types::Value::Blob(b) => Value::String(String::from_utf8_lossy(&b).to_string()),
    }
}

fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<Vec<Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let cols = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut row_out = Vec::with_capacity(cols);
        for i in 0..cols {
            let v: rusqlite::types::Value = row.get(i)?;
            row_out.push(sql_value_to_json(v));
        }
        out.push(row_out);
    }
    Ok(out)
}

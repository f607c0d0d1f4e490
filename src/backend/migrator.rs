// Versioned schema migrations against the embedded database tier E uses
// (spec §4.H). A `schema_migrations` table records applied versions and
// timestamps; `Migrate` applies all pending `up` migrations in ascending
// order, each in its own transaction, halting and surfacing the offending
// version on failure.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up_sql: String,
    pub down_sql: String,
}

#[derive(Debug, Clone)]
pub struct PendingMigration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

pub struct Migrator {
    conn: Mutex<Connection>,
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new(conn: Connection, mut migrations: Vec<Migration>) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;
        migrations.sort_by_key(|m| m.version);
        Ok(Self {
            conn: Mutex::new(conn),
            migrations,
        })
    }

    /// Highest applied version, 0 if none.
    pub fn current_version(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let version: Option<i64> = conn.query_row(
            "SELECT MAX(version) FROM schema_migrations",
            [],
            |r| r.get(0),
        )?;
        Ok(version.unwrap_or(0))
    }

    pub fn pending_migrations(&self) -> Result<Vec<PendingMigration>> {
        let current = self.current_version()?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| m.version > current)
            .map(|m| PendingMigration {
                version: m.version,
                description: m.description.clone(),
                sql: m.up_sql.clone(),
            })
            .collect())
    }

    /// Applies every pending migration in ascending order, each inside its
    /// own transaction. On failure, halts and returns an error naming the
    /// offending version — migrations after it are never attempted.
    pub fn migrate(&self) -> Result<()> {
        let current = self.current_version()?;
        let mut conn = self.conn.lock();
        for migration in self.migrations.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            if let Err(e) = tx.execute_batch(&migration.up_sql) {
                return Err(crate::error::CacheError::Database(format!(
                    "migration {} ({}) failed: {e}",
                    migration.version, migration.description
                )));
            }
            tx.execute(
                "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![migration.version, migration.description, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version = migration.version, "migrator: applied migration");
        }
        Ok(())
    }
}

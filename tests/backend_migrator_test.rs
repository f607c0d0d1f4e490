// Versioned migration orchestration against the embedded database tier
// (spec §4.H): pending migrations surfaced for dry-run, applied in order,
// with the offending version reported on failure.

use loom_cache::{Migration, Migrator};
use rusqlite::Connection;

fn sample_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "create sessions table".to_string(),
            up_sql: "CREATE TABLE sessions (id TEXT PRIMARY KEY, created_at TEXT NOT NULL)".to_string(),
            down_sql: "DROP TABLE sessions".to_string(),
        },
        Migration {
            version: 2,
            description: "add sessions.closed_at".to_string(),
            up_sql: "ALTER TABLE sessions ADD COLUMN closed_at TEXT".to_string(),
            down_sql: "ALTER TABLE sessions DROP COLUMN closed_at".to_string(),
        },
        Migration {
            version: 3,
            description: "index sessions by created_at".to_string(),
            up_sql: "CREATE INDEX idx_sessions_created_at ON sessions (created_at)".to_string(),
            down_sql: "DROP INDEX idx_sessions_created_at".to_string(),
        },
    ]
}

#[test]
fn current_version_starts_at_zero_and_advances_after_migrate() {
    let migrator = Migrator::new(Connection::open_in_memory().unwrap(), sample_migrations()).unwrap();
    assert_eq!(migrator.current_version().unwrap(), 0);

    migrator.migrate().unwrap();
    assert_eq!(migrator.current_version().unwrap(), 3);
}

#[test]
fn pending_migrations_lists_unapplied_versions_for_dry_run() {
    let migrator = Migrator::new(Connection::open_in_memory().unwrap(), sample_migrations()).unwrap();
    let pending = migrator.pending_migrations().unwrap();
    assert_eq!(pending.iter().map(|m| m.version).collect::<Vec<_>>(), vec![1, 2, 3]);

    migrator.migrate().unwrap();
    assert!(migrator.pending_migrations().unwrap().is_empty());
}

#[test]
fn migrate_is_idempotent_across_repeated_calls() {
    let migrator = Migrator::new(Connection::open_in_memory().unwrap(), sample_migrations()).unwrap();
    migrator.migrate().unwrap();
    migrator.migrate().unwrap();
    assert_eq!(migrator.current_version().unwrap(), 3);
}

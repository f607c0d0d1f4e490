//! Backend wiring for the embedded database tier.
//!
//! Only the migrator contract is built here: versioned migrations against
//! the same `rusqlite` connection the structured-result store uses. A
//! facade composing the sibling stores (memory, disk, tracker, results)
//! behind one handle is explicitly out of scope (spec §1, §4.H) — callers
//! compose those stores directly and reach for `Migrator` only when they
//! need to evolve the embedded schema.

mod migrator;

pub use migrator::{Migration, Migrator, PendingMigration};

use crate::error::Result;

/// Dry-run visibility into pending schema migrations. `Migrator` implements
/// this directly; a composite backend facade would forward to its embedded
/// `Migrator`.
pub trait MigrationInspector {
    fn pending_migrations(&self) -> Result<Vec<PendingMigration>>;
}

impl MigrationInspector for Migrator {
    fn pending_migrations(&self) -> Result<Vec<PendingMigration>> {
        Migrator::pending_migrations(self)
    }
}

/// Storage introspection a composite backend facade may choose to expose
/// (current schema version, connection pool stats). No facade struct in
/// this crate implements it — there is no sibling-store composition here
/// to introspect — but the contract is named so one built elsewhere can.
pub trait StorageDetailProvider {
    fn storage_details(&self) -> Result<(i64, String)>;
}

/// Multi-tenant admin store access. Only meaningful for backends that are
/// actually multi-tenant; this crate's embedded SQLite tier is not, so
/// nothing here implements it.
pub trait AdminStorageProvider {
    fn admin_store(&self, tenant: &str) -> Result<()>;
}

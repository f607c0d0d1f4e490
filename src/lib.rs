//! Shared data-reference cache for multi-agent tool output.
//!
//! Large tool results are stored once and handed back as small
//! [`Reference`] handles that agents pass around instead of the payload
//! itself. A two-tier store (in-memory LRU, overflowing to disk) backs
//! the references; a session tracker pins them for the lifetime of a
//! session; a metadata layer exposes schema and bounded previews without
//! requiring a full fetch; and a structured-result store lets tabular
//! results be re-queried with SQL instead of re-fetched wholesale.

pub mod backend;
pub mod cancellation;
pub mod config;
pub mod disk;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod purger;
pub mod reference;
pub mod results;
pub mod singleton;
pub mod sweeper;
pub mod tracker;

pub use backend::{Migration, Migrator, PendingMigration};
pub use cancellation::CancellationToken;
pub use config::{DiskConfig, MemoryConfig, ResultStoreConfig};
pub use disk::{DiskEntryMetadata, DiskStats, DiskStore};
pub use error::{CacheError, Result};
pub use memory::{MemoryCache, MemoryStats, OverflowSink};
pub use metadata::{get_metadata, MetadataRecord};
pub use purger::{PurgeDeleted, SoftDeletePurger};
pub use reference::{Location, Reference};
pub use results::{CellValue, QueryResult, ResultMetadata, ResultStore, TabularInput};
pub use sweeper::{TtlSweeper, DEFAULT_SWEEP_INTERVAL};
pub use tracker::{SessionTracker, TrackerStats};

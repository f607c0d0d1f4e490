// The pluggable eviction target for the in-memory tier (spec's "overflow
// sink", §4.B / glossary). `DiskStore` is the only implementation shipped
// here, but keeping it behind a trait lets tests substitute a fake sink to
// exercise the no-sink `NoCapacity` path in isolation.

use std::collections::HashMap;

use crate::disk::{DiskEntryMetadata, DiskStore};
use crate::error::Result;

pub trait OverflowSink: Send + Sync {
    fn store(
        &self,
        id: &str,
        bytes: &[u8],
        checksum: &str,
        content_type: &str,
        compressed: bool,
        metadata: HashMap<String, String>,
    ) -> Result<()>;

    fn retrieve(&self, id: &str) -> Result<Vec<u8>>;

    fn entry_metadata(&self, id: &str) -> Option<DiskEntryMetadata>;

    fn delete(&self, id: &str) -> Result<()>;
}

impl OverflowSink for DiskStore {
    fn store(
        &self,
        id: &str,
        bytes: &[u8],
        checksum: &str,
        content_type: &str,
        compressed: bool,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        DiskStore::store(self, id, bytes, checksum, content_type, compressed, metadata)
    }

    fn retrieve(&self, id: &str) -> Result<Vec<u8>> {
        DiskStore::retrieve(self, id)
    }

    fn entry_metadata(&self, id: &str) -> Option<DiskEntryMetadata> {
        DiskStore::metadata(self, id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        DiskStore::delete(self, id)
    }
}

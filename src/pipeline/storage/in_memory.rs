use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::domain::Record;
use crate::pipeline::ingestion::IngestionResult;

/// The full contents of the store at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Canonical names of the columns that fed the records
    pub schema: Vec<String>,
    pub records: Vec<Record>,
    /// Summary of the ingestion that produced this set
    pub source: Option<IngestionResult>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// In-memory record store.
///
/// Readers take an `Arc` snapshot; a replacement swaps the whole set at once, so a
/// snapshot never mixes rows from two ingestions.
pub struct RecordStore {
    current: RwLock<Arc<RecordSet>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RecordSet::default())),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Arc<RecordSet>> {
        // Writers only swap an Arc, so a poisoned lock still holds a whole set
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn write_guard(&self) -> RwLockWriteGuard<'_, Arc<RecordSet>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current contents
    pub fn snapshot(&self) -> Arc<RecordSet> {
        Arc::clone(&self.read_guard())
    }

    /// Replace all contents at once
    pub fn replace(&self, set: RecordSet) {
        let count = set.len();
        *self.write_guard() = Arc::new(set);
        debug!("Record store replaced with {} records", count);
    }

    pub fn clear(&self) {
        self.replace(RecordSet::default());
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(ids: &[&str]) -> RecordSet {
        RecordSet {
            schema: vec!["id".to_string()],
            records: ids
                .iter()
                .enumerate()
                .map(|(i, id)| Record::new(*id, i + 2))
                .collect(),
            source: None,
        }
    }

    #[test]
    fn test_store_starts_empty() {
        let store = RecordStore::new();
        assert!(store.is_empty());
        assert_eq!(store.snapshot().len(), 0);
    }

    #[test]
    fn test_replace_is_not_additive() {
        let store = RecordStore::new();
        store.replace(set_of(&["001", "002"]));
        store.replace(set_of(&["003"]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot().records[0].id, "003");
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let store = RecordStore::new();
        store.replace(set_of(&["001", "002"]));
        let before = store.snapshot();
        store.replace(set_of(&["003"]));
        assert_eq!(before.len(), 2);
        assert_eq!(store.snapshot().len(), 1);
    }
}

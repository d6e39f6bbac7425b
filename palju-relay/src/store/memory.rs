use super::{SampleIndex, SampleStore, StoreError, StoredSample};
use crate::models::Sample;
use parking_lot::RwLock;

/// Stockage volatile, même contrat que le journal disque
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<SampleIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleStore for MemoryStore {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.index.write().insert(StoredSample::new(sample.clone()));
        Ok(())
    }

    fn scan_all(&self) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().all())
    }

    fn scan_range(&self, after: i64, before: i64) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().range(after, before))
    }

    fn scan_recent_limit(&self, n: usize) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().recent(n))
    }

    fn scan_since(&self, since: i64) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().since(since))
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.index.read().len())
    }
}

//! In-process store.

use parking_lot::Mutex;

use super::{PoolStore, StoreError, StoreState, StoredPool};
use crate::ledger::Extent;
use crate::pool::Pool;

/// Store that keeps everything in memory; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PoolStore for MemoryStore {
    fn load(&self) -> Result<Vec<StoredPool>, StoreError> {
        Ok(self.state.lock().pools())
    }

    fn create_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        self.state.lock().create_pool(pool)
    }

    fn delete_pool(&self, pool_id: u64) -> Result<(), StoreError> {
        self.state.lock().delete_pool(pool_id)
    }

    fn insert_extent(&self, pool_id: u64, extent: &Extent) -> Result<(), StoreError> {
        self.state.lock().insert_extent(pool_id, extent)
    }

    fn remove_extent(&self, pool_id: u64, offset: u128) -> Result<(), StoreError> {
        self.state.lock().remove_extent(pool_id, offset)
    }
}

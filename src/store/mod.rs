//! Persistence for pools and their extents.
//!
//! The registry records every mutation through a [`PoolStore`]. Each call is
//! all-or-nothing: when it returns an error the store is unchanged, and the
//! registry rolls back its in-memory ledger to match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::ledger::Extent;
use crate::pool::Pool;

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::SnapshotStore;

/// Errors raised by a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Pool {0} is not present in the store")]
    MissingPool(u64),

    #[error("Store rejected the change: {0}")]
    Rejected(String),
}

/// A pool as recorded by a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPool {
    pub pool: Pool,
    pub extents: BTreeMap<u128, Extent>,
}

/// Durable record of pools and extents
pub trait PoolStore: Send + Sync {
    /// Every pool with its extents
    fn load(&self) -> Result<Vec<StoredPool>, StoreError>;

    fn create_pool(&self, pool: &Pool) -> Result<(), StoreError>;

    /// Remove a pool together with all of its extents
    fn delete_pool(&self, pool_id: u64) -> Result<(), StoreError>;

    fn insert_extent(&self, pool_id: u64, extent: &Extent) -> Result<(), StoreError>;

    fn remove_extent(&self, pool_id: u64, offset: u128) -> Result<(), StoreError>;
}

/// Store contents shared by the in-memory and snapshot stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoreState {
    pools: BTreeMap<u64, StoredPool>,
}

impl StoreState {
    pub(crate) fn pools(&self) -> Vec<StoredPool> {
        self.pools.values().cloned().collect()
    }

    pub(crate) fn create_pool(&mut self, pool: &Pool) -> Result<(), StoreError> {
        if self.pools.contains_key(&pool.id) {
            return Err(StoreError::Rejected(format!("pool id {} already exists", pool.id)));
        }
        self.pools.insert(
            pool.id,
            StoredPool {
                pool: pool.clone(),
                extents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub(crate) fn delete_pool(&mut self, pool_id: u64) -> Result<(), StoreError> {
        self.pools
            .remove(&pool_id)
            .map(|_| ())
            .ok_or(StoreError::MissingPool(pool_id))
    }

    pub(crate) fn insert_extent(&mut self, pool_id: u64, extent: &Extent) -> Result<(), StoreError> {
        let stored = self
            .pools
            .get_mut(&pool_id)
            .ok_or(StoreError::MissingPool(pool_id))?;
        if stored.extents.contains_key(&extent.offset) {
            return Err(StoreError::Rejected(format!(
                "extent at offset {} already recorded for pool {}",
                extent.offset, pool_id
            )));
        }
        stored.extents.insert(extent.offset, extent.clone());
        Ok(())
    }

    pub(crate) fn remove_extent(&mut self, pool_id: u64, offset: u128) -> Result<(), StoreError> {
        let stored = self
            .pools
            .get_mut(&pool_id)
            .ok_or(StoreError::MissingPool(pool_id))?;
        stored.extents.remove(&offset).map(|_| ()).ok_or_else(|| {
            StoreError::Rejected(format!(
                "no extent at offset {} recorded for pool {}",
                offset, pool_id
            ))
        })
    }
}

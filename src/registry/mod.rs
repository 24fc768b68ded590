//! # Pool Registry
//!
//! The registry is the single entry point for pool management. It owns every
//! pool's ledger and the durable store, and serializes mutations per pool.
//!
//! ## Locking
//!
//! - The name table maps pool names to pool cells. Its lock is held only to
//!   look up, insert or unlink a cell, never while waiting on a cell.
//! - Each pool cell is a `RwLock`. Allocate, release and delete hold the write
//!   side for the whole read-modify-write including the store call; summaries
//!   and listings hold the read side.
//! - Delete marks the cell dead under its write lock before unlinking it, so a
//!   caller that looked the cell up just before the delete sees
//!   `PoolNotFound` once it gets the lock.
//!
//! ## Store failures
//!
//! Every mutation is applied to the in-memory ledger first and then recorded
//! in the store. If the store rejects the change, the ledger (and the RT/RD
//! cursor) is put back before the cell lock is released and the caller gets
//! [`PoolError::Storage`].

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{PoolError, Result};
use crate::ip::cidr::{locate, parse_cidr};
use crate::ip::CidrAllocator;
use crate::ledger::{Extent, Ledger};
use crate::pool::{Allocation, AllocationRequest, Pool, PoolKind, PoolSpec, PoolSummary};
use crate::rtrd::format::parse_value;
use crate::rtrd::{locate_value, LinearAllocator};
use crate::store::{MemoryStore, PoolStore, StoreError, StoredPool};
use crate::utils::validation::validate_pool_spec;

/// Blocks up to this many addresses list every address
pub const DEFAULT_ENUMERATION_LIMIT: u128 = 256;

/// Tunables for a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Largest block whose addresses are enumerated in a rendered allocation
    pub enumeration_limit: u128,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            enumeration_limit: DEFAULT_ENUMERATION_LIMIT,
        }
    }
}

struct PoolState {
    pool: Arc<Pool>,
    ledger: Ledger,
    linear: LinearAllocator,
    /// False while the pool's creation is being recorded and after deletion
    live: bool,
}

type PoolCell = RwLock<PoolState>;

/// Thread-safe owner of all pools
pub struct PoolRegistry {
    pools: RwLock<BTreeMap<String, Arc<PoolCell>>>,
    store: Arc<dyn PoolStore>,
    next_id: AtomicU64,
    settings: RegistrySettings,
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PoolRegistry {
    /// Registry backed by a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self {
            pools: RwLock::new(BTreeMap::new()),
            store: Arc::new(MemoryStore::new()),
            next_id: AtomicU64::new(1),
            settings: RegistrySettings::default(),
        }
    }

    /// Build a registry from everything recorded in `store`
    pub fn open(store: Arc<dyn PoolStore>, settings: RegistrySettings) -> Result<Self> {
        let stored = store.load()?;
        let mut pools = BTreeMap::new();
        let mut max_id = 0u64;
        let mut extent_count = 0usize;

        for StoredPool { pool, extents } in stored {
            if pools.contains_key(&pool.name) {
                return Err(StoreError::Rejected(format!(
                    "pool name '{}' is recorded more than once",
                    pool.name
                ))
                .into());
            }
            max_id = max_id.max(pool.id);
            extent_count += extents.len();

            let ledger = rebuild_ledger(&pool, extents)?;
            let name = pool.name.clone();
            let state = PoolState {
                pool: Arc::new(pool),
                ledger,
                // Cursor 0 is always valid: nothing below it is free
                linear: LinearAllocator::new(),
                live: true,
            };
            pools.insert(name, Arc::new(RwLock::new(state)));
        }

        info!(
            "Loaded {} pools with {} allocations from store",
            pools.len(),
            extent_count
        );

        Ok(Self {
            pools: RwLock::new(pools),
            store,
            next_id: AtomicU64::new(max_id + 1),
            settings,
        })
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    fn cell(&self, name: &str) -> Result<Arc<PoolCell>> {
        self.pools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::PoolNotFound(name.to_string()))
    }

    /// Validate and create a pool.
    ///
    /// The new cell is linked into the name table before the store call so
    /// that the name is reserved, but it stays write-locked and not live
    /// until the store has recorded it. Only this cell waits on the store.
    pub fn create_pool(&self, spec: &PoolSpec) -> Result<PoolSummary> {
        let validated = validate_pool_spec(spec)?;

        let pool = Pool {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: validated.name,
            description: validated.description,
            kind: validated.kind,
            space: validated.space,
            created_at: Utc::now(),
        };
        let ledger = Ledger::new(pool.space.span);
        let summary = pool.summary(&ledger);
        let cell = Arc::new(RwLock::new(PoolState {
            pool: Arc::new(pool),
            ledger,
            linear: LinearAllocator::new(),
            live: false,
        }));

        let mut state = cell.write();
        {
            let mut pools = self.pools.write();
            if pools.contains_key(&summary.name) {
                return Err(PoolError::Conflict(summary.name));
            }
            pools.insert(summary.name.clone(), Arc::clone(&cell));
        }

        if let Err(err) = self.store.create_pool(&state.pool) {
            warn!("Could not record pool '{}': {}", summary.name, err);
            let mut pools = self.pools.write();
            if pools.get(&summary.name).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                pools.remove(&summary.name);
            }
            return Err(err.into());
        }
        state.live = true;

        info!(
            "Created {} pool '{}' (id {}, {} units)",
            summary.family, summary.name, summary.id, summary.total
        );
        Ok(summary)
    }

    /// Delete a pool and every allocation in it
    pub fn delete_pool(&self, name: &str) -> Result<()> {
        let cell = self.cell(name)?;
        let mut state = cell.write();
        if !state.live {
            return Err(PoolError::PoolNotFound(name.to_string()));
        }

        self.store.delete_pool(state.pool.id)?;
        state.live = false;

        let mut pools = self.pools.write();
        if pools.get(name).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            pools.remove(name);
        }
        info!(
            "Deleted pool '{}' with {} allocations",
            name,
            state.ledger.len()
        );
        Ok(())
    }

    /// Allocate from a pool.
    ///
    /// IP pools require `prefix_length`; RT/RD pools reject it.
    pub fn allocate(&self, name: &str, request: AllocationRequest) -> Result<Allocation> {
        let cell = self.cell(name)?;
        let mut guard = cell.write();
        if !guard.live {
            return Err(PoolError::PoolNotFound(name.to_string()));
        }
        let state = &mut *guard;
        let pool = Arc::clone(&state.pool);
        let saved_cursor = state.linear.clone();

        let extent = match (&pool.kind, request.prefix_length) {
            (PoolKind::Ip { network }, Some(prefix_len)) => {
                CidrAllocator::new(&pool.name, network, &pool.space).allocate(
                    &mut state.ledger,
                    prefix_len,
                    request.metadata,
                )?
            }
            (PoolKind::Ip { .. }, None) => {
                return Err(PoolError::validation(
                    "prefix_length is required for IP pools",
                ));
            }
            (PoolKind::RtRd(_), None) => {
                state
                    .linear
                    .allocate(&pool.name, &mut state.ledger, request.metadata)?
            }
            (PoolKind::RtRd(def), Some(_)) => {
                return Err(PoolError::validation(format!(
                    "prefix_length is not valid for {} pools",
                    def.role
                )));
            }
        };

        let rendered = pool.render(&extent, self.settings.enumeration_limit);
        let committed = match rendered {
            Some(allocation) => self
                .store
                .insert_extent(pool.id, &extent)
                .map(|()| allocation)
                .map_err(PoolError::from),
            None => Err(PoolError::validation(format!(
                "offset {} cannot be represented in pool '{}'",
                extent.offset, pool.name
            ))),
        };

        match committed {
            Ok(allocation) => {
                debug!("Allocated {} from pool '{}'", allocation.identifier(), pool.name);
                Ok(allocation)
            }
            Err(err) => {
                warn!(
                    "Rolling back allocation at offset {} in pool '{}': {}",
                    extent.offset, pool.name, err
                );
                state.ledger.remove_exact(extent.offset, extent.length);
                state.linear = saved_cursor;
                Err(err)
            }
        }
    }

    /// Release the allocation named by `identifier`: a CIDR for IP pools,
    /// `admin:number` for RT/RD pools. Only an exact match is released.
    pub fn release(&self, name: &str, identifier: &str) -> Result<()> {
        let cell = self.cell(name)?;
        let mut guard = cell.write();
        if !guard.live {
            return Err(PoolError::PoolNotFound(name.to_string()));
        }
        let state = &mut *guard;
        let pool = Arc::clone(&state.pool);
        let saved_cursor = state.linear.clone();

        let extent = match &pool.kind {
            PoolKind::Ip { network } => {
                CidrAllocator::new(&pool.name, network, &pool.space)
                    .release(&mut state.ledger, identifier)?
            }
            PoolKind::RtRd(def) => {
                let offset =
                    locate_value(&pool.name, def, &pool.space, &state.ledger, identifier)?;
                state
                    .linear
                    .release(&mut state.ledger, offset)
                    .ok_or_else(|| PoolError::AllocationNotFound {
                        pool: pool.name.clone(),
                        identifier: identifier.trim().to_string(),
                    })?
            }
        };

        if let Err(err) = self.store.remove_extent(pool.id, extent.offset) {
            warn!(
                "Rolling back release of '{}' in pool '{}': {}",
                identifier.trim(),
                pool.name,
                err
            );
            state.linear = saved_cursor;
            if let Err(restore) = state.ledger.insert(extent) {
                warn!("Could not restore extent in pool '{}': {}", pool.name, restore);
            }
            return Err(err.into());
        }

        debug!("Released {} from pool '{}'", identifier.trim(), pool.name);
        Ok(())
    }

    /// Allocations of a pool in offset order, taken from one snapshot
    pub fn list(&self, name: &str) -> Result<Listing> {
        let cell = self.cell(name)?;
        let state = cell.read();
        if !state.live {
            return Err(PoolError::PoolNotFound(name.to_string()));
        }

        Ok(Listing {
            pool: Arc::clone(&state.pool),
            extents: state.ledger.iter().cloned().collect(),
            position: 0,
            enumeration_limit: self.settings.enumeration_limit,
        })
    }

    /// Summary of one pool
    pub fn pool(&self, name: &str) -> Result<PoolSummary> {
        let cell = self.cell(name)?;
        let state = cell.read();
        if !state.live {
            return Err(PoolError::PoolNotFound(name.to_string()));
        }
        Ok(state.pool.summary(&state.ledger))
    }

    /// Summaries of every pool, ordered by name
    pub fn pools(&self) -> Vec<PoolSummary> {
        let cells: Vec<Arc<PoolCell>> = self.pools.read().values().cloned().collect();
        let mut summaries = Vec::with_capacity(cells.len());
        for cell in &cells {
            let state = cell.read();
            if state.live {
                summaries.push(state.pool.summary(&state.ledger));
            }
        }
        summaries
    }
}

fn rebuild_ledger(pool: &Pool, extents: BTreeMap<u128, Extent>) -> Result<Ledger> {
    let mut ledger = Ledger::new(pool.space.span);
    for extent in extents.into_values() {
        let aligned = extent.length.is_power_of_two() && extent.offset % extent.length == 0;
        if matches!(pool.kind, PoolKind::Ip { .. }) && !aligned {
            return Err(StoreError::Rejected(format!(
                "extent at offset {} in pool '{}' is not an aligned block",
                extent.offset, pool.name
            ))
            .into());
        }
        if matches!(pool.kind, PoolKind::RtRd(_)) && extent.length != 1 {
            return Err(StoreError::Rejected(format!(
                "extent at offset {} in pool '{}' covers more than one value",
                extent.offset, pool.name
            ))
            .into());
        }
        ledger.insert(extent).map_err(|e| {
            StoreError::Rejected(format!("pool '{}': {}", pool.name, e))
        })?;
    }
    Ok(ledger)
}

/// Lazily rendered allocations of one pool.
///
/// The extents are copied when the listing is taken, so later changes to the
/// pool do not show up. A clone continues from the same position.
#[derive(Debug, Clone)]
pub struct Listing {
    pool: Arc<Pool>,
    extents: Arc<[Extent]>,
    position: usize,
    enumeration_limit: u128,
}

impl Listing {
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Allocations not yet yielded
    pub fn remaining(&self) -> usize {
        self.extents.len() - self.position
    }

    /// Continue with the allocations that follow `identifier`.
    ///
    /// The identifier does not have to be allocated any more; listing resumes
    /// at the first allocation placed after it.
    pub fn resume_after(mut self, identifier: &str) -> Result<Self> {
        let offset = match &self.pool.kind {
            PoolKind::Ip { .. } => {
                let net = parse_cidr(identifier)?;
                locate(&self.pool.space, &net)?
                    .map(|(offset, _)| offset)
                    .ok_or_else(|| PoolError::AllocationNotFound {
                        pool: self.pool.name.clone(),
                        identifier: net.to_string(),
                    })?
            }
            PoolKind::RtRd(def) => {
                let (admin, number) = parse_value(identifier)?;
                let not_found = || PoolError::AllocationNotFound {
                    pool: self.pool.name.clone(),
                    identifier: identifier.trim().to_string(),
                };
                if admin.trim() != def.admin_value.to_string() {
                    return Err(not_found());
                }
                self.pool
                    .space
                    .offset_of(u128::from(number))
                    .ok_or_else(not_found)?
            }
        };

        self.position = self.extents.partition_point(|e| e.offset <= offset);
        Ok(self)
    }
}

impl Iterator for Listing {
    type Item = Allocation;

    fn next(&mut self) -> Option<Allocation> {
        while let Some(extent) = self.extents.get(self.position) {
            self.position += 1;
            if let Some(allocation) = self.pool.render(extent, self.enumeration_limit) {
                return Some(allocation);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

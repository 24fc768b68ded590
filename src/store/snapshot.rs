//! File-backed store.
//!
//! The whole store is written as one zstd-compressed bincode snapshot after
//! every change. The new snapshot goes to a sibling temporary file that is
//! then renamed over the old one, so a crash or a failed write leaves the
//! previous snapshot in place.

use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{PoolStore, StoreError, StoreState, StoredPool};
use crate::ledger::Extent;
use crate::pool::Pool;

/// Snapshot layout version written to disk
const SNAPSHOT_VERSION: u32 = 1;

/// zstd compression level for snapshots
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    state: StoreState,
}

/// Store persisted to a single snapshot file
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl SnapshotStore {
    /// Open the snapshot at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let state = read_snapshot(&path)?;
            info!("Loaded state snapshot from {:?}", path);
            state
        } else {
            info!("No state snapshot at {:?}, starting empty", path);
            StoreState::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the state, persist the copy, then adopt
    /// it. On any error the current state is left untouched.
    fn commit<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreState) -> Result<(), StoreError>,
    {
        let mut state = self.state.lock();
        let mut next = state.clone();
        change(&mut next)?;
        write_snapshot(&self.path, &next)?;
        *state = next;
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_snapshot(path: &Path) -> Result<StoreState, StoreError> {
    let file = File::open(path).map_err(io_error(path))?;
    let bytes = zstd::decode_all(file).map_err(io_error(path))?;
    let snapshot: Snapshot = bincode::deserialize(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::Rejected(format!(
            "unsupported snapshot version {} in {:?}",
            snapshot.version, path
        )));
    }
    Ok(snapshot.state)
}

/// Sibling of `path` with `.tmp` appended to the full file name
fn temp_path(path: &Path) -> Result<PathBuf, StoreError> {
    let mut name = path
        .file_name()
        .ok_or_else(|| StoreError::Rejected(format!("state path {:?} has no file name", path)))?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

fn write_snapshot(path: &Path, state: &StoreState) -> Result<(), StoreError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        state: state.clone(),
    };
    let bytes = bincode::serialize(&snapshot)?;
    let compressed = zstd::encode_all(&bytes[..], COMPRESSION_LEVEL).map_err(io_error(path))?;

    let tmp_path = temp_path(path)?;
    let mut tmp = File::create(&tmp_path).map_err(io_error(&tmp_path))?;
    tmp.write_all(&compressed).map_err(io_error(&tmp_path))?;
    tmp.sync_all().map_err(io_error(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(io_error(path))?;

    debug!(
        "Wrote state snapshot to {:?} ({} bytes compressed, {} raw)",
        path,
        compressed.len(),
        bytes.len()
    );
    Ok(())
}

impl PoolStore for SnapshotStore {
    fn load(&self) -> Result<Vec<StoredPool>, StoreError> {
        Ok(self.state.lock().pools())
    }

    fn create_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        self.commit(|state| state.create_pool(pool))
    }

    fn delete_pool(&self, pool_id: u64) -> Result<(), StoreError> {
        self.commit(|state| state.delete_pool(pool_id))
    }

    fn insert_extent(&self, pool_id: u64, extent: &Extent) -> Result<(), StoreError> {
        self.commit(|state| state.insert_extent(pool_id, extent))
    }

    fn remove_extent(&self, pool_id: u64, offset: u128) -> Result<(), StoreError> {
        self.commit(|state| state.remove_extent(pool_id, offset))
    }
}

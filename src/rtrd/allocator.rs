//! Sequential RT/RD value allocation.
//!
//! Values are handed out lowest-first. A cursor skips the densely allocated
//! low end of the range; it is kept below every free offset, so a value
//! released behind it is picked up by the very next allocation.

use super::format::parse_value;
use crate::error::{PoolError, Result};
use crate::ledger::{Extent, ExtentMetadata, Ledger};
use crate::pool::RtRdDefinition;
use crate::space::AddressSpace;

/// Next-value allocator for a linear pool.
///
/// Invariant: every offset below `cursor` is allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearAllocator {
    cursor: u128,
}

impl LinearAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> u128 {
        self.cursor
    }

    /// Allocate the lowest free value
    pub fn allocate(
        &mut self,
        pool_name: &str,
        ledger: &mut Ledger,
        metadata: ExtentMetadata,
    ) -> Result<Extent> {
        let offset = ledger
            .first_free_from(self.cursor)
            .ok_or_else(|| PoolError::Exhausted {
                pool: pool_name.to_string(),
                request: "values".to_string(),
            })?;

        let extent = Extent::new(offset, 1, metadata);
        ledger
            .insert(extent.clone())
            .map_err(|e| PoolError::validation(e.to_string()))?;
        self.cursor = offset + 1;
        Ok(extent)
    }

    /// Remove the value at `offset`
    pub fn release(&mut self, ledger: &mut Ledger, offset: u128) -> Option<Extent> {
        let removed = ledger.remove_exact(offset, 1)?;
        self.cursor = self.cursor.min(offset);
        Some(removed)
    }
}

/// Offset of the allocated value named by `text` (`admin:number`)
pub fn locate_value(
    pool_name: &str,
    definition: &RtRdDefinition,
    space: &AddressSpace,
    ledger: &Ledger,
    text: &str,
) -> Result<u128> {
    let (admin, number) = parse_value(text)?;
    let not_found = || PoolError::AllocationNotFound {
        pool: pool_name.to_string(),
        identifier: text.trim().to_string(),
    };

    if admin.trim() != definition.admin_value.to_string() {
        return Err(not_found());
    }
    let offset = space.offset_of(u128::from(number)).ok_or_else(not_found)?;
    ledger.find_exact(offset, 1).ok_or_else(not_found)?;
    Ok(offset)
}

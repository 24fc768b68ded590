//! Extent ledger.
//!
//! Records the allocated sub-ranges of a single pool, keyed by offset in a
//! `BTreeMap` so that overlap probes, exact lookups and first-fit scans are
//! all logarithmic per step. Freed space is never tracked explicitly: a range
//! is available exactly when no extent covers it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::space::align_up;

/// Caller-supplied description of an allocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentMetadata {
    pub description: Option<String>,
    pub allocated_to: Option<String>,
}

/// An allocated range `[offset, offset + length)` within a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub offset: u128,
    pub length: u128,
    pub metadata: ExtentMetadata,
    pub allocated_at: DateTime<Utc>,
}

impl Extent {
    pub fn new(offset: u128, length: u128, metadata: ExtentMetadata) -> Self {
        Self {
            offset,
            length,
            metadata,
            allocated_at: Utc::now(),
        }
    }

    /// Exclusive end offset
    pub fn end(&self) -> u128 {
        self.offset + self.length
    }

    /// Inclusive last offset
    pub fn last(&self) -> u128 {
        self.offset + (self.length - 1)
    }
}

/// Reasons an extent cannot be recorded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("extent at offset {offset} with length {length} does not fit in span {span}")]
    OutOfRange {
        offset: u128,
        length: u128,
        span: u128,
    },

    #[error("extent at offset {offset} overlaps existing extent at offset {existing}")]
    Overlap { offset: u128, existing: u128 },
}

/// Ordered record of the extents allocated in one pool
#[derive(Debug, Clone)]
pub struct Ledger {
    span: u128,
    extents: BTreeMap<u128, Extent>,
    /// Sum of all extent lengths, kept in step with `extents`
    allocated: u128,
}

impl Ledger {
    pub fn new(span: u128) -> Self {
        Self {
            span,
            extents: BTreeMap::new(),
            allocated: 0,
        }
    }

    pub fn span(&self) -> u128 {
        self.span
    }

    /// Units covered by extents
    pub fn allocated(&self) -> u128 {
        self.allocated
    }

    /// Units not covered by any extent
    pub fn available(&self) -> u128 {
        self.span - self.allocated
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Extent starting at `offset` with exactly `length` units
    pub fn find_exact(&self, offset: u128, length: u128) -> Option<&Extent> {
        self.extents.get(&offset).filter(|e| e.length == length)
    }

    /// Extents in ascending offset order
    pub fn iter(&self) -> impl Iterator<Item = &Extent> {
        self.extents.values()
    }

    fn fits(&self, offset: u128, length: u128) -> bool {
        length > 0 && length <= self.span && offset <= self.span - length
    }

    /// Highest-offset extent intersecting `[offset, offset + length)`.
    ///
    /// Extents never overlap each other, so at most one extent starting
    /// before `offset` can reach into the probe; every other candidate starts
    /// inside it.
    fn last_overlap(&self, offset: u128, length: u128) -> Option<&Extent> {
        let last = offset + (length - 1);
        if let Some((_, inside)) = self.extents.range(offset..=last).next_back() {
            return Some(inside);
        }
        self.extents
            .range(..offset)
            .next_back()
            .map(|(_, e)| e)
            .filter(|e| e.last() >= offset)
    }

    /// True if any extent intersects `[offset, offset + length)`
    pub fn overlaps(&self, offset: u128, length: u128) -> bool {
        length > 0 && self.last_overlap(offset, length).is_some()
    }

    /// Record an extent, rejecting ranges outside the span or overlapping
    /// an existing extent.
    pub fn insert(&mut self, extent: Extent) -> Result<(), LedgerError> {
        if !self.fits(extent.offset, extent.length) {
            return Err(LedgerError::OutOfRange {
                offset: extent.offset,
                length: extent.length,
                span: self.span,
            });
        }
        if let Some(existing) = self.last_overlap(extent.offset, extent.length) {
            return Err(LedgerError::Overlap {
                offset: extent.offset,
                existing: existing.offset,
            });
        }

        self.allocated += extent.length;
        self.extents.insert(extent.offset, extent);
        Ok(())
    }

    /// Remove the extent at `offset` only if its length matches exactly
    pub fn remove_exact(&mut self, offset: u128, length: u128) -> Option<Extent> {
        self.find_exact(offset, length)?;
        let removed = self.extents.remove(&offset)?;
        self.allocated -= removed.length;
        Some(removed)
    }

    /// Lowest offset that is a multiple of `length` and whose block
    /// `[offset, offset + length)` is entirely free.
    ///
    /// Candidates are visited in ascending order. On a collision the scan
    /// resumes at the first aligned offset past the colliding extent, since
    /// every aligned candidate before that point intersects the same extent.
    pub fn first_fit_aligned(&self, length: u128) -> Option<u128> {
        if !length.is_power_of_two() || length > self.span {
            return None;
        }
        let limit = self.span - length;

        let mut candidate = 0u128;
        while candidate <= limit {
            match self.last_overlap(candidate, length) {
                None => return Some(candidate),
                Some(blocking) => candidate = align_up(blocking.end(), length)?,
            }
        }
        None
    }

    /// Lowest free single offset at or after `start`
    pub fn first_free_from(&self, start: u128) -> Option<u128> {
        if start >= self.span {
            return None;
        }

        let mut candidate = start;
        if let Some((_, covering)) = self.extents.range(..=candidate).next_back() {
            if covering.end() > candidate {
                candidate = covering.end();
            }
        }
        for (&offset, extent) in self.extents.range(candidate..) {
            if offset != candidate {
                break;
            }
            candidate = extent.end();
        }

        (candidate < self.span).then_some(candidate)
    }
}

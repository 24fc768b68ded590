//! Route Target and Route Distinguisher allocation.
//!
//! RT/RD pools hand out `admin:number` values one at a time from an
//! administratively scoped number range.

pub mod allocator;
pub mod format;

pub use allocator::{locate_value, LinearAllocator};
pub use format::{AdminValue, FormatType, RtRdRole};

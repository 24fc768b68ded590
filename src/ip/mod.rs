//! IP subnet block allocation.
//!
//! This module carves aligned, non-overlapping subnet blocks out of IPv4 and
//! IPv6 pools and converts between CIDR text and pool offsets.

pub mod allocator;
pub mod cidr;

// Re-export commonly used types
pub use allocator::CidrAllocator;
pub use cidr::parse_cidr;

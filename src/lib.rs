//! # Netpool - Network resource pool allocator
//!
//! This library manages named pools of network resources and hands out
//! non-overlapping pieces of them on request.
//!
//! ## Overview
//!
//! Two kinds of pool are supported:
//!
//! - **IP pools** (IPv4 or IPv6): a CIDR block carved into aligned sub-blocks
//!   of a requested prefix length, lowest address first.
//! - **RT/RD pools**: a range of numbers under a fixed administrator field,
//!   handed out one value at a time as `admin:number` (e.g. `65000:1001`).
//!
//! Both are backed by the same extent ledger: a pool is a linear space of
//! offsets, and every allocation is a contiguous extent inside it.
//!
//! ## Architecture
//!
//! - `space`: address spaces, block lengths and alignment math
//! - `ledger`: ordered extent ledger with overlap checks and first-fit search
//! - `ip`: CIDR parsing and aligned subnet block allocation
//! - `rtrd`: RT/RD value formats and sequential value allocation
//! - `pool`: pool records, creation specs and rendered views
//! - `store`: persistence seam with in-memory and snapshot-file stores
//! - `registry`: thread-safe coordinator that owns all pools
//! - `config` / `config_loader`: YAML configuration and startup pools
//! - `utils`: address conversion and pool spec validation
//!
//! ## Example Usage
//!
//! ```rust
//! use netpool::pool::{AllocationRequest, IpPoolSpec, PoolSpec};
//! use netpool::PoolRegistry;
//!
//! let registry = PoolRegistry::in_memory();
//! registry.create_pool(&PoolSpec::Ipv4(IpPoolSpec {
//!     name: "mgmt".to_string(),
//!     description: None,
//!     cidr: "10.100.0.0/24".to_string(),
//! }))?;
//!
//! let block = registry.allocate("mgmt", AllocationRequest::block(30))?;
//! assert_eq!(block.identifier(), "10.100.0.0/30");
//!
//! registry.release("mgmt", "10.100.0.0/30")?;
//! # Ok::<(), netpool::PoolError>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!   state_file: pools.state
//!   enumeration_limit: 256
//!
//! pools:
//!   - type: ipv4
//!     name: mgmt
//!     cidr: 10.100.0.0/24
//!   - type: rt
//!     name: cust-rt
//!     format_type: 0
//!     admin_value: "65000"
//!     range_start: 1000
//!     range_end: 1999
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`PoolError`], which tells validation failures,
//! missing pools or allocations, name conflicts, exhaustion and store
//! failures apart. The binary and the configuration loader report errors
//! through `color_eyre`.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod ip;
pub mod ledger;
pub mod pool;
pub mod registry;
pub mod rtrd;
pub mod space;
pub mod store;
pub mod utils;

pub use error::{PoolError, Result};
pub use registry::{Listing, PoolRegistry, RegistrySettings};

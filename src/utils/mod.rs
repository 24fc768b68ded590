//! Shared utilities: address conversion and pool spec validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::{addr_to_u128, u128_to_addr};
pub use validation::{validate_pool_name, validate_pool_spec};

//! CIDR text handling.
//!
//! Parses CIDR strings the way network operators write them (host bits set
//! or a bare address are accepted and normalized) and renders allocated
//! extents back into network/last-address/mask form.

use ipnet::IpNet;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{PoolError, Result};
use crate::ledger::Extent;
use crate::pool::IpBlock;
use crate::space::{AddressSpace, Family};
use crate::utils::ip_utils::{addr_to_u128, family_of, u128_to_addr};

/// Parse CIDR notation, clearing host bits.
///
/// A bare address is read as a single-host block (`/32` or `/128`).
pub fn parse_cidr(text: &str) -> Result<IpNet> {
    let text = text.trim();
    if text.contains('/') {
        return Ok(IpNet::from_str(text)?.trunc());
    }
    let addr = IpAddr::from_str(text)
        .map_err(|_| PoolError::validation(format!("Invalid CIDR notation: '{}'", text)))?;
    let host_prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    Ok(IpNet::new(addr, host_prefix)?)
}

/// Family of a parsed network
pub fn family_of_net(net: &IpNet) -> Family {
    family_of(&net.network())
}

/// Map a block to `(offset, length)` within `space`.
///
/// Returns `Ok(None)` when the block is well formed but lies outside the
/// space, and a validation error when it belongs to the other family.
pub fn locate(space: &AddressSpace, net: &IpNet) -> Result<Option<(u128, u128)>> {
    let family = family_of_net(net);
    if family != space.family {
        return Err(PoolError::validation(format!(
            "{} is an {} block but the pool is {}",
            net, family, space.family
        )));
    }
    let Some(length) = crate::space::block_length(net.max_prefix_len(), net.prefix_len()) else {
        return Ok(None);
    };
    let Some(offset) = space.offset_of(addr_to_u128(net.network())) else {
        return Ok(None);
    };
    if length > space.span - offset {
        return Ok(None);
    }
    Ok(Some((offset, length)))
}

/// Network of the block recorded by `extent`
pub fn extent_network(space: &AddressSpace, extent: &Extent) -> Option<IpNet> {
    let addr = u128_to_addr(space.family, space.absolute(extent.offset))?;
    let width = space.family.addr_width()?;
    let prefix_len = width - extent.length.trailing_zeros() as u8;
    IpNet::new(addr, prefix_len).ok()
}

/// Render an allocated extent.
///
/// Addresses are enumerated only for blocks of at most `enumeration_limit`
/// addresses.
pub fn render_block(
    pool_name: &str,
    pool_net: &IpNet,
    space: &AddressSpace,
    extent: &Extent,
    enumeration_limit: u128,
) -> Option<IpBlock> {
    let cidr = extent_network(space, extent)?;
    let first = space.absolute(extent.offset);
    let last_address = u128_to_addr(space.family, first + (extent.length - 1))?;

    let subnet_mask = match cidr {
        IpNet::V4(v4) => Some(v4.netmask()),
        IpNet::V6(_) => None,
    };

    let addresses = if extent.length <= enumeration_limit {
        (0..extent.length)
            .map(|i| u128_to_addr(space.family, first + i))
            .collect::<Option<Vec<_>>>()
    } else {
        None
    };

    Some(IpBlock {
        pool_name: pool_name.to_string(),
        pool_cidr: *pool_net,
        cidr,
        network_address: cidr.network(),
        last_address,
        prefix_length: cidr.prefix_len(),
        block_size: extent.length,
        subnet_mask,
        addresses,
        description: extent.metadata.description.clone(),
        allocated_to: extent.metadata.allocated_to.clone(),
        allocated_at: extent.allocated_at,
    })
}

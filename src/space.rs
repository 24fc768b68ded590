//! Address and number space model.
//!
//! Every pool allocates from a range `[0, span)` of offsets relative to an
//! integer `base`. CIDR spaces have a power-of-two span and carve naturally
//! aligned blocks; linear spaces have an arbitrary span and hand out single
//! values.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PoolError, Result};

/// Kind of identifier space a pool draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ipv4,
    Ipv6,
    Linear,
}

impl Family {
    /// Address width in bits, `None` for linear spaces
    pub fn addr_width(&self) -> Option<u8> {
        match self {
            Family::Ipv4 => Some(32),
            Family::Ipv6 => Some(128),
            Family::Linear => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Ipv4 => write!(f, "ipv4"),
            Family::Ipv6 => write!(f, "ipv6"),
            Family::Linear => write!(f, "linear"),
        }
    }
}

/// Allocatable range of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpace {
    pub family: Family,
    pub base: u128,
    pub span: u128,
}

impl AddressSpace {
    /// Space covered by a (normalized) CIDR network.
    ///
    /// `::/0` is rejected because its span of 2^128 is not representable.
    pub fn cidr(net: &IpNet) -> Result<Self> {
        let (family, width) = match net {
            IpNet::V4(_) => (Family::Ipv4, 32u8),
            IpNet::V6(_) => (Family::Ipv6, 128u8),
        };
        let span = block_length(width, net.prefix_len()).ok_or_else(|| {
            PoolError::validation(format!(
                "Pool {} is too large to allocate from; use a prefix of at least /1",
                net
            ))
        })?;

        Ok(Self {
            family,
            base: crate::utils::ip_utils::addr_to_u128(net.network()),
            span,
        })
    }

    /// Space covering the inclusive range `[start, end]`
    pub fn linear(start: u128, end: u128) -> Result<Self> {
        if start > end {
            return Err(PoolError::validation(
                "range_start must be less than or equal to range_end",
            ));
        }
        let span = (end - start).checked_add(1).ok_or_else(|| {
            PoolError::validation("range covers the entire 128-bit space")
        })?;

        Ok(Self {
            family: Family::Linear,
            base: start,
            span,
        })
    }

    /// Offset of an absolute value, if the value lies inside the space
    pub fn offset_of(&self, value: u128) -> Option<u128> {
        let offset = value.checked_sub(self.base)?;
        (offset < self.span).then_some(offset)
    }

    /// Absolute value of an offset
    pub fn absolute(&self, offset: u128) -> u128 {
        self.base + offset
    }
}

/// Number of addresses in a block of `prefix_len` within a `width`-bit space.
///
/// Returns `None` when the block would hold 2^128 addresses or the prefix
/// exceeds the width.
pub fn block_length(width: u8, prefix_len: u8) -> Option<u128> {
    if prefix_len > width {
        return None;
    }
    1u128.checked_shl(u32::from(width - prefix_len))
}

/// Round `value` up to the next multiple of `alignment` (a power of two).
pub fn align_up(value: u128, alignment: u128) -> Option<u128> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_block_length() {
        assert_eq!(block_length(32, 30), Some(4));
        assert_eq!(block_length(32, 32), Some(1));
        assert_eq!(block_length(32, 0), Some(1 << 32));
        assert_eq!(block_length(128, 64), Some(1 << 64));
        assert_eq!(block_length(128, 1), Some(1 << 127));
        assert_eq!(block_length(128, 0), None);
        assert_eq!(block_length(32, 33), None);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), Some(0));
        assert_eq!(align_up(1, 4), Some(4));
        assert_eq!(align_up(4, 4), Some(4));
        assert_eq!(align_up(5, 1), Some(5));
        assert_eq!(align_up(u128::MAX, 2), None);
    }

    #[test]
    fn test_cidr_space() {
        let net = IpNet::from_str("10.100.0.0/24").unwrap();
        let space = AddressSpace::cidr(&net).unwrap();
        assert_eq!(space.family, Family::Ipv4);
        assert_eq!(space.span, 256);
        assert_eq!(space.base, 0x0a64_0000);

        let v6 = IpNet::from_str("2001:db8::/48").unwrap();
        let space = AddressSpace::cidr(&v6).unwrap();
        assert_eq!(space.family, Family::Ipv6);
        assert_eq!(space.span, 1u128 << 80);
    }

    #[test]
    fn test_whole_ipv6_space_rejected() {
        let net = IpNet::from_str("::/0").unwrap();
        assert!(AddressSpace::cidr(&net).unwrap_err().is_validation());

        let net = IpNet::from_str("0.0.0.0/0").unwrap();
        assert_eq!(AddressSpace::cidr(&net).unwrap().span, 1 << 32);
    }

    #[test]
    fn test_linear_space() {
        let space = AddressSpace::linear(1000, 1999).unwrap();
        assert_eq!(space.span, 1000);
        assert_eq!(space.offset_of(1000), Some(0));
        assert_eq!(space.offset_of(1999), Some(999));
        assert_eq!(space.offset_of(2000), None);
        assert_eq!(space.offset_of(999), None);
        assert_eq!(space.absolute(5), 1005);

        assert!(AddressSpace::linear(10, 9).is_err());
        assert_eq!(AddressSpace::linear(7, 7).unwrap().span, 1);
    }
}

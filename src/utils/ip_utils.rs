use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::space::Family;

/// IP utility functions for converting between addresses and integers

/// Integer value of an IPv4 or IPv6 address
pub fn addr_to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Address of the given family with integer value `value`.
///
/// Returns `None` for linear spaces and for values wider than an IPv4
/// address.
pub fn u128_to_addr(family: Family, value: u128) -> Option<IpAddr> {
    match family {
        Family::Ipv4 => u32::try_from(value)
            .ok()
            .map(|v| IpAddr::V4(Ipv4Addr::from(v))),
        Family::Ipv6 => Some(IpAddr::V6(Ipv6Addr::from(value))),
        Family::Linear => None,
    }
}

/// Family of a parsed address
pub fn family_of(addr: &IpAddr) -> Family {
    match addr {
        IpAddr::V4(_) => Family::Ipv4,
        IpAddr::V6(_) => Family::Ipv6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_round_trip() {
        let v4: IpAddr = "10.100.0.4".parse().unwrap();
        let value = addr_to_u128(v4);
        assert_eq!(value, 0x0a64_0004);
        assert_eq!(u128_to_addr(Family::Ipv4, value), Some(v4));

        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        let value = addr_to_u128(v6);
        assert_eq!(u128_to_addr(Family::Ipv6, value), Some(v6));
    }

    #[test]
    fn test_u128_to_addr_bounds() {
        assert_eq!(u128_to_addr(Family::Ipv4, 1u128 << 32), None);
        assert_eq!(u128_to_addr(Family::Linear, 5), None);
        assert_eq!(
            u128_to_addr(Family::Ipv6, u128::MAX),
            Some("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff".parse().unwrap())
        );
    }
}

//! Subnet block allocation.
//!
//! Carves naturally aligned blocks out of a pool's CIDR space using
//! first-fit by ascending offset, so the same request sequence always
//! produces the same blocks.

use ipnet::IpNet;

use super::cidr::{locate, parse_cidr};
use crate::error::{PoolError, Result};
use crate::ledger::{Extent, ExtentMetadata, Ledger};
use crate::space::{block_length, AddressSpace};

/// Block allocator bound to one IP pool
#[derive(Debug, Clone, Copy)]
pub struct CidrAllocator<'a> {
    pool_name: &'a str,
    network: &'a IpNet,
    space: &'a AddressSpace,
}

impl<'a> CidrAllocator<'a> {
    pub fn new(pool_name: &'a str, network: &'a IpNet, space: &'a AddressSpace) -> Self {
        Self {
            pool_name,
            network,
            space,
        }
    }

    /// Block length for a requested prefix, validated against the pool
    pub fn block_length(&self, prefix_len: u8) -> Result<u128> {
        let max_prefix = self.network.max_prefix_len();
        if prefix_len > max_prefix {
            return Err(PoolError::validation(format!(
                "prefix_length cannot exceed {} for {}",
                max_prefix, self.space.family
            )));
        }
        if prefix_len < self.network.prefix_len() {
            return Err(PoolError::validation(format!(
                "Cannot allocate /{} from pool /{} - requested block is larger than pool",
                prefix_len,
                self.network.prefix_len()
            )));
        }
        // Representable: the pool span itself fits, and the block is no larger.
        block_length(max_prefix, prefix_len).ok_or_else(|| {
            PoolError::validation(format!("/{} block is not representable", prefix_len))
        })
    }

    /// Allocate the lowest free aligned block of `prefix_len`
    pub fn allocate(
        &self,
        ledger: &mut Ledger,
        prefix_len: u8,
        metadata: ExtentMetadata,
    ) -> Result<Extent> {
        let length = self.block_length(prefix_len)?;

        let offset = ledger
            .first_fit_aligned(length)
            .ok_or_else(|| PoolError::Exhausted {
                pool: self.pool_name.to_string(),
                request: format!("/{} blocks", prefix_len),
            })?;
        debug_assert_eq!(offset % length, 0);

        let extent = Extent::new(offset, length, metadata);
        ledger
            .insert(extent.clone())
            .map_err(|e| PoolError::validation(e.to_string()))?;
        Ok(extent)
    }

    /// `(offset, length)` of the allocated block named by `cidr_text`
    pub fn locate(&self, ledger: &Ledger, cidr_text: &str) -> Result<(u128, u128)> {
        let net = parse_cidr(cidr_text)?;
        let not_found = || PoolError::AllocationNotFound {
            pool: self.pool_name.to_string(),
            identifier: net.to_string(),
        };

        let (offset, length) = locate(self.space, &net)?.ok_or_else(not_found)?;
        ledger.find_exact(offset, length).ok_or_else(not_found)?;
        Ok((offset, length))
    }

    /// Release the block named by `cidr_text`; only an exact match is removed
    pub fn release(&self, ledger: &mut Ledger, cidr_text: &str) -> Result<Extent> {
        let (offset, length) = self.locate(ledger, cidr_text)?;
        ledger
            .remove_exact(offset, length)
            .ok_or_else(|| PoolError::AllocationNotFound {
                pool: self.pool_name.to_string(),
                identifier: cidr_text.trim().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::cidr::extent_network;

    fn pool(cidr: &str) -> (IpNet, AddressSpace, Ledger) {
        let net = parse_cidr(cidr).unwrap();
        let space = AddressSpace::cidr(&net).unwrap();
        let ledger = Ledger::new(space.span);
        (net, space, ledger)
    }

    fn cidr_of(space: &AddressSpace, extent: &Extent) -> String {
        extent_network(space, extent).unwrap().to_string()
    }

    #[test]
    fn test_allocate_sequential() {
        let (net, space, mut ledger) = pool("10.100.0.0/16");
        let alloc = CidrAllocator::new("p", &net, &space);

        let a = alloc.allocate(&mut ledger, 20, ExtentMetadata::default()).unwrap();
        let b = alloc.allocate(&mut ledger, 20, ExtentMetadata::default()).unwrap();
        let c = alloc.allocate(&mut ledger, 20, ExtentMetadata::default()).unwrap();

        assert_eq!(cidr_of(&space, &a), "10.100.0.0/20");
        assert_eq!(cidr_of(&space, &b), "10.100.16.0/20");
        assert_eq!(cidr_of(&space, &c), "10.100.32.0/20");
    }

    #[test]
    fn test_mixed_sizes_keep_alignment() {
        let (net, space, mut ledger) = pool("10.100.0.0/24");
        let alloc = CidrAllocator::new("p", &net, &space);

        let host = alloc.allocate(&mut ledger, 32, ExtentMetadata::default()).unwrap();
        let slash30 = alloc.allocate(&mut ledger, 30, ExtentMetadata::default()).unwrap();
        let slash31 = alloc.allocate(&mut ledger, 31, ExtentMetadata::default()).unwrap();
        let slash28 = alloc.allocate(&mut ledger, 28, ExtentMetadata::default()).unwrap();

        assert_eq!(cidr_of(&space, &host), "10.100.0.0/32");
        assert_eq!(cidr_of(&space, &slash30), "10.100.0.4/30");
        assert_eq!(cidr_of(&space, &slash31), "10.100.0.2/31");
        assert_eq!(cidr_of(&space, &slash28), "10.100.0.16/28");
        for extent in ledger.iter() {
            assert_eq!(extent.offset % extent.length, 0);
        }
    }

    #[test]
    fn test_prefix_validation() {
        let (net, space, mut ledger) = pool("10.100.0.0/24");
        let alloc = CidrAllocator::new("p", &net, &space);

        let err = alloc.allocate(&mut ledger, 23, ExtentMetadata::default()).unwrap_err();
        assert!(err.is_validation());
        let err = alloc.allocate(&mut ledger, 33, ExtentMetadata::default()).unwrap_err();
        assert!(err.is_validation());
        assert!(ledger.is_empty());

        // The whole pool as one block is allowed
        let whole = alloc.allocate(&mut ledger, 24, ExtentMetadata::default()).unwrap();
        assert_eq!(whole.length, 256);
    }

    #[test]
    fn test_exhaustion() {
        let (net, space, mut ledger) = pool("10.100.0.0/20");
        let alloc = CidrAllocator::new("p", &net, &space);

        for _ in 0..16 {
            alloc.allocate(&mut ledger, 24, ExtentMetadata::default()).unwrap();
        }
        let err = alloc.allocate(&mut ledger, 24, ExtentMetadata::default()).unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
        assert_eq!(ledger.len(), 16);
    }

    #[test]
    fn test_release_exact_match_only() {
        let (net, space, mut ledger) = pool("10.100.0.0/24");
        let alloc = CidrAllocator::new("p", &net, &space);
        alloc.allocate(&mut ledger, 29, ExtentMetadata::default()).unwrap();

        // Sub-block and containing block are not the allocation
        assert!(alloc.release(&mut ledger, "10.100.0.0/30").unwrap_err().is_not_found());
        assert!(alloc.release(&mut ledger, "10.100.0.0/28").unwrap_err().is_not_found());
        // Outside the pool
        assert!(alloc.release(&mut ledger, "192.168.0.0/29").unwrap_err().is_not_found());
        // Wrong family and garbage
        assert!(alloc.release(&mut ledger, "2001:db8::/125").unwrap_err().is_validation());
        assert!(alloc.release(&mut ledger, "bogus").unwrap_err().is_validation());
        assert_eq!(ledger.len(), 1);

        // Host bits are ignored when matching
        let released = alloc.release(&mut ledger, "10.100.0.3/29").unwrap();
        assert_eq!((released.offset, released.length), (0, 8));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ipv6_carving() {
        let (net, space, mut ledger) = pool("2001:db8::/48");
        let alloc = CidrAllocator::new("p", &net, &space);

        let first = alloc.allocate(&mut ledger, 64, ExtentMetadata::default()).unwrap();
        let host = alloc.allocate(&mut ledger, 128, ExtentMetadata::default()).unwrap();
        let second = alloc.allocate(&mut ledger, 64, ExtentMetadata::default()).unwrap();

        assert_eq!(cidr_of(&space, &first), "2001:db8::/64");
        assert_eq!(cidr_of(&space, &host), "2001:db8:0:1::/128");
        assert_eq!(cidr_of(&space, &second), "2001:db8:0:2::/64");
        assert_eq!(ledger.available(), (1u128 << 80) - (2u128 << 64) - 1);
    }
}

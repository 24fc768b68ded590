//! Property-based tests for pool allocation

use proptest::prelude::*;
use proptest::sample::Index;

use netpool::pool::{Allocation, AllocationRequest, IpPoolSpec, PoolSpec, RtRdPoolSpec};
use netpool::utils::addr_to_u128;
use netpool::PoolRegistry;

#[derive(Debug, Clone)]
enum Op {
    Allocate(u8),
    Release(Index),
}

fn arb_ops(min_prefix: u8, max_prefix: u8) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (min_prefix..=max_prefix).prop_map(Op::Allocate),
        1 => any::<Index>().prop_map(Op::Release),
    ];
    prop::collection::vec(op, 1..80)
}

/// Inclusive `[first, last]` of every allocation, sorted
fn ranges(allocations: &[Allocation]) -> Vec<(u128, u128)> {
    let mut ranges: Vec<(u128, u128)> = allocations
        .iter()
        .map(|a| match a {
            Allocation::Block(b) => (addr_to_u128(b.network_address), addr_to_u128(b.last_address)),
            Allocation::Value(v) => (u128::from(v.assigned_number), u128::from(v.assigned_number)),
        })
        .collect();
    ranges.sort_unstable();
    ranges
}

fn assert_disjoint(registry: &PoolRegistry, pool: &str) -> Result<(), TestCaseError> {
    let listed: Vec<Allocation> = registry.list(pool).unwrap().collect();
    let ranges = ranges(&listed);
    for pair in ranges.windows(2) {
        prop_assert!(pair[0].1 < pair[1].0, "overlap between {:?} and {:?}", pair[0], pair[1]);
    }

    let covered: u128 = ranges.iter().map(|(first, last)| last - first + 1).sum();
    let summary = registry.pool(pool).unwrap();
    prop_assert_eq!(covered, summary.allocated);
    prop_assert_eq!(summary.allocated + summary.available, summary.total);
    Ok(())
}

fn run_ip_ops(spec: PoolSpec, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let registry = PoolRegistry::in_memory();
    registry.create_pool(&spec).unwrap();
    let mut held: Vec<String> = Vec::new();

    for op in ops {
        match op {
            Op::Allocate(prefix) => {
                if let Ok(allocation) = registry.allocate(spec.name(), AllocationRequest::block(prefix)) {
                    let block = allocation.as_block().unwrap();
                    let size = block.block_size;
                    prop_assert_eq!(addr_to_u128(block.network_address) % size, 0);
                    held.push(allocation.identifier());
                }
            }
            Op::Release(index) if !held.is_empty() => {
                let identifier = held.swap_remove(index.index(held.len()));
                registry.release(spec.name(), &identifier).unwrap();
            }
            Op::Release(_) => {}
        }
        assert_disjoint(&registry, spec.name())?;
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_ipv4_blocks_never_overlap(ops in arb_ops(26, 32)) {
        let spec = PoolSpec::Ipv4(IpPoolSpec {
            name: "v4".to_string(),
            description: None,
            cidr: "10.20.0.0/24".to_string(),
        });
        run_ip_ops(spec, ops)?;
    }

    #[test]
    fn prop_ipv6_blocks_never_overlap(ops in arb_ops(52, 64)) {
        let spec = PoolSpec::Ipv6(IpPoolSpec {
            name: "v6".to_string(),
            description: None,
            cidr: "2001:db8:ab00::/48".to_string(),
        });
        run_ip_ops(spec, ops)?;
    }

    #[test]
    fn prop_rtrd_values_are_lowest_free(ops in arb_ops(0, 0)) {
        let registry = PoolRegistry::in_memory();
        registry.create_pool(&PoolSpec::Rt(RtRdPoolSpec {
            name: "rt".to_string(),
            description: None,
            format_type: 0,
            admin_value: "65000".to_string(),
            range_start: 100,
            range_end: 131,
        })).unwrap();
        let mut held: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate(_) => {
                    let lowest_free = (100..=131u32).find(|n| !held.contains(n));
                    match registry.allocate("rt", AllocationRequest::value()) {
                        Ok(allocation) => {
                            let number = allocation.as_value().unwrap().assigned_number;
                            prop_assert_eq!(Some(number), lowest_free);
                            held.push(number);
                        }
                        Err(_) => {
                            prop_assert_eq!(lowest_free, None);
                        }
                    }
                }
                Op::Release(index) if !held.is_empty() => {
                    let number = held.swap_remove(index.index(held.len()));
                    registry.release("rt", &format!("65000:{}", number)).unwrap();
                }
                Op::Release(_) => {}
            }
            assert_disjoint(&registry, "rt")?;
        }
    }
}

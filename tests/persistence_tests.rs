//! Registry state surviving a restart, and store failures.

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use netpool::pool::{AllocationRequest, IpPoolSpec, PoolSpec, RtRdPoolSpec};
use netpool::store::SnapshotStore;
use netpool::{PoolError, PoolRegistry, RegistrySettings};

fn open(path: &std::path::Path) -> PoolRegistry {
    let store = SnapshotStore::open(path).unwrap();
    PoolRegistry::open(Arc::new(store), RegistrySettings::default()).unwrap()
}

fn populate(registry: &PoolRegistry) {
    registry
        .create_pool(&PoolSpec::Ipv4(IpPoolSpec {
            name: "mgmt".to_string(),
            description: Some("management network".to_string()),
            cidr: "10.100.0.0/24".to_string(),
        }))
        .unwrap();
    registry
        .create_pool(&PoolSpec::Ipv6(IpPoolSpec {
            name: "v6".to_string(),
            description: None,
            cidr: "2001:db8::/48".to_string(),
        }))
        .unwrap();
    registry
        .create_pool(&PoolSpec::Rd(RtRdPoolSpec {
            name: "cust-rd".to_string(),
            description: None,
            format_type: 1,
            admin_value: "10.0.0.1".to_string(),
            range_start: 1,
            range_end: 500,
        }))
        .unwrap();

    registry
        .allocate(
            "mgmt",
            AllocationRequest::block(30).with_allocated_to("customer-abc"),
        )
        .unwrap();
    registry.allocate("mgmt", AllocationRequest::block(28)).unwrap();
    registry.allocate("v6", AllocationRequest::block(64)).unwrap();
    for _ in 0..3 {
        registry.allocate("cust-rd", AllocationRequest::value()).unwrap();
    }
    registry.release("cust-rd", "10.0.0.1:2").unwrap();
}

#[test]
fn test_snapshot_reload_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pools.state");

    let (summaries, listings) = {
        let registry = open(&path);
        populate(&registry);
        let summaries = registry.pools();
        let listings: Vec<Vec<String>> = summaries
            .iter()
            .map(|s| registry.list(&s.name).unwrap().map(|a| a.identifier()).collect())
            .collect();
        (summaries, listings)
    };

    let registry = open(&path);
    assert_eq!(registry.pools(), summaries);
    for (summary, expected) in summaries.iter().zip(&listings) {
        let listed: Vec<String> = registry
            .list(&summary.name)
            .unwrap()
            .map(|a| a.identifier())
            .collect();
        assert_eq!(&listed, expected);
    }

    let first = registry.list("mgmt").unwrap().next().unwrap();
    assert_eq!(first.as_block().unwrap().allocated_to.as_deref(), Some("customer-abc"));

    // Allocation picks up where it left off
    let value = registry.allocate("cust-rd", AllocationRequest::value()).unwrap();
    assert_eq!(value.identifier(), "10.0.0.1:2");
    let block = registry.allocate("mgmt", AllocationRequest::block(30)).unwrap();
    assert_eq!(block.identifier(), "10.100.0.4/30");
}

#[test]
fn test_deleted_pool_stays_deleted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pools.state");
    {
        let registry = open(&path);
        populate(&registry);
        registry.delete_pool("v6").unwrap();
    }

    let registry = open(&path);
    assert!(registry.pool("v6").unwrap_err().is_not_found());
    assert_eq!(registry.pools().len(), 2);
}

#[test]
fn test_failed_write_rolls_back() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");
    fs::create_dir(&state_dir).unwrap();
    let path = state_dir.join("pools.state");

    let registry = open(&path);
    populate(&registry);
    let before = registry.pools();

    fs::remove_dir_all(&state_dir).unwrap();

    let err = registry.allocate("mgmt", AllocationRequest::block(30)).unwrap_err();
    assert!(matches!(err, PoolError::Storage(_)));
    let err = registry.allocate("cust-rd", AllocationRequest::value()).unwrap_err();
    assert!(matches!(err, PoolError::Storage(_)));
    let err = registry.release("mgmt", "10.100.0.0/30").unwrap_err();
    assert!(matches!(err, PoolError::Storage(_)));
    assert_eq!(registry.pools(), before);

    fs::create_dir(&state_dir).unwrap();
    let value = registry.allocate("cust-rd", AllocationRequest::value()).unwrap();
    assert_eq!(value.identifier(), "10.0.0.1:2");
    registry.release("mgmt", "10.100.0.0/30").unwrap();

    drop(registry);
    let reopened = open(&path);
    assert_eq!(reopened.pool("mgmt").unwrap().allocated, 16);
    assert_eq!(reopened.pool("cust-rd").unwrap().allocated, 3);
}

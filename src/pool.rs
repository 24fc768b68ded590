//! Pool records, creation specs and rendered views.

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::ip::cidr::render_block;
use crate::ledger::{Extent, ExtentMetadata, Ledger};
use crate::rtrd::format::{format_display, format_value, AdminValue, FormatType, RtRdRole};
use crate::space::{AddressSpace, Family};

/// Request to create an IP pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpPoolSpec {
    pub name: String,
    pub description: Option<String>,
    /// CIDR notation e.g., 192.168.1.0/24 or 2001:db8::/64
    pub cidr: String,
}

/// Request to create an RT or RD pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtRdPoolSpec {
    pub name: String,
    pub description: Option<String>,
    pub format_type: u8,
    /// ASN or IPv4 address, depending on `format_type`
    pub admin_value: String,
    pub range_start: u64,
    pub range_end: u64,
}

/// Pool creation request, tagged by pool type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PoolSpec {
    Ipv4(IpPoolSpec),
    Ipv6(IpPoolSpec),
    Rt(RtRdPoolSpec),
    Rd(RtRdPoolSpec),
}

impl PoolSpec {
    pub fn name(&self) -> &str {
        match self {
            PoolSpec::Ipv4(spec) | PoolSpec::Ipv6(spec) => &spec.name,
            PoolSpec::Rt(spec) | PoolSpec::Rd(spec) => &spec.name,
        }
    }
}

/// Validated RT/RD pool parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtRdDefinition {
    pub role: RtRdRole,
    pub format_type: FormatType,
    pub admin_value: AdminValue,
    pub range_start: u32,
    pub range_end: u32,
}

/// What a pool allocates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    Ip { network: IpNet },
    RtRd(RtRdDefinition),
}

/// A named pool. The space is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub kind: PoolKind,
    pub space: AddressSpace,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    pub fn family(&self) -> Family {
        self.space.family
    }

    /// Render an extent of this pool for callers
    pub fn render(&self, extent: &Extent, enumeration_limit: u128) -> Option<Allocation> {
        match &self.kind {
            PoolKind::Ip { network } => {
                render_block(&self.name, network, &self.space, extent, enumeration_limit)
                    .map(Allocation::Block)
            }
            PoolKind::RtRd(def) => {
                let number = u32::try_from(self.space.absolute(extent.offset)).ok()?;
                Some(Allocation::Value(RtRdValue {
                    pool_name: self.name.clone(),
                    role: def.role,
                    value: format_value(&def.admin_value, number),
                    assigned_number: number,
                    description: extent.metadata.description.clone(),
                    allocated_to: extent.metadata.allocated_to.clone(),
                    allocated_at: extent.allocated_at,
                }))
            }
        }
    }

    /// Totals and kind-specific details for the pool
    pub fn summary(&self, ledger: &Ledger) -> PoolSummary {
        let definition = match &self.kind {
            PoolKind::Ip { network } => {
                let broadcast_address = match network {
                    IpNet::V4(v4) => Some(IpAddr::V4(v4.broadcast())),
                    IpNet::V6(_) => None,
                };
                PoolDefinition::Ip {
                    cidr: *network,
                    network_address: network.network(),
                    broadcast_address,
                }
            }
            PoolKind::RtRd(def) => PoolDefinition::RtRd {
                role: def.role,
                format_type: u8::from(def.format_type),
                admin_value: def.admin_value.to_string(),
                range_start: def.range_start,
                range_end: def.range_end,
                format_display: format_display(&def.admin_value, def.range_start, def.range_end),
            },
        };

        PoolSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            family: self.family(),
            definition,
            total: self.space.span,
            allocated: ledger.allocated(),
            available: ledger.available(),
            allocation_count: ledger.len(),
            created_at: self.created_at,
        }
    }
}

/// Parameters of an allocate call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Required for IP pools, must be absent for RT/RD pools
    pub prefix_length: Option<u8>,
    pub metadata: ExtentMetadata,
}

impl AllocationRequest {
    /// Request a subnet block of `prefix_length`
    pub fn block(prefix_length: u8) -> Self {
        Self {
            prefix_length: Some(prefix_length),
            metadata: ExtentMetadata::default(),
        }
    }

    /// Request the next RT/RD value
    pub fn value() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn with_allocated_to(mut self, allocated_to: impl Into<String>) -> Self {
        self.metadata.allocated_to = Some(allocated_to.into());
        self
    }
}

/// An allocated subnet block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpBlock {
    pub pool_name: String,
    pub pool_cidr: IpNet,
    pub cidr: IpNet,
    pub network_address: IpAddr,
    pub last_address: IpAddr,
    pub prefix_length: u8,
    pub block_size: u128,
    /// Dotted decimal mask, IPv4 only
    pub subnet_mask: Option<Ipv4Addr>,
    /// Every address in the block, omitted above the enumeration limit
    pub addresses: Option<Vec<IpAddr>>,
    pub description: Option<String>,
    pub allocated_to: Option<String>,
    pub allocated_at: DateTime<Utc>,
}

/// An allocated RT/RD value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RtRdValue {
    pub pool_name: String,
    pub role: RtRdRole,
    /// e.g., "65000:1001"
    pub value: String,
    pub assigned_number: u32,
    pub description: Option<String>,
    pub allocated_to: Option<String>,
    pub allocated_at: DateTime<Utc>,
}

/// Result of a successful allocate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Allocation {
    Block(IpBlock),
    Value(RtRdValue),
}

impl Allocation {
    /// Text that releases this allocation
    pub fn identifier(&self) -> String {
        match self {
            Allocation::Block(block) => block.cidr.to_string(),
            Allocation::Value(value) => value.value.clone(),
        }
    }

    pub fn as_block(&self) -> Option<&IpBlock> {
        match self {
            Allocation::Block(block) => Some(block),
            Allocation::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&RtRdValue> {
        match self {
            Allocation::Value(value) => Some(value),
            Allocation::Block(_) => None,
        }
    }
}

/// Kind-specific part of a pool summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PoolDefinition {
    Ip {
        cidr: IpNet,
        network_address: IpAddr,
        broadcast_address: Option<IpAddr>,
    },
    RtRd {
        role: RtRdRole,
        format_type: u8,
        admin_value: String,
        range_start: u32,
        range_end: u32,
        /// e.g., "65000:{1000-1999}"
        format_display: String,
    },
}

/// Pool totals as seen by one consistent read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub family: Family,
    pub definition: PoolDefinition,
    pub total: u128,
    pub allocated: u128,
    pub available: u128,
    pub allocation_count: usize,
    pub created_at: DateTime<Utc>,
}

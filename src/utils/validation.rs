//! Pool specification validation.
//!
//! Every check here runs before a pool is created, so a rejected spec never
//! touches the registry or the store.

use ipnet::IpNet;

use crate::error::{PoolError, Result};
use crate::ip::cidr::{family_of_net, parse_cidr};
use crate::pool::{IpPoolSpec, PoolKind, PoolSpec, RtRdDefinition, RtRdPoolSpec};
use crate::rtrd::format::{AdminValue, FormatType, RtRdRole};
use crate::space::{AddressSpace, Family};

/// Longest accepted pool name
pub const MAX_POOL_NAME_LEN: usize = 100;

/// A pool spec that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPool {
    pub name: String,
    pub description: Option<String>,
    pub kind: PoolKind,
    pub space: AddressSpace,
}

/// Validate a pool name
///
/// Names must be 1-100 characters, without surrounding whitespace or
/// control characters.
///
/// # Examples
/// ```
/// use netpool::utils::validation::validate_pool_name;
///
/// assert!(validate_pool_name("datacenter-mgmt").is_ok());
/// assert!(validate_pool_name("").is_err());
/// assert!(validate_pool_name(" padded ").is_err());
/// ```
pub fn validate_pool_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PoolError::validation("Pool name cannot be empty"));
    }
    if name.chars().count() > MAX_POOL_NAME_LEN {
        return Err(PoolError::validation(format!(
            "Pool name cannot be longer than {} characters",
            MAX_POOL_NAME_LEN
        )));
    }
    if name.trim() != name || name.chars().any(char::is_control) {
        return Err(PoolError::validation(format!(
            "Pool name '{}' contains surrounding whitespace or control characters",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// Validate an IP pool against the family it was declared with
pub fn validate_ip_pool(family: Family, spec: &IpPoolSpec) -> Result<(IpNet, AddressSpace)> {
    let network = parse_cidr(&spec.cidr)?;
    let actual = family_of_net(&network);
    if actual != family {
        return Err(PoolError::validation(format!(
            "CIDR {} is {} but the pool type is {}",
            network, actual, family
        )));
    }
    let space = AddressSpace::cidr(&network)?;
    Ok((network, space))
}

/// Validate an RT/RD pool: admin value and number range per format type
///
/// | format_type | admin field | number field |
/// |---|---|---|
/// | 0 | ASN, 16-bit | 0-4294967295 |
/// | 1 | IPv4 address | 0-65535 |
/// | 2 | ASN, 32-bit | 0-65535 |
pub fn validate_rtrd_pool(
    role: RtRdRole,
    spec: &RtRdPoolSpec,
) -> Result<(RtRdDefinition, AddressSpace)> {
    let format_type = FormatType::try_from(spec.format_type).map_err(PoolError::Validation)?;
    let admin_value = AdminValue::parse(format_type, &spec.admin_value)?;

    let max = u64::from(format_type.max_number());
    if spec.range_start > max || spec.range_end > max {
        return Err(PoolError::validation(format!(
            "Type {} range must be between 0 and {}",
            spec.format_type, max
        )));
    }
    if spec.range_start > spec.range_end {
        return Err(PoolError::validation(
            "range_start must be less than or equal to range_end",
        ));
    }

    // Both bounds are at most u32::MAX after the checks above
    let range_start = spec.range_start as u32;
    let range_end = spec.range_end as u32;
    let space = AddressSpace::linear(u128::from(range_start), u128::from(range_end))?;

    Ok((
        RtRdDefinition {
            role,
            format_type,
            admin_value,
            range_start,
            range_end,
        },
        space,
    ))
}

/// Validate any pool spec
pub fn validate_pool_spec(spec: &PoolSpec) -> Result<ValidatedPool> {
    validate_pool_name(spec.name())?;

    let (description, kind, space) = match spec {
        PoolSpec::Ipv4(ip) | PoolSpec::Ipv6(ip) => {
            let family = if matches!(spec, PoolSpec::Ipv4(_)) {
                Family::Ipv4
            } else {
                Family::Ipv6
            };
            let (network, space) = validate_ip_pool(family, ip)?;
            (ip.description.clone(), PoolKind::Ip { network }, space)
        }
        PoolSpec::Rt(rtrd) | PoolSpec::Rd(rtrd) => {
            let role = if matches!(spec, PoolSpec::Rt(_)) {
                RtRdRole::Rt
            } else {
                RtRdRole::Rd
            };
            let (definition, space) = validate_rtrd_pool(role, rtrd)?;
            (rtrd.description.clone(), PoolKind::RtRd(definition), space)
        }
    };

    Ok(ValidatedPool {
        name: spec.name().to_string(),
        description,
        kind,
        space,
    })
}

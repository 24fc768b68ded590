//! Route Target / Route Distinguisher encodings.
//!
//! Format types:
//! - Type 0: 2-byte ASN : 4-byte number (e.g., 65000:100)
//! - Type 1: 4-byte IPv4 address : 2-byte number (e.g., 10.0.0.1:100)
//! - Type 2: 4-byte ASN : 2-byte number (e.g., 4200000000:100)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{PoolError, Result};

/// Whether a pool hands out Route Targets or Route Distinguishers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtRdRole {
    /// Route Target: controls route import/export between VRFs
    Rt,
    /// Route Distinguisher: makes VPN prefixes globally unique
    Rd,
}

impl fmt::Display for RtRdRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtRdRole::Rt => write!(f, "rt"),
            RtRdRole::Rd => write!(f, "rd"),
        }
    }
}

/// RT/RD encoding, fixing the width of the admin and number fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FormatType {
    Type0,
    Type1,
    Type2,
}

impl FormatType {
    /// Largest assignable number for this encoding
    pub fn max_number(&self) -> u32 {
        match self {
            FormatType::Type0 => u32::MAX,
            FormatType::Type1 | FormatType::Type2 => u32::from(u16::MAX),
        }
    }
}

impl TryFrom<u8> for FormatType {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(FormatType::Type0),
            1 => Ok(FormatType::Type1),
            2 => Ok(FormatType::Type2),
            other => Err(format!("format_type must be 0, 1 or 2, got {}", other)),
        }
    }
}

impl From<FormatType> for u8 {
    fn from(value: FormatType) -> Self {
        match value {
            FormatType::Type0 => 0,
            FormatType::Type1 => 1,
            FormatType::Type2 => 2,
        }
    }
}

/// Administrative field of an RT/RD value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminValue {
    Asn(u32),
    Ipv4(Ipv4Addr),
}

impl AdminValue {
    /// Parse and range-check the admin field for `format_type`
    pub fn parse(format_type: FormatType, text: &str) -> Result<Self> {
        let text = text.trim();
        match format_type {
            FormatType::Type0 => match text.parse::<u32>() {
                Ok(asn) if (1..=u32::from(u16::MAX)).contains(&asn) => Ok(AdminValue::Asn(asn)),
                _ => Err(PoolError::validation(
                    "Type 0 admin_value must be a valid 2-byte ASN (1-65535)",
                )),
            },
            FormatType::Type1 => text.parse::<Ipv4Addr>().map(AdminValue::Ipv4).map_err(|_| {
                PoolError::validation("Type 1 admin_value must be a valid IPv4 address")
            }),
            FormatType::Type2 => match text.parse::<u32>() {
                Ok(asn) if asn >= 1 => Ok(AdminValue::Asn(asn)),
                _ => Err(PoolError::validation(
                    "Type 2 admin_value must be a valid 4-byte ASN (1-4294967295)",
                )),
            },
        }
    }
}

impl fmt::Display for AdminValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminValue::Asn(asn) => write!(f, "{}", asn),
            AdminValue::Ipv4(ip) => write!(f, "{}", ip),
        }
    }
}

/// Render `admin:number`
pub fn format_value(admin: &AdminValue, number: u32) -> String {
    format!("{}:{}", admin, number)
}

/// Split `admin:number` at the last colon
pub fn parse_value(text: &str) -> Result<(&str, u32)> {
    let text = text.trim();
    let (admin, number) = text.rsplit_once(':').ok_or_else(|| {
        PoolError::validation(format!(
            "Value '{}' must be in format 'admin:number' (e.g., '65000:1001')",
            text
        ))
    })?;
    let number = number.parse::<u32>().map_err(|_| {
        PoolError::validation(format!("Invalid assigned number in RT/RD value '{}'", text))
    })?;
    Ok((admin, number))
}

/// Range summary such as `65000:{1000-1999}`
pub fn format_display(admin: &AdminValue, range_start: u32, range_end: u32) -> String {
    format!("{}:{{{}-{}}}", admin, range_start, range_end)
}

// ---------------------------------------------------------------------------
// IP address field codec
// ---------------------------------------------------------------------------
//
// Records keep addresses as `IpAddr` and store them as the normalized text
// form. `parse` is the only way from text to the canonical value.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::ValidationError;

/// Value arriving at an address field: unparsed text or an already typed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressValue {
    Raw(String),
    Canonical(IpAddr),
}

impl fmt::Display for AddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressValue::Raw(s) => f.write_str(s),
            AddressValue::Canonical(ip) => write!(f, "{ip}"),
        }
    }
}

impl From<&str> for AddressValue {
    fn from(s: &str) -> Self {
        AddressValue::Raw(s.to_string())
    }
}

impl From<String> for AddressValue {
    fn from(s: String) -> Self {
        AddressValue::Raw(s)
    }
}

impl From<IpAddr> for AddressValue {
    fn from(ip: IpAddr) -> Self {
        AddressValue::Canonical(ip)
    }
}

impl From<Ipv4Addr> for AddressValue {
    fn from(ip: Ipv4Addr) -> Self {
        AddressValue::Canonical(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for AddressValue {
    fn from(ip: Ipv6Addr) -> Self {
        AddressValue::Canonical(IpAddr::V6(ip))
    }
}

/// Convert input into a canonical address. Text is trimmed before parsing;
/// canonical values pass through untouched.
pub fn parse(input: impl Into<AddressValue>) -> Result<IpAddr, ValidationError> {
    match input.into() {
        AddressValue::Canonical(ip) => Ok(ip),
        AddressValue::Raw(s) => s
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ValidationError::InvalidAddress { value: s }),
    }
}

/// Accept only values that have already been through [`parse`].
pub fn validate(value: &AddressValue) -> Result<IpAddr, ValidationError> {
    match value {
        AddressValue::Canonical(ip) => Ok(*ip),
        AddressValue::Raw(s) => Err(ValidationError::InvalidAddress { value: s.clone() }),
    }
}

/// Storage form of an address field. An unset field stays unset.
pub fn serialize(value: Option<&AddressValue>) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(AddressValue::Canonical(ip)) => Ok(Some(ip.to_string())),
        Some(AddressValue::Raw(s)) => Err(ValidationError::NotSerializable { value: s.clone() }),
    }
}

/// Integer form of an address, as used for range and membership queries.
/// IPv4 addresses map onto `0..=u32::MAX`.
pub fn to_int(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// `#[serde(with = "ip::as_string")]` for `IpAddr` fields: writes the
/// normalized text and reads through [`parse`].
pub mod as_string {
    use std::net::IpAddr;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ip: &IpAddr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(ip)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IpAddr, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(raw).map_err(serde::de::Error::custom)
    }
}

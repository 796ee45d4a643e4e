//! Flow identity and counter types for the flow metadata pipeline.
//!
//! This crate provides the value types sampled flows are described with:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`VlanId`]: 12-bit VLAN identifiers, `0` meaning untagged
//! - [`IpAddress`]: IPv4 and IPv6 addresses with a total order
//! - [`FlowKey`]: the lookup identity of a sampled flow
//! - [`FlowCounters`]: byte/packet counter pairs
//! - [`FlowReportKey`]: the stringified projection of a key used in reports
//!
//! A [`FlowKey`] is plain data as handed over by the sampling source.
//! [`FlowKey::validate`] checks it and classifies it into the index it
//! belongs to (see [`FlowClass`]).

mod counters;
mod flow_key;
mod ip;
mod mac;
mod report_key;
mod vlan;

pub use counters::FlowCounters;
pub use flow_key::{EthPairKey, FiveTupleKey, FlowClass, FlowKey};
pub use ip::IpAddress;
pub use mac::MacAddress;
pub use report_key::FlowReportKey;
pub use vlan::VlanId;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid VLAN ID: {0} (must be 0-4095)")]
    InvalidVlanId(u16),
}

/// Reasons a [`FlowKey`] is rejected by [`FlowKey::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported IP version {0} (expected 0, 4 or 6)")]
    InvalidIpVersion(u8),

    #[error("source and destination MAC must both be present or both absent")]
    PartialEthernet,

    #[error("key carries neither ethernet nor IP information")]
    Empty,

    #[error("IPv{version} key has missing or mismatched addresses")]
    AddressMismatch { version: u8 },

    #[error("address length {len} does not match IP version {version}")]
    InvalidAddressLength { version: u8, len: usize },
}

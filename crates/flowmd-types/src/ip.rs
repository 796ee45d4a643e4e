//! IP address type used in 5-tuple flow keys.

use crate::{KeyError, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 or IPv6 address.
///
/// Ordering puts every IPv4 address before every IPv6 address and is
/// byte-wise within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpAddress {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl IpAddress {
    /// Builds an address from the fixed-width octets a sampling source hands
    /// over, sized by `version`.
    ///
    /// # Errors
    ///
    /// Fails if `version` is neither 4 nor 6, or if `octets` has the wrong
    /// length for it.
    pub fn from_octets(version: u8, octets: &[u8]) -> Result<Self, KeyError> {
        match version {
            4 => <[u8; 4]>::try_from(octets)
                .map(|b| IpAddress::V4(Ipv4Addr::from(b)))
                .map_err(|_| KeyError::InvalidAddressLength {
                    version,
                    len: octets.len(),
                }),
            6 => <[u8; 16]>::try_from(octets)
                .map(|b| IpAddress::V6(Ipv6Addr::from(b)))
                .map_err(|_| KeyError::InvalidAddressLength {
                    version,
                    len: octets.len(),
                }),
            other => Err(KeyError::InvalidIpVersion(other)),
        }
    }

    /// Returns 4 or 6.
    pub const fn version(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 4,
            IpAddress::V6(_) => 6,
        }
    }

    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(IpAddress::from)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl TryFrom<String> for IpAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpAddress> for String {
    fn from(addr: IpAddress) -> String {
        addr.to_string()
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => IpAddress::V4(v4),
            IpAddr::V6(v6) => IpAddress::V6(v6),
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_octets() {
        let v4 = IpAddress::from_octets(4, &[10, 0, 0, 1]).unwrap();
        assert_eq!(v4.to_string(), "10.0.0.1");
        assert_eq!(v4.version(), 4);

        let mut raw = [0u8; 16];
        raw[15] = 1;
        let v6 = IpAddress::from_octets(6, &raw).unwrap();
        assert_eq!(v6.to_string(), "::1");
    }

    #[test]
    fn test_from_octets_rejects_bad_input() {
        assert_eq!(
            IpAddress::from_octets(4, &[1, 2, 3]),
            Err(KeyError::InvalidAddressLength { version: 4, len: 3 })
        );
        assert_eq!(
            IpAddress::from_octets(5, &[1, 2, 3, 4]),
            Err(KeyError::InvalidIpVersion(5))
        );
    }

    #[test]
    fn test_family_ordering() {
        let v4: IpAddress = "255.255.255.255".parse().unwrap();
        let v6: IpAddress = "::".parse().unwrap();
        assert!(v4 < v6);

        let a: IpAddress = "10.0.0.1".parse().unwrap();
        let b: IpAddress = "10.0.0.2".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("10.0.0".parse::<IpAddress>().is_err());
        assert!("zz::1".parse::<IpAddress>().is_err());
    }
}

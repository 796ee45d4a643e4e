//! VLAN identifier as carried in flow keys.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 12-bit IEEE 802.1Q VLAN identifier.
///
/// Unlike configuration-side VLANs, a flow key may legitimately carry
/// VLAN 0, which means the frame was untagged (or the tag is irrelevant).
///
/// # Examples
///
/// ```
/// use flowmd_types::VlanId;
///
/// let vlan = VlanId::new(100).unwrap();
/// assert_eq!(vlan.as_u16(), 100);
/// assert!(VlanId::UNTAGGED.is_untagged());
/// assert!(VlanId::new(4096).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Largest value representable in the 12-bit VID field.
    pub const MAX: u16 = 0x0fff;

    /// Untagged / irrelevant VLAN.
    pub const UNTAGGED: VlanId = VlanId(0);

    /// Creates a VLAN ID.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not fit in 12 bits.
    pub const fn new(id: u16) -> Result<Self, ParseError> {
        if id <= Self::MAX {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id))
        }
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub const fn is_untagged(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u16 = s
            .parse()
            .map_err(|_| ParseError::InvalidVlanId(u16::MAX))?;
        VlanId::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range() {
        assert!(VlanId::new(0).is_ok());
        assert!(VlanId::new(4095).is_ok());
        assert_eq!(VlanId::new(4096), Err(ParseError::InvalidVlanId(4096)));
    }

    #[test]
    fn test_parse() {
        assert_eq!("100".parse::<VlanId>().unwrap().as_u16(), 100);
        assert_eq!("4095".parse::<VlanId>().unwrap().as_u16(), 4095);
        assert!("Vlan200".parse::<VlanId>().is_err());
        assert!("4096".parse::<VlanId>().is_err());
    }

    #[test]
    fn test_default_is_untagged() {
        assert!(VlanId::default().is_untagged());
        assert!(!VlanId::new(10).unwrap().is_untagged());
    }
}

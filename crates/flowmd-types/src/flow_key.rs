//! Flow keys and the index keys derived from them.

use crate::{IpAddress, KeyError, MacAddress, VlanId};
use serde::{Deserialize, Serialize};

/// Identity of a sampled flow, as produced by the sampling source.
///
/// A key with `ip_version == 0` is an L2-only flow and its 5-tuple fields
/// are ignored. A key with neither `smac` nor `dmac` is a bare 5-tuple flow
/// with no ethernet context. Use [`FlowKey::validate`] before trusting the
/// combination of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowKey {
    pub smac: Option<MacAddress>,
    pub dmac: Option<MacAddress>,
    pub vlan_id: VlanId,
    /// Ethertype value (e.g. `0x0800`), already converted from network order.
    pub ethertype: u16,
    /// 0 (no IP), 4 or 6.
    pub ip_version: u8,
    pub src_ip: Option<IpAddress>,
    pub dst_ip: Option<IpAddress>,
    pub ipprotocol: u8,
    pub sport: u16,
    pub dport: u16,
}

/// Index key for the (source MAC, destination MAC, VLAN) level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthPairKey {
    pub smac: MacAddress,
    pub dmac: MacAddress,
    pub vlan_id: VlanId,
}

/// Index key for a fully-qualified 5-tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiveTupleKey {
    pub src_ip: IpAddress,
    pub dst_ip: IpAddress,
    pub ipprotocol: u8,
    pub sport: u16,
    pub dport: u16,
}

/// Which index a validated key routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowClass {
    /// L2-only flow under an ethernet pair, indexed by ethertype.
    EthOnly { pair: EthPairKey, ethertype: u16 },
    /// 5-tuple flow riding an ethernet pair.
    EthFiveTuple { pair: EthPairKey, tuple: FiveTupleKey },
    /// 5-tuple flow with no ethernet context.
    FiveTuple(FiveTupleKey),
}

impl FlowKey {
    /// L2-only key for traffic of `ethertype` between two MACs.
    pub fn eth(smac: MacAddress, dmac: MacAddress, vlan_id: VlanId, ethertype: u16) -> Self {
        Self {
            smac: Some(smac),
            dmac: Some(dmac),
            vlan_id,
            ethertype,
            ..Self::default()
        }
    }

    /// Bare 5-tuple key. The IP version is taken from `src_ip`.
    pub fn five_tuple(
        src_ip: IpAddress,
        dst_ip: IpAddress,
        ipprotocol: u8,
        sport: u16,
        dport: u16,
    ) -> Self {
        Self {
            ethertype: if src_ip.is_ipv4() { 0x0800 } else { 0x86dd },
            ip_version: src_ip.version(),
            src_ip: Some(src_ip),
            dst_ip: Some(dst_ip),
            ipprotocol,
            sport,
            dport,
            ..Self::default()
        }
    }

    /// Adds ethernet context to a key.
    pub fn with_eth(mut self, smac: MacAddress, dmac: MacAddress, vlan_id: VlanId) -> Self {
        self.smac = Some(smac);
        self.dmac = Some(dmac);
        self.vlan_id = vlan_id;
        self
    }

    /// True when the key carries no IP information.
    pub fn is_eth_only(&self) -> bool {
        self.ip_version == 0
    }

    /// Validates the key and classifies it.
    ///
    /// Routing is total over valid keys: every key accepted here maps to
    /// exactly one index.
    pub fn validate(&self) -> Result<FlowClass, KeyError> {
        if !matches!(self.ip_version, 0 | 4 | 6) {
            return Err(KeyError::InvalidIpVersion(self.ip_version));
        }

        let pair = match (self.smac, self.dmac) {
            (Some(smac), Some(dmac)) => Some(EthPairKey {
                smac,
                dmac,
                vlan_id: self.vlan_id,
            }),
            (None, None) => None,
            _ => return Err(KeyError::PartialEthernet),
        };

        if self.is_eth_only() {
            return pair
                .map(|pair| FlowClass::EthOnly {
                    pair,
                    ethertype: self.ethertype,
                })
                .ok_or(KeyError::Empty);
        }

        let tuple = self.five_tuple_key()?;
        Ok(match pair {
            Some(pair) => FlowClass::EthFiveTuple { pair, tuple },
            None => FlowClass::FiveTuple(tuple),
        })
    }

    fn five_tuple_key(&self) -> Result<FiveTupleKey, KeyError> {
        let version = self.ip_version;
        match (self.src_ip, self.dst_ip) {
            (Some(src_ip), Some(dst_ip))
                if src_ip.version() == version && dst_ip.version() == version =>
            {
                Ok(FiveTupleKey {
                    src_ip,
                    dst_ip,
                    ipprotocol: self.ipprotocol,
                    sport: self.sport,
                    dport: self.dport,
                })
            }
            _ => Err(KeyError::AddressMismatch { version }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_eth_only_routing() {
        let key = FlowKey::eth(mac(1), mac(2), VlanId::new(10).unwrap(), 0x0806);
        assert!(key.is_eth_only());
        assert_eq!(
            key.validate().unwrap(),
            FlowClass::EthOnly {
                pair: EthPairKey {
                    smac: mac(1),
                    dmac: mac(2),
                    vlan_id: VlanId::new(10).unwrap(),
                },
                ethertype: 0x0806,
            }
        );
    }

    #[test]
    fn test_five_tuple_routing() {
        let src: IpAddress = "10.0.0.1".parse().unwrap();
        let dst: IpAddress = "10.0.0.2".parse().unwrap();
        let bare = FlowKey::five_tuple(src, dst, 6, 1234, 443);
        assert!(matches!(bare.validate(), Ok(FlowClass::FiveTuple(_))));

        let riding = bare.with_eth(mac(1), mac(2), VlanId::UNTAGGED);
        match riding.validate().unwrap() {
            FlowClass::EthFiveTuple { pair, tuple } => {
                assert_eq!(pair.smac, mac(1));
                assert_eq!(tuple.dport, 443);
            }
            other => panic!("unexpected class {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_ip_version() {
        let key = FlowKey {
            ip_version: 5,
            ..FlowKey::default()
        };
        assert_eq!(key.validate(), Err(KeyError::InvalidIpVersion(5)));
    }

    #[test]
    fn test_rejects_partial_ethernet() {
        let key = FlowKey {
            smac: Some(mac(1)),
            ..FlowKey::default()
        };
        assert_eq!(key.validate(), Err(KeyError::PartialEthernet));
    }

    #[test]
    fn test_rejects_empty_key() {
        assert_eq!(FlowKey::default().validate(), Err(KeyError::Empty));
    }

    #[test]
    fn test_rejects_family_mismatch() {
        let src: IpAddress = "10.0.0.1".parse().unwrap();
        let dst: IpAddress = "::1".parse().unwrap();
        let key = FlowKey::five_tuple(src, dst, 17, 53, 53);
        assert_eq!(
            key.validate(),
            Err(KeyError::AddressMismatch { version: 4 })
        );

        let missing = FlowKey {
            ip_version: 6,
            ..FlowKey::default()
        };
        assert_eq!(
            missing.validate(),
            Err(KeyError::AddressMismatch { version: 6 })
        );
    }

    #[test]
    fn test_deserialize_sparse_key() {
        let key: FlowKey = serde_json::from_str(
            r#"{"smac":"02:00:00:00:00:01","dmac":"02:00:00:00:00:02","ethertype":2054}"#,
        )
        .unwrap();
        assert_eq!(key.ip_version, 0);
        assert_eq!(key.vlan_id, VlanId::UNTAGGED);
        assert!(key.validate().is_ok());
    }
}

//! Report-oriented projection of a flow key.

use crate::{EthPairKey, FlowKey};
use serde::{Deserialize, Serialize};

/// Stringified flow identity as it appears in reports.
///
/// Built once when an accumulator is created and shared, never rebuilt,
/// by every window entry the accumulator contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowReportKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dmac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<u16>,
    pub ip_version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipprotocol: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dport: Option<u16>,
}

impl FlowReportKey {
    /// Key reported for an ethernet pair's own aggregate.
    pub fn for_pair(pair: &EthPairKey) -> Self {
        Self {
            smac: Some(pair.smac.to_string()),
            dmac: Some(pair.dmac.to_string()),
            vlan_id: (!pair.vlan_id.is_untagged()).then(|| pair.vlan_id.as_u16()),
            ..Self::default()
        }
    }
}

impl From<&FlowKey> for FlowReportKey {
    fn from(key: &FlowKey) -> Self {
        let has_ip = matches!(key.ip_version, 4 | 6);
        Self {
            smac: key.smac.map(|m| m.to_string()),
            dmac: key.dmac.map(|m| m.to_string()),
            vlan_id: (!key.vlan_id.is_untagged()).then(|| key.vlan_id.as_u16()),
            ethertype: (key.ethertype != 0).then_some(key.ethertype),
            ip_version: key.ip_version,
            src_ip: key.src_ip.filter(|_| has_ip).map(|ip| ip.to_string()),
            dst_ip: key.dst_ip.filter(|_| has_ip).map(|ip| ip.to_string()),
            ipprotocol: has_ip.then_some(key.ipprotocol),
            sport: has_ip.then_some(key.sport),
            dport: has_ip.then_some(key.dport),
        }
    }
}

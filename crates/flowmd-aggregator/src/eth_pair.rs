//! Ethernet-pair grouping: one aggregate accumulator plus the L2-only and
//! 5-tuple flows seen between the same two MACs on the same VLAN.
//!
//! L2-only flows (ARP, LLDP, ...) are folded into the pair's own
//! `mac_stats` and, unless `report_all_samples` is set, only the pair
//! total is reported. 5-tuple flows riding the pair are always reported
//! individually and never folded.

use chrono::{DateTime, Utc};
use flowmd_types::{EthPairKey, FiveTupleKey, FlowKey, FlowReportKey};

use crate::accumulator::StatsAccumulator;
use crate::close::ClosePass;
use crate::index::FlowIndex;

/// All accumulators sharing one (smac, dmac, vlan).
#[derive(Debug, Clone)]
pub struct EthPair {
    key: EthPairKey,
    mac_stats: StatsAccumulator,
    ethertype_flows: FlowIndex<u16, StatsAccumulator>,
    five_tuple_flows: FlowIndex<FiveTupleKey, StatsAccumulator>,
}

impl EthPair {
    pub fn new(key: EthPairKey, now: DateTime<Utc>) -> Self {
        let pair_key = FlowKey::eth(key.smac, key.dmac, key.vlan_id, 0);
        Self {
            key,
            mac_stats: StatsAccumulator::with_report_key(
                pair_key,
                FlowReportKey::for_pair(&key),
                now,
            ),
            ethertype_flows: FlowIndex::new(),
            five_tuple_flows: FlowIndex::new(),
        }
    }

    pub fn key(&self) -> &EthPairKey {
        &self.key
    }

    /// The pair's own aggregate accumulator.
    pub fn mac_stats(&self) -> &StatsAccumulator {
        &self.mac_stats
    }

    pub fn ethertype_flows(&self) -> &FlowIndex<u16, StatsAccumulator> {
        &self.ethertype_flows
    }

    pub fn five_tuple_flows(&self) -> &FlowIndex<FiveTupleKey, StatsAccumulator> {
        &self.five_tuple_flows
    }

    /// Child accumulators, not counting `mac_stats`.
    pub fn child_count(&self) -> usize {
        self.ethertype_flows.len() + self.five_tuple_flows.len()
    }

    /// Marks the pair aggregate active for the current window. Returns true
    /// on the first call since the last close.
    pub(crate) fn activate_aggregate(&mut self) -> bool {
        self.mac_stats.activate()
    }

    pub(crate) fn ethertype_flow(
        &mut self,
        ethertype: u16,
        key: &FlowKey,
        now: DateTime<Utc>,
    ) -> (&mut StatsAccumulator, bool) {
        self.ethertype_flows
            .lookup_or_create(ethertype, || StatsAccumulator::new(key.clone(), now))
    }

    pub(crate) fn five_tuple_flow(
        &mut self,
        tuple: FiveTupleKey,
        key: &FlowKey,
        now: DateTime<Utc>,
    ) -> (&mut StatsAccumulator, bool) {
        self.five_tuple_flows
            .lookup_or_create(tuple, || StatsAccumulator::new(key.clone(), now))
    }

    /// Closes the window for everything under this pair.
    pub(crate) fn close_window(&mut self, pass: &mut ClosePass<'_>) {
        let Self {
            mac_stats,
            ethertype_flows,
            five_tuple_flows,
            ..
        } = self;

        let evicted = ethertype_flows.remove_if(|_, child| {
            if !child.is_active() {
                return pass.should_evict(child);
            }
            // Fold before closing: the delta is measured against the
            // child's previous close.
            mac_stats.fold(child);
            pass.close(child);
            if pass.report_all_samples() {
                pass.emit(child);
            }
            false
        });
        pass.count_evicted(evicted);

        if mac_stats.is_active() {
            pass.close_and_emit(mac_stats);
        }

        pass.walk_five_tuples(five_tuple_flows);
    }

    /// True once the pair holds no flows and its own aggregate has gone
    /// idle past the TTL.
    pub(crate) fn is_idle(&self, pass: &ClosePass<'_>) -> bool {
        self.child_count() == 0 && pass.is_expired(&self.mac_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportType;
    use crate::window::Window;
    use chrono::TimeDelta;
    use flowmd_types::{FlowCounters, IpAddress, MacAddress, VlanId};
    use pretty_assertions::assert_eq;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn pair_key() -> EthPairKey {
        EthPairKey {
            smac: MacAddress::new([2, 0, 0, 0, 0, 1]),
            dmac: MacAddress::new([2, 0, 0, 0, 0, 2]),
            vlan_id: VlanId::UNTAGGED,
        }
    }

    fn sample_ethertype(pair: &mut EthPair, ethertype: u16, counters: FlowCounters, at: i64) {
        let k = pair_key();
        let key = FlowKey::eth(k.smac, k.dmac, k.vlan_id, ethertype);
        let (acc, _) = pair.ethertype_flow(ethertype, &key, t(at));
        acc.sample(&counters, t(at));
    }

    fn close(pair: &mut EthPair, window: &mut Window, report_all: bool, at: i64) {
        let mut pass = ClosePass::new(
            t(at),
            Some(TimeDelta::seconds(60)),
            ReportType::Absolute,
            report_all,
            None,
            window,
        );
        pair.close_window(&mut pass);
    }

    #[test]
    fn test_l2_children_fold_into_pair() {
        let mut pair = EthPair::new(pair_key(), t(0));
        sample_ethertype(&mut pair, 0x0806, FlowCounters::new(100, 2), 1);
        sample_ethertype(&mut pair, 0x88cc, FlowCounters::new(50, 1), 1);

        let mut window = Window::open(t(0));
        close(&mut pair, &mut window, false, 2);

        assert_eq!(window.num_stats(), 1);
        assert_eq!(window.flow_stats()[0].counters(), FlowCounters::new(150, 3));
        assert_eq!(
            window.flow_stats()[0].key().smac.as_deref(),
            Some("02:00:00:00:00:01")
        );
        assert_eq!(window.flow_stats()[0].key().ethertype, None);
    }

    #[test]
    fn test_report_all_samples_adds_children() {
        let mut pair = EthPair::new(pair_key(), t(0));
        sample_ethertype(&mut pair, 0x0806, FlowCounters::new(100, 2), 1);
        sample_ethertype(&mut pair, 0x88cc, FlowCounters::new(50, 1), 1);

        let mut window = Window::open(t(0));
        close(&mut pair, &mut window, true, 2);

        let ethertypes: Vec<_> = window
            .flow_stats()
            .iter()
            .map(|s| s.key().ethertype)
            .collect();
        assert_eq!(ethertypes, vec![Some(0x0806), Some(0x88cc), None]);
    }

    #[test]
    fn test_five_tuples_under_pair_are_not_folded() {
        let mut pair = EthPair::new(pair_key(), t(0));
        let k = pair_key();
        let src: IpAddress = "10.0.0.1".parse().unwrap();
        let dst: IpAddress = "10.0.0.2".parse().unwrap();
        let key = FlowKey::five_tuple(src, dst, 6, 40000, 22).with_eth(k.smac, k.dmac, k.vlan_id);
        let tuple = match key.validate().unwrap() {
            flowmd_types::FlowClass::EthFiveTuple { tuple, .. } => tuple,
            other => panic!("unexpected class {:?}", other),
        };
        let (acc, created) = pair.five_tuple_flow(tuple, &key, t(1));
        assert!(created);
        acc.sample(&FlowCounters::new(9000, 6), t(1));

        let mut window = Window::open(t(0));
        close(&mut pair, &mut window, false, 2);

        assert_eq!(window.num_stats(), 1);
        assert_eq!(window.flow_stats()[0].key().dport, Some(22));
        assert!(!pair.mac_stats().is_active());
        assert_eq!(pair.mac_stats().counters(), FlowCounters::ZERO);
    }

    #[test]
    fn test_idle_pair_detection() {
        let mut pair = EthPair::new(pair_key(), t(0));
        sample_ethertype(&mut pair, 0x0806, FlowCounters::new(1, 1), 0);

        let mut window = Window::open(t(0));
        close(&mut pair, &mut window, false, 1);
        assert_eq!(pair.child_count(), 1);

        // Both the child and the aggregate are past the 60s TTL now.
        let mut later = Window::open(t(100));
        let mut pass = ClosePass::new(
            t(100),
            Some(TimeDelta::seconds(60)),
            ReportType::Absolute,
            false,
            None,
            &mut later,
        );
        pair.close_window(&mut pass);
        assert!(pair.is_idle(&pass));
        assert_eq!(pass.finish().evicted, 1);
        assert_eq!(pair.child_count(), 0);
    }
}

//! The flow aggregator: owns every accumulator index, drives the window
//! lifecycle and hands finished reports to the publisher.
//!
//! # Lifecycle
//!
//! ```text
//! activate_window ──> add_sample* ──> close_active_window ──┬──> send_report
//!        ^                                                   │
//!        └───────────────── (up to max_windows) ─────────────┘
//! ```
//!
//! Accumulators outlive reports: `send_report` only clears windows, the
//! indices carry over to the next reporting cycle and shrink through TTL
//! eviction during window close.
//!
//! All operations are synchronous and assume a single caller; wrap the
//! aggregator in a lock or give it a single owning task to share it.

use chrono::{DateTime, TimeDelta, Utc};
use flowmd_types::{EthPairKey, FiveTupleKey, FlowClass, FlowCounters, FlowKey};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::accumulator::StatsAccumulator;
use crate::clock::{Clock, SystemClock};
use crate::close::{ClosePass, ReportFilter};
use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, Result};
use crate::eth_pair::EthPair;
use crate::index::FlowIndex;
use crate::publish::{JsonReportSerializer, ReportSerializer, ReportTransport};
use crate::window::{Report, Window};

/// Predicate deciding whether a sample is collected at all.
pub type CollectFilter = Box<dyn Fn(&FlowKey) -> bool + Send + Sync>;

/// Operation counters for an aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Samples applied to an accumulator.
    pub samples_added: u64,
    /// Samples rejected for a malformed key.
    pub samples_rejected: u64,
    /// Samples dropped by the collect filter.
    pub samples_not_collected: u64,
    pub accumulators_created: u64,
    pub accumulators_evicted: u64,
    pub eth_pairs_created: u64,
    pub eth_pairs_removed: u64,
    pub windows_closed: u64,
    /// Closed flows the report filter kept out of windows.
    pub flows_filtered: u64,
    pub reports_sent: u64,
    pub report_failures: u64,
}

/// Flow accumulator cache and windowed report builder.
pub struct Aggregator {
    config: AggregatorConfig,
    acc_ttl: Option<TimeDelta>,
    /// Ethernet pairs keyed by (smac, dmac, vlan).
    eth_pairs: FlowIndex<EthPairKey, EthPair>,
    /// 5-tuple flows with no ethernet context.
    five_tuple_flows: FlowIndex<FiveTupleKey, StatsAccumulator>,
    report: Report,
    active_window: Option<Window>,
    /// Accumulators moved into `WindowActive` since the last close.
    active_accs: usize,
    total_report_flows: usize,
    report_filter: Option<ReportFilter>,
    collect_filter: Option<CollectFilter>,
    clock: Arc<dyn Clock>,
    serializer: Arc<dyn ReportSerializer>,
    transport: Option<Arc<dyn ReportTransport>>,
    stats: AggregatorStats,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.config)
            .field("eth_pairs", &self.eth_pairs.len())
            .field("five_tuple_flows", &self.five_tuple_flows.len())
            .field("windows", &self.report.num_windows())
            .field("window_active", &self.active_window.is_some())
            .field("active_accs", &self.active_accs)
            .field("total_report_flows", &self.total_report_flows)
            .field("has_report_filter", &self.report_filter.is_some())
            .field("has_collect_filter", &self.collect_filter.is_some())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

impl Aggregator {
    /// Allocates an aggregator.
    ///
    /// The aggregator starts with the system clock, a JSON serializer and no
    /// transport; see the `with_*`/`set_*` methods to change that.
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let acc_ttl = config.acc_ttl_delta();

        debug!(
            node_id = %config.node_info.node_id,
            max_windows = config.max_windows,
            acc_ttl_secs = ?config.acc_ttl_secs,
            report_type = ?config.report_type,
            "aggregator allocated"
        );

        Ok(Self {
            report: Report::new(config.node_info.clone(), config.max_windows),
            config,
            acc_ttl,
            eth_pairs: FlowIndex::new(),
            five_tuple_flows: FlowIndex::new(),
            active_window: None,
            active_accs: 0,
            total_report_flows: 0,
            report_filter: None,
            collect_filter: None,
            clock: Arc::new(SystemClock),
            serializer: Arc::new(JsonReportSerializer::new()),
            transport: None,
            stats: AggregatorStats::default(),
        })
    }

    /// Installs the predicate deciding which closed flows are reported.
    pub fn with_report_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&StatsAccumulator) -> bool + Send + Sync + 'static,
    {
        self.report_filter = Some(Box::new(filter));
        self
    }

    /// Installs the predicate deciding which samples are collected.
    pub fn with_collect_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&FlowKey) -> bool + Send + Sync + 'static,
    {
        self.collect_filter = Some(Box::new(filter));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_serializer(&mut self, serializer: Arc<dyn ReportSerializer>) {
        self.serializer = serializer;
    }

    pub fn set_transport(&mut self, transport: Arc<dyn ReportTransport>) {
        self.transport = Some(transport);
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    /// Opens a new observation window.
    ///
    /// # Errors
    ///
    /// [`AggregatorError::WindowCapacityExceeded`] when the report already
    /// holds `max_windows` closed windows; send the report first.
    pub fn activate_window(&mut self) -> Result<()> {
        if self.active_window.is_some() {
            return Err(AggregatorError::WindowAlreadyActive);
        }
        if self.report.num_windows() >= self.config.max_windows {
            return Err(AggregatorError::WindowCapacityExceeded {
                max_windows: self.config.max_windows,
            });
        }

        let now = self.clock.now();
        self.active_window = Some(Window::open(now));
        debug!(index = self.report.num_windows(), started_at = %now, "window activated");
        Ok(())
    }

    /// Records a counter sample for the flow identified by `key`.
    ///
    /// Counters are absolute running totals; within a window the last
    /// sample wins.
    ///
    /// # Errors
    ///
    /// [`AggregatorError::InvalidArgument`] for a malformed key; the sample
    /// is dropped and nothing is mutated.
    pub fn add_sample(&mut self, key: &FlowKey, counters: &FlowCounters) -> Result<()> {
        let class = match key.validate() {
            Ok(class) => class,
            Err(e) => {
                self.stats.samples_rejected += 1;
                debug!(?key, error = %e, "sample rejected");
                return Err(e.into());
            }
        };

        if let Some(filter) = &self.collect_filter {
            if !filter(key) {
                self.stats.samples_not_collected += 1;
                return Ok(());
            }
        }

        let now = self.clock.now();
        let (acc, created) = match class {
            FlowClass::FiveTuple(tuple) => self
                .five_tuple_flows
                .lookup_or_create(tuple, || StatsAccumulator::new(key.clone(), now)),
            FlowClass::EthOnly { pair, ethertype } => {
                let eth_pair = Self::eth_pair_mut(&mut self.eth_pairs, &mut self.stats, pair, now);
                // The pair aggregate is reported for this window too, so it
                // needs a slot of its own.
                if eth_pair.activate_aggregate() {
                    self.active_accs += 1;
                }
                eth_pair.ethertype_flow(ethertype, key, now)
            }
            FlowClass::EthFiveTuple { pair, tuple } => {
                Self::eth_pair_mut(&mut self.eth_pairs, &mut self.stats, pair, now)
                    .five_tuple_flow(tuple, key, now)
            }
        };

        if created {
            self.stats.accumulators_created += 1;
            debug!(key = ?acc.report_key(), "accumulator created");
        }
        if acc.sample(counters, now) {
            self.active_accs += 1;
        }
        self.stats.samples_added += 1;
        Ok(())
    }

    fn eth_pair_mut<'a>(
        eth_pairs: &'a mut FlowIndex<EthPairKey, EthPair>,
        stats: &mut AggregatorStats,
        pair: EthPairKey,
        now: DateTime<Utc>,
    ) -> &'a mut EthPair {
        let (eth_pair, created) = eth_pairs.lookup_or_create(pair, || EthPair::new(pair, now));
        if created {
            stats.eth_pairs_created += 1;
            debug!(smac = %pair.smac, dmac = %pair.dmac, vlan = %pair.vlan_id, "eth pair created");
        }
        eth_pair
    }

    /// Closes the active window: freezes counters of every accumulator
    /// touched since the last close, folds L2-only flows into their
    /// ethernet pairs, evicts idle accumulators and fills the window.
    ///
    /// # Errors
    ///
    /// [`AggregatorError::NoActiveWindow`] without an open window, and
    /// [`AggregatorError::AllocationFailure`] if the window's stat array
    /// cannot be reserved. Either way nothing is mutated.
    pub fn close_active_window(&mut self) -> Result<()> {
        let mut window = self
            .active_window
            .take()
            .ok_or(AggregatorError::NoActiveWindow)?;
        if let Err(e) = window.provision(self.active_accs) {
            error!(requested = self.active_accs, "failed to provision window");
            self.active_window = Some(window);
            return Err(e);
        }

        let now = self.clock.now();
        let mut pass = ClosePass::new(
            now,
            self.acc_ttl,
            self.config.report_type,
            self.config.report_all_samples,
            self.report_filter.as_deref(),
            &mut window,
        );

        let pairs_removed = self.eth_pairs.remove_if(|key, eth_pair| {
            eth_pair.close_window(&mut pass);
            let idle = eth_pair.is_idle(&pass);
            if idle {
                debug!(smac = %key.smac, dmac = %key.dmac, vlan = %key.vlan_id, "removing idle eth pair");
            }
            idle
        });
        pass.walk_five_tuples(&mut self.five_tuple_flows);
        let outcome = pass.finish();

        window.seal(now);

        self.total_report_flows += outcome.appended;
        self.stats.windows_closed += 1;
        self.stats.flows_filtered += outcome.filtered as u64;
        // A removed pair takes its aggregate accumulator with it.
        self.stats.accumulators_evicted += (outcome.evicted + pairs_removed) as u64;
        self.stats.eth_pairs_removed += pairs_removed as u64;

        debug!(
            index = self.report.num_windows(),
            provisioned = window.provisioned_stats(),
            flows = window.num_stats(),
            filtered = outcome.filtered,
            evicted = outcome.evicted,
            eth_pairs_removed = pairs_removed,
            "window closed"
        );

        self.active_accs = 0;
        self.report.push_window(window);
        Ok(())
    }

    /// Serializes and sends the report on `topic`, then resets the report
    /// for the next cycle.
    ///
    /// The reset happens whether or not delivery succeeded, so a failing
    /// transport cannot wedge the pipeline; the unsent report is lost and
    /// the error is returned. An active (not yet closed) window is not part
    /// of the report and stays open.
    pub fn send_report(&mut self, topic: &str) -> Result<()> {
        let windows = self.report.num_windows();
        let flows = self.total_report_flows;
        let result = self.publish(topic);

        self.report.clear();
        self.total_report_flows = 0;

        match &result {
            Ok(()) => {
                self.stats.reports_sent += 1;
                info!(topic, windows, flows, "report sent");
            }
            Err(e) => {
                self.stats.report_failures += 1;
                error!(topic, windows, flows, error = %e, "report send failed, report discarded");
            }
        }
        result
    }

    fn publish(&self, topic: &str) -> Result<()> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(AggregatorError::TransportUnavailable)?;
        let payload = self
            .serializer
            .serialize(&self.report)
            .map_err(|e| AggregatorError::Serialization(e.to_string()))?;
        transport
            .send(topic, &payload)
            .map_err(|e| AggregatorError::Transport(e.to_string()))
    }

    /// Number of flow entries across all closed windows of the current
    /// report.
    pub fn get_total_flows(&self) -> usize {
        self.total_report_flows
    }

    /// The window currently open, if any.
    pub fn active_window(&self) -> Option<&Window> {
        self.active_window.as_ref()
    }

    /// Closed windows waiting to be sent.
    pub fn closed_windows(&self) -> &[Window] {
        self.report.windows()
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Index of the next window slot.
    pub fn windows_cur_idx(&self) -> usize {
        self.report.num_windows()
    }

    /// Accumulators activated since the last close.
    pub fn active_accs(&self) -> usize {
        self.active_accs
    }

    /// Finds the accumulator for `key` without creating one.
    pub fn lookup(&self, key: &FlowKey) -> Option<&StatsAccumulator> {
        match key.validate().ok()? {
            FlowClass::FiveTuple(tuple) => self.five_tuple_flows.get(&tuple),
            FlowClass::EthOnly { pair, ethertype } => {
                self.eth_pairs.get(&pair)?.ethertype_flows().get(&ethertype)
            }
            FlowClass::EthFiveTuple { pair, tuple } => {
                self.eth_pairs.get(&pair)?.five_tuple_flows().get(&tuple)
            }
        }
    }

    /// Finds the ethernet pair for (smac, dmac, vlan).
    pub fn eth_pair(&self, key: &EthPairKey) -> Option<&EthPair> {
        self.eth_pairs.get(key)
    }

    pub fn eth_pair_count(&self) -> usize {
        self.eth_pairs.len()
    }

    /// Live accumulators, counting each pair's aggregate.
    pub fn total_accumulators(&self) -> usize {
        self.five_tuple_flows.len()
            + self
                .eth_pairs
                .values()
                .map(|pair| 1 + pair.child_count())
                .sum::<usize>()
    }

    /// Dumps every live accumulator at debug level.
    pub fn log_accumulators(&self) {
        for pair in self.eth_pairs.values() {
            log_acc("eth pair", pair.mac_stats());
            for acc in pair.ethertype_flows().values() {
                log_acc("ethertype flow", acc);
            }
            for acc in pair.five_tuple_flows().values() {
                log_acc("eth 5-tuple flow", acc);
            }
        }
        for acc in self.five_tuple_flows.values() {
            log_acc("5-tuple flow", acc);
        }
    }
}

fn log_acc(kind: &str, acc: &StatsAccumulator) {
    debug!(
        kind,
        key = ?acc.report_key(),
        state = ?acc.state(),
        counters = ?acc.counters(),
        first_counters = ?acc.first_counters(),
        report_counters = ?acc.report_counters(),
        last_updated = %acc.last_updated(),
        "accumulator"
    );
}

//! Per-flow stats accumulator and its window state machine.
//!
//! ```text
//!            sample                 close                  sample
//!   Init ──────────────> WindowActive ─────> WindowReset ──────────> WindowActive ...
//! ```
//!
//! Only accumulators in `WindowReset` (or never sampled `Init` ones) are
//! candidates for TTL eviction.

use chrono::{DateTime, TimeDelta, Utc};
use flowmd_types::{FlowCounters, FlowKey, FlowReportKey};
use std::sync::Arc;
use tracing::warn;

use crate::config::ReportType;
use crate::window::FlowStat;

/// Lifecycle state of an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccState {
    /// Created but never sampled.
    Init,
    /// Touched since the last window close.
    WindowActive,
    /// Closed; waiting for the next sample.
    WindowReset,
}

/// One cache entry tracking a flow's counters across windows.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    key: FlowKey,
    report_key: Arc<FlowReportKey>,
    /// Baseline taken at the last close; relative deltas start here.
    first_counters: FlowCounters,
    /// Latest absolute counters.
    counters: FlowCounters,
    /// Counters frozen by the last close.
    report_counters: FlowCounters,
    state: AccState,
    last_updated: DateTime<Utc>,
}

impl StatsAccumulator {
    /// Creates an accumulator for `key`, projecting its report key once.
    pub fn new(key: FlowKey, now: DateTime<Utc>) -> Self {
        let report_key = FlowReportKey::from(&key);
        Self::with_report_key(key, report_key, now)
    }

    pub fn with_report_key(key: FlowKey, report_key: FlowReportKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            report_key: Arc::new(report_key),
            first_counters: FlowCounters::ZERO,
            counters: FlowCounters::ZERO,
            report_counters: FlowCounters::ZERO,
            state: AccState::Init,
            last_updated: now,
        }
    }

    pub fn key(&self) -> &FlowKey {
        &self.key
    }

    pub fn report_key(&self) -> &Arc<FlowReportKey> {
        &self.report_key
    }

    pub fn first_counters(&self) -> FlowCounters {
        self.first_counters
    }

    pub fn counters(&self) -> FlowCounters {
        self.counters
    }

    pub fn report_counters(&self) -> FlowCounters {
        self.report_counters
    }

    pub fn state(&self) -> AccState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == AccState::WindowActive
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Applies a sample: last write wins.
    ///
    /// Returns true if this sample moved the accumulator into
    /// `WindowActive`, so the caller can account for it.
    pub(crate) fn sample(&mut self, counters: &FlowCounters, now: DateTime<Utc>) -> bool {
        self.counters = *counters;
        self.last_updated = now;
        self.activate()
    }

    pub(crate) fn activate(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = AccState::WindowActive;
        !was_active
    }

    /// Folds a child's growth since its own last close into this
    /// accumulator's running counters.
    pub(crate) fn fold(&mut self, child: &StatsAccumulator) {
        self.activate();
        self.counters
            .accumulate(&child.counters.delta_since(&child.first_counters));
        if child.last_updated > self.last_updated {
            self.last_updated = child.last_updated;
        }
    }

    /// Freezes the window's counters into `report_counters` and starts a
    /// new baseline.
    pub(crate) fn close(&mut self, report_type: ReportType) {
        self.report_counters = match report_type {
            ReportType::Absolute => self.counters,
            ReportType::Relative => {
                if self.counters.regressed_from(&self.first_counters) {
                    warn!(
                        key = ?self.report_key,
                        baseline = ?self.first_counters,
                        counters = ?self.counters,
                        "flow counters went backwards, clamping delta"
                    );
                }
                self.counters.delta_since(&self.first_counters)
            }
        };
        self.first_counters = self.counters;
        self.state = AccState::WindowReset;
    }

    /// True when the accumulator is idle and its TTL has run out.
    ///
    /// An active accumulator never expires. `ttl == None` disables expiry.
    pub(crate) fn is_expired(&self, now: DateTime<Utc>, ttl: Option<TimeDelta>) -> bool {
        match ttl {
            Some(ttl) if !self.is_active() => now.signed_duration_since(self.last_updated) >= ttl,
            _ => false,
        }
    }

    /// Window entry carrying the frozen counters and a shared handle on
    /// this accumulator's report key.
    pub(crate) fn flow_stat(&self) -> FlowStat {
        FlowStat::new(Arc::clone(&self.report_key), self.report_counters)
    }
}

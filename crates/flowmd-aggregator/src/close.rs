//! The window-close pass: freezes active accumulators, appends their
//! entries to the closing window and evicts idle ones.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use crate::accumulator::StatsAccumulator;
use crate::config::ReportType;
use crate::index::FlowIndex;
use crate::window::Window;

/// Predicate deciding whether a closed accumulator is reported.
pub type ReportFilter = Box<dyn Fn(&StatsAccumulator) -> bool + Send + Sync>;

/// Tallies of one close pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CloseOutcome {
    /// Entries appended to the window.
    pub appended: usize,
    /// Closed accumulators the report filter kept out of the window.
    pub filtered: usize,
    /// Accumulators evicted for being idle past their TTL.
    pub evicted: usize,
}

/// State shared by every index walk while one window closes.
pub(crate) struct ClosePass<'a> {
    now: DateTime<Utc>,
    ttl: Option<TimeDelta>,
    report_type: ReportType,
    report_all_samples: bool,
    filter: Option<&'a (dyn Fn(&StatsAccumulator) -> bool + Send + Sync)>,
    window: &'a mut Window,
    outcome: CloseOutcome,
}

impl<'a> ClosePass<'a> {
    pub(crate) fn new(
        now: DateTime<Utc>,
        ttl: Option<TimeDelta>,
        report_type: ReportType,
        report_all_samples: bool,
        filter: Option<&'a (dyn Fn(&StatsAccumulator) -> bool + Send + Sync)>,
        window: &'a mut Window,
    ) -> Self {
        Self {
            now,
            ttl,
            report_type,
            report_all_samples,
            filter,
            window,
            outcome: CloseOutcome::default(),
        }
    }

    pub(crate) fn report_all_samples(&self) -> bool {
        self.report_all_samples
    }

    /// Freezes an accumulator's counters for this window.
    pub(crate) fn close(&self, acc: &mut StatsAccumulator) {
        acc.close(self.report_type);
    }

    /// Appends a closed accumulator's entry, unless the report filter
    /// rejects it.
    pub(crate) fn emit(&mut self, acc: &StatsAccumulator) {
        if let Some(filter) = self.filter {
            if !filter(acc) {
                trace!(key = ?acc.report_key(), "flow filtered out of window");
                self.outcome.filtered += 1;
                return;
            }
        }
        trace!(
            key = ?acc.report_key(),
            counters = ?acc.report_counters(),
            "flow added to window"
        );
        self.window.push(acc.flow_stat());
        self.outcome.appended += 1;
    }

    pub(crate) fn close_and_emit(&mut self, acc: &mut StatsAccumulator) {
        self.close(acc);
        self.emit(acc);
    }

    /// True if `acc` is idle past its TTL.
    pub(crate) fn is_expired(&self, acc: &StatsAccumulator) -> bool {
        acc.is_expired(self.now, self.ttl)
    }

    /// Checks expiry and logs the eviction it implies.
    pub(crate) fn should_evict(&self, acc: &StatsAccumulator) -> bool {
        let expired = self.is_expired(acc);
        if expired {
            debug!(
                key = ?acc.report_key(),
                last_updated = %acc.last_updated(),
                "evicting idle accumulator"
            );
        }
        expired
    }

    pub(crate) fn count_evicted(&mut self, count: usize) {
        self.outcome.evicted += count;
    }

    /// Walks a 5-tuple index: every active flow is closed and reported on
    /// its own. Flows that were already idle when the pass started are
    /// evicted once past the TTL; a flow closed by this pass is kept.
    pub(crate) fn walk_five_tuples<K: Ord>(&mut self, index: &mut FlowIndex<K, StatsAccumulator>) {
        let evicted = index.remove_if(|_, acc| {
            if acc.is_active() {
                self.close_and_emit(acc);
                false
            } else {
                self.should_evict(acc)
            }
        });
        self.count_evicted(evicted);
    }

    pub(crate) fn finish(self) -> CloseOutcome {
        self.outcome
    }
}

//! Observation windows and the report that carries them.

use chrono::{DateTime, Utc};
use flowmd_types::{FlowCounters, FlowReportKey};
use serde::Serialize;
use std::sync::Arc;

use crate::config::NodeInfo;
use crate::error::{AggregatorError, Result};

/// One reportable flow entry of a window.
///
/// The key is shared with the accumulator that produced the entry, so it
/// stays valid even if that accumulator is evicted before the report is
/// sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowStat {
    key: Arc<FlowReportKey>,
    counters: FlowCounters,
}

impl FlowStat {
    pub fn new(key: Arc<FlowReportKey>, counters: FlowCounters) -> Self {
        Self { key, counters }
    }

    pub fn key(&self) -> &Arc<FlowReportKey> {
        &self.key
    }

    pub fn counters(&self) -> FlowCounters {
        self.counters
    }
}

/// One observation interval's worth of flow statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Window {
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    provisioned_stats: usize,
    flow_stats: Vec<FlowStat>,
}

impl Window {
    pub(crate) fn open(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            ended_at: None,
            provisioned_stats: 0,
            flow_stats: Vec::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `None` while the window is still active.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Capacity reserved when the window was closed.
    pub fn provisioned_stats(&self) -> usize {
        self.provisioned_stats
    }

    /// Entries actually written; filtering can leave this below
    /// [`provisioned_stats`](Self::provisioned_stats).
    pub fn num_stats(&self) -> usize {
        self.flow_stats.len()
    }

    pub fn flow_stats(&self) -> &[FlowStat] {
        &self.flow_stats
    }

    /// Reserves room for `count` entries up front.
    pub(crate) fn provision(&mut self, count: usize) -> Result<()> {
        self.flow_stats
            .try_reserve_exact(count)
            .map_err(|_| AggregatorError::AllocationFailure {
                what: "window flow stats",
                requested: count,
            })?;
        self.provisioned_stats = count;
        Ok(())
    }

    pub(crate) fn push(&mut self, stat: FlowStat) {
        self.flow_stats.push(stat);
    }

    pub(crate) fn seal(&mut self, now: DateTime<Utc>) {
        self.ended_at = Some(now);
    }
}

/// Ordered sequence of closed windows plus node metadata, ready to be
/// serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    node_info: NodeInfo,
    windows: Vec<Window>,
}

impl Report {
    pub(crate) fn new(node_info: NodeInfo, max_windows: usize) -> Self {
        Self {
            node_info,
            windows: Vec::with_capacity(max_windows),
        }
    }

    pub fn node_info(&self) -> &NodeInfo {
        &self.node_info
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    /// Total flow entries across all windows.
    pub fn num_flow_stats(&self) -> usize {
        self.windows.iter().map(Window::num_stats).sum()
    }

    pub(crate) fn push_window(&mut self, window: Window) {
        self.windows.push(window);
    }

    /// Drops all window contents, keeping node metadata.
    pub(crate) fn clear(&mut self) {
        self.windows.clear();
    }
}

//! Flow accumulator cache and windowed flow-statistics reporting.
//!
//! Sampled flow counters are folded into per-flow [`StatsAccumulator`]s,
//! grouped per ethernet pair, and snapshotted into time [`Window`]s. Closed
//! windows are gathered in a [`Report`] that is serialized and published on
//! demand.
//!
//! - [`Aggregator`]: owns the indices and drives the window lifecycle
//! - [`AggregatorConfig`]: node metadata, window count, TTL and report mode
//! - [`ReportSerializer`] / [`ReportTransport`]: publishing seams
//! - [`Clock`]: time source, swappable for replay and tests
//!
//! # Example
//!
//! ```ignore
//! use flowmd_aggregator::{Aggregator, AggregatorConfig, WriterTransport};
//! use std::sync::Arc;
//!
//! let mut aggr = Aggregator::new(AggregatorConfig::load()?)?;
//! aggr.set_transport(Arc::new(WriterTransport::new(std::io::stdout())));
//!
//! aggr.activate_window()?;
//! aggr.add_sample(&key, &counters)?;
//! aggr.close_active_window()?;
//! aggr.send_report("flows")?;
//! ```

pub mod accumulator;
pub mod aggregator;
pub mod clock;
mod close;
pub mod config;
pub mod error;
pub mod eth_pair;
pub mod index;
pub mod publish;
pub mod window;

pub use accumulator::{AccState, StatsAccumulator};
pub use aggregator::{Aggregator, AggregatorStats, CollectFilter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use close::ReportFilter;
pub use config::{AggregatorConfig, NodeInfo, ReportType, DEFAULT_CONFIG_PATH};
pub use error::{AggregatorError, Result};
pub use eth_pair::EthPair;
pub use index::FlowIndex;
pub use publish::{
    JsonReportSerializer, PublishError, ReportSerializer, ReportTransport, WriterTransport,
};
pub use window::{FlowStat, Report, Window};

pub use flowmd_types::{
    EthPairKey, FiveTupleKey, FlowClass, FlowCounters, FlowKey, FlowReportKey, IpAddress,
    MacAddress, VlanId,
};

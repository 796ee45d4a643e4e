//! Byte/packet counter pair.

use serde::{Deserialize, Serialize};

/// Bytes and packets observed for a flow.
///
/// Sampling sources report absolute running totals; deltas are derived
/// with [`FlowCounters::delta_since`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowCounters {
    pub bytes_count: u64,
    pub packets_count: u64,
}

impl FlowCounters {
    pub const ZERO: FlowCounters = FlowCounters {
        bytes_count: 0,
        packets_count: 0,
    };

    pub const fn new(bytes_count: u64, packets_count: u64) -> Self {
        Self {
            bytes_count,
            packets_count,
        }
    }

    /// Field-wise `self - base`, each field clamped at zero.
    pub fn delta_since(&self, base: &FlowCounters) -> FlowCounters {
        FlowCounters {
            bytes_count: self.bytes_count.saturating_sub(base.bytes_count),
            packets_count: self.packets_count.saturating_sub(base.packets_count),
        }
    }

    /// Returns true if either field is below the corresponding field of
    /// `base`, i.e. the source went backwards.
    pub fn regressed_from(&self, base: &FlowCounters) -> bool {
        self.bytes_count < base.bytes_count || self.packets_count < base.packets_count
    }

    /// Field-wise saturating add.
    pub fn accumulate(&mut self, delta: &FlowCounters) {
        self.bytes_count = self.bytes_count.saturating_add(delta.bytes_count);
        self.packets_count = self.packets_count.saturating_add(delta.packets_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delta_is_field_wise() {
        let base = FlowCounters::new(100, 10);
        let now = FlowCounters::new(250, 12);
        assert_eq!(now.delta_since(&base), FlowCounters::new(150, 2));
    }

    #[test]
    fn test_delta_clamps_each_field() {
        let base = FlowCounters::new(100, 10);
        let now = FlowCounters::new(50, 20);
        assert!(now.regressed_from(&base));
        assert_eq!(now.delta_since(&base), FlowCounters::new(0, 10));
    }

    #[test]
    fn test_accumulate() {
        let mut total = FlowCounters::new(1, 1);
        total.accumulate(&FlowCounters::new(9, 2));
        assert_eq!(total, FlowCounters::new(10, 3));

        let mut full = FlowCounters::new(u64::MAX, 0);
        full.accumulate(&FlowCounters::new(1, 0));
        assert_eq!(full.bytes_count, u64::MAX);
    }
}

//! Smurfing detection.
//!
//! Fan-in: many distinct senders paying one account inside a short window.
//! Fan-out: one account paying many distinct receivers inside the window.
//! Both are evaluated on the busiest window of each account, so activity
//! spread over months does not trip the threshold.

use crate::types::{FanHub, SmurfingResult};
use flowtrace_core::config::SmurfingConfig;
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::traits::Detector;
use flowtrace_graph::temporal::{FlowDirection, TemporalIndex};

// ============================================================================
// Smurfing Detector
// ============================================================================

/// Fan-in / fan-out detector.
#[derive(Debug, Clone)]
pub struct SmurfingDetector {
    metadata: DetectorMetadata,
}

impl Default for SmurfingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SmurfingDetector {
    /// Create a new smurfing detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("compliance/smurfing", DetectorFamily::Temporal)
                .with_description("Fan-in and fan-out stars inside a sliding time window")
                .with_rings(),
        }
    }

    /// Detect fan-in and fan-out hubs.
    pub fn compute(index: &TemporalIndex, config: &SmurfingConfig) -> SmurfingResult {
        let window = config.window_seconds();
        let mut result = SmurfingResult::default();

        for node in 0..index.len() {
            if let Some(hub) = Self::hub(index, node, FlowDirection::Inbound, window, config) {
                result.fan_in.push(hub);
            }
            if let Some(hub) = Self::hub(index, node, FlowDirection::Outbound, window, config) {
                result.fan_out.push(hub);
            }
        }

        tracing::debug!(
            fan_in = result.fan_in.len(),
            fan_out = result.fan_out.len(),
            window_hours = config.window_hours,
            "smurfing detection complete"
        );

        result
    }

    fn hub(
        index: &TemporalIndex,
        node: usize,
        direction: FlowDirection,
        window: i64,
        config: &SmurfingConfig,
    ) -> Option<FanHub> {
        // Cheap reject before the sweep.
        if index.events(node, direction).len() < config.min_counterparties {
            return None;
        }
        let peak = index.peak_distinct_counterparties(node, direction, window)?;
        (peak.distinct >= config.min_counterparties).then_some(FanHub {
            node,
            direction,
            peak,
        })
    }
}

impl Detector for SmurfingDetector {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrace_core::pattern::RingPattern;
    use flowtrace_graph::builder::build_graph;
    use flowtrace_graph::types::Transaction;

    const HOUR: i64 = 3600;

    /// `n` senders pay HUB, spread evenly over `span_hours`.
    fn fan_in(n: usize, span_hours: i64) -> Vec<Transaction> {
        (0..n)
            .map(|i| {
                let ts = if n > 1 {
                    span_hours * HOUR * i as i64 / (n as i64 - 1)
                } else {
                    0
                };
                Transaction::new(format!("T{i}"), format!("S{i}"), "HUB", 500.0, ts)
            })
            .collect()
    }

    #[test]
    fn test_ten_senders_in_window_flag_hub() {
        let (graph, index) = build_graph(&fan_in(10, 70)).unwrap();
        let result = SmurfingDetector::compute(&index, &SmurfingConfig::default());

        assert_eq!(result.fan_in.len(), 1);
        let hub = &result.fan_in[0];
        assert_eq!(graph.account_id(hub.node), "HUB");
        assert_eq!(hub.peak.distinct, 10);
        assert!(result.fan_out.is_empty());

        let candidate = hub.candidate();
        assert_eq!(candidate.pattern, RingPattern::FanIn);
        assert_eq!(candidate.members.len(), 11);
        assert_eq!(graph.account_id(candidate.members[0]), "HUB");
    }

    #[test]
    fn test_nine_senders_do_not_flag() {
        let (_, index) = build_graph(&fan_in(9, 70)).unwrap();
        let result = SmurfingDetector::compute(&index, &SmurfingConfig::default());
        assert!(result.fan_in.is_empty());
    }

    #[test]
    fn test_spread_out_senders_do_not_flag() {
        // Ten senders over 30 days never put ten inside one 72h window.
        let (_, index) = build_graph(&fan_in(10, 720)).unwrap();
        let result = SmurfingDetector::compute(&index, &SmurfingConfig::default());
        assert!(result.fan_in.is_empty());
    }

    #[test]
    fn test_fan_out_and_fan_in_coexist() {
        let mut txs = fan_in(10, 10);
        for i in 0..12 {
            txs.push(Transaction::new(
                format!("O{i}"),
                "HUB",
                format!("R{i}"),
                400.0,
                20 * HOUR + i as i64 * HOUR,
            ));
        }
        let (graph, index) = build_graph(&txs).unwrap();
        let result = SmurfingDetector::compute(&index, &SmurfingConfig::default());

        let hub = graph.node_index("HUB").unwrap();
        assert_eq!(result.fan_in.len(), 1);
        assert_eq!(result.fan_out.len(), 1);
        assert_eq!(result.fan_in[0].node, hub);
        assert_eq!(result.fan_out[0].node, hub);
        assert_eq!(result.fan_out[0].peak.distinct, 12);
    }

    #[test]
    fn test_custom_threshold() {
        let (_, index) = build_graph(&fan_in(5, 10)).unwrap();
        let config = SmurfingConfig {
            min_counterparties: 5,
            ..Default::default()
        };
        assert_eq!(SmurfingDetector::compute(&index, &config).fan_in.len(), 1);
    }
}

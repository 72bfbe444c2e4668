//! Amount distribution analysis.
//!
//! Two dataset-level checks on transaction amounts:
//! - Benford first-digit conformance
//! - Structuring, i.e. amounts kept just under the reporting threshold
//!
//! Neither check tags accounts. Accounts that receive bursts of
//! near-threshold amounts, or bursts of inbound transactions of any size,
//! are listed as context for the reviewer.

use crate::types::{
    BenfordReport, BenfordStatus, DistributionResult, StructuringAccount, StructuringReport,
    StructuringStatus, VelocityAccount,
};
use flowtrace_core::config::DistributionConfig;
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::traits::Detector;
use flowtrace_graph::temporal::{FlowDirection, TemporalIndex};

/// Expected share of leading digit `d` under Benford's law.
#[must_use]
pub fn benford_expected(digit: u32) -> f64 {
    (1.0 + 1.0 / f64::from(digit)).log10()
}

/// Leading decimal digit of `amount`, for amounts of at least 1.
#[must_use]
pub fn leading_digit(amount: f64) -> Option<u32> {
    if !amount.is_finite() || amount < 1.0 {
        return None;
    }
    format!("{amount:e}").chars().next()?.to_digit(10)
}

// ============================================================================
// Distribution Analyzer
// ============================================================================

/// Benford and structuring analyzer.
#[derive(Debug, Clone)]
pub struct DistributionAnalyzer {
    metadata: DetectorMetadata,
}

impl Default for DistributionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionAnalyzer {
    /// Create a new distribution analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("compliance/distribution", DetectorFamily::Statistical)
                .with_description("Benford first-digit test and near-threshold structuring"),
        }
    }

    /// Run both checks over every indexed transaction.
    pub fn compute(index: &TemporalIndex, config: &DistributionConfig) -> DistributionResult {
        // Each transaction appears exactly once as an outbound event.
        let amounts: Vec<f64> = (0..index.len())
            .flat_map(|v| index.events(v, FlowDirection::Outbound))
            .map(|e| e.amount)
            .collect();

        let benford = Self::benford(&amounts, config);
        let structuring = Self::structuring(index, &amounts, config);
        let velocity = Self::velocity(index, config);

        tracing::debug!(
            benford = %benford.status,
            deviation = benford.deviation,
            structuring = %structuring.status,
            near_threshold = structuring.near_threshold,
            velocity_accounts = velocity.len(),
            "distribution analysis complete"
        );

        DistributionResult {
            benford,
            structuring,
            velocity,
        }
    }

    /// Benford first-digit test.
    pub fn benford(amounts: &[f64], config: &DistributionConfig) -> BenfordReport {
        let mut counts = [0usize; 9];
        for digit in amounts.iter().filter_map(|&a| leading_digit(a)) {
            counts[(digit - 1) as usize] += 1;
        }
        let samples: usize = counts.iter().sum();

        let mut observed = [0.0; 9];
        let mut deviation = 0.0;
        if samples > 0 {
            for (d, &count) in counts.iter().enumerate() {
                observed[d] = count as f64 / samples as f64;
                let expected = benford_expected(d as u32 + 1);
                deviation += (observed[d] - expected).powi(2) / expected;
            }
        }

        let status = if samples < config.benford_min_samples {
            BenfordStatus::InsufficientData
        } else if deviation > config.benford_suspicious {
            BenfordStatus::Suspicious
        } else if deviation > config.benford_warning {
            BenfordStatus::Warning
        } else {
            BenfordStatus::Normal
        };

        BenfordReport {
            status,
            deviation,
            samples,
            observed,
        }
    }

    /// Near-threshold share plus per-account inbound bursts.
    pub fn structuring(
        index: &TemporalIndex,
        amounts: &[f64],
        config: &DistributionConfig,
    ) -> StructuringReport {
        let total = amounts.len();
        let near_threshold = amounts
            .iter()
            .filter(|&&a| config.is_near_threshold(a))
            .count();
        let fraction = if total > 0 {
            near_threshold as f64 / total as f64
        } else {
            0.0
        };
        let status = if total > 0 && fraction >= config.elevated_fraction {
            StructuringStatus::Elevated
        } else {
            StructuringStatus::Normal
        };

        let window = config.account_window_seconds();
        let accounts = (0..index.len())
            .filter_map(|node| {
                let peak_hits = index.peak_count_where(node, FlowDirection::Inbound, window, |e| {
                    config.is_near_threshold(e.amount)
                });
                (peak_hits >= config.account_min_hits).then_some(StructuringAccount { node, peak_hits })
            })
            .collect();

        StructuringReport {
            status,
            near_threshold,
            total,
            fraction,
            accounts,
        }
    }

    /// Accounts whose busiest inbound window holds at least
    /// `velocity_min_events` transactions.
    pub fn velocity(index: &TemporalIndex, config: &DistributionConfig) -> Vec<VelocityAccount> {
        let window = config.velocity_window_seconds();
        (0..index.len())
            .filter(|&node| index.events(node, FlowDirection::Inbound).len() >= config.velocity_min_events)
            .filter_map(|node| {
                let peak_events = index.peak_count_where(node, FlowDirection::Inbound, window, |_| true);
                (peak_events >= config.velocity_min_events).then_some(VelocityAccount { node, peak_events })
            })
            .collect()
    }
}

impl Detector for DistributionAnalyzer {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrace_graph::builder::build_graph;
    use flowtrace_graph::types::Transaction;

    #[test]
    fn test_leading_digit() {
        assert_eq!(leading_digit(1.0), Some(1));
        assert_eq!(leading_digit(9_999.99), Some(9));
        assert_eq!(leading_digit(450.0), Some(4));
        assert_eq!(leading_digit(0.5), None);
        assert_eq!(leading_digit(f64::NAN), None);
    }

    #[test]
    fn test_expected_shares_sum_to_one() {
        let total: f64 = (1..=9).map(benford_expected).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((benford_expected(1) - 0.30103).abs() < 1e-5);
    }

    #[test]
    fn test_benford_conforming_amounts() {
        // Log-uniform over three decades follows Benford closely.
        let amounts: Vec<f64> = (0..900).map(|i| 10f64.powf(i as f64 / 300.0)).collect();
        let report = DistributionAnalyzer::benford(&amounts, &DistributionConfig::default());
        assert_eq!(report.samples, 900);
        assert_eq!(report.status, BenfordStatus::Normal);
        assert!(report.deviation < 0.02);
    }

    #[test]
    fn test_benford_uniform_nines_are_suspicious() {
        let amounts = vec![9_500.0; 60];
        let report = DistributionAnalyzer::benford(&amounts, &DistributionConfig::default());
        assert_eq!(report.status, BenfordStatus::Suspicious);
        assert!((report.observed[8] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_benford_insufficient_data() {
        let amounts = vec![123.0; 49];
        let report = DistributionAnalyzer::benford(&amounts, &DistributionConfig::default());
        assert_eq!(report.status, BenfordStatus::InsufficientData);
        assert_eq!(report.samples, 49);
    }

    #[test]
    fn test_structuring_fraction_and_accounts() {
        let mut txs = Vec::new();
        // Three deposits of 9 500 into DROP within a few hours.
        for i in 0..3 {
            txs.push(Transaction::new(
                format!("S{i}"),
                format!("P{i}"),
                "DROP",
                9_500.0,
                i as i64 * 3600,
            ));
        }
        for i in 0..7 {
            txs.push(Transaction::new(format!("N{i}"), "A", format!("B{i}"), 120.0, i as i64));
        }
        let (graph, index) = build_graph(&txs).unwrap();
        let result = DistributionAnalyzer::compute(&index, &DistributionConfig::default());

        let report = &result.structuring;
        assert_eq!(report.total, 10);
        assert_eq!(report.near_threshold, 3);
        assert!((report.fraction - 0.3).abs() < 1e-12);
        assert_eq!(report.status, StructuringStatus::Elevated);
        assert_eq!(report.accounts.len(), 1);
        assert_eq!(graph.account_id(report.accounts[0].node), "DROP");
        assert_eq!(report.accounts[0].peak_hits, 3);
    }

    #[test]
    fn test_threshold_itself_is_outside_band() {
        let config = DistributionConfig::default();
        assert!(config.is_near_threshold(8_000.0));
        assert!(config.is_near_threshold(9_999.0));
        assert!(!config.is_near_threshold(10_000.0));
        assert!(!config.is_near_threshold(7_999.0));
    }

    #[test]
    fn test_spread_deposits_are_not_listed() {
        let txs: Vec<Transaction> = (0..3)
            .map(|i| {
                Transaction::new(format!("S{i}"), format!("P{i}"), "DROP", 9_000.0, i as i64 * 86_400)
            })
            .collect();
        let (_, index) = build_graph(&txs).unwrap();
        let result = DistributionAnalyzer::compute(&index, &DistributionConfig::default());
        assert!(result.structuring.accounts.is_empty());
        assert_eq!(result.benford.status, BenfordStatus::InsufficientData);
    }

    #[test]
    fn test_velocity_burst_is_listed() {
        // 25 deposits two minutes apart, then 25 spread a day apart.
        let mut txs: Vec<Transaction> = (0..25)
            .map(|i| Transaction::new(format!("B{i}"), format!("P{i}"), "BURST", 50.0, i as i64 * 120))
            .collect();
        txs.extend((0..25).map(|i| {
            Transaction::new(format!("C{i}"), format!("Q{i}"), "CALM", 50.0, i as i64 * 86_400)
        }));
        let (graph, index) = build_graph(&txs).unwrap();
        let result = DistributionAnalyzer::compute(&index, &DistributionConfig::default());

        assert_eq!(result.velocity.len(), 1);
        assert_eq!(graph.account_id(result.velocity[0].node), "BURST");
        // All 25 deposits fall inside one hour.
        assert_eq!(result.velocity[0].peak_events, 25);
    }

    #[test]
    fn test_twenty_in_an_hour_is_not_a_burst() {
        let txs: Vec<Transaction> = (0..20)
            .map(|i| Transaction::new(format!("B{i}"), format!("P{i}"), "SHOP", 50.0, i as i64 * 60))
            .collect();
        let (_, index) = build_graph(&txs).unwrap();
        assert!(DistributionAnalyzer::velocity(&index, &DistributionConfig::default()).is_empty());
    }
}

//! Analysis report: the JSON contract returned to callers.

use flowtrace_compliance::types::{BenfordStatus, ScoringResult, StructuringStatus};
use flowtrace_core::error::Result;
use flowtrace_core::notes::ProcessingNote;
use flowtrace_core::pattern::RingPattern;
use flowtrace_graph::types::TransactionGraph;
use serde::{Deserialize, Serialize};

/// `ring_id` of an account outside every ring.
pub const NO_RING: &str = "NONE";

/// Score at or above which a flagged account counts as high risk.
pub const HIGH_RISK_SCORE: f64 = 70.0;

/// Round to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Account flagged by the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    /// Account id.
    pub account_id: String,
    /// Score in `[0, 100]`, one decimal.
    pub suspicion_score: f64,
    /// Pattern tag names.
    pub detected_patterns: Vec<String>,
    /// Primary ring id, or [`NO_RING`].
    pub ring_id: String,
}

/// Emitted fraud ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingReport {
    /// `RING_001`, `RING_002`, ...
    pub ring_id: String,
    /// Member account ids in detection order.
    pub member_accounts: Vec<String>,
    /// Ring pattern.
    pub pattern_type: RingPattern,
    /// Aggregate member risk, one decimal.
    pub risk_score: f64,
}

/// Account listed as context by a burst check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstAccount {
    /// Account id.
    pub account_id: String,
    /// Matching inbound transactions in the busiest window.
    pub peak_hits: usize,
}

/// Run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Accounts in the graph.
    pub total_accounts_analyzed: usize,
    /// Accounts in `suspicious_accounts`.
    pub suspicious_accounts_flagged: usize,
    /// Rings in `fraud_rings`.
    pub fraud_rings_detected: usize,
    /// Wall time of the run.
    pub processing_time_seconds: f64,
    /// Input rows, self-loops included.
    pub total_transactions: usize,
    /// Benford verdict.
    pub benford_status: BenfordStatus,
    /// Structuring verdict.
    pub structuring_status: StructuringStatus,
    /// Sum of input amounts, two decimals.
    pub total_volume: f64,
    /// Mean input amount, two decimals.
    pub avg_transaction_size: f64,
    /// Directed density of the account graph.
    pub graph_density: f64,
    /// Flagged accounts scoring at least [`HIGH_RISK_SCORE`].
    pub high_risk_count: usize,
    /// Mean score of flagged accounts, two decimals.
    pub avg_risk_score: f64,
    /// Benford deviation behind `benford_status`.
    pub benford_deviation: f64,
    /// Share of transactions in the near-threshold band.
    pub structuring_fraction: f64,
    /// Accounts receiving near-threshold bursts.
    pub structuring_accounts: Vec<BurstAccount>,
    /// Accounts receiving inbound velocity bursts.
    pub velocity_accounts: Vec<BurstAccount>,
    /// Guard and convergence notes.
    pub processing_notes: Vec<ProcessingNote>,
}

/// Complete analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Flagged accounts, score descending then account id ascending.
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    /// Rings in assembly order.
    pub fraud_rings: Vec<RingReport>,
    /// Summary.
    pub summary: AnalysisSummary,
}

impl AnalysisReport {
    /// Resolve node indices of a scoring result to account ids.
    pub fn assemble(graph: &TransactionGraph, scoring: &ScoringResult, summary: AnalysisSummary) -> Self {
        let suspicious_accounts = scoring
            .accounts
            .iter()
            .map(|a| SuspiciousAccount {
                account_id: graph.account_id(a.node).to_string(),
                suspicion_score: a.score,
                detected_patterns: a.patterns.names(),
                ring_id: a
                    .ring
                    .and_then(|r| scoring.rings.get(r))
                    .map_or_else(|| NO_RING.to_string(), |r| r.ring_id.clone()),
            })
            .collect();

        let fraud_rings = scoring
            .rings
            .iter()
            .map(|r| RingReport {
                ring_id: r.ring_id.clone(),
                member_accounts: r
                    .members
                    .iter()
                    .map(|&v| graph.account_id(v).to_string())
                    .collect(),
                pattern_type: r.pattern,
                risk_score: r.risk_score,
            })
            .collect();

        Self {
            suspicious_accounts,
            fraud_rings,
            summary,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Flagged account by id.
    #[must_use]
    pub fn account(&self, account_id: &str) -> Option<&SuspiciousAccount> {
        self.suspicious_accounts
            .iter()
            .find(|a| a.account_id == account_id)
    }

    /// Ring by id.
    #[must_use]
    pub fn ring(&self, ring_id: &str) -> Option<&RingReport> {
        self.fraud_rings.iter().find(|r| r.ring_id == ring_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> AnalysisSummary {
        AnalysisSummary {
            total_accounts_analyzed: 3,
            suspicious_accounts_flagged: 1,
            fraud_rings_detected: 0,
            processing_time_seconds: 0.01,
            total_transactions: 3,
            benford_status: BenfordStatus::InsufficientData,
            structuring_status: StructuringStatus::Normal,
            total_volume: 1_500.0,
            avg_transaction_size: 500.0,
            graph_density: 0.5,
            high_risk_count: 0,
            avg_risk_score: 40.0,
            benford_deviation: 0.0,
            structuring_fraction: 0.0,
            structuring_accounts: Vec::new(),
            velocity_accounts: vec![BurstAccount {
                account_id: "ACC_1".to_string(),
                peak_hits: 25,
            }],
            processing_notes: Vec::new(),
        }
    }

    #[test]
    fn test_report_json_shape() {
        let report = AnalysisReport {
            suspicious_accounts: vec![SuspiciousAccount {
                account_id: "ACC_1".to_string(),
                suspicion_score: 40.0,
                detected_patterns: vec!["shell_account".to_string()],
                ring_id: NO_RING.to_string(),
            }],
            fraud_rings: vec![RingReport {
                ring_id: "RING_001".to_string(),
                member_accounts: vec!["A".into(), "B".into(), "C".into()],
                pattern_type: RingPattern::ShellChain,
                risk_score: 40.0,
            }],
            summary: summary(),
        };

        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
        assert_eq!(json["suspicious_accounts"][0]["ring_id"], "NONE");
        assert_eq!(json["fraud_rings"][0]["pattern_type"], "shell_chain");
        assert_eq!(json["summary"]["benford_status"], "insufficient_data");
        assert_eq!(json["summary"]["structuring_status"], "normal");
        assert!(json["summary"]["processing_notes"].as_array().unwrap().is_empty());
        assert_eq!(json["summary"]["velocity_accounts"][0]["account_id"], "ACC_1");
        assert_eq!(json["summary"]["velocity_accounts"][0]["peak_hits"], 25);

        let back: AnalysisReport = serde_json::from_str(&report.to_json(true).unwrap()).unwrap();
        assert_eq!(back, report);
        assert!(back.account("ACC_1").is_some());
        assert!(back.ring("RING_002").is_none());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1_234.567), 1_234.57);
        assert_eq!(round2(0.004), 0.0);
    }
}

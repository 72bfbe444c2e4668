//! Compliance types and data structures.
//!
//! Node ids are indices into the [`TransactionGraph`] the detectors ran on.
//!
//! [`TransactionGraph`]: flowtrace_graph::types::TransactionGraph

use flowtrace_core::pattern::{PatternSet, RingPattern};
use flowtrace_graph::temporal::{FlowDirection, WindowPeak};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Ring Candidates
// ============================================================================

/// Ring proposed by a detector, before assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingCandidate {
    /// Ring pattern.
    pub pattern: RingPattern,
    /// Members in detection order.
    pub members: Vec<usize>,
    /// Hub of a fan pattern.
    pub hub: Option<usize>,
}

impl RingCandidate {
    /// Candidate without a hub.
    #[must_use]
    pub fn new(pattern: RingPattern, members: Vec<usize>) -> Self {
        Self {
            pattern,
            members,
            hub: None,
        }
    }

    /// Fan candidate: hub first, then counterparties.
    #[must_use]
    pub fn fan(pattern: RingPattern, hub: usize, counterparties: &[usize]) -> Self {
        let mut members = Vec::with_capacity(counterparties.len() + 1);
        members.push(hub);
        members.extend(counterparties.iter().copied().filter(|&c| c != hub));
        Self {
            pattern,
            members,
            hub: Some(hub),
        }
    }
}

// ============================================================================
// Smurfing Types
// ============================================================================

/// Account that reached the fan threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanHub {
    /// Hub node.
    pub node: usize,
    /// Inbound for fan-in, outbound for fan-out.
    pub direction: FlowDirection,
    /// Busiest window.
    pub peak: WindowPeak,
}

impl FanHub {
    /// Ring pattern of this hub.
    #[must_use]
    pub fn pattern(&self) -> RingPattern {
        match self.direction {
            FlowDirection::Inbound => RingPattern::FanIn,
            FlowDirection::Outbound => RingPattern::FanOut,
        }
    }

    /// Ring candidate: hub, then the peak-window counterparties.
    #[must_use]
    pub fn candidate(&self) -> RingCandidate {
        RingCandidate::fan(self.pattern(), self.node, &self.peak.counterparties)
    }
}

/// Fan-in / fan-out findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmurfingResult {
    /// Fan-in hubs in node order.
    pub fan_in: Vec<FanHub>,
    /// Fan-out hubs in node order.
    pub fan_out: Vec<FanHub>,
}

// ============================================================================
// Shell Types
// ============================================================================

/// Shell account and chain findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellResult {
    /// Shell accounts in node order.
    pub shell_nodes: Vec<usize>,
    /// Chains: source, shell intermediates, sink.
    pub chains: Vec<Vec<usize>>,
    /// Chains merged on shared intermediates, members in discovery order.
    pub rings: Vec<Vec<usize>>,
}

// ============================================================================
// Distribution Types
// ============================================================================

/// Benford conformance verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenfordStatus {
    /// Close to the expected distribution.
    Normal,
    /// Noticeable deviation.
    Warning,
    /// Strong deviation.
    Suspicious,
    /// Too few samples to judge.
    InsufficientData,
}

impl BenfordStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BenfordStatus::Normal => "normal",
            BenfordStatus::Warning => "warning",
            BenfordStatus::Suspicious => "suspicious",
            BenfordStatus::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for BenfordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset-level structuring verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuringStatus {
    /// Near-threshold share below the alert level.
    Normal,
    /// Near-threshold share at or above the alert level.
    Elevated,
}

impl StructuringStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StructuringStatus::Normal => "normal",
            StructuringStatus::Elevated => "elevated",
        }
    }
}

impl fmt::Display for StructuringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Benford first-digit test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenfordReport {
    /// Verdict.
    pub status: BenfordStatus,
    /// `Σ (observed - expected)² / expected`.
    pub deviation: f64,
    /// Amounts with a leading digit (amount >= 1).
    pub samples: usize,
    /// Observed share of leading digits 1-9.
    pub observed: [f64; 9],
}

/// Account receiving a burst of near-threshold amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuringAccount {
    /// Account node.
    pub node: usize,
    /// Near-threshold inbound transactions in the busiest window.
    pub peak_hits: usize,
}

/// Structuring test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuringReport {
    /// Verdict.
    pub status: StructuringStatus,
    /// Transactions in the near-threshold band.
    pub near_threshold: usize,
    /// Transactions examined.
    pub total: usize,
    /// `near_threshold / total`.
    pub fraction: f64,
    /// Per-account bursts, in node order.
    pub accounts: Vec<StructuringAccount>,
}

/// Account receiving a burst of inbound transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityAccount {
    /// Account node.
    pub node: usize,
    /// Inbound transactions in the busiest velocity window.
    pub peak_events: usize,
}

/// Distribution analyzer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    /// Benford test.
    pub benford: BenfordReport,
    /// Structuring test.
    pub structuring: StructuringReport,
    /// Inbound velocity bursts, in node order.
    pub velocity: Vec<VelocityAccount>,
}

// ============================================================================
// Scoring Types
// ============================================================================

/// Fused per-account verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredAccount {
    /// Account node.
    pub node: usize,
    /// Tags from all detectors.
    pub patterns: PatternSet,
    /// Final score, one decimal.
    pub score: f64,
    /// Index of the primary ring in `ScoringResult::rings`.
    pub ring: Option<usize>,
}

/// Emitted fraud ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRing {
    /// `RING_001`, `RING_002`, ...
    pub ring_id: String,
    /// Pattern.
    pub pattern: RingPattern,
    /// Members in detection order.
    pub members: Vec<usize>,
    /// `max_share × max + (1 - max_share) × mean` of member scores.
    pub risk_score: f64,
}

/// Aggregator output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoringResult {
    /// Reported accounts, score descending then account id ascending.
    pub accounts: Vec<ScoredAccount>,
    /// Emitted rings in assembly order.
    pub rings: Vec<FraudRing>,
    /// Tag set of every node.
    pub node_patterns: Vec<PatternSet>,
    /// Final score of every node.
    pub node_scores: Vec<f64>,
    /// Primary ring of every node.
    pub node_rings: Vec<Option<usize>>,
    /// Nodes the dampener matched, in node order.
    pub dampened: Vec<usize>,
}

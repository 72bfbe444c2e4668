//! Per-detector configuration sections.
//!
//! Every threshold the detectors use lives here. Defaults reproduce the
//! standard rule set: 3-5 hop cycles, a 72 hour / 10 counterparty smurfing
//! window, 1-3 transaction shell relays and the 10 000 reporting threshold.

use crate::pattern::PatternTag;
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: i64 = 3600;

/// Cycle detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum cycle length in edges.
    pub min_length: usize,
    /// Maximum cycle length in edges.
    pub max_length: usize,
    /// Largest SCC searched exhaustively.
    pub max_scc_size: usize,
    /// Cap on cycles enumerated inside one SCC.
    pub max_cycles_per_scc: usize,
    /// Search steps allowed per node when an SCC exceeds `max_scc_size`.
    pub fallback_step_budget: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 5,
            max_scc_size: 100,
            max_cycles_per_scc: 500,
            fallback_step_budget: 20_000,
        }
    }
}

/// Fan-in / fan-out detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmurfingConfig {
    /// Window length in hours.
    pub window_hours: u32,
    /// Distinct counterparties inside one window that make a hub.
    pub min_counterparties: usize,
}

impl Default for SmurfingConfig {
    fn default() -> Self {
        Self {
            window_hours: 72,
            min_counterparties: 10,
        }
    }
}

impl SmurfingConfig {
    /// Window length in seconds.
    #[must_use]
    pub fn window_seconds(&self) -> i64 {
        i64::from(self.window_hours) * SECONDS_PER_HOUR
    }
}

/// Shell account and chain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Lowest transaction count of a shell account.
    pub min_tx_count: u32,
    /// Highest transaction count of a shell account.
    pub max_tx_count: u32,
    /// Lowest outbound/inbound ratio.
    pub min_pass_through: f64,
    /// Highest outbound/inbound ratio.
    pub max_pass_through: f64,
    /// Inbound volume a shell account must exceed. Smaller relays are ignored.
    pub min_inbound_volume: f64,
    /// Hops a chain needs before it forms a ring.
    pub min_chain_hops: usize,
    /// Depth bound of the chain traversal.
    pub max_depth: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            min_tx_count: 1,
            max_tx_count: 3,
            min_pass_through: 0.90,
            max_pass_through: 1.10,
            min_inbound_volume: 1_000.0,
            min_chain_hops: 3,
            max_depth: 8,
        }
    }
}

/// What an aggregated edge weighs in the weighted graph algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeWeighting {
    /// Total amount moved along the edge.
    #[default]
    Volume,
    /// Number of transactions along the edge.
    Count,
}

/// PageRank settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceConfig {
    /// Damping factor.
    pub damping: f64,
    /// Maximum power iterations.
    pub max_iterations: usize,
    /// L1 convergence tolerance.
    pub tolerance: f64,
    /// Edge weighting.
    pub weighting: EdgeWeighting,
    /// Score percentile (0-1) an account must reach to be tagged `source`.
    pub source_percentile: f64,
    /// Multiple of the uniform score `1/N` a source must also reach.
    pub min_lift: f64,
    /// Graphs smaller than this never produce sources.
    pub min_graph_size: usize,
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 200,
            tolerance: 1e-9,
            weighting: EdgeWeighting::Volume,
            source_percentile: 0.99,
            min_lift: 5.0,
            min_graph_size: 10,
        }
    }
}

/// Louvain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Edge weighting of the undirected projection.
    pub weighting: EdgeWeighting,
    /// Maximum aggregation levels.
    pub max_levels: usize,
    /// Maximum local-moving sweeps per level.
    pub max_sweeps: usize,
    /// Smallest modularity gain that counts as an improvement.
    pub min_gain: f64,
    /// Above this node count, fall back to weakly connected components.
    pub max_nodes: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            weighting: EdgeWeighting::Volume,
            max_levels: 10,
            max_sweeps: 100,
            min_gain: 1e-7,
            max_nodes: 50_000,
        }
    }
}

/// Benford and structuring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Fewer leading digits than this yields `insufficient_data`.
    pub benford_min_samples: usize,
    /// Deviation above which the distribution is `warning`.
    pub benford_warning: f64,
    /// Deviation above which the distribution is `suspicious`.
    pub benford_suspicious: f64,
    /// Regulatory reporting threshold.
    pub reporting_threshold: f64,
    /// Lower bound of the near-threshold band.
    pub near_threshold_floor: f64,
    /// Share of near-threshold transactions that marks the dataset elevated.
    pub elevated_fraction: f64,
    /// Window for the per-account structuring check, in hours.
    pub account_window_hours: u32,
    /// Near-threshold inbound transactions in one window that list an account.
    pub account_min_hits: usize,
    /// Window for the inbound velocity check, in minutes.
    pub velocity_window_minutes: u32,
    /// Inbound transactions in one velocity window that list an account.
    pub velocity_min_events: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            benford_min_samples: 50,
            benford_warning: 0.02,
            benford_suspicious: 0.05,
            reporting_threshold: 10_000.0,
            near_threshold_floor: 8_000.0,
            elevated_fraction: 0.10,
            account_window_hours: 24,
            account_min_hits: 3,
            velocity_window_minutes: 60,
            velocity_min_events: 21,
        }
    }
}

impl DistributionConfig {
    /// Per-account window in seconds.
    #[must_use]
    pub fn account_window_seconds(&self) -> i64 {
        i64::from(self.account_window_hours) * SECONDS_PER_HOUR
    }

    /// Velocity window in seconds.
    #[must_use]
    pub fn velocity_window_seconds(&self) -> i64 {
        i64::from(self.velocity_window_minutes) * 60
    }

    /// Whether `amount` falls in `[near_threshold_floor, reporting_threshold)`.
    #[must_use]
    pub fn is_near_threshold(&self, amount: f64) -> bool {
        amount >= self.near_threshold_floor && amount < self.reporting_threshold
    }
}

/// Score contribution of each pattern tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternWeights {
    /// `cycle`
    pub cycle: f64,
    /// `fan_in_aggregator`
    pub fan_in_aggregator: f64,
    /// `fan_out_source`
    pub fan_out_source: f64,
    /// `shell_account`
    pub shell_account: f64,
    /// `source`
    pub source: f64,
    /// `fan_in_contributor`
    pub fan_in_contributor: f64,
    /// `fan_out_recipient`
    pub fan_out_recipient: f64,
}

impl Default for PatternWeights {
    fn default() -> Self {
        Self {
            cycle: 60.0,
            fan_in_aggregator: 40.0,
            fan_out_source: 40.0,
            shell_account: 40.0,
            source: 20.0,
            fan_in_contributor: 10.0,
            fan_out_recipient: 10.0,
        }
    }
}

impl PatternWeights {
    /// Weight of a single tag.
    #[must_use]
    pub fn weight(&self, tag: PatternTag) -> f64 {
        match tag {
            PatternTag::Cycle => self.cycle,
            PatternTag::FanInAggregator => self.fan_in_aggregator,
            PatternTag::FanOutSource => self.fan_out_source,
            PatternTag::ShellAccount => self.shell_account,
            PatternTag::Source => self.source,
            PatternTag::FanInContributor => self.fan_in_contributor,
            PatternTag::FanOutRecipient => self.fan_out_recipient,
        }
    }
}

/// Score fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-tag weights.
    pub weights: PatternWeights,
    /// Score ceiling.
    pub max_score: f64,
    /// Share of the member maximum in a ring's risk; the rest is the mean.
    pub ring_max_share: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: PatternWeights::default(),
            max_score: 100.0,
            ring_max_share: 0.7,
        }
    }
}

/// False-positive dampener for legitimate high-volume accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampenerConfig {
    /// Turn the dampener on or off.
    pub enabled: bool,
    /// Minimum transaction count.
    pub min_tx_count: u32,
    /// Minimum distinct counterparties (senders plus receivers).
    pub min_counterparties: usize,
    /// Retention at or above which the account looks like a merchant.
    pub merchant_min_retention: f64,
    /// Maximum distinct funding senders of a payroll-shaped account.
    pub payroll_max_funders: usize,
    /// Maximum coefficient of variation of payroll outbound amounts.
    pub payroll_max_cv: f64,
    /// Multiplier applied to a dampened account's score. 0 suppresses it.
    pub factor: f64,
}

impl Default for DampenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_tx_count: 25,
            min_counterparties: 20,
            merchant_min_retention: 0.70,
            payroll_max_funders: 3,
            payroll_max_cv: 0.35,
            factor: 0.0,
        }
    }
}

/// Visualization export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Node cap of the exported graph.
    pub max_nodes: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self { max_nodes: 5_000 }
    }
}

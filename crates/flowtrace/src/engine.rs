//! Analysis engine.
//!
//! One call runs the whole pipeline: validation, graph construction, the
//! detectors, score aggregation and report assembly. Nothing is kept
//! between calls.

use crate::report::{round2, AnalysisReport, AnalysisSummary, BurstAccount, HIGH_RISK_SCORE};
use crate::view::GraphView;
use async_trait::async_trait;
use flowtrace_compliance::distribution::DistributionAnalyzer;
use flowtrace_compliance::scoring::{DetectorOutputs, ScoreAggregator};
use flowtrace_compliance::shell::ShellChainDetector;
use flowtrace_compliance::smurfing::SmurfingDetector;
use flowtrace_compliance::types::{DistributionResult, ShellResult, SmurfingResult};
use flowtrace_core::config::EngineConfig;
use flowtrace_core::error::{EngineError, Result};
use flowtrace_core::notes::ProcessingNote;
use flowtrace_core::traits::BatchAnalyzer;
use flowtrace_graph::builder::build_graph;
use flowtrace_graph::centrality::{InfluenceAnalyzer, InfluenceResult};
use flowtrace_graph::community::{CommunityDetector, CommunityResult};
use flowtrace_graph::cycles::{CycleDetector, CycleResult};
use flowtrace_graph::input::{validate_records, RawTransaction};
use flowtrace_graph::temporal::TemporalIndex;
use flowtrace_graph::types::{Transaction, TransactionGraph};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

// ============================================================================
// Run Context
// ============================================================================

/// Per-run identity and clock.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Unique run id.
    pub run_id: String,
    /// Run start.
    pub start_time: Instant,
}

impl AnalysisContext {
    /// Start a new run.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            start_time: Instant::now(),
        }
    }

    /// Time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Detector Fan-out
// ============================================================================

/// Owned results of the six independent detectors.
#[derive(Debug, Clone)]
pub struct Detections {
    /// Cycle detector.
    pub cycles: CycleResult,
    /// Smurfing detector.
    pub smurfing: SmurfingResult,
    /// Shell chain detector.
    pub shell: ShellResult,
    /// Influence analyzer.
    pub influence: InfluenceResult,
    /// Community detector.
    pub community: CommunityResult,
    /// Distribution analyzer.
    pub distribution: DistributionResult,
}

impl Detections {
    /// Run every detector over the same read-only graph and index.
    pub fn run(graph: &TransactionGraph, index: &TemporalIndex, config: &EngineConfig) -> Self {
        let cycles = || CycleDetector::compute(graph, &config.cycles);
        let smurfing = || SmurfingDetector::compute(index, &config.smurfing);
        let shell = || ShellChainDetector::compute(graph, index, &config.shell);
        let influence = || InfluenceAnalyzer::compute(graph, &config.influence);
        let community = || CommunityDetector::compute(graph, &config.community);
        let distribution = || DistributionAnalyzer::compute(index, &config.distribution);

        if !config.parallel {
            return Self {
                cycles: cycles(),
                smurfing: smurfing(),
                shell: shell(),
                influence: influence(),
                community: community(),
                distribution: distribution(),
            };
        }

        let (((cycles, smurfing), (shell, influence)), (community, distribution)) = rayon::join(
            || {
                rayon::join(
                    || rayon::join(cycles, smurfing),
                    || rayon::join(shell, influence),
                )
            },
            || rayon::join(community, distribution),
        );
        Self {
            cycles,
            smurfing,
            shell,
            influence,
            community,
            distribution,
        }
    }

    /// Borrowed view for the score aggregator.
    #[must_use]
    pub fn outputs(&self) -> DetectorOutputs<'_> {
        DetectorOutputs {
            cycles: &self.cycles,
            smurfing: &self.smurfing,
            shell: &self.shell,
            influence: &self.influence,
            distribution: &self.distribution,
        }
    }

    /// Notes of every detector, in pipeline order.
    #[must_use]
    pub fn notes(&self) -> Vec<ProcessingNote> {
        self.cycles
            .notes
            .iter()
            .chain(&self.influence.notes)
            .chain(&self.community.notes)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Analysis Engine
// ============================================================================

/// Report plus visualization graph of one run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// JSON report.
    pub report: AnalysisReport,
    /// Visualization graph.
    pub graph: GraphView,
}

/// Transaction graph analysis engine.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    config: EngineConfig,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

impl AnalysisEngine {
    /// Create an engine with a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate raw records, then analyze them.
    pub fn analyze_records(&self, records: &[RawTransaction]) -> Result<AnalysisOutcome> {
        let ctx = AnalysisContext::new();
        let span = info_span!("analysis", run_id = %ctx.run_id);
        let _guard = span.enter();

        let transactions = validate_records(records)?;
        self.run(&ctx, &transactions)
    }

    /// Analyze typed transactions.
    pub fn analyze(&self, transactions: &[Transaction]) -> Result<AnalysisOutcome> {
        let ctx = AnalysisContext::new();
        let span = info_span!("analysis", run_id = %ctx.run_id);
        let _guard = span.enter();

        self.run(&ctx, transactions)
    }

    fn run(&self, ctx: &AnalysisContext, transactions: &[Transaction]) -> Result<AnalysisOutcome> {
        let config = &self.config;
        let (graph, index) = build_graph(transactions)?;
        debug!(
            accounts = graph.node_count(),
            edges = graph.edge_count(),
            self_loops = graph.dropped_self_loops,
            "graph built"
        );

        let detections = Detections::run(&graph, &index, config);
        let scoring = ScoreAggregator::compute(
            &graph,
            &index,
            detections.outputs(),
            &config.scoring,
            &config.dampener,
        );
        let view = GraphView::build(
            &graph,
            &scoring,
            &detections.influence,
            &detections.community,
            &config.visualization,
        );

        let mut notes = detections.notes();
        notes.extend(view.notes.iter().cloned());

        let total_volume: f64 = transactions.iter().map(|t| t.amount).sum();
        let avg_transaction_size = if transactions.is_empty() {
            0.0
        } else {
            total_volume / transactions.len() as f64
        };
        let high_risk_count = scoring
            .accounts
            .iter()
            .filter(|a| a.score >= HIGH_RISK_SCORE)
            .count();
        let avg_risk_score = if scoring.accounts.is_empty() {
            0.0
        } else {
            scoring.accounts.iter().map(|a| a.score).sum::<f64>() / scoring.accounts.len() as f64
        };
        let distribution = &detections.distribution;

        let summary = AnalysisSummary {
            total_accounts_analyzed: graph.node_count(),
            suspicious_accounts_flagged: scoring.accounts.len(),
            fraud_rings_detected: scoring.rings.len(),
            processing_time_seconds: round_seconds(ctx.elapsed()),
            total_transactions: transactions.len(),
            benford_status: distribution.benford.status,
            structuring_status: distribution.structuring.status,
            total_volume: round2(total_volume),
            avg_transaction_size: round2(avg_transaction_size),
            graph_density: graph.density(),
            high_risk_count,
            avg_risk_score: round2(avg_risk_score),
            benford_deviation: distribution.benford.deviation,
            structuring_fraction: distribution.structuring.fraction,
            structuring_accounts: distribution
                .structuring
                .accounts
                .iter()
                .map(|a| burst_account(&graph, a.node, a.peak_hits))
                .collect(),
            velocity_accounts: distribution
                .velocity
                .iter()
                .map(|a| burst_account(&graph, a.node, a.peak_events))
                .collect(),
            processing_notes: notes,
        };
        let report = AnalysisReport::assemble(&graph, &scoring, summary);

        info!(
            accounts = report.summary.total_accounts_analyzed,
            flagged = report.summary.suspicious_accounts_flagged,
            rings = report.summary.fraud_rings_detected,
            notes = report.summary.processing_notes.len(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(AnalysisOutcome {
            report,
            graph: view,
        })
    }
}

#[async_trait]
impl BatchAnalyzer<Vec<RawTransaction>, AnalysisOutcome> for AnalysisEngine {
    async fn execute(&self, input: Vec<RawTransaction>) -> Result<AnalysisOutcome> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.analyze_records(&input))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl BatchAnalyzer<Vec<Transaction>, AnalysisOutcome> for AnalysisEngine {
    async fn execute(&self, input: Vec<Transaction>) -> Result<AnalysisOutcome> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.analyze(&input))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }
}

fn burst_account(graph: &TransactionGraph, node: usize, peak_hits: usize) -> BurstAccount {
    BurstAccount {
        account_id: graph.account_id(node).to_string(),
        peak_hits,
    }
}

fn round_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

//! Score aggregation and ring assembly.
//!
//! Fuses the tag output of every detector into one tag set and score per
//! account, suppresses legitimate high-volume accounts, and assembles the
//! ring candidates into numbered fraud rings.

use crate::types::{
    DistributionResult, FraudRing, RingCandidate, ScoredAccount, ScoringResult, ShellResult,
    SmurfingResult,
};
use flowtrace_core::config::{DampenerConfig, ScoringConfig};
use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};
use flowtrace_core::pattern::{PatternSet, PatternTag, RingPattern};
use flowtrace_core::traits::Detector;
use flowtrace_graph::centrality::InfluenceResult;
use flowtrace_graph::cycles::CycleResult;
use flowtrace_graph::temporal::{FlowDirection, TemporalIndex};
use flowtrace_graph::types::TransactionGraph;
use std::collections::HashSet;

/// Round to one decimal.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Results of the tagging detectors, borrowed for one aggregation.
#[derive(Debug, Clone, Copy)]
pub struct DetectorOutputs<'a> {
    /// Cycle detector.
    pub cycles: &'a CycleResult,
    /// Smurfing detector.
    pub smurfing: &'a SmurfingResult,
    /// Shell chain detector.
    pub shell: &'a ShellResult,
    /// Influence analyzer.
    pub influence: &'a InfluenceResult,
    /// Distribution analyzer.
    pub distribution: &'a DistributionResult,
}

// ============================================================================
// Score Aggregator
// ============================================================================

/// Score aggregator and ring assembler.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    metadata: DetectorMetadata,
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreAggregator {
    /// Create a new score aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: DetectorMetadata::new("compliance/scoring", DetectorFamily::Statistical)
                .with_description("Tag fusion, false-positive dampening and ring assembly"),
        }
    }

    /// Whether `node` looks like a legitimate high-volume account: a
    /// merchant that keeps what it receives, or a payroll account paying
    /// near-equal amounts out of a handful of funding sources.
    pub fn is_legitimate(
        graph: &TransactionGraph,
        index: &TemporalIndex,
        node: usize,
        config: &DampenerConfig,
    ) -> bool {
        let account = &graph.nodes[node];
        if account.tx_count < config.min_tx_count
            || account.counterparty_degree() < config.min_counterparties
        {
            return false;
        }

        let merchant = account
            .retention_ratio()
            .is_some_and(|r| r >= config.merchant_min_retention);
        if merchant {
            return true;
        }

        if account.in_degree == 0 || account.in_degree > config.payroll_max_funders {
            return false;
        }
        let amounts: Vec<f64> = index
            .events(node, FlowDirection::Outbound)
            .iter()
            .map(|e| e.amount)
            .collect();
        coefficient_of_variation(&amounts).is_some_and(|cv| cv <= config.payroll_max_cv)
    }

    /// Fuse detector outputs into scored accounts and rings.
    pub fn compute(
        graph: &TransactionGraph,
        index: &TemporalIndex,
        outputs: DetectorOutputs<'_>,
        scoring: &ScoringConfig,
        dampener: &DampenerConfig,
    ) -> ScoringResult {
        let n = graph.node_count();

        let mut tags = vec![PatternSet::empty(); n];
        for &v in &outputs.cycles.cycle_nodes {
            tags[v].insert(PatternTag::Cycle);
        }
        for hub in &outputs.smurfing.fan_in {
            tags[hub.node].insert(PatternTag::FanInAggregator);
        }
        for hub in &outputs.smurfing.fan_out {
            tags[hub.node].insert(PatternTag::FanOutSource);
        }
        // A cycle member counts as a shell only when it also relays a chain.
        let mut chain_relay = vec![false; n];
        for chain in &outputs.shell.chains {
            for &v in chain.iter().skip(1).take(chain.len().saturating_sub(2)) {
                chain_relay[v] = true;
            }
        }
        for &v in &outputs.shell.shell_nodes {
            if !tags[v].contains(PatternTag::Cycle) || chain_relay[v] {
                tags[v].insert(PatternTag::ShellAccount);
            }
        }
        for &v in &outputs.influence.sources {
            tags[v].insert(PatternTag::Source);
        }

        // Cycle members and near-threshold drop accounts are never dampened.
        let mut structuring_burst = vec![false; n];
        for account in &outputs.distribution.structuring.accounts {
            structuring_burst[account.node] = true;
        }
        let is_dampened: Vec<bool> = (0..n)
            .map(|v| {
                dampener.enabled
                    && !tags[v].contains(PatternTag::Cycle)
                    && !structuring_burst[v]
                    && Self::is_legitimate(graph, index, v, dampener)
            })
            .collect();

        let fan_candidates: Vec<RingCandidate> = outputs
            .smurfing
            .fan_in
            .iter()
            .chain(&outputs.smurfing.fan_out)
            .filter(|hub| !is_dampened[hub.node])
            .map(|hub| hub.candidate())
            .collect();
        for candidate in &fan_candidates {
            let tag = match candidate.pattern {
                RingPattern::FanIn => PatternTag::FanInContributor,
                _ => PatternTag::FanOutRecipient,
            };
            for &v in candidate.members.iter().skip(1) {
                tags[v].insert(tag);
            }
        }

        let node_scores: Vec<f64> = (0..n)
            .map(|v| {
                let raw: f64 = tags[v].iter().map(|t| scoring.weights.weight(t)).sum();
                let capped = raw.min(scoring.max_score);
                if is_dampened[v] {
                    round1(capped * dampener.factor)
                } else {
                    round1(capped)
                }
            })
            .collect();

        // Priority order: cycle, shell chain, fan-in, fan-out.
        let mut candidates: Vec<RingCandidate> = outputs
            .cycles
            .rings
            .iter()
            .map(|m| RingCandidate::new(RingPattern::Cycle, m.clone()))
            .chain(
                outputs
                    .shell
                    .rings
                    .iter()
                    .map(|m| RingCandidate::new(RingPattern::ShellChain, m.clone())),
            )
            .collect();
        candidates.extend(fan_candidates);

        let mut assembler = RingAssembler::new(n);
        for candidate in candidates {
            assembler.offer(candidate);
        }
        let RingAssembler {
            rings: emitted,
            node_rings,
            ..
        } = assembler;

        let rings: Vec<FraudRing> = emitted
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let risk_score = ring_risk(&candidate.members, &node_scores, scoring);
                FraudRing {
                    ring_id: format!("RING_{:03}", i + 1),
                    pattern: candidate.pattern,
                    members: candidate.members,
                    risk_score,
                }
            })
            .collect();

        let mut accounts: Vec<ScoredAccount> = (0..n)
            .filter(|&v| !tags[v].is_empty() && node_scores[v] > 0.0)
            .map(|v| ScoredAccount {
                node: v,
                patterns: tags[v],
                score: node_scores[v],
                ring: node_rings[v],
            })
            .collect();
        accounts.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| graph.account_id(a.node).cmp(graph.account_id(b.node)))
        });

        let dampened: Vec<usize> = (0..n).filter(|&v| is_dampened[v]).collect();

        tracing::debug!(
            accounts = accounts.len(),
            rings = rings.len(),
            dampened = dampened.len(),
            "score aggregation complete"
        );

        ScoringResult {
            accounts,
            rings,
            node_patterns: tags,
            node_scores,
            node_rings,
            dampened,
        }
    }
}

impl Detector for ScoreAggregator {
    fn metadata(&self) -> &DetectorMetadata {
        &self.metadata
    }
}

// ============================================================================
// Ring Assembly
// ============================================================================

/// Emits candidates in the order offered, folding any candidate already
/// covered by an emitted ring into that ring.
struct RingAssembler {
    rings: Vec<RingCandidate>,
    members: Vec<HashSet<usize>>,
    /// Emitted rings containing each node.
    containing: Vec<Vec<usize>>,
    node_rings: Vec<Option<usize>>,
}

impl RingAssembler {
    fn new(node_count: usize) -> Self {
        Self {
            rings: Vec::new(),
            members: Vec::new(),
            containing: vec![Vec::new(); node_count],
            node_rings: vec![None; node_count],
        }
    }

    fn offer(&mut self, mut candidate: RingCandidate) {
        let mut seen = HashSet::with_capacity(candidate.members.len());
        candidate.members.retain(|&v| seen.insert(v));
        if candidate.members.len() < candidate.pattern.min_members() {
            return;
        }

        let first = candidate.members[0];
        let covered = self.containing[first]
            .iter()
            .any(|&r| candidate.members.iter().all(|v| self.members[r].contains(v)));
        if covered {
            return;
        }

        let id = self.rings.len();
        for &v in &candidate.members {
            self.containing[v].push(id);
            self.node_rings[v].get_or_insert(id);
        }
        self.members.push(seen);
        self.rings.push(candidate);
    }
}

/// `max_share × max + (1 - max_share) × mean` of member scores.
fn ring_risk(members: &[usize], scores: &[f64], config: &ScoringConfig) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let max = members.iter().map(|&v| scores[v]).fold(0.0, f64::max);
    let mean = members.iter().map(|&v| scores[v]).sum::<f64>() / members.len() as f64;
    let risk = config.ring_max_share * max + (1.0 - config.ring_max_share) * mean;
    round1(risk.min(config.max_score))
}

/// Population coefficient of variation. `None` for fewer than two values
/// or a non-positive mean.
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt() / mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DistributionAnalyzer;
    use crate::shell::ShellChainDetector;
    use crate::smurfing::SmurfingDetector;
    use flowtrace_core::config::{
        CycleConfig, DistributionConfig, InfluenceConfig, ShellConfig, SmurfingConfig,
    };
    use flowtrace_graph::builder::build_graph;
    use flowtrace_graph::centrality::InfluenceAnalyzer;
    use flowtrace_graph::cycles::CycleDetector;
    use flowtrace_graph::types::Transaction;

    const HOUR: i64 = 3600;

    fn score(txs: &[Transaction]) -> (TransactionGraph, ScoringResult) {
        score_with(txs, &DampenerConfig::default())
    }

    fn score_with(txs: &[Transaction], dampener: &DampenerConfig) -> (TransactionGraph, ScoringResult) {
        let (graph, index) = build_graph(txs).unwrap();
        let cycles = CycleDetector::compute(&graph, &CycleConfig::default());
        let smurfing = SmurfingDetector::compute(&index, &SmurfingConfig::default());
        let shell = ShellChainDetector::compute(&graph, &index, &ShellConfig::default());
        // Small fixtures would otherwise put their hubs on the source list.
        let influence_config = InfluenceConfig {
            min_graph_size: 1_000,
            ..Default::default()
        };
        let influence = InfluenceAnalyzer::compute(&graph, &influence_config);
        let distribution = DistributionAnalyzer::compute(&index, &DistributionConfig::default());
        let outputs = DetectorOutputs {
            cycles: &cycles,
            smurfing: &smurfing,
            shell: &shell,
            influence: &influence,
            distribution: &distribution,
        };
        let result =
            ScoreAggregator::compute(&graph, &index, outputs, &ScoringConfig::default(), dampener);
        (graph, result)
    }

    fn ids(graph: &TransactionGraph, nodes: &[usize]) -> Vec<String> {
        nodes.iter().map(|&v| graph.account_id(v).to_string()).collect()
    }

    /// Triangle whose decreasing amounts keep every member off the shell list.
    fn triangle() -> Vec<Transaction> {
        vec![
            Transaction::new("T1", "A", "B", 1_000.0, 0),
            Transaction::new("T2", "B", "C", 500.0, HOUR),
            Transaction::new("T3", "C", "A", 250.0, 2 * HOUR),
        ]
    }

    fn payroll() -> Vec<Transaction> {
        let mut txs = vec![Transaction::new("F0", "EMPLOYER", "PAYROLL", 100_000.0, 0)];
        for i in 0..30 {
            txs.push(Transaction::new(
                format!("P{i}"),
                "PAYROLL",
                format!("EMP{i:02}"),
                3_000.0,
                HOUR + i as i64 * 60,
            ));
        }
        txs
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(66.66), 66.7);
        assert_eq!(round1(10.04), 10.0);
    }

    #[test]
    fn test_lone_triangle_forms_one_ring() {
        let (graph, result) = score(&triangle());

        assert_eq!(result.rings.len(), 1);
        let ring = &result.rings[0];
        assert_eq!(ring.ring_id, "RING_001");
        assert_eq!(ring.pattern, RingPattern::Cycle);
        assert_eq!(ids(&graph, &ring.members), vec!["A", "B", "C"]);
        assert_eq!(ring.risk_score, 60.0);

        assert_eq!(result.accounts.len(), 3);
        assert!(result.accounts.iter().all(|a| a.score == 60.0 && a.ring == Some(0)));
        // Equal scores sort by account id.
        let order: Vec<&str> = result.accounts.iter().map(|a| graph.account_id(a.node)).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_fan_in_tags_contributors() {
        let txs: Vec<Transaction> = (0..10)
            .map(|i| Transaction::new(format!("T{i}"), format!("S{i}"), "HUB", 500.0, i as i64 * HOUR))
            .collect();
        let (graph, result) = score(&txs);

        let hub = graph.node_index("HUB").unwrap();
        assert!(result.node_patterns[hub].contains(PatternTag::FanInAggregator));
        assert_eq!(result.node_scores[hub], 40.0);

        let sender = graph.node_index("S0").unwrap();
        assert!(result.node_patterns[sender].contains(PatternTag::FanInContributor));
        assert_eq!(result.node_scores[sender], 10.0);

        assert_eq!(result.rings.len(), 1);
        assert_eq!(result.rings[0].pattern, RingPattern::FanIn);
        assert_eq!(result.rings[0].members.len(), 11);
        // 0.7 * 40 + 0.3 * (40 + 10 * 10) / 11
        assert_eq!(result.rings[0].risk_score, 31.8);
        assert_eq!(graph.account_id(result.accounts[0].node), "HUB");
    }

    #[test]
    fn test_source_tag_scores_without_ring() {
        let (graph, index) = build_graph(&triangle()).unwrap();
        let b = graph.node_index("B").unwrap();
        let cycles = CycleResult::default();
        let smurfing = SmurfingResult::default();
        let shell = ShellResult::default();
        let influence = InfluenceResult {
            sources: vec![b],
            ..Default::default()
        };
        let distribution = DistributionAnalyzer::compute(&index, &DistributionConfig::default());
        let outputs = DetectorOutputs {
            cycles: &cycles,
            smurfing: &smurfing,
            shell: &shell,
            influence: &influence,
            distribution: &distribution,
        };
        let result = ScoreAggregator::compute(
            &graph,
            &index,
            outputs,
            &ScoringConfig::default(),
            &DampenerConfig::default(),
        );
        assert_eq!(result.accounts.len(), 1);
        assert_eq!(result.accounts[0].node, b);
        assert_eq!(result.accounts[0].score, 20.0);
        assert_eq!(result.accounts[0].ring, None);
        assert!(result.rings.is_empty());
    }

    #[test]
    fn test_payroll_hub_is_suppressed() {
        let (graph, result) = score(&payroll());

        let hub = graph.node_index("PAYROLL").unwrap();
        assert_eq!(result.dampened, vec![hub]);
        assert_eq!(result.node_scores[hub], 0.0);
        assert!(result.rings.is_empty());
        assert!(result.accounts.iter().all(|a| a.node != hub));
        let employee = graph.node_index("EMP00").unwrap();
        assert!(!result.node_patterns[employee].contains(PatternTag::FanOutRecipient));
    }

    #[test]
    fn test_disabled_dampener_keeps_payroll_hub() {
        let config = DampenerConfig {
            enabled: false,
            ..Default::default()
        };
        let (graph, result) = score_with(&payroll(), &config);
        let hub = graph.node_index("PAYROLL").unwrap();
        assert!(result.dampened.is_empty());
        assert_eq!(result.node_scores[hub], 40.0);
        assert_eq!(result.rings.len(), 1);
        assert_eq!(result.rings[0].pattern, RingPattern::FanOut);
    }

    #[test]
    fn test_partial_dampening_factor() {
        let config = DampenerConfig {
            factor: 0.5,
            ..Default::default()
        };
        let (graph, result) = score_with(&payroll(), &config);
        let hub = graph.node_index("PAYROLL").unwrap();
        assert_eq!(result.node_scores[hub], 20.0);
        assert!(result.accounts.iter().any(|a| a.node == hub));
    }

    #[test]
    fn test_equal_amount_triangle_scores_evenly() {
        let txs = vec![
            Transaction::new("T1", "A", "B", 5_000.0, 0),
            Transaction::new("T2", "B", "C", 5_000.0, HOUR),
            Transaction::new("T3", "C", "A", 5_000.0, 2 * HOUR),
        ];
        let (graph, result) = score(&txs);
        assert_eq!(result.accounts.len(), 3);
        for account in &result.accounts {
            assert_eq!(account.score, 60.0, "{}", graph.account_id(account.node));
            assert_eq!(account.patterns.names(), vec!["cycle"]);
        }
        assert_eq!(result.rings[0].risk_score, 60.0);
    }

    #[test]
    fn test_cycle_member_relaying_a_chain_keeps_shell_tag() {
        // B and C relay ORIGIN -> B -> C -> SINK and also lie on A -> B -> C -> A.
        let shell = ShellResult {
            shell_nodes: vec![1, 2],
            chains: vec![vec![4, 1, 2, 3]],
            rings: Vec::new(),
        };
        let cycles = CycleResult {
            cycle_nodes: vec![0, 1, 2],
            ..Default::default()
        };
        let txs = vec![
            Transaction::new("T1", "A", "B", 5_000.0, 0),
            Transaction::new("T2", "B", "C", 5_000.0, HOUR),
            Transaction::new("T3", "C", "SINK", 5_000.0, 2 * HOUR),
            Transaction::new("T4", "ORIGIN", "B", 5_000.0, 3 * HOUR),
            Transaction::new("T5", "C", "A", 5_000.0, 4 * HOUR),
        ];
        let (graph, index) = build_graph(&txs).unwrap();
        let smurfing = SmurfingResult::default();
        let influence = InfluenceResult::default();
        let distribution = DistributionAnalyzer::compute(&index, &DistributionConfig::default());
        let outputs = DetectorOutputs {
            cycles: &cycles,
            smurfing: &smurfing,
            shell: &shell,
            influence: &influence,
            distribution: &distribution,
        };
        let result = ScoreAggregator::compute(
            &graph,
            &index,
            outputs,
            &ScoringConfig::default(),
            &DampenerConfig::default(),
        );
        assert!(result.node_patterns[1].contains(PatternTag::ShellAccount));
        assert!(result.node_patterns[2].contains(PatternTag::ShellAccount));
        assert_eq!(result.node_scores[1], 100.0);
        assert!(!result.node_patterns[0].contains(PatternTag::ShellAccount));
    }

    #[test]
    fn test_structuring_drop_is_not_dampened() {
        // Thirty deposits of 9 500 an hour apart into an account that keeps them.
        let txs: Vec<Transaction> = (0..30)
            .map(|i| {
                Transaction::new(format!("T{i}"), format!("SMURF_{i:02}"), "DROP", 9_500.0, i as i64 * HOUR)
            })
            .collect();
        let (graph, index) = build_graph(&txs).unwrap();
        let drop = graph.node_index("DROP").unwrap();
        assert!(ScoreAggregator::is_legitimate(&graph, &index, drop, &DampenerConfig::default()));

        let (graph, result) = score(&txs);
        let drop = graph.node_index("DROP").unwrap();
        assert!(result.dampened.is_empty());
        assert!(result.node_patterns[drop].contains(PatternTag::FanInAggregator));
        assert_eq!(result.node_scores[drop], 40.0);
        assert_eq!(result.rings.len(), 1);
        assert_eq!(result.rings[0].pattern, RingPattern::FanIn);
    }

    #[test]
    fn test_uneven_payouts_are_not_payroll() {
        let mut txs = vec![Transaction::new("F0", "EMPLOYER", "HUB", 100_000.0, 0)];
        for i in 0..30 {
            let amount = if i % 2 == 0 { 500.0 } else { 5_500.0 };
            txs.push(Transaction::new(format!("P{i}"), "HUB", format!("R{i}"), amount, HOUR + i as i64));
        }
        let (graph, index) = build_graph(&txs).unwrap();
        let hub = graph.node_index("HUB").unwrap();
        assert!(!ScoreAggregator::is_legitimate(&graph, &index, hub, &DampenerConfig::default()));
    }

    #[test]
    fn test_merchant_is_legitimate() {
        let txs: Vec<Transaction> = (0..30)
            .map(|i| Transaction::new(format!("T{i}"), format!("C{i}"), "SHOP", 40.0 + i as f64, i as i64 * HOUR))
            .collect();
        let (graph, index) = build_graph(&txs).unwrap();
        let shop = graph.node_index("SHOP").unwrap();
        assert!(ScoreAggregator::is_legitimate(&graph, &index, shop, &DampenerConfig::default()));
    }

    #[test]
    fn test_covered_candidate_is_folded() {
        let mut assembler = RingAssembler::new(5);
        assembler.offer(RingCandidate::new(RingPattern::Cycle, vec![0, 1, 2, 3]));
        assembler.offer(RingCandidate::fan(RingPattern::FanIn, 2, &[1, 3]));
        assembler.offer(RingCandidate::fan(RingPattern::FanOut, 2, &[4]));
        assert_eq!(assembler.rings.len(), 2);
        assert_eq!(assembler.node_rings, vec![Some(0), Some(0), Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn test_undersized_candidate_is_dropped() {
        let mut assembler = RingAssembler::new(3);
        assembler.offer(RingCandidate::new(RingPattern::Cycle, vec![0, 1]));
        assert!(assembler.rings.is_empty());
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[5.0]), None);
        let cv = coefficient_of_variation(&[1.0, 3.0]).unwrap();
        assert!((cv - 0.5).abs() < 1e-12);
    }
}

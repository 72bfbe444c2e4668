//! Graph construction.
//!
//! Collapses a transaction list into the aggregated [`TransactionGraph`] and
//! fills the [`TemporalIndex`] in the same pass. Self-loops are dropped and
//! counted. The finished graph is checked against its own invariants.

use crate::temporal::TemporalIndex;
use crate::types::{AccountNode, EdgeAggregate, Transaction, TransactionGraph};
use flowtrace_core::error::{EngineError, Result};
use std::collections::HashMap;

/// Incremental graph builder.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: TransactionGraph,
    edge_index: HashMap<(usize, usize), usize>,
    events: Vec<(usize, usize, f64, i64)>,
}

impl GraphBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder sized for `transactions` records.
    #[must_use]
    pub fn with_capacity(transactions: usize) -> Self {
        Self {
            events: Vec::with_capacity(transactions),
            ..Self::default()
        }
    }

    /// Add one transaction.
    pub fn add(&mut self, tx: &Transaction) {
        if tx.is_self_loop() {
            self.graph.dropped_self_loops += 1;
            return;
        }

        let sender = self.node(&tx.sender, tx.timestamp);
        let receiver = self.node(&tx.receiver, tx.timestamp);

        let graph = &mut self.graph;
        let edge = *self.edge_index.entry((sender, receiver)).or_insert_with(|| {
            let id = graph.edges.len();
            graph.edges.push(EdgeAggregate {
                source: sender,
                target: receiver,
                total_amount: 0.0,
                tx_count: 0,
                first_seen: tx.timestamp,
                last_seen: tx.timestamp,
                timestamps: Vec::new(),
            });
            graph.out_edges[sender].push(id);
            graph.in_edges[receiver].push(id);
            graph.nodes[sender].out_degree += 1;
            graph.nodes[receiver].in_degree += 1;
            id
        });

        let agg = &mut graph.edges[edge];
        agg.total_amount += tx.amount;
        agg.tx_count += 1;
        agg.first_seen = agg.first_seen.min(tx.timestamp);
        agg.last_seen = agg.last_seen.max(tx.timestamp);
        agg.timestamps.push(tx.timestamp);

        let s = &mut graph.nodes[sender];
        s.outbound_volume += tx.amount;
        s.tx_count += 1;
        s.first_seen = s.first_seen.min(tx.timestamp);
        s.last_seen = s.last_seen.max(tx.timestamp);

        let r = &mut graph.nodes[receiver];
        r.inbound_volume += tx.amount;
        r.tx_count += 1;
        r.first_seen = r.first_seen.min(tx.timestamp);
        r.last_seen = r.last_seen.max(tx.timestamp);

        graph.transaction_count += 1;
        self.events.push((sender, receiver, tx.amount, tx.timestamp));
    }

    /// Finish construction and verify invariants.
    pub fn build(mut self) -> Result<(TransactionGraph, TemporalIndex)> {
        for edge in &mut self.graph.edges {
            edge.timestamps.sort_unstable();
        }

        let mut index = TemporalIndex::with_nodes(self.graph.nodes.len());
        for (sender, receiver, amount, timestamp) in self.events {
            index.record(sender, receiver, amount, timestamp);
        }
        index.finish();

        check_invariants(&self.graph)?;

        tracing::debug!(
            accounts = self.graph.node_count(),
            edges = self.graph.edge_count(),
            transactions = self.graph.transaction_count,
            self_loops = self.graph.dropped_self_loops,
            "transaction graph built"
        );

        Ok((self.graph, index))
    }

    fn node(&mut self, id: &str, timestamp: i64) -> usize {
        if let Some(&idx) = self.graph.index.get(id) {
            return idx;
        }
        let idx = self.graph.nodes.len();
        self.graph.nodes.push(AccountNode::new(id.to_string(), timestamp));
        self.graph.out_edges.push(Vec::new());
        self.graph.in_edges.push(Vec::new());
        self.graph.index.insert(id.to_string(), idx);
        idx
    }
}

/// Build the graph and temporal index from validated transactions.
pub fn build_graph(transactions: &[Transaction]) -> Result<(TransactionGraph, TemporalIndex)> {
    let mut builder = GraphBuilder::with_capacity(transactions.len());
    for tx in transactions {
        builder.add(tx);
    }
    builder.build()
}

/// Verify structural consistency of a graph.
pub fn check_invariants(graph: &TransactionGraph) -> Result<()> {
    let n = graph.nodes.len();
    if graph.out_edges.len() != n || graph.in_edges.len() != n || graph.index.len() != n {
        return Err(EngineError::invariant(format!(
            "node tables disagree: {} nodes, {} out lists, {} in lists, {} ids",
            n,
            graph.out_edges.len(),
            graph.in_edges.len(),
            graph.index.len()
        )));
    }

    let mut tx_total: u64 = 0;
    for (e, edge) in graph.edges.iter().enumerate() {
        if edge.source >= n || edge.target >= n {
            return Err(EngineError::invariant(format!(
                "edge {} references node outside 0..{}",
                e, n
            )));
        }
        if edge.source == edge.target {
            return Err(EngineError::invariant(format!("edge {} is a self-loop", e)));
        }
        if edge.timestamps.len() != edge.tx_count as usize {
            return Err(EngineError::invariant(format!(
                "edge {} has {} timestamps for {} transactions",
                e,
                edge.timestamps.len(),
                edge.tx_count
            )));
        }
        tx_total += u64::from(edge.tx_count);
    }

    let out_total: usize = graph.out_edges.iter().map(Vec::len).sum();
    let in_total: usize = graph.in_edges.iter().map(Vec::len).sum();
    if out_total != graph.edges.len() || in_total != graph.edges.len() {
        return Err(EngineError::invariant(format!(
            "adjacency lists hold {}/{} entries for {} edges",
            out_total,
            in_total,
            graph.edges.len()
        )));
    }

    if tx_total != graph.transaction_count as u64 {
        return Err(EngineError::invariant(format!(
            "edges hold {} transactions, graph counted {}",
            tx_total, graph.transaction_count
        )));
    }

    for (i, node) in graph.nodes.iter().enumerate() {
        if graph.index.get(&node.id) != Some(&i) {
            return Err(EngineError::invariant(format!(
                "account '{}' not indexed at {}",
                node.id, i
            )));
        }
        if node.out_degree != graph.out_edges[i].len() || node.in_degree != graph.in_edges[i].len()
        {
            return Err(EngineError::invariant(format!(
                "account '{}' degree counters disagree with adjacency",
                node.id
            )));
        }
        let misplaced = graph.out_edges[i]
            .iter()
            .any(|&e| e >= graph.edges.len() || graph.edges[e].source != i)
            || graph.in_edges[i]
                .iter()
                .any(|&e| e >= graph.edges.len() || graph.edges[e].target != i);
        if misplaced {
            return Err(EngineError::invariant(format!(
                "account '{}' adjacency lists reference foreign edges",
                node.id
            )));
        }
        let counted: u32 = graph.out_edges[i]
            .iter()
            .chain(graph.in_edges[i].iter())
            .map(|&e| graph.edges[e].tx_count)
            .sum();
        if counted != node.tx_count {
            return Err(EngineError::invariant(format!(
                "account '{}' counts {} transactions, edges hold {}",
                node.id, node.tx_count, counted
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::FlowDirection;

    fn tx(id: &str, from: &str, to: &str, amount: f64, ts: i64) -> Transaction {
        Transaction::new(id, from, to, amount, ts)
    }

    #[test]
    fn test_density() {
        let (graph, _) = build_graph(&[
            tx("T1", "A", "B", 10.0, 0),
            tx("T2", "A", "B", 20.0, 1),
            tx("T3", "B", "C", 10.0, 2),
            tx("T4", "C", "C", 10.0, 3),
        ])
        .unwrap();
        // Two aggregated edges over 3 * 2 ordered pairs.
        assert!((graph.density() - 2.0 / 6.0).abs() < 1e-12);

        let (single, _) = build_graph(&[tx("T1", "A", "A", 10.0, 0)]).unwrap();
        assert_eq!(single.density(), 0.0);
    }

    #[test]
    fn test_nodes_in_first_appearance_order() {
        let txs = vec![
            tx("T1", "B", "A", 10.0, 100),
            tx("T2", "A", "C", 20.0, 200),
        ];
        let (graph, _) = build_graph(&txs).unwrap();
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert_eq!(graph.node_index("C"), Some(2));
    }

    #[test]
    fn test_parallel_transactions_collapse() {
        let txs = vec![
            tx("T1", "A", "B", 100.0, 300),
            tx("T2", "A", "B", 50.0, 100),
            tx("T3", "B", "A", 25.0, 200),
        ];
        let (graph, _) = build_graph(&txs).unwrap();

        assert_eq!(graph.edge_count(), 2);
        let ab = &graph.edges[0];
        assert_eq!(ab.total_amount, 150.0);
        assert_eq!(ab.tx_count, 2);
        assert_eq!(ab.first_seen, 100);
        assert_eq!(ab.last_seen, 300);
        assert_eq!(ab.timestamps, vec![100, 300]);

        let a = &graph.nodes[0];
        assert_eq!(a.out_degree, 1);
        assert_eq!(a.in_degree, 1);
        assert_eq!(a.outbound_volume, 150.0);
        assert_eq!(a.inbound_volume, 25.0);
        assert_eq!(a.tx_count, 3);
        assert_eq!(graph.transaction_count, 3);
    }

    #[test]
    fn test_self_loops_dropped() {
        let txs = vec![
            tx("T1", "A", "A", 100.0, 0),
            tx("T2", "A", "B", 10.0, 0),
            tx("T3", "Z", "Z", 5.0, 0),
        ];
        let (graph, index) = build_graph(&txs).unwrap();
        assert_eq!(graph.dropped_self_loops, 2);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node_index("Z"), None);
        assert_eq!(graph.transaction_count, 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_temporal_index_filled() {
        let txs = vec![
            tx("T1", "A", "B", 10.0, 500),
            tx("T2", "C", "B", 20.0, 100),
        ];
        let (graph, index) = build_graph(&txs).unwrap();
        let b = graph.node_index("B").unwrap();
        let inbound = index.events(b, FlowDirection::Inbound);
        assert_eq!(inbound.len(), 2);
        assert_eq!(inbound[0].timestamp, 100);
        assert_eq!(graph.account_id(inbound[0].counterparty), "C");
    }

    #[test]
    fn test_empty_input() {
        let (graph, index) = build_graph(&[]).unwrap();
        assert!(graph.is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_invariant_violation_detected() {
        let (mut graph, _) = build_graph(&[tx("T1", "A", "B", 10.0, 0)]).unwrap();
        graph.nodes[0].out_degree = 7;
        let err = check_invariants(&graph).unwrap_err();
        assert!(err.is_internal());
    }
}

//! Transaction graph types.
//!
//! Accounts and edges are stored in dense vectors indexed by `usize`, in order
//! of first appearance in the input. Adjacency lists hold edge indices, so a
//! neighbour walk can read the edge aggregate without a second lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Validated transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier.
    pub id: String,
    /// Sending account.
    pub sender: String,
    /// Receiving account.
    pub receiver: String,
    /// Non-negative finite amount.
    pub amount: f64,
    /// Unix seconds, UTC.
    pub timestamp: i64,
}

impl Transaction {
    /// Create a transaction.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            timestamp,
        }
    }

    /// Whether sender and receiver are the same account.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.sender == self.receiver
    }
}

/// Per-account aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountNode {
    /// Account identifier.
    pub id: String,
    /// Distinct senders.
    pub in_degree: usize,
    /// Distinct receivers.
    pub out_degree: usize,
    /// Total amount received.
    pub inbound_volume: f64,
    /// Total amount sent.
    pub outbound_volume: f64,
    /// Transactions sent or received.
    pub tx_count: u32,
    /// Earliest activity.
    pub first_seen: i64,
    /// Latest activity.
    pub last_seen: i64,
}

impl AccountNode {
    pub(crate) fn new(id: String, timestamp: i64) -> Self {
        Self {
            id,
            in_degree: 0,
            out_degree: 0,
            inbound_volume: 0.0,
            outbound_volume: 0.0,
            tx_count: 0,
            first_seen: timestamp,
            last_seen: timestamp,
        }
    }

    /// `1 - outbound / inbound`. `None` when nothing was received.
    #[must_use]
    pub fn retention_ratio(&self) -> Option<f64> {
        if self.inbound_volume > 0.0 {
            Some(1.0 - self.outbound_volume / self.inbound_volume)
        } else {
            None
        }
    }

    /// `outbound / inbound`. `None` when nothing was received.
    #[must_use]
    pub fn pass_through_ratio(&self) -> Option<f64> {
        self.retention_ratio().map(|r| 1.0 - r)
    }

    /// Distinct senders plus distinct receivers.
    #[must_use]
    pub fn counterparty_degree(&self) -> usize {
        self.in_degree + self.out_degree
    }
}

/// All transactions from one account to another, collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAggregate {
    /// Sender node index.
    pub source: usize,
    /// Receiver node index.
    pub target: usize,
    /// Sum of amounts.
    pub total_amount: f64,
    /// Number of transactions.
    pub tx_count: u32,
    /// Earliest transaction.
    pub first_seen: i64,
    /// Latest transaction.
    pub last_seen: i64,
    /// Contributing timestamps, ascending.
    pub timestamps: Vec<i64>,
}

/// Directed, aggregated transaction graph.
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    /// Accounts in order of first appearance.
    pub nodes: Vec<AccountNode>,
    /// Account id to node index.
    pub index: HashMap<String, usize>,
    /// Edges in order of first appearance.
    pub edges: Vec<EdgeAggregate>,
    /// Outgoing edge indices per node.
    pub out_edges: Vec<Vec<usize>>,
    /// Incoming edge indices per node.
    pub in_edges: Vec<Vec<usize>>,
    /// Transactions represented in the graph (self-loops excluded).
    pub transaction_count: usize,
    /// Self-loop transactions that were dropped.
    pub dropped_self_loops: usize,
}

impl TransactionGraph {
    /// Number of accounts.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of aggregated edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Directed density `E / (N (N - 1))` over aggregated edges.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.nodes.len();
        if n < 2 {
            return 0.0;
        }
        self.edges.len() as f64 / (n * (n - 1)) as f64
    }

    /// True when there are no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node index of an account id.
    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Account id of a node index.
    #[must_use]
    pub fn account_id(&self, node: usize) -> &str {
        &self.nodes[node].id
    }

    /// Successor node indices.
    pub fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.out_edges[node].iter().map(move |&e| self.edges[e].target)
    }

    /// Predecessor node indices.
    pub fn predecessors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.in_edges[node].iter().map(move |&e| self.edges[e].source)
    }

    /// Edge index between two nodes, if any.
    #[must_use]
    pub fn find_edge(&self, source: usize, target: usize) -> Option<usize> {
        self.out_edges[source]
            .iter()
            .copied()
            .find(|&e| self.edges[e].target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_ratio() {
        let mut node = AccountNode::new("A".to_string(), 0);
        assert_eq!(node.retention_ratio(), None);

        node.inbound_volume = 1000.0;
        node.outbound_volume = 950.0;
        let retention = node.retention_ratio().unwrap();
        assert!((retention - 0.05).abs() < 1e-12);
        assert!((node.pass_through_ratio().unwrap() - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_self_loop() {
        assert!(Transaction::new("T1", "A", "A", 10.0, 0).is_self_loop());
        assert!(!Transaction::new("T1", "A", "B", 10.0, 0).is_self_loop());
    }
}

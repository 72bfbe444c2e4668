//! Temporal index.
//!
//! Per account, the inbound and outbound transactions sorted by
//! `(timestamp, counterparty)`. Window queries use the inclusive interval
//! `[t - W, t]` and run as two-pointer sweeps over these sequences.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One incident transaction as seen from an account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Unix seconds.
    pub timestamp: i64,
    /// Counterparty node index.
    pub counterparty: usize,
    /// Amount.
    pub amount: f64,
}

/// Direction of flow relative to the indexed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDirection {
    /// Money received; counterparties are senders.
    Inbound,
    /// Money sent; counterparties are receivers.
    Outbound,
}

/// Time-ordered events of one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTimeline {
    /// Received transactions.
    pub inbound: Vec<TimedEvent>,
    /// Sent transactions.
    pub outbound: Vec<TimedEvent>,
}

impl NodeTimeline {
    /// Events in one direction.
    #[must_use]
    pub fn events(&self, direction: FlowDirection) -> &[TimedEvent] {
        match direction {
            FlowDirection::Inbound => &self.inbound,
            FlowDirection::Outbound => &self.outbound,
        }
    }

    fn sort(&mut self) {
        let key = |e: &TimedEvent| (e.timestamp, e.counterparty);
        self.inbound.sort_by_key(key);
        self.outbound.sort_by_key(key);
    }
}

/// Window with the most distinct counterparties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPeak {
    /// Distinct counterparties in the window.
    pub distinct: usize,
    /// Earliest event timestamp in the window.
    pub start: i64,
    /// Latest event timestamp in the window.
    pub end: i64,
    /// Counterparties in order of first appearance inside the window.
    pub counterparties: Vec<usize>,
}

/// Per-account time-ordered transaction index.
#[derive(Debug, Clone, Default)]
pub struct TemporalIndex {
    timelines: Vec<NodeTimeline>,
}

impl TemporalIndex {
    /// Index with `node_count` empty timelines.
    #[must_use]
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            timelines: vec![NodeTimeline::default(); node_count],
        }
    }

    /// Record a transaction from `sender` to `receiver`.
    pub fn record(&mut self, sender: usize, receiver: usize, amount: f64, timestamp: i64) {
        self.timelines[sender].outbound.push(TimedEvent {
            timestamp,
            counterparty: receiver,
            amount,
        });
        self.timelines[receiver].inbound.push(TimedEvent {
            timestamp,
            counterparty: sender,
            amount,
        });
    }

    /// Sort every timeline. Must be called once all events are recorded.
    pub fn finish(&mut self) {
        for timeline in &mut self.timelines {
            timeline.sort();
        }
    }

    /// Number of indexed accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    /// True when no account is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Timeline of one account.
    #[must_use]
    pub fn timeline(&self, node: usize) -> &NodeTimeline {
        &self.timelines[node]
    }

    /// Events of one account in one direction.
    #[must_use]
    pub fn events(&self, node: usize, direction: FlowDirection) -> &[TimedEvent] {
        self.timelines[node].events(direction)
    }

    /// Distinct counterparties in `[t - window, t]`.
    #[must_use]
    pub fn distinct_counterparties_ending_at(
        &self,
        node: usize,
        direction: FlowDirection,
        t: i64,
        window: i64,
    ) -> usize {
        let events = self.events(node, direction);
        let lo = events.partition_point(|e| e.timestamp < t.saturating_sub(window));
        let hi = events.partition_point(|e| e.timestamp <= t);
        events[lo..hi.max(lo)]
            .iter()
            .map(|e| e.counterparty)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Window of length `window` holding the most distinct counterparties.
    ///
    /// Returns the earliest such window, or `None` when there are no events.
    #[must_use]
    pub fn peak_distinct_counterparties(
        &self,
        node: usize,
        direction: FlowDirection,
        window: i64,
    ) -> Option<WindowPeak> {
        let events = self.events(node, direction);
        if events.is_empty() {
            return None;
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        let mut left = 0;
        let mut best: Option<(usize, usize, usize)> = None;

        for right in 0..events.len() {
            *counts.entry(events[right].counterparty).or_insert(0) += 1;

            // Windows end at a timestamp, so take every event sharing it first.
            if right + 1 < events.len() && events[right + 1].timestamp == events[right].timestamp {
                continue;
            }

            let floor = events[right].timestamp.saturating_sub(window);
            while events[left].timestamp < floor {
                let cp = events[left].counterparty;
                if let Some(c) = counts.get_mut(&cp) {
                    *c -= 1;
                    if *c == 0 {
                        counts.remove(&cp);
                    }
                }
                left += 1;
            }

            let distinct = counts.len();
            if best.map_or(true, |(d, _, _)| distinct > d) {
                best = Some((distinct, left, right));
            }
        }

        best.map(|(distinct, left, right)| {
            let mut seen = HashSet::new();
            let counterparties = events[left..=right]
                .iter()
                .map(|e| e.counterparty)
                .filter(|cp| seen.insert(*cp))
                .collect();
            WindowPeak {
                distinct,
                start: events[left].timestamp,
                end: events[right].timestamp,
                counterparties,
            }
        })
    }

    /// Most events satisfying `pred` inside any window of length `window`.
    pub fn peak_count_where<F>(
        &self,
        node: usize,
        direction: FlowDirection,
        window: i64,
        pred: F,
    ) -> usize
    where
        F: Fn(&TimedEvent) -> bool,
    {
        let times: Vec<i64> = self
            .events(node, direction)
            .iter()
            .filter(|e| pred(e))
            .map(|e| e.timestamp)
            .collect();

        let mut left = 0;
        let mut peak = 0;
        for right in 0..times.len() {
            while times[left] < times[right].saturating_sub(window) {
                left += 1;
            }
            peak = peak.max(right - left + 1);
        }
        peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;

    /// Node 0 receives from senders 1..=n, one per `spacing` hours.
    fn fan_in(n: usize, spacing: i64) -> TemporalIndex {
        let mut index = TemporalIndex::with_nodes(n + 1);
        for i in 1..=n {
            index.record(i, 0, 100.0, (i as i64 - 1) * spacing * HOUR);
        }
        index.finish();
        index
    }

    #[test]
    fn test_events_sorted() {
        let mut index = TemporalIndex::with_nodes(3);
        index.record(1, 0, 10.0, 500);
        index.record(2, 0, 10.0, 100);
        index.finish();

        let ts: Vec<i64> = index
            .events(0, FlowDirection::Inbound)
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(ts, vec![100, 500]);
        assert_eq!(index.events(1, FlowDirection::Outbound).len(), 1);
    }

    #[test]
    fn test_window_is_inclusive() {
        // Senders at 0h and 72h: both inside a 72h window ending at 72h.
        let index = fan_in(2, 72);
        assert_eq!(
            index.distinct_counterparties_ending_at(0, FlowDirection::Inbound, 72 * HOUR, 72 * HOUR),
            2
        );
        assert_eq!(
            index.distinct_counterparties_ending_at(0, FlowDirection::Inbound, 72 * HOUR, 71 * HOUR),
            1
        );
    }

    #[test]
    fn test_peak_window() {
        // Ten senders 7h apart span 63h, all inside one 72h window.
        let index = fan_in(10, 7);
        let peak = index
            .peak_distinct_counterparties(0, FlowDirection::Inbound, 72 * HOUR)
            .unwrap();
        assert_eq!(peak.distinct, 10);
        assert_eq!(peak.counterparties, (1..=10).collect::<Vec<_>>());
        assert_eq!(peak.start, 0);
        assert_eq!(peak.end, 63 * HOUR);
    }

    #[test]
    fn test_peak_window_sliding() {
        // Twelve senders 10h apart: at most 8 fit in 72h.
        let index = fan_in(12, 10);
        let peak = index
            .peak_distinct_counterparties(0, FlowDirection::Inbound, 72 * HOUR)
            .unwrap();
        assert_eq!(peak.distinct, 8);
        assert_eq!(peak.counterparties, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_repeat_counterparty_counted_once() {
        let mut index = TemporalIndex::with_nodes(2);
        for h in 0..5 {
            index.record(1, 0, 10.0, h * HOUR);
        }
        index.finish();
        let peak = index
            .peak_distinct_counterparties(0, FlowDirection::Inbound, 72 * HOUR)
            .unwrap();
        assert_eq!(peak.distinct, 1);
    }

    #[test]
    fn test_no_events() {
        let index = TemporalIndex::with_nodes(1);
        assert!(index
            .peak_distinct_counterparties(0, FlowDirection::Outbound, HOUR)
            .is_none());
        assert_eq!(index.peak_count_where(0, FlowDirection::Inbound, HOUR, |_| true), 0);
    }

    #[test]
    fn test_peak_count_where() {
        let mut index = TemporalIndex::with_nodes(5);
        index.record(1, 0, 9_500.0, 0);
        index.record(2, 0, 9_800.0, 2 * HOUR);
        index.record(3, 0, 200.0, 3 * HOUR);
        index.record(4, 0, 9_100.0, 20 * HOUR);
        index.record(1, 0, 9_900.0, 40 * HOUR);
        index.finish();

        let near = |e: &TimedEvent| e.amount >= 8_000.0 && e.amount < 10_000.0;
        assert_eq!(index.peak_count_where(0, FlowDirection::Inbound, 24 * HOUR, near), 3);
        assert_eq!(index.peak_count_where(0, FlowDirection::Inbound, HOUR, near), 1);
    }
}

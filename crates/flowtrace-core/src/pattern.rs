//! Pattern tags and ring pattern types.
//!
//! An account can match several detectors at once, so its classification is
//! a small bitmask of tags rather than a single account "type".

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A structural or behavioural pattern attributed to an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PatternTag {
    /// Member of a short closed money loop.
    Cycle = 0,
    /// Hub receiving from many distinct senders inside the window.
    FanInAggregator = 1,
    /// Hub sending to many distinct receivers inside the window.
    FanOutSource = 2,
    /// Low-activity pass-through relay.
    ShellAccount = 3,
    /// High-centrality candidate orchestrator.
    Source = 4,
    /// Sender feeding a fan-in hub.
    FanInContributor = 5,
    /// Receiver of a fan-out hub.
    FanOutRecipient = 6,
}

impl PatternTag {
    /// All tags in canonical order.
    pub const ALL: &'static [PatternTag] = &[
        PatternTag::Cycle,
        PatternTag::FanInAggregator,
        PatternTag::FanOutSource,
        PatternTag::ShellAccount,
        PatternTag::Source,
        PatternTag::FanInContributor,
        PatternTag::FanOutRecipient,
    ];

    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PatternTag::Cycle => "cycle",
            PatternTag::FanInAggregator => "fan_in_aggregator",
            PatternTag::FanOutSource => "fan_out_source",
            PatternTag::ShellAccount => "shell_account",
            PatternTag::Source => "source",
            PatternTag::FanInContributor => "fan_in_contributor",
            PatternTag::FanOutRecipient => "fan_out_recipient",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of pattern tags backed by a bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PatternSet(u16);

impl PatternSet {
    /// Empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing a single tag.
    #[must_use]
    pub const fn single(tag: PatternTag) -> Self {
        Self(tag.bit())
    }

    /// Add a tag. Returns true if it was not already present.
    pub fn insert(&mut self, tag: PatternTag) -> bool {
        let had = self.contains(tag);
        self.0 |= tag.bit();
        !had
    }

    /// Remove a tag.
    pub fn remove(&mut self, tag: PatternTag) {
        self.0 &= !tag.bit();
    }

    /// Check membership.
    #[must_use]
    pub const fn contains(&self, tag: PatternTag) -> bool {
        self.0 & tag.bit() != 0
    }

    /// Union with another set.
    #[must_use]
    pub const fn union(self, other: PatternSet) -> PatternSet {
        PatternSet(self.0 | other.0)
    }

    /// Number of tags present.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True when no tag is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate tags in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = PatternTag> + '_ {
        PatternTag::ALL.iter().copied().filter(|t| self.contains(*t))
    }

    /// Tag names in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl FromIterator<PatternTag> for PatternSet {
    fn from_iter<I: IntoIterator<Item = PatternTag>>(iter: I) -> Self {
        let mut set = PatternSet::empty();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl Serialize for PatternSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|t| t.as_str()))
    }
}

/// Pattern that forms a fraud ring.
///
/// Declaration order is ring assignment priority: an account matched by
/// several ring-forming detectors takes its primary ring from the earliest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingPattern {
    /// Closed loop of 3-5 hops.
    Cycle,
    /// Chain of pass-through shell accounts.
    ShellChain,
    /// Many senders into one hub.
    FanIn,
    /// One hub out to many receivers.
    FanOut,
}

impl RingPattern {
    /// Wire name of the ring pattern.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RingPattern::Cycle => "cycle",
            RingPattern::ShellChain => "shell_chain",
            RingPattern::FanIn => "fan_in",
            RingPattern::FanOut => "fan_out",
        }
    }

    /// Smallest member count a ring of this pattern may be emitted with.
    #[must_use]
    pub const fn min_members(&self) -> usize {
        match self {
            RingPattern::Cycle | RingPattern::ShellChain => 3,
            RingPattern::FanIn | RingPattern::FanOut => 2,
        }
    }
}

impl fmt::Display for RingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

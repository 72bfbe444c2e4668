//! Processing notes for non-fatal, precision-degrading events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subsystem that emitted a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Cycle detector.
    Cycles,
    /// Community detector.
    Community,
    /// Influence analyzer.
    Influence,
    /// Visualization graph export.
    Visualization,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycles => write!(f, "cycles"),
            Self::Community => write!(f, "community"),
            Self::Influence => write!(f, "influence"),
            Self::Visualization => write!(f, "visualization"),
        }
    }
}

/// Kind of note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// A size or runtime guard cut an exhaustive computation short.
    ResourceGuardTripped,
    /// An iterative algorithm stopped before converging.
    NotConverged,
}

/// A non-fatal event surfaced to the caller in the run summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingNote {
    /// Emitting subsystem.
    pub subsystem: Subsystem,
    /// Note kind.
    pub kind: NoteKind,
    /// Details.
    pub message: String,
}

impl ProcessingNote {
    /// A tripped resource guard.
    #[must_use]
    pub fn guard_tripped(subsystem: Subsystem, message: impl Into<String>) -> Self {
        Self {
            subsystem,
            kind: NoteKind::ResourceGuardTripped,
            message: message.into(),
        }
    }

    /// A non-converged iterative computation.
    #[must_use]
    pub fn not_converged(subsystem: Subsystem, message: impl Into<String>) -> Self {
        Self {
            subsystem,
            kind: NoteKind::NotConverged,
            message: message.into(),
        }
    }

    /// Emit the note as a tracing warning and return it.
    #[must_use]
    pub fn logged(self) -> Self {
        tracing::warn!(
            subsystem = %self.subsystem,
            kind = ?self.kind,
            "{}",
            self.message
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_serialization() {
        let note = ProcessingNote::guard_tripped(Subsystem::Cycles, "scc of 250 nodes");
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["subsystem"], "cycles");
        assert_eq!(json["kind"], "resource_guard_tripped");
        assert_eq!(json["message"], "scc of 250 nodes");
    }
}

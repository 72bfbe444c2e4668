//! Detector metadata.
//!
//! Every analysis stage carries a static description of itself: a stable id
//! (e.g. `"graph/cycles"`), the family it belongs to, and whether its output
//! can form fraud rings. The engine logs against these ids and the CLI lists
//! them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorFamily {
    /// Structural patterns over the directed graph (cycles, shell chains).
    Structural,
    /// Time-windowed patterns (fan-in/fan-out).
    Temporal,
    /// Network-wide measures (centrality, communities).
    Network,
    /// Amount distribution statistics.
    Statistical,
}

impl DetectorFamily {
    /// Family name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DetectorFamily::Structural => "structural",
            DetectorFamily::Temporal => "temporal",
            DetectorFamily::Network => "network",
            DetectorFamily::Statistical => "statistical",
        }
    }
}

impl fmt::Display for DetectorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorMetadata {
    /// Unique detector identifier (e.g., "graph/cycles").
    pub id: String,

    /// Detector family.
    pub family: DetectorFamily,

    /// Human-readable description.
    pub description: String,

    /// Whether findings of this detector can form fraud rings.
    pub forms_rings: bool,

    /// Version of the detector implementation.
    pub version: u32,
}

impl DetectorMetadata {
    /// Create metadata for an advisory detector (no rings).
    #[must_use]
    pub fn new(id: impl Into<String>, family: DetectorFamily) -> Self {
        Self {
            id: id.into(),
            family,
            description: String::new(),
            forms_rings: false,
            version: 1,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the detector as ring-forming.
    #[must_use]
    pub fn with_rings(mut self) -> Self {
        self.forms_rings = true;
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

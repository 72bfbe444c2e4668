//! # flowtrace
//!
//! Transaction graph analysis for money-laundering investigation.
//!
//! flowtrace turns a flat list of transactions into a directed account graph,
//! runs a set of independent detectors over it and fuses their findings into
//! a ranked list of suspicious accounts and named fraud rings.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowtrace::prelude::*;
//!
//! let engine = AnalysisEngine::new(EngineConfig::default())?;
//! let outcome = engine.analyze_records(&records)?;
//! println!("{}", outcome.report.to_json(true)?);
//! ```
//!
//! ## Detectors
//!
//! ### Structural
//! - **Cycles**: closed money loops of 3-5 hops
//! - **Shell chains**: layering through low-activity pass-through accounts
//!
//! ### Temporal
//! - **Smurfing**: fan-in / fan-out stars inside a 72 hour window
//!
//! ### Network
//! - **Influence**: weighted PageRank, orchestrator candidates
//! - **Communities**: Louvain modularity clustering
//!
//! ### Statistical
//! - **Distribution**: Benford first-digit test and structuring
//!
//! The score aggregator fuses the tags, suppresses legitimate high-volume
//! accounts and assembles rings.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use flowtrace_compliance as compliance;
pub use flowtrace_core as core;
pub use flowtrace_graph as graph;

pub mod engine;
pub mod report;
pub mod view;

/// Prelude module for convenient imports.
///
/// Import everything you need with:
/// ```rust,ignore
/// use flowtrace::prelude::*;
/// ```
pub mod prelude {
    pub use flowtrace_core::prelude::*;

    pub use crate::engine::{AnalysisContext, AnalysisEngine, AnalysisOutcome, Detections};
    pub use crate::report::{
        AnalysisReport, AnalysisSummary, BurstAccount, RingReport, SuspiciousAccount, NO_RING,
    };
    pub use crate::view::{GraphView, NodeKind, ViewEdge, ViewNode};
    pub use flowtrace_graph::input::RawTransaction;
    pub use flowtrace_graph::types::Transaction;
}

/// Version information.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Detector catalog.
pub mod catalog {
    use flowtrace_core::detector::{DetectorFamily, DetectorMetadata};

    /// Family information.
    #[derive(Debug, Clone)]
    pub struct FamilyInfo {
        /// Family enum value.
        pub family: DetectorFamily,
        /// Human-readable name.
        pub name: &'static str,
        /// Description.
        pub description: &'static str,
        /// Number of detectors.
        pub detector_count: usize,
    }

    /// Every detector, graph detectors first.
    pub fn detectors() -> Vec<DetectorMetadata> {
        let mut all = flowtrace_graph::detectors();
        all.extend(flowtrace_compliance::detectors());
        all
    }

    /// Look up a detector by id.
    pub fn find(id: &str) -> Option<DetectorMetadata> {
        detectors().into_iter().find(|d| d.id == id)
    }

    /// Get all family information.
    pub fn families() -> Vec<FamilyInfo> {
        let all = detectors();
        let count = |family: DetectorFamily| all.iter().filter(|d| d.family == family).count();
        vec![
            FamilyInfo {
                family: DetectorFamily::Structural,
                name: "Structural",
                description: "Cycles and shell chains over the directed graph",
                detector_count: count(DetectorFamily::Structural),
            },
            FamilyInfo {
                family: DetectorFamily::Temporal,
                name: "Temporal",
                description: "Fan-in and fan-out inside a sliding window",
                detector_count: count(DetectorFamily::Temporal),
            },
            FamilyInfo {
                family: DetectorFamily::Network,
                name: "Network",
                description: "PageRank influence and Louvain communities",
                detector_count: count(DetectorFamily::Network),
            },
            FamilyInfo {
                family: DetectorFamily::Statistical,
                name: "Statistical",
                description: "Amount distributions and score aggregation",
                detector_count: count(DetectorFamily::Statistical),
            },
        ]
    }

    /// Get total detector count.
    pub fn total_detector_count() -> usize {
        detectors().len()
    }
}

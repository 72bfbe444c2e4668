//! # flowtrace Graph Analytics
//!
//! Transaction graph construction and the graph algorithms the detectors
//! build on.
//!
//! ## Construction
//! - `validate_records` - raw string records to typed transactions
//! - `build_graph` - aggregated directed graph plus temporal index
//!
//! ## Detectors
//! - `CycleDetector` - iterative Tarjan SCC, bounded cycle enumeration
//! - `InfluenceAnalyzer` - weighted PageRank, source candidates
//! - `CommunityDetector` - multi-level Louvain, component fallback

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod centrality;
pub mod community;
pub mod cycles;
pub mod input;
pub mod temporal;

// Common graph types
pub mod types;

use flowtrace_core::detector::DetectorMetadata;
use flowtrace_core::traits::Detector;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{build_graph, GraphBuilder};
    pub use crate::centrality::{InfluenceAnalyzer, InfluenceResult};
    pub use crate::community::{CommunityDetector, CommunityResult};
    pub use crate::cycles::{CycleDetector, CycleResult};
    pub use crate::input::{validate_records, RawTransaction};
    pub use crate::temporal::{FlowDirection, TemporalIndex, TimedEvent, WindowPeak};
    pub use crate::types::{AccountNode, EdgeAggregate, Transaction, TransactionGraph};
}

/// Metadata of every graph detector.
#[must_use]
pub fn detectors() -> Vec<DetectorMetadata> {
    vec![
        cycles::CycleDetector::new().metadata().clone(),
        centrality::InfluenceAnalyzer::new().metadata().clone(),
        community::CommunityDetector::new().metadata().clone(),
    ]
}

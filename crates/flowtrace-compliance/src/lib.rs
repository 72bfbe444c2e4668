//! # flowtrace Compliance
//!
//! Laundering-pattern detectors on top of the transaction graph, and the
//! aggregator that turns their findings into scored accounts and rings.
//!
//! ## Detectors
//! - `SmurfingDetector` - fan-in / fan-out inside a sliding window
//! - `ShellChainDetector` - pass-through accounts and layering chains
//! - `DistributionAnalyzer` - Benford and near-threshold structuring
//!
//! ## Aggregation
//! - `ScoreAggregator` - tag fusion, false-positive dampener, ring assembly

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distribution;
pub mod scoring;
pub mod shell;
pub mod smurfing;
pub mod types;

use flowtrace_core::detector::DetectorMetadata;
use flowtrace_core::traits::Detector;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::distribution::DistributionAnalyzer;
    pub use crate::scoring::{DetectorOutputs, ScoreAggregator};
    pub use crate::shell::ShellChainDetector;
    pub use crate::smurfing::SmurfingDetector;
    pub use crate::types::*;
}

/// Metadata of every compliance detector.
#[must_use]
pub fn detectors() -> Vec<DetectorMetadata> {
    vec![
        smurfing::SmurfingDetector::new().metadata().clone(),
        shell::ShellChainDetector::new().metadata().clone(),
        distribution::DistributionAnalyzer::new().metadata().clone(),
        scoring::ScoreAggregator::new().metadata().clone(),
    ]
}

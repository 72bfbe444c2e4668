//! # flowtrace Core
//!
//! Core abstractions shared by the flowtrace detector crates.
//!
//! This crate provides:
//! - The `EngineError` type and `Result` alias
//! - Engine configuration with TOML and environment loading
//! - Logging setup on `tracing-subscriber`
//! - Pattern tags, ring patterns and processing notes
//! - Detector metadata and the detector/batch traits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod notes;
pub mod pattern;
pub mod traits;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        CommunityConfig, CycleConfig, DampenerConfig, DistributionConfig, EdgeWeighting,
        EngineConfig, InfluenceConfig, PatternWeights, ScoringConfig, ShellConfig,
        SmurfingConfig, VisualizationConfig,
    };
    pub use crate::detector::{DetectorFamily, DetectorMetadata};
    pub use crate::error::{EngineError, Result};
    pub use crate::logging::{LogConfig, LogLevel};
    pub use crate::notes::{NoteKind, ProcessingNote, Subsystem};
    pub use crate::pattern::{PatternSet, PatternTag, RingPattern};
    pub use crate::traits::{BatchAnalyzer, Detector};
}

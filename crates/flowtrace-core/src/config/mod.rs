//! Engine configuration.
//!
//! One `EngineConfig` carries every detector threshold, the scoring weights,
//! the dampener rules and the logging setup. Sections default individually,
//! so a TOML file only needs the values it changes.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowtrace_core::config::EngineConfig;
//!
//! // Load from environment
//! let config = EngineConfig::from_env()?;
//!
//! // Or load from file
//! let config = EngineConfig::from_file("flowtrace.toml")?;
//! config.validate()?;
//! ```

mod detectors;

pub use detectors::{
    CommunityConfig, CycleConfig, DampenerConfig, DistributionConfig, EdgeWeighting,
    InfluenceConfig, PatternWeights, ScoringConfig, ShellConfig, SmurfingConfig,
    VisualizationConfig,
};

use crate::error::{EngineError, Result};
use crate::logging::{LogConfig, LogLevel};
use crate::pattern::PatternTag;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable selecting the preset.
pub const ENV_PRESET: &str = "FLOWTRACE_ENV";

/// Unified engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run the detectors concurrently
    pub parallel: bool,
    /// Cycle detector
    pub cycles: CycleConfig,
    /// Smurfing detector
    pub smurfing: SmurfingConfig,
    /// Shell-chain detector
    pub shell: ShellConfig,
    /// Influence analyzer
    pub influence: InfluenceConfig,
    /// Community detector
    pub community: CommunityConfig,
    /// Distribution analyzer
    pub distribution: DistributionConfig,
    /// Score aggregator
    pub scoring: ScoringConfig,
    /// False-positive dampener
    pub dampener: DampenerConfig,
    /// Visualization export
    pub visualization: VisualizationConfig,
    /// Logging
    pub logging: LogConfig,
}

impl EngineConfig {
    /// Create development configuration
    pub fn development() -> Self {
        Self {
            parallel: false,
            logging: LogConfig::development(),
            ..Default::default()
        }
    }

    /// Create production configuration
    pub fn production() -> Self {
        Self {
            parallel: true,
            logging: LogConfig::production(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let preset = std::env::var(ENV_PRESET).ok();
        let mut config = Self::preset(preset.as_deref().unwrap_or("development"))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Preset by name.
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "production" | "prod" => Ok(Self::production()),
            "development" | "dev" => Ok(Self::development()),
            other => Err(EngineError::config(format!(
                "unknown preset '{}', expected development or production",
                other
            ))),
        }
    }

    /// Apply `FLOWTRACE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = lookup("FLOWTRACE_PARALLEL") {
            self.parallel = parse_override("FLOWTRACE_PARALLEL", &val)?;
        }

        if let Some(val) = lookup("FLOWTRACE_LOG_LEVEL") {
            self.logging.level = val
                .parse::<LogLevel>()
                .map_err(|e| EngineError::config(format!("FLOWTRACE_LOG_LEVEL: {}", e)))?;
        }

        if let Some(val) = lookup("FLOWTRACE_LOG_JSON") {
            self.logging.structured = parse_override("FLOWTRACE_LOG_JSON", &val)?;
        }

        // Detector overrides
        if let Some(val) = lookup("FLOWTRACE_WINDOW_HOURS") {
            self.smurfing.window_hours = parse_override("FLOWTRACE_WINDOW_HOURS", &val)?;
        }

        if let Some(val) = lookup("FLOWTRACE_FAN_THRESHOLD") {
            self.smurfing.min_counterparties = parse_override("FLOWTRACE_FAN_THRESHOLD", &val)?;
        }

        if let Some(val) = lookup("FLOWTRACE_MAX_SCC_SIZE") {
            self.cycles.max_scc_size = parse_override("FLOWTRACE_MAX_SCC_SIZE", &val)?;
        }

        if let Some(val) = lookup("FLOWTRACE_DAMPENER") {
            self.dampener.enabled = parse_override("FLOWTRACE_DAMPENER", &val)?;
        }

        if let Some(val) = lookup("FLOWTRACE_GRAPH_MAX_NODES") {
            self.visualization.max_nodes = parse_override("FLOWTRACE_GRAPH_MAX_NODES", &val)?;
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::config(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| EngineError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml()?)
            .map_err(|e| EngineError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let c = &self.cycles;
        if c.min_length < 3 {
            return Err(EngineError::config("cycles.min_length must be at least 3"));
        }
        if c.max_length < c.min_length {
            return Err(EngineError::config(
                "cycles.max_length must not be below cycles.min_length",
            ));
        }
        if c.max_cycles_per_scc == 0 || c.fallback_step_budget == 0 {
            return Err(EngineError::config(
                "cycles.max_cycles_per_scc and cycles.fallback_step_budget must be positive",
            ));
        }

        if self.smurfing.window_hours == 0 {
            return Err(EngineError::config("smurfing.window_hours must be positive"));
        }
        if self.smurfing.min_counterparties < 2 {
            return Err(EngineError::config(
                "smurfing.min_counterparties must be at least 2",
            ));
        }

        let s = &self.shell;
        if s.min_tx_count == 0 || s.max_tx_count < s.min_tx_count {
            return Err(EngineError::config(
                "shell transaction count bounds must satisfy 1 <= min <= max",
            ));
        }
        if !(s.min_pass_through > 0.0 && s.min_pass_through <= s.max_pass_through) {
            return Err(EngineError::config(
                "shell pass-through bounds must satisfy 0 < min <= max",
            ));
        }
        if s.min_inbound_volume < 0.0 {
            return Err(EngineError::config("shell.min_inbound_volume must not be negative"));
        }
        if s.min_chain_hops < 2 || s.max_depth < s.min_chain_hops {
            return Err(EngineError::config(
                "shell chain bounds must satisfy 2 <= min_chain_hops <= max_depth",
            ));
        }

        let i = &self.influence;
        if !(i.damping > 0.0 && i.damping < 1.0) {
            return Err(EngineError::config("influence.damping must be in (0, 1)"));
        }
        if i.max_iterations == 0 || i.tolerance <= 0.0 {
            return Err(EngineError::config(
                "influence.max_iterations and influence.tolerance must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&i.source_percentile) {
            return Err(EngineError::config("influence.source_percentile must be in [0, 1]"));
        }

        if self.community.max_levels == 0 || self.community.max_sweeps == 0 {
            return Err(EngineError::config(
                "community.max_levels and community.max_sweeps must be positive",
            ));
        }

        let d = &self.distribution;
        if d.near_threshold_floor >= d.reporting_threshold {
            return Err(EngineError::config(
                "distribution.near_threshold_floor must be below reporting_threshold",
            ));
        }
        if d.benford_warning > d.benford_suspicious {
            return Err(EngineError::config(
                "distribution.benford_warning must not exceed benford_suspicious",
            ));
        }
        if d.velocity_window_minutes == 0 || d.velocity_min_events < 2 {
            return Err(EngineError::config(
                "distribution velocity window must be positive and velocity_min_events at least 2",
            ));
        }
        if d.account_window_hours == 0 {
            return Err(EngineError::config(
                "distribution.account_window_hours must be positive",
            ));
        }

        let sc = &self.scoring;
        if !(sc.max_score > 0.0 && sc.max_score <= 100.0) {
            return Err(EngineError::config("scoring.max_score must be in (0, 100]"));
        }
        for tag in PatternTag::ALL {
            let w = sc.weights.weight(*tag);
            if !(0.0..=100.0).contains(&w) {
                return Err(EngineError::config(format!(
                    "scoring weight for `{}` must be in [0, 100], got {}",
                    tag, w
                )));
            }
        }
        if !(0.0..=1.0).contains(&sc.ring_max_share) {
            return Err(EngineError::config("scoring.ring_max_share must be in [0, 1]"));
        }

        if !(0.0..=1.0).contains(&self.dampener.factor) {
            return Err(EngineError::config("dampener.factor must be in [0, 1]"));
        }

        if self.visualization.max_nodes == 0 {
            return Err(EngineError::config("visualization.max_nodes must be positive"));
        }

        Ok(())
    }

    /// Set parallel execution
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set logging configuration
    pub fn with_logging(mut self, config: LogConfig) -> Self {
        self.logging = config;
        self
    }

    /// Set dampener configuration
    pub fn with_dampener(mut self, config: DampenerConfig) -> Self {
        self.dampener = config;
        self
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, val: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse()
        .map_err(|e| EngineError::config(format!("{}: invalid value '{}': {}", key, val, e)))
}

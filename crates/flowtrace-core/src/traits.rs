//! Core analysis traits.
//!
//! - `Detector`: base trait for every analysis stage
//! - `BatchAnalyzer`: async request/response entry point for a whole run

use crate::detector::DetectorMetadata;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Base trait for analysis stages.
pub trait Detector: Send + Sync + Debug {
    /// Static description of the detector.
    fn metadata(&self) -> &DetectorMetadata;

    /// Detector id, shorthand for `metadata().id`.
    fn id(&self) -> &str {
        &self.metadata().id
    }
}

/// Batch analysis entry point.
///
/// Implemented by components that turn a complete input batch into a
/// complete result, with no state carried between calls.
#[async_trait]
pub trait BatchAnalyzer<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Run the analysis on `input`.
    async fn execute(&self, input: I) -> Result<O>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorFamily;

    #[derive(Debug)]
    struct CountingDetector {
        metadata: DetectorMetadata,
    }

    impl Detector for CountingDetector {
        fn metadata(&self) -> &DetectorMetadata {
            &self.metadata
        }
    }

    #[async_trait]
    impl BatchAnalyzer<Vec<u32>, usize> for CountingDetector {
        async fn execute(&self, input: Vec<u32>) -> Result<usize> {
            Ok(input.len())
        }
    }

    #[tokio::test]
    async fn test_batch_analyzer_execute() {
        let detector = CountingDetector {
            metadata: DetectorMetadata::new("test/count", DetectorFamily::Statistical),
        };
        assert_eq!(detector.id(), "test/count");
        assert_eq!(detector.execute(vec![1, 2, 3]).await.unwrap(), 3);
    }
}

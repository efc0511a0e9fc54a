//! Signal normalizers.
//!
//! Each normalizer turns one source's raw input into a `NormalizedSignal`
//! on the shared `(score -100..100, confidence 0..1)` scale for a horizon,
//! or explains why the source cannot contribute this cycle.

pub mod ml;
pub mod rl;
pub mod sentiment;
pub mod technical;

pub use ml::MlNormalizer;
pub use rl::RlNormalizer;
pub use sentiment::SentimentNormalizer;
pub use technical::TechnicalNormalizer;

use crate::error::SourceUnavailable;
use crate::types::{AggregationInput, Horizon, NormalizedSignal, SignalSource};

/// Trait for converting a source's raw input into the unified scale.
pub trait SignalNormalizer: Send + Sync {
    /// Source this normalizer produces.
    fn source(&self) -> SignalSource;

    /// Normalize the source's part of `input` for one horizon.
    fn normalize(
        &self,
        input: &AggregationInput,
        horizon: Horizon,
    ) -> Result<NormalizedSignal, SourceUnavailable>;
}

/// One normalizer per source, in canonical source order.
pub fn all_normalizers() -> Vec<Box<dyn SignalNormalizer>> {
    vec![
        Box::new(SentimentNormalizer),
        Box::new(TechnicalNormalizer::default()),
        Box::new(MlNormalizer),
        Box::new(RlNormalizer),
    ]
}

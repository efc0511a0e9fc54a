//! RL agent normalizer.

use super::SignalNormalizer;
use crate::error::SourceUnavailable;
use crate::types::{
    AggregationInput, Horizon, NormalizedSignal, RlSignal, SignalSource, SourceDetail,
};

/// Lowest confidence credited to an agent recommendation.
pub const CONFIDENCE_FLOOR: f64 = 0.3;

pub struct RlNormalizer;

impl SignalNormalizer for RlNormalizer {
    fn source(&self) -> SignalSource {
        SignalSource::Rl
    }

    fn normalize(
        &self,
        input: &AggregationInput,
        horizon: Horizon,
    ) -> Result<NormalizedSignal, SourceUnavailable> {
        normalize_rl(&input.rl_signals, horizon)
    }
}

/// Pass the agent's recommendation through.
///
/// A signal aimed at this horizon beats a horizon-less one; among equals the
/// latest entry wins.
pub fn normalize_rl(
    signals: &[RlSignal],
    horizon: Horizon,
) -> Result<NormalizedSignal, SourceUnavailable> {
    let signal = signals
        .iter()
        .rev()
        .find(|s| s.horizon == Some(horizon))
        .or_else(|| signals.iter().rev().find(|s| s.horizon.is_none()))
        .ok_or(SourceUnavailable::NoData)?;

    if !signal.confidence.is_finite() {
        return Err(SourceUnavailable::Invalid(
            "non-finite agent confidence".to_string(),
        ));
    }

    let confidence = signal.confidence.clamp(0.0, 1.0).max(CONFIDENCE_FLOOR);
    let score = signal.signal.direction() as f64 * confidence * 100.0;

    Ok(NormalizedSignal::new(
        SignalSource::Rl,
        horizon,
        score,
        confidence,
        SourceDetail::Rl {
            action: signal.signal,
            reported_confidence: signal.confidence,
        },
    ))
}

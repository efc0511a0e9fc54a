//! Technical indicator normalizer.

use std::borrow::Cow;

use super::SignalNormalizer;
use crate::error::SourceUnavailable;
use crate::services::technical::TechnicalEvaluator;
use crate::types::{
    AggregationInput, Horizon, NormalizedSignal, SignalSource, SourceDetail, TechnicalReading,
};

/// Passes technical readings through with a horizon-specific moving average.
///
/// Pre-computed readings on the input win; otherwise the OHLCV series (if
/// any) is evaluated locally.
#[derive(Default)]
pub struct TechnicalNormalizer {
    evaluator: TechnicalEvaluator,
}

impl TechnicalNormalizer {
    pub fn new(evaluator: TechnicalEvaluator) -> Self {
        Self { evaluator }
    }

    fn readings<'a>(&self, input: &'a AggregationInput) -> Cow<'a, [TechnicalReading]> {
        if !input.technical.is_empty() {
            return Cow::Borrowed(&input.technical);
        }
        match input.stock_series {
            Some(ref candles) => Cow::Owned(
                self.evaluator
                    .evaluate_series(candles, Horizon::LongTerm.technical_smoothing()),
            ),
            None => Cow::Owned(Vec::new()),
        }
    }
}

impl SignalNormalizer for TechnicalNormalizer {
    fn source(&self) -> SignalSource {
        SignalSource::Technical
    }

    fn normalize(
        &self,
        input: &AggregationInput,
        horizon: Horizon,
    ) -> Result<NormalizedSignal, SourceUnavailable> {
        if input.technical.is_empty() && input.stock_series.is_none() {
            return Err(SourceUnavailable::NoData);
        }
        smooth_readings(&self.readings(input), horizon)
    }
}

/// Average the most recent readings for a horizon.
pub fn smooth_readings(
    readings: &[TechnicalReading],
    horizon: Horizon,
) -> Result<NormalizedSignal, SourceUnavailable> {
    if readings.is_empty() {
        return Err(SourceUnavailable::NoData);
    }

    let mut valid: Vec<&TechnicalReading> = readings
        .iter()
        .filter(|r| r.score.is_finite() && r.confidence.is_finite())
        .collect();
    if valid.is_empty() {
        return Err(SourceUnavailable::Invalid(
            "no finite technical readings".to_string(),
        ));
    }

    valid.sort_by_key(|r| r.timestamp);
    let window = horizon.technical_smoothing().min(valid.len());
    let recent = &valid[valid.len() - window..];

    let score = recent.iter().map(|r| r.score.clamp(-100.0, 100.0)).sum::<f64>() / window as f64;
    let confidence =
        recent.iter().map(|r| r.confidence.clamp(0.0, 1.0)).sum::<f64>() / window as f64;

    Ok(NormalizedSignal::new(
        SignalSource::Technical,
        horizon,
        score,
        confidence,
        SourceDetail::Technical {
            readings_used: window,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OhlcPoint;
    use chrono::Utc;

    fn reading(score: f64, confidence: f64, timestamp: i64) -> TechnicalReading {
        TechnicalReading {
            score,
            confidence,
            timestamp,
        }
    }

    #[test]
    fn test_hourly_uses_latest_reading_only() {
        let readings = vec![reading(-40.0, 0.5, 2), reading(80.0, 0.9, 3), reading(10.0, 0.2, 1)];
        let signal = smooth_readings(&readings, Horizon::Hourly).unwrap();
        assert_eq!(signal.score, 80.0);
        assert_eq!(signal.confidence, 0.9);
    }

    #[test]
    fn test_daily_averages_three_readings() {
        let readings = vec![
            reading(10.0, 0.3, 1),
            reading(20.0, 0.6, 2),
            reading(30.0, 0.6, 3),
            reading(40.0, 0.9, 4),
        ];
        let signal = smooth_readings(&readings, Horizon::Daily).unwrap();
        assert!((signal.score - 30.0).abs() < 1e-9);
        assert!((signal.confidence - 0.7).abs() < 1e-9);
        assert_eq!(signal.detail, SourceDetail::Technical { readings_used: 3 });
    }

    #[test]
    fn test_short_series_uses_what_is_there() {
        let readings = vec![reading(50.0, 0.5, 1)];
        let signal = smooth_readings(&readings, Horizon::LongTerm).unwrap();
        assert_eq!(signal.score, 50.0);
    }

    #[test]
    fn test_non_finite_readings_dropped() {
        let readings = vec![reading(f64::NAN, 0.5, 1), reading(20.0, 0.4, 0)];
        let signal = smooth_readings(&readings, Horizon::Hourly).unwrap();
        assert_eq!(signal.score, 20.0);

        let readings = vec![reading(f64::NAN, 0.5, 1)];
        assert!(matches!(
            smooth_readings(&readings, Horizon::Hourly),
            Err(SourceUnavailable::Invalid(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let readings = vec![reading(250.0, 3.0, 1)];
        let signal = smooth_readings(&readings, Horizon::Hourly).unwrap();
        assert_eq!(signal.score, 100.0);
        assert_eq!(signal.confidence, 1.0);
    }

    #[test]
    fn test_missing_input_is_no_data() {
        let input = AggregationInput::new(Utc::now(), 100.0);
        let result = TechnicalNormalizer::default().normalize(&input, Horizon::Daily);
        assert_eq!(result, Err(SourceUnavailable::NoData));
    }

    #[test]
    fn test_short_stock_series_yields_no_data() {
        let mut input = AggregationInput::new(Utc::now(), 100.0);
        input.stock_series = Some(vec![OhlcPoint {
            time: 0,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: None,
        }]);
        let result = TechnicalNormalizer::default().normalize(&input, Horizon::Daily);
        assert_eq!(result, Err(SourceUnavailable::NoData));
    }
}

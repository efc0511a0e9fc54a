//! Technical evaluator.
//!
//! Reduces an OHLCV series to `TechnicalReading`s by averaging a fixed set
//! of indicator scores. Used when the caller supplies candles instead of
//! pre-computed readings.

pub mod indicators;

use tracing::trace;

use crate::types::{OhlcPoint, TechnicalReading};
use indicators::{BollingerBands, Macd, Rsi, Sma};

/// Output from a single indicator calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    /// Indicator name (e.g., "RSI (14)").
    pub name: String,
    /// Raw indicator value.
    pub value: f64,
    /// Score from -100 (bearish) to +100 (bullish).
    pub score: f64,
}

/// Trait for implementing technical indicators.
pub trait Indicator: Send + Sync {
    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Minimum number of candles required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the indicator from candle data.
    /// Returns None if there is not enough data or the math breaks down.
    fn calculate(&self, candles: &[OhlcPoint]) -> Option<IndicatorOutput>;
}

/// Helper to create an IndicatorOutput with a clamped score.
pub fn make_output(name: &str, value: f64, score: f64) -> Option<IndicatorOutput> {
    if !value.is_finite() || !score.is_finite() {
        return None;
    }
    Some(IndicatorOutput {
        name: name.to_string(),
        value,
        score: score.clamp(-100.0, 100.0),
    })
}

/// Combines indicators into a single directional reading.
pub struct TechnicalEvaluator {
    indicators: Vec<Box<dyn Indicator>>,
}

impl Default for TechnicalEvaluator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(Rsi::default()),
            Box::new(Macd::default()),
            Box::new(Sma::new(20)),
            Box::new(BollingerBands::default()),
        ])
    }
}

impl TechnicalEvaluator {
    pub fn new(indicators: Vec<Box<dyn Indicator>>) -> Self {
        Self { indicators }
    }

    /// Evaluate the series as of its last candle.
    ///
    /// Score is the mean indicator score; confidence is the share of
    /// indicators pointing the same way as that mean.
    pub fn evaluate(&self, candles: &[OhlcPoint]) -> Option<TechnicalReading> {
        let last = candles.last()?;
        let outputs: Vec<IndicatorOutput> = self
            .indicators
            .iter()
            .filter(|i| candles.len() >= i.min_periods())
            .filter_map(|i| {
                let output = i.calculate(candles);
                if output.is_none() {
                    trace!("Indicator {} produced no value", i.id());
                }
                output
            })
            .collect();

        if outputs.is_empty() {
            return None;
        }

        let score = outputs.iter().map(|o| o.score).sum::<f64>() / outputs.len() as f64;
        let agreeing = outputs
            .iter()
            .filter(|o| o.score.signum() == score.signum() && o.score != 0.0)
            .count();
        let confidence = if score == 0.0 {
            0.0
        } else {
            agreeing as f64 / outputs.len() as f64
        };

        Some(TechnicalReading {
            score,
            confidence,
            timestamp: last.time,
        })
    }

    /// Evaluate the trailing `count` window ends, oldest first.
    pub fn evaluate_series(&self, candles: &[OhlcPoint], count: usize) -> Vec<TechnicalReading> {
        let start = candles.len().saturating_sub(count);
        (start..candles.len())
            .filter_map(|end| self.evaluate(&candles[..=end]))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::OhlcPoint;

    /// Steadily rising closes.
    pub fn uptrend(count: usize) -> Vec<OhlcPoint> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64 * 1.5;
                OhlcPoint {
                    time: 1_000_000 + i as i64 * 60_000,
                    open: base,
                    high: base + 2.0,
                    low: base - 1.0,
                    close: base + 1.0,
                    volume: Some(1000.0),
                }
            })
            .collect()
    }

    /// Steadily falling closes.
    pub fn downtrend(count: usize) -> Vec<OhlcPoint> {
        (0..count)
            .map(|i| {
                let base = 200.0 - i as f64 * 1.5;
                OhlcPoint {
                    time: 1_000_000 + i as i64 * 60_000,
                    open: base,
                    high: base + 1.0,
                    low: base - 2.0,
                    close: base - 1.0,
                    volume: Some(1000.0),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{downtrend, uptrend};
    use super::*;

    #[test]
    fn test_evaluate_empty_series() {
        let evaluator = TechnicalEvaluator::default();
        assert!(evaluator.evaluate(&[]).is_none());
        assert!(evaluator.evaluate_series(&[], 5).is_empty());
    }

    #[test]
    fn test_evaluate_reading_in_range() {
        let evaluator = TechnicalEvaluator::default();
        for candles in [uptrend(60), downtrend(60)] {
            let reading = evaluator.evaluate(&candles).unwrap();
            assert!(reading.score >= -100.0 && reading.score <= 100.0);
            assert!(reading.confidence >= 0.0 && reading.confidence <= 1.0);
            assert_eq!(reading.timestamp, candles.last().unwrap().time);
        }
    }

    #[test]
    fn test_evaluate_series_length_and_order() {
        let evaluator = TechnicalEvaluator::default();
        let candles = uptrend(60);
        let readings = evaluator.evaluate_series(&candles, 10);
        assert_eq!(readings.len(), 10);
        assert!(readings.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_short_series_skips_long_indicators() {
        // Enough for SMA(20) and Bollinger(20) but not MACD.
        let evaluator = TechnicalEvaluator::default();
        let reading = evaluator.evaluate(&uptrend(22));
        assert!(reading.is_some());
    }
}

//! Relative Strength Index (RSI) indicator.

use crate::services::technical::{make_output, Indicator, IndicatorOutput};
use crate::types::OhlcPoint;

/// RSI (Relative Strength Index) indicator.
///
/// Compares the magnitude of recent gains to recent losses (0-100).
/// Below 30 reads as oversold (bullish), above 70 as overbought (bearish).
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// Wilder-smoothed RSI over the closes.
    fn value(&self, candles: &[OhlcPoint]) -> Option<f64> {
        if candles.len() < self.period + 1 {
            return None;
        }

        let changes: Vec<f64> = candles.windows(2).map(|w| w[1].close - w[0].close).collect();
        let n = self.period as f64;

        let (mut avg_gain, mut avg_loss) = changes[..self.period]
            .iter()
            .fold((0.0, 0.0), |(g, l), c| (g + c.max(0.0), l + (-c).max(0.0)));
        avg_gain /= n;
        avg_loss /= n;

        for c in &changes[self.period..] {
            avg_gain = (avg_gain * (n - 1.0) + c.max(0.0)) / n;
            avg_loss = (avg_loss * (n - 1.0) + (-c).max(0.0)) / n;
        }

        if avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn id(&self) -> &str {
        "rsi"
    }

    fn name(&self) -> &str {
        "RSI"
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<IndicatorOutput> {
        let rsi = self.value(candles)?;

        // 30 and below → +100 at 0, 70 and above → -100 at 100, linear between.
        let score = if rsi <= 30.0 {
            (30.0 - rsi) / 30.0 * 100.0
        } else if rsi >= 70.0 {
            -(rsi - 70.0) / 30.0 * 100.0
        } else {
            (50.0 - rsi) / 20.0 * 50.0
        };

        make_output(self.name(), rsi, score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::technical::test_support::{downtrend, uptrend};

    #[test]
    fn test_rsi_min_periods() {
        assert_eq!(Rsi::default().min_periods(), 15);
        assert_eq!(Rsi::new(7).min_periods(), 8);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        assert!(Rsi::default().calculate(&uptrend(10)).is_none());
    }

    #[test]
    fn test_rsi_uptrend_is_overbought() {
        let output = Rsi::default().calculate(&uptrend(50)).unwrap();
        assert!(output.value > 70.0, "RSI in uptrend should be > 70, got {}", output.value);
        assert!(output.score < 0.0);
    }

    #[test]
    fn test_rsi_downtrend_is_oversold() {
        let output = Rsi::default().calculate(&downtrend(50)).unwrap();
        assert!(output.value < 30.0, "RSI in downtrend should be < 30, got {}", output.value);
        assert!(output.score > 0.0);
    }

    #[test]
    fn test_rsi_value_range() {
        let output = Rsi::default().calculate(&downtrend(50)).unwrap();
        assert!(output.value >= 0.0 && output.value <= 100.0);
        assert!(output.score >= -100.0 && output.score <= 100.0);
    }
}

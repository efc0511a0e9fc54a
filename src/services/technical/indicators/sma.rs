//! Simple Moving Average (SMA) indicator.

use crate::services::technical::{make_output, Indicator, IndicatorOutput};
use crate::types::OhlcPoint;

/// Price position relative to its simple moving average.
///
/// Above the average is bullish, below is bearish; a 5% gap is full scale.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }
}

impl Indicator for Sma {
    fn id(&self) -> &str {
        "sma"
    }

    fn name(&self) -> &str {
        "SMA"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<IndicatorOutput> {
        if candles.len() < self.period {
            return None;
        }

        let window = &candles[candles.len() - self.period..];
        let sma = window.iter().map(|c| c.close).sum::<f64>() / self.period as f64;
        if sma <= 0.0 {
            return None;
        }

        let price = candles.last()?.close;
        let pct_diff = (price - sma) / sma * 100.0;

        make_output(self.name(), sma, pct_diff * 20.0)
    }
}

//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema_series;
use crate::services::technical::{make_output, Indicator, IndicatorOutput};
use crate::types::OhlcPoint;

/// MACD indicator.
///
/// - MACD line = EMA(fast) - EMA(slow)
/// - Signal line = EMA(signal) of the MACD line
/// - Histogram = MACD line - signal line
///
/// Score follows the histogram in basis points of price, flipped when the
/// histogram is shrinking.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Indicator for Macd {
    fn id(&self) -> &str {
        "macd"
    }

    fn name(&self) -> &str {
        "MACD"
    }

    fn min_periods(&self) -> usize {
        self.slow_period + self.signal_period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<IndicatorOutput> {
        if candles.len() < self.min_periods() {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let fast = ema_series(&closes, self.fast_period);
        let slow = ema_series(&closes, self.slow_period);

        // The fast EMA starts earlier; line them up on the same candles.
        let offset = self.slow_period - self.fast_period;
        let macd_line: Vec<f64> = fast
            .iter()
            .skip(offset)
            .zip(slow.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = ema_series(&macd_line, self.signal_period);
        if signal_line.len() < 2 {
            return None;
        }

        // Align the tail of the MACD line with the signal line.
        let lag = macd_line.len() - signal_line.len();
        let histogram: Vec<f64> = macd_line[lag..]
            .iter()
            .zip(signal_line.iter())
            .map(|(m, s)| m - s)
            .collect();

        let current = *histogram.last()?;
        let previous = histogram[histogram.len() - 2];
        let momentum = if current >= previous { 1.0 } else { -1.0 };

        let price = candles.last()?.close;
        if price <= 0.0 {
            return None;
        }
        let basis_points = current / price * 10_000.0;

        make_output(self.name(), current, basis_points * momentum)
    }
}

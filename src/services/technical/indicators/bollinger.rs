//! Bollinger Bands indicator.

use crate::services::technical::{make_output, Indicator, IndicatorOutput};
use crate::types::OhlcPoint;

/// Bollinger Bands indicator.
///
/// Middle band is SMA(period); outer bands sit `std_dev_multiplier` standard
/// deviations away. Price near the lower band reads as oversold (bullish),
/// near the upper band as overbought (bearish).
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

impl Indicator for BollingerBands {
    fn id(&self) -> &str {
        "bollinger"
    }

    fn name(&self) -> &str {
        "Bollinger Bands"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[OhlcPoint]) -> Option<IndicatorOutput> {
        if self.period == 0 || candles.len() < self.period {
            return None;
        }

        let closes: Vec<f64> = candles[candles.len() - self.period..]
            .iter()
            .map(|c| c.close)
            .collect();
        let middle = closes.iter().sum::<f64>() / closes.len() as f64;
        let variance =
            closes.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / closes.len() as f64;
        let half_width = self.std_dev_multiplier * variance.sqrt();

        let price = candles.last()?.close;

        // %B: 0 at the lower band, 1 at the upper band.
        let percent_b = if half_width > 0.0 {
            (price - (middle - half_width)) / (2.0 * half_width)
        } else {
            0.5
        };

        make_output(self.name(), percent_b, (0.5 - percent_b) * 200.0)
    }
}

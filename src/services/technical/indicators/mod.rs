//! Indicator implementations used by the technical evaluator.

pub mod bollinger;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::BollingerBands;
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::Sma;

/// Exponential moving average of `values`, seeded with the SMA of the first
/// `period` values. Empty when there is not enough data.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for v in &values[period..] {
        prev += (v - prev) * k;
        out.push(prev);
    }
    out
}

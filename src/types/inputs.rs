//! Raw per-source inputs for one aggregation cycle.
//!
//! Everything here is already fetched by the caller; the engine performs no
//! I/O while aggregating.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Horizon, SignalAction};

/// Output of the external sentiment classifier for one news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    /// Polarity from -1 (bearish) to +1 (bullish).
    pub polarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A classified news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub sentiment_result: SentimentResult,
    pub datetime: DateTime<Utc>,
}

impl NewsItem {
    pub fn new(polarity: f64, datetime: DateTime<Utc>) -> Self {
        Self {
            sentiment_result: SentimentResult {
                polarity,
                label: None,
            },
            datetime,
        }
    }
}

/// One point on the ML forecast path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Days ahead of the forecast origin.
    pub day: f64,
    pub predicted_price: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<f64>,
}

/// ML forecaster output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub predictions: Vec<ForecastPoint>,
}

/// OHLC (Open, High, Low, Close) data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcPoint {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// A technical evaluation already reduced to the unified scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalReading {
    /// Score from -100 to +100.
    pub score: f64,
    /// Confidence from 0 to 1.
    pub confidence: f64,
    /// Unix timestamp (milliseconds) of the candle this reading closes on.
    pub timestamp: i64,
}

/// Recommendation produced by the RL agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlSignal {
    pub signal: SignalAction,
    pub confidence: f64,
    /// Horizon the agent targeted; `None` applies to every horizon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon: Option<Horizon>,
}

/// Everything one aggregation cycle consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationInput {
    /// Reference time for recency weighting.
    pub as_of: DateTime<Utc>,
    pub current_price: f64,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
    /// Raw OHLCV candles; evaluated locally when `technical` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_series: Option<Vec<OhlcPoint>>,
    /// Pre-computed technical readings, oldest first.
    #[serde(default)]
    pub technical: Vec<TechnicalReading>,
    #[serde(default)]
    pub rl_signals: Vec<RlSignal>,
}

impl AggregationInput {
    /// An input with only a reference time and price.
    pub fn new(as_of: DateTime<Utc>, current_price: f64) -> Self {
        Self {
            as_of,
            current_price,
            news: Vec::new(),
            forecast: None,
            stock_series: None,
            technical: Vec::new(),
            rl_signals: Vec::new(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance allowed on the sum of a weight set.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// One origin of directional opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Sentiment,
    Technical,
    Ml,
    Rl,
}

impl SignalSource {
    /// All sources in canonical order.
    pub const ALL: [SignalSource; 4] = [
        SignalSource::Sentiment,
        SignalSource::Technical,
        SignalSource::Ml,
        SignalSource::Rl,
    ];

    /// Get display name for this source.
    pub fn name(&self) -> &'static str {
        match self {
            SignalSource::Sentiment => "News sentiment",
            SignalSource::Technical => "Technical indicators",
            SignalSource::Ml => "ML forecast",
            SignalSource::Rl => "RL agent",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalSource::Sentiment => "sentiment",
            SignalSource::Technical => "technical",
            SignalSource::Ml => "ml",
            SignalSource::Rl => "rl",
        };
        write!(f, "{}", s)
    }
}

/// Analysis window over which a signal is computed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Horizon {
    Hourly,
    Daily,
    Weekly,
    LongTerm,
}

impl Horizon {
    /// All horizons, shortest first.
    pub const ALL: [Horizon; 4] = [
        Horizon::Hourly,
        Horizon::Daily,
        Horizon::Weekly,
        Horizon::LongTerm,
    ];

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hourly" | "short" | "1h" => Some(Self::Hourly),
            "daily" | "1d" => Some(Self::Daily),
            "weekly" | "1w" => Some(Self::Weekly),
            "longterm" | "long_term" | "long" => Some(Self::LongTerm),
            _ => None,
        }
    }

    /// Stable identifier, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::LongTerm => "longTerm",
        }
    }

    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hourly => "Hourly",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::LongTerm => "Long-term",
        }
    }

    /// Lookback window for news sentiment, in seconds.
    pub fn sentiment_lookback_secs(&self) -> i64 {
        match self {
            Self::Hourly => 6 * 3600,
            Self::Daily => 24 * 3600,
            Self::Weekly => 7 * 86_400,
            Self::LongTerm => 30 * 86_400,
        }
    }

    /// Number of technical readings averaged for this horizon.
    pub fn technical_smoothing(&self) -> usize {
        match self {
            Self::Hourly => 1,
            Self::Daily => 3,
            Self::Weekly => 5,
            Self::LongTerm => 10,
        }
    }

    /// Forecast distance (in days) that best represents this horizon.
    pub fn forecast_target_day(&self) -> f64 {
        match self {
            // The forecaster's resolution is one day, so the nearest point wins.
            Self::Hourly => 1.0 / 24.0,
            Self::Daily => 1.0,
            Self::Weekly => 7.0,
            Self::LongTerm => 30.0,
        }
    }

    /// Forecast price move (percent) that maps to a full-scale score.
    pub fn forecast_full_scale_pct(&self) -> f64 {
        match self {
            Self::Hourly => 1.0,
            Self::Daily => 2.0,
            Self::Weekly => 5.0,
            Self::LongTerm => 10.0,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Source-specific debug payload attached to a normalized signal.
///
/// Carried for explainability only; the aggregator never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceDetail {
    #[serde(rename_all = "camelCase")]
    Sentiment {
        items_used: usize,
        mean_polarity: f64,
    },
    #[serde(rename_all = "camelCase")]
    Technical { readings_used: usize },
    #[serde(rename_all = "camelCase")]
    Ml {
        forecast_day: f64,
        predicted_price: f64,
        change_pct: f64,
    },
    #[serde(rename_all = "camelCase")]
    Rl { action: SignalAction, reported_confidence: f64 },
}

/// A source's output for one horizon, on the unified scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSignal {
    pub source: SignalSource,
    pub horizon: Horizon,
    /// Directional score from -100 (strong sell) to +100 (strong buy).
    pub score: f64,
    /// Confidence from 0 to 1.
    pub confidence: f64,
    pub detail: SourceDetail,
}

impl NormalizedSignal {
    /// Create a signal, clamping score and confidence into range.
    pub fn new(
        source: SignalSource,
        horizon: Horizon,
        score: f64,
        confidence: f64,
        detail: SourceDetail,
    ) -> Self {
        Self {
            source,
            horizon,
            score: clamp_score(score),
            confidence: confidence.clamp(0.0, 1.0),
            detail,
        }
    }

    /// Direction of the score: 1, -1, or 0 for neutral.
    pub fn direction(&self) -> i8 {
        direction_of(self.score)
    }
}

/// Relative trust assigned to each source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub ml: f64,
    pub rl: f64,
    pub sentiment: f64,
    pub technical: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self::equal()
    }
}

impl SignalWeights {
    /// Create a weight set from explicit values (not normalized).
    pub fn new(sentiment: f64, technical: f64, ml: f64, rl: f64) -> Self {
        Self {
            ml,
            rl,
            sentiment,
            technical,
        }
    }

    /// Equal trust in every source.
    pub fn equal() -> Self {
        Self::new(0.25, 0.25, 0.25, 0.25)
    }

    /// Get the weight for a source.
    pub fn get(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::Sentiment => self.sentiment,
            SignalSource::Technical => self.technical,
            SignalSource::Ml => self.ml,
            SignalSource::Rl => self.rl,
        }
    }

    /// Set the weight for a source.
    pub fn set(&mut self, source: SignalSource, value: f64) {
        match source {
            SignalSource::Sentiment => self.sentiment = value,
            SignalSource::Technical => self.technical = value,
            SignalSource::Ml => self.ml = value,
            SignalSource::Rl => self.rl = value,
        }
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        SignalSource::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Whether every weight is in [0, 1] and the sum is within tolerance of 1.
    pub fn is_valid(&self) -> bool {
        SignalSource::ALL
            .iter()
            .all(|s| (0.0..=1.0).contains(&self.get(*s)))
            && (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Replace non-finite or negative weights with zero.
    pub fn sanitized(&self) -> Self {
        let mut out = *self;
        for source in SignalSource::ALL {
            let w = self.get(source);
            out.set(source, if w.is_finite() && w > 0.0 { w } else { 0.0 });
        }
        out
    }

    /// Scale weights so they sum to 1. Falls back to equal weights when
    /// nothing positive remains.
    pub fn normalized(&self) -> Self {
        let clean = self.sanitized();
        let total = clean.sum();
        if total <= f64::EPSILON {
            return Self::equal();
        }
        let mut out = clean;
        for source in SignalSource::ALL {
            out.set(source, clean.get(source) / total);
        }
        out
    }

    /// Largest absolute per-source difference to another weight set.
    pub fn max_abs_diff(&self, other: &SignalWeights) -> f64 {
        SignalSource::ALL
            .iter()
            .map(|s| (self.get(*s) - other.get(*s)).abs())
            .fold(0.0, f64::max)
    }
}

/// Which sources a trader wants considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalSourceConfig {
    pub enable_sentiment: bool,
    pub enable_technical: bool,
    #[serde(rename = "enableMLPrediction")]
    pub enable_ml_prediction: bool,
    #[serde(rename = "enableRLAgents")]
    pub enable_rl_agents: bool,
}

impl Default for SignalSourceConfig {
    fn default() -> Self {
        Self {
            enable_sentiment: true,
            enable_technical: true,
            enable_ml_prediction: true,
            enable_rl_agents: true,
        }
    }
}

impl SignalSourceConfig {
    /// Check whether a source is enabled.
    pub fn is_enabled(&self, source: SignalSource) -> bool {
        match source {
            SignalSource::Sentiment => self.enable_sentiment,
            SignalSource::Technical => self.enable_technical,
            SignalSource::Ml => self.enable_ml_prediction,
            SignalSource::Rl => self.enable_rl_agents,
        }
    }

    /// Only the given source enabled.
    pub fn only(source: SignalSource) -> Self {
        Self {
            enable_sentiment: source == SignalSource::Sentiment,
            enable_technical: source == SignalSource::Technical,
            enable_ml_prediction: source == SignalSource::Ml,
            enable_rl_agents: source == SignalSource::Rl,
        }
    }
}

/// How many sources share the majority direction for a horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Conflicting,
    Weak,
    Moderate,
    Strong,
}

impl Agreement {
    /// Multiplier applied to the weighted source confidence.
    pub fn confidence_factor(&self) -> f64 {
        match self {
            Agreement::Strong => 1.0,
            Agreement::Moderate => 0.8,
            Agreement::Weak => 0.5,
            Agreement::Conflicting => 0.25,
        }
    }

    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            Agreement::Strong => "strong",
            Agreement::Moderate => "moderate",
            Agreement::Weak => "weak",
            Agreement::Conflicting => "conflicting",
        }
    }
}

/// One source's stance relative to the horizon's majority direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAgreement {
    Agrees,
    Disagrees,
    Neutral,
}

/// How a source was weighted in one horizon's aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalContribution {
    pub source: SignalSource,
    pub score: f64,
    pub confidence: f64,
    /// Configured weight renormalized over the sources available this cycle.
    pub weight: f64,
    /// Weight after damping for disagreement; never above `weight`.
    pub effective_weight: f64,
    pub agreement: SourceAgreement,
    pub detail: SourceDetail,
}

/// Discrete action for one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            SignalAction::Buy => "Buy",
            SignalAction::Sell => "Sell",
            SignalAction::Hold => "Hold",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Hold => "hold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(SignalAction::Buy),
            "sell" => Some(SignalAction::Sell),
            "hold" => Some(SignalAction::Hold),
            _ => None,
        }
    }

    /// +1 for buy, -1 for sell, 0 for hold.
    pub fn direction(&self) -> i8 {
        match self {
            SignalAction::Buy => 1,
            SignalAction::Sell => -1,
            SignalAction::Hold => 0,
        }
    }
}

/// The externally visible result for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSignal {
    pub signal: SignalAction,
    /// Weighted score from -100 to +100.
    pub score: f64,
    /// Overall confidence from 0 to 1.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<Agreement>,
    pub reasoning: String,
}

impl TradingSignal {
    /// Terminal state for a horizon without any usable source.
    pub fn no_data() -> Self {
        Self {
            signal: SignalAction::Hold,
            score: 0.0,
            confidence: 0.0,
            agreement: None,
            reasoning: "no data".to_string(),
        }
    }
}

/// Aggregate market stance across horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Dispersion of the sources' opinions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityIndicator {
    Low,
    Medium,
    High,
}

impl VolatilityIndicator {
    /// Classify a score standard deviation.
    pub fn from_dispersion(std_dev: f64) -> Self {
        if std_dev < 20.0 {
            VolatilityIndicator::Low
        } else if std_dev < 45.0 {
            VolatilityIndicator::Medium
        } else {
            VolatilityIndicator::High
        }
    }
}

/// All four horizon signals from one aggregation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedSignalResult {
    pub hourly: TradingSignal,
    pub daily: TradingSignal,
    pub weekly: TradingSignal,
    pub long_term: TradingSignal,
    pub overall_bias: OverallBias,
    pub volatility_indicator: VolatilityIndicator,
    pub data_sources_used: Vec<SignalSource>,
    /// Mean polarity (-1 to 1) of every valid news item supplied.
    pub avg_sentiment: f64,
    pub news_count: usize,
    pub contributions: BTreeMap<Horizon, Vec<SignalContribution>>,
    pub generated_at: DateTime<Utc>,
}

impl CombinedSignalResult {
    /// Get the signal for a horizon.
    pub fn signal(&self, horizon: Horizon) -> &TradingSignal {
        match horizon {
            Horizon::Hourly => &self.hourly,
            Horizon::Daily => &self.daily,
            Horizon::Weekly => &self.weekly,
            Horizon::LongTerm => &self.long_term,
        }
    }

    /// Get the contributions recorded for a horizon.
    pub fn contributions_for(&self, horizon: Horizon) -> &[SignalContribution] {
        self.contributions
            .get(&horizon)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Clamp a score into [-100, 100].
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(-100.0, 100.0)
}

/// Sign of a score as -1, 0 or 1.
pub fn direction_of(score: f64) -> i8 {
    if score > 0.0 {
        1
    } else if score < 0.0 {
        -1
    } else {
        0
    }
}

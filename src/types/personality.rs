//! Trader personality: the stored configuration the engine reads each cycle.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{SignalSourceConfig, SignalWeights, WEIGHT_SUM_TOLERANCE};

const MIN_SAMPLES_RANGE: (u32, u32) = (1, 500);
const CHECK_INTERVAL_RANGE: (u64, u64) = (10, 86_400);

/// Minimum number of sources that must confirm an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationLevel {
    /// At least 2 of 4 sources.
    Weak,
    /// At least 3 of 4 sources.
    Moderate,
    /// All 4 sources.
    Strong,
}

impl ConfirmationLevel {
    /// Sources that must share the action's direction.
    pub fn required_sources(&self) -> usize {
        match self {
            ConfirmationLevel::Weak => 2,
            ConfirmationLevel::Moderate => 3,
            ConfirmationLevel::Strong => 4,
        }
    }
}

/// How signals are combined and gated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalSettings {
    pub weights: SignalWeights,
    /// Minimum overall confidence (0-1) for a non-hold action.
    pub min_agreement: f64,
    pub require_multiple_confirmation: bool,
    pub min_signal_agreement: ConfirmationLevel,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            weights: SignalWeights::equal(),
            min_agreement: 0.5,
            require_multiple_confirmation: false,
            min_signal_agreement: ConfirmationLevel::Moderate,
        }
    }
}

/// Adaptive weight learning switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningSettings {
    pub enabled: bool,
    /// When false, accuracy is tracked but weights are never rewritten.
    pub update_weights: bool,
    /// Unconsumed outcomes required before an adjustment pass.
    pub min_samples: u32,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            update_weights: true,
            min_samples: 5,
        }
    }
}

/// A trader's full configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraderPersonality {
    pub signals: SignalSettings,
    pub sources: SignalSourceConfig,
    pub learning: LearningSettings,
    /// Seconds between scheduled aggregation cycles.
    pub check_interval_seconds: u64,
}

impl Default for TraderPersonality {
    fn default() -> Self {
        Self::balanced()
    }
}

impl TraderPersonality {
    /// Middle-of-the-road defaults.
    pub fn balanced() -> Self {
        Self {
            signals: SignalSettings::default(),
            sources: SignalSourceConfig::default(),
            learning: LearningSettings::default(),
            check_interval_seconds: 300,
        }
    }

    /// Demands broad agreement before acting and learns slowly.
    pub fn conservative() -> Self {
        Self {
            signals: SignalSettings {
                weights: SignalWeights::new(0.2, 0.3, 0.3, 0.2),
                min_agreement: 0.7,
                require_multiple_confirmation: true,
                min_signal_agreement: ConfirmationLevel::Moderate,
            },
            sources: SignalSourceConfig::default(),
            learning: LearningSettings {
                enabled: true,
                update_weights: true,
                min_samples: 10,
            },
            check_interval_seconds: 900,
        }
    }

    /// Acts on thin agreement and checks often.
    pub fn aggressive() -> Self {
        Self {
            signals: SignalSettings {
                weights: SignalWeights::new(0.3, 0.3, 0.2, 0.2),
                min_agreement: 0.35,
                require_multiple_confirmation: false,
                min_signal_agreement: ConfirmationLevel::Weak,
            },
            sources: SignalSourceConfig::default(),
            learning: LearningSettings {
                enabled: true,
                update_weights: true,
                min_samples: 5,
            },
            check_interval_seconds: 60,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "balanced" | "default" => Some(Self::balanced()),
            "conservative" => Some(Self::conservative()),
            "aggressive" => Some(Self::aggressive()),
            _ => None,
        }
    }

    /// Clamp out-of-range values and renormalize weights.
    ///
    /// Every correction is logged at warn level; none is surfaced as an error.
    pub fn validated(mut self, trader_id: &str) -> Self {
        let weights = self.signals.weights;
        let normalized = weights.normalized();
        if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE
            || weights.sanitized() != weights
        {
            warn!(
                "Trader {}: weights {:?} (sum {:.3}) renormalized to {:?}",
                trader_id,
                weights,
                weights.sum(),
                normalized
            );
        }
        self.signals.weights = normalized;

        let min_agreement = self.signals.min_agreement;
        let clamped = if min_agreement.is_finite() {
            min_agreement.clamp(0.0, 1.0)
        } else {
            SignalSettings::default().min_agreement
        };
        if clamped != min_agreement {
            warn!(
                "Trader {}: minAgreement {} out of range, using {}",
                trader_id, min_agreement, clamped
            );
        }
        self.signals.min_agreement = clamped;

        let (lo, hi) = MIN_SAMPLES_RANGE;
        let min_samples = self.learning.min_samples.clamp(lo, hi);
        if min_samples != self.learning.min_samples {
            warn!(
                "Trader {}: minSamples {} out of range, using {}",
                trader_id, self.learning.min_samples, min_samples
            );
        }
        self.learning.min_samples = min_samples;

        let (lo, hi) = CHECK_INTERVAL_RANGE;
        let interval = self.check_interval_seconds.clamp(lo, hi);
        if interval != self.check_interval_seconds {
            warn!(
                "Trader {}: checkIntervalSeconds {} out of range, using {}",
                trader_id, self.check_interval_seconds, interval
            );
        }
        self.check_interval_seconds = interval;

        self
    }
}

/// Partial signal settings for updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSignalSettings {
    /// Weights are replaced as a whole set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<SignalWeights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_agreement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_multiple_confirmation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_signal_agreement: Option<ConfirmationLevel>,
}

/// Partial source switches for updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_sentiment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_technical: Option<bool>,
    #[serde(rename = "enableMLPrediction", skip_serializing_if = "Option::is_none")]
    pub enable_ml_prediction: Option<bool>,
    #[serde(rename = "enableRLAgents", skip_serializing_if = "Option::is_none")]
    pub enable_rl_agents: Option<bool>,
}

/// Partial learning settings for updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialLearningSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_weights: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<u32>,
}

/// Partial personality for updates.
/// All fields are optional - only provided fields override the base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPersonality {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<PartialSignalSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<PartialSourceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning: Option<PartialLearningSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval_seconds: Option<u64>,
}

impl PartialPersonality {
    /// Merge onto a base personality, returning a new one.
    ///
    /// Set fields win; unset fields inherit from `base`.
    pub fn apply_to(&self, base: &TraderPersonality) -> TraderPersonality {
        let mut merged = base.clone();

        if let Some(ref signals) = self.signals {
            if let Some(weights) = signals.weights {
                merged.signals.weights = weights;
            }
            if let Some(min_agreement) = signals.min_agreement {
                merged.signals.min_agreement = min_agreement;
            }
            if let Some(require) = signals.require_multiple_confirmation {
                merged.signals.require_multiple_confirmation = require;
            }
            if let Some(level) = signals.min_signal_agreement {
                merged.signals.min_signal_agreement = level;
            }
        }

        if let Some(ref sources) = self.sources {
            if let Some(v) = sources.enable_sentiment {
                merged.sources.enable_sentiment = v;
            }
            if let Some(v) = sources.enable_technical {
                merged.sources.enable_technical = v;
            }
            if let Some(v) = sources.enable_ml_prediction {
                merged.sources.enable_ml_prediction = v;
            }
            if let Some(v) = sources.enable_rl_agents {
                merged.sources.enable_rl_agents = v;
            }
        }

        if let Some(ref learning) = self.learning {
            if let Some(v) = learning.enabled {
                merged.learning.enabled = v;
            }
            if let Some(v) = learning.update_weights {
                merged.learning.update_weights = v;
            }
            if let Some(v) = learning.min_samples {
                merged.learning.min_samples = v;
            }
        }

        if let Some(interval) = self.check_interval_seconds {
            merged.check_interval_seconds = interval;
        }

        merged
    }
}

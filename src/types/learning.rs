use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{direction_of, Horizon, SignalAction, SignalContribution, SignalSource, SignalWeights};

/// One source's share in a settled decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttribution {
    pub source: SignalSource,
    /// Effective weight the source had when the decision was made.
    pub effective_weight: f64,
    /// Whether the source's direction matched the realized move.
    pub correct: bool,
}

/// Realized result of a past decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub id: Uuid,
    pub trader_id: String,
    pub horizon: Horizon,
    pub action: SignalAction,
    pub attributions: Vec<SourceAttribution>,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub closed_at: DateTime<Utc>,
}

impl DecisionOutcome {
    /// Settle a decision from the contributions it was made with.
    ///
    /// The realized market direction is the action's direction when the
    /// position made money and the opposite when it lost. Neutral sources
    /// and flat outcomes attribute nothing.
    pub fn from_contributions(
        trader_id: &str,
        horizon: Horizon,
        action: SignalAction,
        contributions: &[SignalContribution],
        pnl: f64,
        pnl_percent: f64,
        closed_at: DateTime<Utc>,
    ) -> Self {
        let realized = action.direction() * direction_of(pnl_percent);

        let attributions = if realized == 0 {
            Vec::new()
        } else {
            contributions
                .iter()
                .filter(|c| direction_of(c.score) != 0 && c.effective_weight > 0.0)
                .map(|c| SourceAttribution {
                    source: c.source,
                    effective_weight: c.effective_weight,
                    correct: direction_of(c.score) == realized,
                })
                .collect()
        };

        Self {
            id: Uuid::new_v4(),
            trader_id: trader_id.to_string(),
            horizon,
            action,
            attributions,
            pnl,
            pnl_percent,
            closed_at,
        }
    }

    /// Whether the decision made money.
    pub fn profitable(&self) -> bool {
        self.pnl_percent > 0.0
    }
}

/// Why a weight set changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightChangeReason {
    AdaptiveLearning,
    Manual,
}

impl WeightChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightChangeReason::AdaptiveLearning => "adaptive_learning",
            WeightChangeReason::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "adaptive_learning" => Some(WeightChangeReason::AdaptiveLearning),
            "manual" => Some(WeightChangeReason::Manual),
            _ => None,
        }
    }
}

/// Append-only audit record of a weight change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightHistoryEntry {
    pub id: Uuid,
    pub trader_id: String,
    pub timestamp: DateTime<Utc>,
    pub old_weights: SignalWeights,
    pub new_weights: SignalWeights,
    pub reason: WeightChangeReason,
}

impl WeightHistoryEntry {
    pub fn new(
        trader_id: &str,
        old_weights: SignalWeights,
        new_weights: SignalWeights,
        reason: WeightChangeReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trader_id: trader_id.to_string(),
            timestamp: Utc::now(),
            old_weights,
            new_weights,
            reason,
        }
    }
}

/// Per-trader learner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerPhase {
    Idle,
    Accumulating,
    Adjusting,
}

/// Accuracy of one source over the outcomes consumed by a learning pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAccuracy {
    pub source: SignalSource,
    pub decisions: u32,
    pub attributed_weight: f64,
    pub correct_weight: f64,
    /// `correct_weight / attributed_weight`; `None` when nothing was attributed.
    pub accuracy: Option<f64>,
}

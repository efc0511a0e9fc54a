//! Adaptive weight learner.
//!
//! Tracks, per trader, how often each source pointed the right way in
//! settled decisions and shifts weight toward the more accurate sources.
//!
//! Phases: `Idle` until the first outcome, `Accumulating` while fewer than
//! `minSamples` outcomes are pending, `Adjusting` once enough have arrived.
//! An adjustment pass consumes every pending outcome and returns to `Idle`.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use crate::types::{
    DecisionOutcome, LearnerPhase, LearningSettings, SignalSource, SignalWeights, SourceAccuracy,
};

/// Largest change one adjustment pass may apply to any single weight.
pub const MAX_STEP: f64 = 0.05;

/// Adjustment never pushes a weight below this floor.
pub const MIN_WEIGHT: f64 = 0.05;

/// Upper bound on the factor applied to an accuracy gap.
pub const LEARNING_RATE: f64 = 0.2;

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    decisions: u32,
    attributed_weight: f64,
    correct_weight: f64,
}

/// Result of an adjustment pass, before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightAdjustment {
    pub old_weights: SignalWeights,
    pub new_weights: SignalWeights,
    pub accuracies: Vec<SourceAccuracy>,
    /// Pending outcomes this pass consumes.
    pub consumed: Vec<Uuid>,
}

impl WeightAdjustment {
    /// Whether the pass moved any weight.
    pub fn changed(&self) -> bool {
        self.old_weights.max_abs_diff(&self.new_weights) > 1e-9
    }
}

/// Per-trader learner state.
#[derive(Debug, Clone)]
pub struct AdaptiveWeightLearner {
    pending: Vec<DecisionOutcome>,
    tallies: BTreeMap<SignalSource, Tally>,
    phase: LearnerPhase,
}

impl Default for AdaptiveWeightLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveWeightLearner {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            tallies: BTreeMap::new(),
            phase: LearnerPhase::Idle,
        }
    }

    /// Rebuild state from outcomes that were stored but not yet consumed.
    pub fn from_pending(outcomes: Vec<DecisionOutcome>, settings: &LearningSettings) -> Self {
        let mut learner = Self::new();
        for outcome in outcomes {
            learner.fold(outcome);
        }
        learner.refresh_phase(settings);
        learner
    }

    pub fn phase(&self) -> LearnerPhase {
        self.phase
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.pending.iter().map(|o| o.id).collect()
    }

    /// Record a settled decision and return the phase reached.
    ///
    /// With learning disabled the outcome is ignored and the learner stays idle.
    pub fn record(&mut self, outcome: DecisionOutcome, settings: &LearningSettings) -> LearnerPhase {
        if !settings.enabled {
            return self.phase;
        }
        self.fold(outcome);
        self.refresh_phase(settings);
        debug!(
            "Learner: {} pending outcome(s), phase {:?}",
            self.pending.len(),
            self.phase
        );
        self.phase
    }

    fn fold(&mut self, outcome: DecisionOutcome) {
        for attribution in &outcome.attributions {
            if !attribution.effective_weight.is_finite() || attribution.effective_weight <= 0.0 {
                continue;
            }
            let tally = self.tallies.entry(attribution.source).or_default();
            tally.decisions += 1;
            tally.attributed_weight += attribution.effective_weight;
            if attribution.correct {
                tally.correct_weight += attribution.effective_weight;
            }
        }
        self.pending.push(outcome);
    }

    /// Recompute the phase against the current `minSamples`.
    pub fn refresh_phase(&mut self, settings: &LearningSettings) {
        self.phase = if self.pending.is_empty() {
            LearnerPhase::Idle
        } else if self.pending.len() >= settings.min_samples.max(1) as usize {
            LearnerPhase::Adjusting
        } else {
            LearnerPhase::Accumulating
        };
    }

    /// Weighted accuracy of every source over the pending outcomes.
    pub fn accuracies(&self) -> Vec<SourceAccuracy> {
        SignalSource::ALL
            .iter()
            .map(|source| {
                let tally = self.tallies.get(source).copied().unwrap_or_default();
                SourceAccuracy {
                    source: *source,
                    decisions: tally.decisions,
                    attributed_weight: tally.attributed_weight,
                    correct_weight: tally.correct_weight,
                    accuracy: (tally.attributed_weight > 0.0)
                        .then(|| tally.correct_weight / tally.attributed_weight),
                }
            })
            .collect()
    }

    /// Compute the next weight set from the pending tallies.
    ///
    /// Does not change learner state; call [`complete`](Self::complete) once
    /// the result is persisted.
    pub fn propose(&self, current: &SignalWeights) -> WeightAdjustment {
        let accuracies = self.accuracies();
        let new_weights = adjust_weights(current, &accuracies);
        WeightAdjustment {
            old_weights: *current,
            new_weights,
            accuracies,
            consumed: self.pending_ids(),
        }
    }

    /// Drop the consumed outcomes and return to idle.
    pub fn complete(&mut self) {
        self.pending.clear();
        self.tallies.clear();
        self.phase = LearnerPhase::Idle;
    }
}

/// Shift weight from less to more accurate sources.
///
/// Sources without an accuracy keep their weight. Deltas sum to zero, none
/// exceeds `MAX_STEP`, and no decrease takes a weight below `MIN_WEIGHT`
/// (or below its current value when that is already lower).
pub fn adjust_weights(current: &SignalWeights, accuracies: &[SourceAccuracy]) -> SignalWeights {
    let scored: Vec<(SignalSource, f64)> = accuracies
        .iter()
        .filter_map(|a| a.accuracy.map(|acc| (a.source, acc)))
        .collect();
    if scored.len() < 2 {
        return *current;
    }

    let mean = scored.iter().map(|(_, acc)| acc).sum::<f64>() / scored.len() as f64;
    let max_gap = scored
        .iter()
        .map(|(_, acc)| (acc - mean).abs())
        .fold(0.0, f64::max);
    if max_gap <= 1e-12 {
        return *current;
    }

    let rate = LEARNING_RATE.min(MAX_STEP / max_gap);
    let mut deltas: Vec<(SignalSource, f64)> = scored
        .iter()
        .map(|(source, acc)| {
            let mut delta = (acc - mean) * rate;
            if delta < 0.0 {
                let weight = current.get(*source);
                let floor = weight.min(MIN_WEIGHT);
                delta = delta.max(floor - weight);
            }
            (*source, delta)
        })
        .collect();

    // Flooring shrinks the decreases; shrink the increases to match.
    let decrease: f64 = deltas.iter().filter(|(_, d)| *d < 0.0).map(|(_, d)| -d).sum();
    let increase: f64 = deltas.iter().filter(|(_, d)| *d > 0.0).map(|(_, d)| d).sum();
    if increase > decrease && increase > 0.0 {
        let scale = decrease / increase;
        for (_, delta) in deltas.iter_mut().filter(|(_, d)| *d > 0.0) {
            *delta *= scale;
        }
    }

    let mut next = *current;
    for (source, delta) in deltas {
        next.set(source, current.get(source) + delta);
    }
    next.normalized()
}

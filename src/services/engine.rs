//! Signal engine.
//!
//! Owns per-trader state and is the entry point for aggregation, outcome
//! recording and weight edits. Each trader has one slot behind an async
//! mutex, so work for a trader is serialized while different traders run
//! in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::aggregator::SignalAggregator;
use super::learner::{AdaptiveWeightLearner, WeightAdjustment};
use super::store::TraderStore;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{
    AggregationInput, CombinedSignalResult, DecisionOutcome, LearnerPhase, PartialPersonality,
    SignalSource, SignalWeights, SourceAccuracy, TraderPersonality, WeightChangeReason,
    WeightHistoryEntry,
};

/// State held for one trader.
struct TraderSlot {
    /// Replaced whole after every successful write.
    personality: Arc<TraderPersonality>,
    learner: AdaptiveWeightLearner,
}

/// What happened when an outcome was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeReceipt {
    /// Phase reached by recording the outcome, before any adjustment ran.
    pub phase: LearnerPhase,
    /// Set when the outcome completed a learning pass.
    pub adjustment: Option<AdjustmentReport>,
}

/// A completed learning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentReport {
    pub accuracies: Vec<SourceAccuracy>,
    pub old_weights: SignalWeights,
    pub new_weights: SignalWeights,
    /// Present whenever `learning.updateWeights` allowed the pass to write,
    /// even if the weights came out unchanged.
    pub history_entry: Option<WeightHistoryEntry>,
}

/// Per-trader signal aggregation and adaptive weighting.
pub struct SignalEngine {
    store: Arc<dyn TraderStore>,
    aggregator: SignalAggregator,
    traders: DashMap<String, Arc<Mutex<TraderSlot>>>,
    default_personality: TraderPersonality,
}

impl SignalEngine {
    /// Create an engine backed by `store`.
    ///
    /// Traders without a stored personality start from the configured
    /// preset and check interval.
    pub fn new(store: Arc<dyn TraderStore>, config: &Config) -> Arc<Self> {
        let mut default_personality = TraderPersonality::preset(&config.default_preset)
            .unwrap_or_else(|| {
                warn!(
                    "Unknown personality preset '{}', using balanced",
                    config.default_preset
                );
                TraderPersonality::balanced()
            });
        default_personality.check_interval_seconds = config.default_check_interval_secs;

        Self::with_aggregator(store, SignalAggregator::default(), default_personality)
    }

    pub fn with_aggregator(
        store: Arc<dyn TraderStore>,
        aggregator: SignalAggregator,
        default_personality: TraderPersonality,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            aggregator,
            traders: DashMap::new(),
            default_personality,
        })
    }

    /// Get or lazily load a trader's slot.
    ///
    /// Store failures fall back to defaults so aggregation keeps working.
    fn slot(&self, trader_id: &str) -> Arc<Mutex<TraderSlot>> {
        if let Some(slot) = self.traders.get(trader_id) {
            return slot.clone();
        }

        let personality = match self.store.load_personality(trader_id) {
            Ok(Some(p)) => p,
            Ok(None) => self.default_personality.clone(),
            Err(e) => {
                warn!(
                    "Failed to load personality for trader {}: {}, using defaults",
                    trader_id, e
                );
                self.default_personality.clone()
            }
        }
        .validated(trader_id);

        let pending = self.store.pending_outcomes(trader_id).unwrap_or_else(|e| {
            warn!("Failed to load pending outcomes for trader {}: {}", trader_id, e);
            Vec::new()
        });
        if !pending.is_empty() {
            debug!(
                "Trader {}: restored {} pending outcome(s)",
                trader_id,
                pending.len()
            );
        }
        let learner = AdaptiveWeightLearner::from_pending(pending, &personality.learning);

        let slot = Arc::new(Mutex::new(TraderSlot {
            personality: Arc::new(personality),
            learner,
        }));

        self.traders
            .entry(trader_id.to_string())
            .or_insert(slot)
            .clone()
    }

    /// Ids of every trader known to the engine or the store.
    pub fn trader_ids(&self) -> Result<Vec<String>> {
        let mut ids = self.store.trader_ids()?;
        for entry in self.traders.iter() {
            if !ids.contains(entry.key()) {
                ids.push(entry.key().clone());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Store a full personality for a trader, replacing any previous one.
    pub async fn register_trader(
        &self,
        trader_id: &str,
        personality: TraderPersonality,
    ) -> Result<Arc<TraderPersonality>> {
        let personality = personality.validated(trader_id);
        let slot = self.slot(trader_id);
        let mut guard = slot.lock().await;

        self.store.save_personality(trader_id, &personality)?;
        guard.learner.refresh_phase(&personality.learning);
        guard.personality = Arc::new(personality);
        info!("Registered trader {}", trader_id);
        Ok(guard.personality.clone())
    }

    /// Current validated personality.
    pub async fn personality(&self, trader_id: &str) -> Arc<TraderPersonality> {
        let slot = self.slot(trader_id);
        let guard = slot.lock().await;
        guard.personality.clone()
    }

    /// Merge a partial update onto the current personality.
    ///
    /// A change to the weights is recorded in the history as manual.
    pub async fn update_personality(
        &self,
        trader_id: &str,
        partial: &PartialPersonality,
    ) -> Result<Arc<TraderPersonality>> {
        let slot = self.slot(trader_id);
        let mut guard = slot.lock().await;

        let current = guard.personality.clone();
        let merged = partial.apply_to(&current).validated(trader_id);

        if merged.signals.weights.max_abs_diff(&current.signals.weights) > 1e-9 {
            let entry = WeightHistoryEntry::new(
                trader_id,
                current.signals.weights,
                merged.signals.weights,
                WeightChangeReason::Manual,
            );
            self.store
                .commit_weight_update(trader_id, &merged, &entry, &[])?;
        } else {
            self.store.save_personality(trader_id, &merged)?;
        }

        guard.learner.refresh_phase(&merged.learning);
        guard.personality = Arc::new(merged);
        Ok(guard.personality.clone())
    }

    /// Replace a trader's weights by hand.
    ///
    /// The submitted set is renormalized; the learner is bypassed.
    pub async fn set_weights(
        &self,
        trader_id: &str,
        weights: SignalWeights,
    ) -> Result<WeightHistoryEntry> {
        if SignalSource::ALL
            .iter()
            .any(|s| !weights.get(*s).is_finite() || weights.get(*s) < 0.0)
        {
            return Err(AppError::InvalidInput(format!(
                "weights must be finite and non-negative: {:?}",
                weights
            )));
        }
        if weights.sum() <= f64::EPSILON {
            return Err(AppError::InvalidInput(
                "at least one weight must be positive".to_string(),
            ));
        }

        let normalized = weights.normalized();
        if (weights.sum() - 1.0).abs() > 1e-9 {
            debug!(
                "Trader {}: manual weights summed to {:.3}, renormalized",
                trader_id,
                weights.sum()
            );
        }

        let slot = self.slot(trader_id);
        let mut guard = slot.lock().await;

        let mut next = (*guard.personality).clone();
        let entry = WeightHistoryEntry::new(
            trader_id,
            next.signals.weights,
            normalized,
            WeightChangeReason::Manual,
        );
        next.signals.weights = normalized;

        self.store
            .commit_weight_update(trader_id, &next, &entry, &[])?;
        guard.personality = Arc::new(next);
        Ok(entry)
    }

    /// Compute all four horizon signals for a trader.
    ///
    /// Never fails: missing sources degrade the result instead.
    pub async fn analyze(&self, trader_id: &str, input: &AggregationInput) -> CombinedSignalResult {
        let slot = self.slot(trader_id);
        let guard = slot.lock().await;
        let personality = guard.personality.clone();

        let result = self.aggregator.combine(input, &personality);
        debug!(
            "Trader {}: bias {:?}, volatility {:?}, sources {:?}",
            trader_id, result.overall_bias, result.volatility_indicator, result.data_sources_used
        );
        result
    }

    /// Record a settled decision and run a learning pass if enough have
    /// accumulated.
    ///
    /// If the pass cannot be persisted the weights stay as they were, the
    /// learner stays in `Adjusting` and the error is returned; the pass is
    /// retried by the next outcome or by `run_pending_adjustment`.
    pub async fn record_outcome(&self, outcome: DecisionOutcome) -> Result<OutcomeReceipt> {
        let trader_id = outcome.trader_id.clone();
        let slot = self.slot(&trader_id);
        let mut guard = slot.lock().await;
        let learning = guard.personality.learning.clone();

        self.store.save_outcome(&outcome)?;

        if !learning.enabled {
            self.store.archive_outcomes(&trader_id, &[outcome.id])?;
            debug!(
                "Trader {}: learning disabled, outcome {} archived",
                trader_id, outcome.id
            );
            self.discard_pending(&trader_id, &mut guard)?;
            return Ok(OutcomeReceipt {
                phase: guard.learner.phase(),
                adjustment: None,
            });
        }

        let phase = guard.learner.record(outcome, &learning);
        let adjustment = if phase == LearnerPhase::Adjusting {
            Some(self.adjust(&trader_id, &mut guard)?)
        } else {
            None
        };

        Ok(OutcomeReceipt { phase, adjustment })
    }

    /// Run a learning pass left in `Adjusting`, either by a failed write or
    /// by a lowered `minSamples`.
    ///
    /// If learning was switched off meanwhile, the pending outcomes are
    /// archived and no pass runs.
    pub async fn run_pending_adjustment(&self, trader_id: &str) -> Result<Option<AdjustmentReport>> {
        let slot = self.slot(trader_id);
        let mut guard = slot.lock().await;

        if !guard.personality.learning.enabled {
            self.discard_pending(trader_id, &mut guard)?;
            return Ok(None);
        }
        if guard.learner.phase() != LearnerPhase::Adjusting {
            return Ok(None);
        }
        self.adjust(trader_id, &mut guard).map(Some)
    }

    /// Archive outcomes the learner still holds and return it to idle.
    fn discard_pending(&self, trader_id: &str, slot: &mut TraderSlot) -> Result<()> {
        let pending = slot.learner.pending_ids();
        if pending.is_empty() {
            return Ok(());
        }
        self.store.archive_outcomes(trader_id, &pending)?;
        slot.learner.complete();
        debug!(
            "Trader {}: learning disabled, {} pending outcome(s) archived",
            trader_id,
            pending.len()
        );
        Ok(())
    }

    fn adjust(&self, trader_id: &str, slot: &mut TraderSlot) -> Result<AdjustmentReport> {
        let current = slot.personality.clone();
        let adjustment = slot.learner.propose(&current.signals.weights);
        let changed = adjustment.changed();
        let WeightAdjustment {
            old_weights,
            new_weights,
            accuracies,
            consumed,
        } = adjustment;

        // Every completed pass is audited, including one that leaves the
        // weights where they were.
        let history_entry = if current.learning.update_weights {
            let entry = WeightHistoryEntry::new(
                trader_id,
                old_weights,
                new_weights,
                WeightChangeReason::AdaptiveLearning,
            );
            let mut next = (*current).clone();
            next.signals.weights = new_weights;

            self.store
                .commit_weight_update(trader_id, &next, &entry, &consumed)?;
            slot.personality = Arc::new(next);
            Some(entry)
        } else {
            self.store.archive_outcomes(trader_id, &consumed)?;
            if changed {
                info!(
                    "Trader {}: weight updates disabled, proposed {:?} not applied",
                    trader_id, new_weights
                );
            }
            None
        };

        slot.learner.complete();
        debug!(
            "Trader {}: learning pass consumed {} outcome(s)",
            trader_id,
            consumed.len()
        );

        Ok(AdjustmentReport {
            accuracies,
            old_weights,
            new_weights: slot.personality.signals.weights,
            history_entry,
        })
    }

    /// Weight changes for a trader, newest first.
    pub fn weight_history(&self, trader_id: &str, limit: usize) -> Result<Vec<WeightHistoryEntry>> {
        self.store.weight_history(trader_id, limit)
    }

    pub async fn learner_phase(&self, trader_id: &str) -> LearnerPhase {
        let slot = self.slot(trader_id);
        let guard = slot.lock().await;
        guard.learner.phase()
    }

    /// Accuracy over the outcomes not yet consumed by a learning pass.
    pub async fn source_accuracy(&self, trader_id: &str) -> Vec<SourceAccuracy> {
        let slot = self.slot(trader_id);
        let guard = slot.lock().await;
        guard.learner.accuracies()
    }
}

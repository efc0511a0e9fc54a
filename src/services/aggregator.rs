//! Horizon aggregator.
//!
//! Combines the normalized signals of one horizon into a weighted score,
//! classifies how well the sources agree, and assembles the four horizon
//! results of a cycle into a `CombinedSignalResult`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::normalizers::{all_normalizers, sentiment::average_polarity, SignalNormalizer};
use super::policy;
use crate::error::SourceUnavailable;
use crate::types::{
    clamp_score, direction_of, Agreement, AggregationInput, CombinedSignalResult, Horizon,
    NormalizedSignal, OverallBias, SignalContribution, SignalSource, SignalWeights,
    SourceAgreement, TraderPersonality, TradingSignal, VolatilityIndicator,
};

/// Multiplier applied to the weight of a source opposing the majority.
pub const DISAGREEMENT_DAMPING: f64 = 0.5;

/// Every source must reach this |score| for `Agreement::Strong`.
pub const STRONG_SCORE: f64 = 50.0;

/// Mean horizon score beyond which the overall bias leaves neutral.
pub const BIAS_THRESHOLD: f64 = 10.0;

/// Weighted view of one horizon before the decision policy runs.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonAggregate {
    pub horizon: Horizon,
    pub score: f64,
    pub confidence: f64,
    /// `None` when no source contributed.
    pub agreement: Option<Agreement>,
    pub contributions: Vec<SignalContribution>,
    /// Population standard deviation of the source scores.
    pub dispersion: f64,
    pub summary: String,
}

impl HorizonAggregate {
    fn empty(horizon: Horizon) -> Self {
        Self {
            horizon,
            score: 0.0,
            confidence: 0.0,
            agreement: None,
            contributions: Vec::new(),
            dispersion: 0.0,
            summary: "no data".to_string(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.contributions.is_empty()
    }

    /// Sources whose score points in `direction` (1 or -1).
    pub fn sources_pointing(&self, direction: i8) -> usize {
        self.contributions
            .iter()
            .filter(|c| direction != 0 && direction_of(c.score) == direction)
            .count()
    }
}

/// Renormalize configured weights over the sources present in `signals`.
///
/// Returned weights are in `signals` order and sum to 1. A subset whose
/// configured weights sum to zero is split equally.
pub fn renormalize_weights(signals: &[NormalizedSignal], weights: &SignalWeights) -> Vec<f64> {
    if signals.is_empty() {
        return Vec::new();
    }

    let clean = weights.sanitized();
    let raw: Vec<f64> = signals.iter().map(|s| clean.get(s.source)).collect();
    let total: f64 = raw.iter().sum();

    if total <= f64::EPSILON {
        let sources: Vec<SignalSource> = signals.iter().map(|s| s.source).collect();
        warn!(
            "Configured weights for {:?} sum to zero, splitting equally",
            sources
        );
        let share = 1.0 / signals.len() as f64;
        return vec![share; signals.len()];
    }

    raw.iter().map(|w| w / total).collect()
}

/// Classify agreement from the sign of each score.
pub fn classify_agreement(scores: &[f64]) -> Agreement {
    let positive = scores.iter().filter(|s| direction_of(**s) > 0).count();
    let negative = scores.iter().filter(|s| direction_of(**s) < 0).count();

    if positive == negative {
        return if positive == 0 {
            Agreement::Weak
        } else {
            Agreement::Conflicting
        };
    }

    let majority = positive.max(negative);
    if majority == scores.len() && scores.iter().all(|s| s.abs() >= STRONG_SCORE) {
        Agreement::Strong
    } else if majority * 2 > scores.len() {
        Agreement::Moderate
    } else {
        Agreement::Weak
    }
}

/// Aggregate one horizon's available signals with the configured weights.
pub fn aggregate_horizon(
    horizon: Horizon,
    signals: &[NormalizedSignal],
    weights: &SignalWeights,
) -> HorizonAggregate {
    if signals.is_empty() {
        return HorizonAggregate::empty(horizon);
    }

    let renormalized = renormalize_weights(signals, weights);
    let scores: Vec<f64> = signals.iter().map(|s| s.score).collect();
    let agreement = classify_agreement(&scores);

    // A conflicting horizon has no majority to disagree with.
    let majority = if agreement == Agreement::Conflicting {
        0
    } else {
        direction_of(scores.iter().map(|s| direction_of(*s) as f64).sum())
    };

    let contributions: Vec<SignalContribution> = signals
        .iter()
        .zip(renormalized.iter())
        .map(|(signal, &weight)| {
            let direction = signal.direction();
            let stance = if direction == 0 || majority == 0 {
                SourceAgreement::Neutral
            } else if direction == majority {
                SourceAgreement::Agrees
            } else {
                SourceAgreement::Disagrees
            };
            let effective_weight = if stance == SourceAgreement::Disagrees {
                weight * DISAGREEMENT_DAMPING
            } else {
                weight
            };

            SignalContribution {
                source: signal.source,
                score: signal.score,
                confidence: signal.confidence,
                weight,
                effective_weight,
                agreement: stance,
                detail: signal.detail.clone(),
            }
        })
        .collect();

    let effective_total: f64 = contributions.iter().map(|c| c.effective_weight).sum();
    let (score, weighted_confidence) = if effective_total > 0.0 {
        (
            contributions
                .iter()
                .map(|c| c.score * c.effective_weight)
                .sum::<f64>()
                / effective_total,
            contributions
                .iter()
                .map(|c| c.confidence * c.effective_weight)
                .sum::<f64>()
                / effective_total,
        )
    } else {
        (0.0, 0.0)
    };
    let score = clamp_score(score);
    let confidence = (weighted_confidence * agreement.confidence_factor()).clamp(0.0, 1.0);

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let dispersion =
        (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64).sqrt();

    let summary = summarize(&contributions, agreement, score);

    HorizonAggregate {
        horizon,
        score,
        confidence,
        agreement: Some(agreement),
        contributions,
        dispersion,
        summary,
    }
}

/// Human-readable account of the weighting, naming the dominant source.
fn summarize(contributions: &[SignalContribution], agreement: Agreement, score: f64) -> String {
    let dominant = contributions.iter().fold(None::<&SignalContribution>, |best, c| {
        match best {
            Some(b) if (b.score * b.effective_weight).abs() >= (c.score * c.effective_weight).abs() => {
                Some(b)
            }
            _ => Some(c),
        }
    });

    let mut text = format!(
        "score {:+.1} with {} agreement across {} source{}",
        score,
        agreement.label(),
        contributions.len(),
        if contributions.len() == 1 { "" } else { "s" }
    );
    if let Some(d) = dominant.filter(|d| d.score != 0.0) {
        text.push_str(&format!("; led by {} ({:+.1})", d.source, d.score));
    }
    text
}

/// Runs the normalizers for every horizon and assembles a cycle's result.
pub struct SignalAggregator {
    normalizers: Vec<Box<dyn SignalNormalizer>>,
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new(all_normalizers())
    }
}

impl SignalAggregator {
    pub fn new(normalizers: Vec<Box<dyn SignalNormalizer>>) -> Self {
        Self { normalizers }
    }

    /// Normalized signals for one horizon; unavailable sources are logged and skipped.
    pub fn collect(
        &self,
        input: &AggregationInput,
        personality: &TraderPersonality,
        horizon: Horizon,
    ) -> Vec<NormalizedSignal> {
        let mut signals = Vec::with_capacity(self.normalizers.len());
        for normalizer in &self.normalizers {
            let source = normalizer.source();
            let result = if personality.sources.is_enabled(source) {
                normalizer.normalize(input, horizon).and_then(|signal| {
                    if signal.score.is_finite() && signal.confidence.is_finite() {
                        Ok(signal)
                    } else {
                        Err(SourceUnavailable::Invalid(format!(
                            "non-finite score {} or confidence {}",
                            signal.score, signal.confidence
                        )))
                    }
                })
            } else {
                Err(SourceUnavailable::Disabled)
            };

            match result {
                Ok(signal) => signals.push(signal),
                Err(reason) => debug!("{} excluded from {} horizon: {}", source, horizon, reason),
            }
        }
        signals
    }

    /// Compute every horizon for one trader.
    ///
    /// Pure with respect to its arguments; `generated_at` is the input's
    /// reference time so identical inputs give identical results.
    pub fn combine(
        &self,
        input: &AggregationInput,
        personality: &TraderPersonality,
    ) -> CombinedSignalResult {
        let weights = &personality.signals.weights;
        let mut signals: BTreeMap<Horizon, TradingSignal> = BTreeMap::new();
        let mut contributions = BTreeMap::new();
        let mut sources_used = BTreeSet::new();
        let mut dispersions = Vec::new();
        let mut horizon_scores = Vec::new();

        for horizon in Horizon::ALL {
            let normalized = self.collect(input, personality, horizon);
            let aggregate = aggregate_horizon(horizon, &normalized, weights);
            let decision = policy::decide(&aggregate, &personality.signals);

            if aggregate.has_data() {
                dispersions.push(aggregate.dispersion);
                horizon_scores.push(aggregate.score);
                sources_used.extend(aggregate.contributions.iter().map(|c| c.source));
            }

            debug!(
                "{} horizon: {} ({})",
                horizon,
                decision.signal.label(),
                decision.reasoning
            );

            signals.insert(horizon, decision);
            contributions.insert(horizon, aggregate.contributions);
        }

        let overall_bias = overall_bias(&horizon_scores);
        let volatility_indicator = if dispersions.is_empty() {
            VolatilityIndicator::Low
        } else {
            VolatilityIndicator::from_dispersion(
                dispersions.iter().sum::<f64>() / dispersions.len() as f64,
            )
        };

        let mut take = |h: Horizon| signals.remove(&h).unwrap_or_else(TradingSignal::no_data);

        CombinedSignalResult {
            hourly: take(Horizon::Hourly),
            daily: take(Horizon::Daily),
            weekly: take(Horizon::Weekly),
            long_term: take(Horizon::LongTerm),
            overall_bias,
            volatility_indicator,
            data_sources_used: sources_used.into_iter().collect(),
            avg_sentiment: average_polarity(&input.news),
            news_count: input.news.len(),
            contributions,
            generated_at: input.as_of,
        }
    }
}

/// Bias from the mean score of the horizons that had data.
pub fn overall_bias(horizon_scores: &[f64]) -> OverallBias {
    if horizon_scores.is_empty() {
        return OverallBias::Neutral;
    }
    let mean = horizon_scores.iter().sum::<f64>() / horizon_scores.len() as f64;
    if mean > BIAS_THRESHOLD {
        OverallBias::Bullish
    } else if mean < -BIAS_THRESHOLD {
        OverallBias::Bearish
    } else {
        OverallBias::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceDetail;

    fn signal(source: SignalSource, score: f64, confidence: f64) -> NormalizedSignal {
        NormalizedSignal::new(
            source,
            Horizon::Daily,
            score,
            confidence,
            SourceDetail::Technical { readings_used: 1 },
        )
    }

    #[test]
    fn test_empty_horizon_is_no_data() {
        let aggregate = aggregate_horizon(Horizon::Daily, &[], &SignalWeights::equal());
        assert!(!aggregate.has_data());
        assert_eq!(aggregate.agreement, None);
        assert_eq!(aggregate.score, 0.0);
        assert_eq!(aggregate.confidence, 0.0);
    }

    #[test]
    fn test_all_agree_strong() {
        let signals: Vec<_> = SignalSource::ALL
            .iter()
            .map(|s| signal(*s, 60.0, 0.8))
            .collect();
        let aggregate = aggregate_horizon(Horizon::Daily, &signals, &SignalWeights::equal());
        assert_eq!(aggregate.agreement, Some(Agreement::Strong));
        assert!((aggregate.score - 60.0).abs() < 1e-9);
        assert!((aggregate.confidence - 0.8).abs() < 1e-9);
        assert!(aggregate.dispersion.abs() < 1e-9);
    }

    #[test]
    fn test_classify_agreement() {
        assert_eq!(classify_agreement(&[70.0, 70.0, -70.0, -70.0]), Agreement::Conflicting);
        assert_eq!(classify_agreement(&[0.0, 0.0]), Agreement::Weak);
        assert_eq!(classify_agreement(&[60.0, 55.0, 90.0]), Agreement::Strong);
        assert_eq!(classify_agreement(&[60.0, 10.0, 90.0]), Agreement::Moderate);
        assert_eq!(classify_agreement(&[30.0, 20.0, -40.0]), Agreement::Moderate);
        assert_eq!(classify_agreement(&[30.0, 0.0, 0.0, -10.0, 5.0]), Agreement::Weak);
    }

    #[test]
    fn test_disagreeing_source_is_damped() {
        let signals = vec![
            signal(SignalSource::Sentiment, 40.0, 0.6),
            signal(SignalSource::Technical, 50.0, 0.6),
            signal(SignalSource::Ml, -80.0, 0.9),
        ];
        let aggregate = aggregate_horizon(Horizon::Daily, &signals, &SignalWeights::equal());

        let ml = &aggregate.contributions[2];
        assert_eq!(ml.agreement, SourceAgreement::Disagrees);
        assert!(ml.effective_weight < ml.weight);
        assert!((ml.effective_weight - ml.weight * DISAGREEMENT_DAMPING).abs() < 1e-12);

        for c in &aggregate.contributions[..2] {
            assert_eq!(c.agreement, SourceAgreement::Agrees);
            assert_eq!(c.effective_weight, c.weight);
        }

        // (40 + 50 - 80 * 0.5) / 2.5 with each weight at 1/3
        assert!((aggregate.score - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_renormalized_weights_sum_to_one() {
        let weights = SignalWeights::new(0.1, 0.2, 0.3, 0.4);
        let signals = vec![
            signal(SignalSource::Technical, 10.0, 0.5),
            signal(SignalSource::Rl, -10.0, 0.5),
        ];
        let renormalized = renormalize_weights(&signals, &weights);
        assert!((renormalized.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((renormalized[0] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_subset_splits_equally() {
        let weights = SignalWeights::new(0.0, 0.0, 0.5, 0.5);
        let signals = vec![
            signal(SignalSource::Sentiment, 10.0, 0.5),
            signal(SignalSource::Technical, 30.0, 0.5),
        ];
        assert_eq!(renormalize_weights(&signals, &weights), vec![0.5, 0.5]);
    }

    #[test]
    fn test_summary_names_dominant_source() {
        let signals = vec![
            signal(SignalSource::Sentiment, 10.0, 0.5),
            signal(SignalSource::Ml, 90.0, 0.5),
        ];
        let aggregate = aggregate_horizon(Horizon::Daily, &signals, &SignalWeights::equal());
        assert!(aggregate.summary.contains("led by ml"));
    }

    /// Normalizer that returns whatever it was built with.
    struct StubNormalizer {
        source: SignalSource,
        score: f64,
        confidence: f64,
    }

    impl SignalNormalizer for StubNormalizer {
        fn source(&self) -> SignalSource {
            self.source
        }

        fn normalize(
            &self,
            _input: &AggregationInput,
            horizon: Horizon,
        ) -> Result<NormalizedSignal, SourceUnavailable> {
            Ok(NormalizedSignal::new(
                self.source,
                horizon,
                self.score,
                self.confidence,
                SourceDetail::Technical { readings_used: 1 },
            ))
        }
    }

    #[test]
    fn test_non_finite_signals_are_excluded() {
        let stub = |source, score, confidence| {
            Box::new(StubNormalizer {
                source,
                score,
                confidence,
            }) as Box<dyn SignalNormalizer>
        };
        let aggregator = SignalAggregator::new(vec![
            stub(SignalSource::Sentiment, f64::NAN, 0.8),
            stub(SignalSource::Technical, 60.0, f64::NAN),
            stub(SignalSource::Ml, 45.0, 0.7),
        ]);
        let input = AggregationInput::new(chrono::Utc::now(), 100.0);
        let personality = TraderPersonality::balanced();

        let signals = aggregator.collect(&input, &personality, Horizon::Daily);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, SignalSource::Ml);

        let result = aggregator.combine(&input, &personality);
        assert_eq!(result.data_sources_used, vec![SignalSource::Ml]);
        assert!((result.daily.score - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_bias() {
        assert_eq!(overall_bias(&[]), OverallBias::Neutral);
        assert_eq!(overall_bias(&[30.0, 10.0]), OverallBias::Bullish);
        assert_eq!(overall_bias(&[-30.0, 0.0]), OverallBias::Bearish);
        assert_eq!(overall_bias(&[5.0, -5.0]), OverallBias::Neutral);
    }
}

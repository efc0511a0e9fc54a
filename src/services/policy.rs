//! Decision policy.
//!
//! Turns a horizon's weighted score into buy / sell / hold. The threshold
//! picks a candidate action; the gates that follow can only downgrade it to
//! hold, never flip it.

use super::aggregator::HorizonAggregate;
use crate::types::{Agreement, SignalAction, SignalSettings, TradingSignal};

/// |score| beyond which a horizon leaves the neutral band.
pub const ACTION_THRESHOLD: f64 = 20.0;

/// Candidate action from the score alone.
pub fn threshold_action(score: f64) -> SignalAction {
    if score > ACTION_THRESHOLD {
        SignalAction::Buy
    } else if score < -ACTION_THRESHOLD {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    }
}

/// Why a candidate action was downgraded to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldReason {
    NeutralBand,
    Conflicting,
    LowConfidence { confidence: f64, required: f64 },
    Unconfirmed { confirming: usize, required: usize },
}

impl HoldReason {
    fn describe(&self) -> String {
        match self {
            HoldReason::NeutralBand => {
                format!("score inside the ±{:.0} neutral band", ACTION_THRESHOLD)
            }
            HoldReason::Conflicting => "sources conflict".to_string(),
            HoldReason::LowConfidence {
                confidence,
                required,
            } => format!(
                "confidence {:.2} below minimum {:.2}",
                confidence, required
            ),
            HoldReason::Unconfirmed {
                confirming,
                required,
            } => format!(
                "{} of {} required sources confirm",
                confirming, required
            ),
        }
    }
}

/// Run the gates in order and return the first that fires, if any.
pub fn gate(aggregate: &HorizonAggregate, settings: &SignalSettings) -> Result<SignalAction, HoldReason> {
    let action = threshold_action(aggregate.score);
    if action == SignalAction::Hold {
        return Err(HoldReason::NeutralBand);
    }

    if aggregate.agreement == Some(Agreement::Conflicting) {
        return Err(HoldReason::Conflicting);
    }

    if aggregate.confidence < settings.min_agreement {
        return Err(HoldReason::LowConfidence {
            confidence: aggregate.confidence,
            required: settings.min_agreement,
        });
    }

    if settings.require_multiple_confirmation {
        let required = settings.min_signal_agreement.required_sources();
        let confirming = aggregate.sources_pointing(action.direction());
        if confirming < required {
            return Err(HoldReason::Unconfirmed {
                confirming,
                required,
            });
        }
    }

    Ok(action)
}

/// Final trading signal for one horizon.
pub fn decide(aggregate: &HorizonAggregate, settings: &SignalSettings) -> TradingSignal {
    if !aggregate.has_data() {
        return TradingSignal::no_data();
    }

    let (signal, reasoning) = match gate(aggregate, settings) {
        Ok(action) => (action, format!("{}: {}", action.label(), aggregate.summary)),
        Err(reason) => (
            SignalAction::Hold,
            format!("Hold ({}): {}", reason.describe(), aggregate.summary),
        ),
    };

    TradingSignal {
        signal,
        score: aggregate.score,
        confidence: aggregate.confidence,
        agreement: aggregate.agreement,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::aggregate_horizon;
    use crate::types::{
        ConfirmationLevel, Horizon, NormalizedSignal, SignalSource, SignalWeights, SourceDetail,
    };

    fn aggregate(scores: &[(SignalSource, f64)], confidence: f64) -> HorizonAggregate {
        let signals: Vec<NormalizedSignal> = scores
            .iter()
            .map(|(source, score)| {
                NormalizedSignal::new(
                    *source,
                    Horizon::Daily,
                    *score,
                    confidence,
                    SourceDetail::Technical { readings_used: 1 },
                )
            })
            .collect();
        aggregate_horizon(Horizon::Daily, &signals, &SignalWeights::equal())
    }

    #[test]
    fn test_threshold_action() {
        assert_eq!(threshold_action(20.0), SignalAction::Hold);
        assert_eq!(threshold_action(20.1), SignalAction::Buy);
        assert_eq!(threshold_action(-20.1), SignalAction::Sell);
        assert_eq!(threshold_action(0.0), SignalAction::Hold);
    }

    #[test]
    fn test_no_data_holds() {
        let empty = aggregate(&[], 0.0);
        let signal = decide(&empty, &SignalSettings::default());
        assert_eq!(signal, TradingSignal::no_data());
    }

    #[test]
    fn test_conflicting_holds_regardless_of_min_agreement() {
        let agg = aggregate(
            &[
                (SignalSource::Sentiment, 70.0),
                (SignalSource::Technical, 70.0),
                (SignalSource::Ml, -30.0),
                (SignalSource::Rl, -10.0),
            ],
            1.0,
        );
        assert_eq!(agg.agreement, Some(Agreement::Conflicting));
        assert!(agg.score > ACTION_THRESHOLD);

        let mut settings = SignalSettings::default();
        settings.min_agreement = 0.0;
        assert_eq!(gate(&agg, &settings), Err(HoldReason::Conflicting));
    }

    #[test]
    fn test_low_confidence_holds() {
        let agg = aggregate(
            &[(SignalSource::Technical, 60.0), (SignalSource::Ml, 40.0)],
            0.5,
        );
        // 0.5 confidence * 0.8 moderate factor
        let mut settings = SignalSettings::default();
        settings.min_agreement = 0.6;
        assert!(matches!(gate(&agg, &settings), Err(HoldReason::LowConfidence { .. })));

        settings.min_agreement = 0.3;
        assert_eq!(gate(&agg, &settings), Ok(SignalAction::Buy));
    }

    #[test]
    fn test_multiple_confirmation() {
        let agg = aggregate(
            &[
                (SignalSource::Sentiment, 60.0),
                (SignalSource::Technical, 70.0),
                (SignalSource::Ml, 0.0),
            ],
            0.9,
        );
        let mut settings = SignalSettings {
            min_agreement: 0.1,
            require_multiple_confirmation: true,
            min_signal_agreement: ConfirmationLevel::Moderate,
            ..Default::default()
        };
        assert_eq!(
            gate(&agg, &settings),
            Err(HoldReason::Unconfirmed {
                confirming: 2,
                required: 3
            })
        );

        settings.min_signal_agreement = ConfirmationLevel::Weak;
        assert_eq!(gate(&agg, &settings), Ok(SignalAction::Buy));
    }

    #[test]
    fn test_reasoning_records_gate() {
        let agg = aggregate(&[(SignalSource::Rl, 10.0)], 0.9);
        let signal = decide(&agg, &SignalSettings::default());
        assert_eq!(signal.signal, SignalAction::Hold);
        assert!(signal.reasoning.contains("neutral band"));
    }
}

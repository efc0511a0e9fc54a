//! External schema tests.

use confluence::{
    AggregationInput, ConfirmationLevel, DecisionOutcome, Horizon, PartialPersonality,
    SignalAction, SignalWeights, TraderPersonality, WeightChangeReason,
    WeightHistoryEntry,
};

#[test]
fn test_personality_json_surface() {
    let json = serde_json::to_value(TraderPersonality::conservative()).unwrap();

    assert!(json["signals"]["weights"]["ml"].is_number());
    assert_eq!(json["signals"]["minAgreement"], 0.7);
    assert_eq!(json["signals"]["requireMultipleConfirmation"], true);
    assert_eq!(json["signals"]["minSignalAgreement"], "moderate");
    assert_eq!(json["learning"]["updateWeights"], true);
    assert_eq!(json["learning"]["minSamples"], 10);
    assert_eq!(json["sources"]["enableRLAgents"], true);
    assert_eq!(json["checkIntervalSeconds"], 900);
}

#[test]
fn test_partial_personality_from_json() {
    let patch: PartialPersonality = serde_json::from_str(
        r#"{
            "signals": {"minSignalAgreement": "strong", "requireMultipleConfirmation": true},
            "sources": {"enableMLPrediction": false}
        }"#,
    )
    .unwrap();

    let merged = patch.apply_to(&TraderPersonality::aggressive());
    assert_eq!(merged.signals.min_signal_agreement, ConfirmationLevel::Strong);
    assert!(merged.signals.require_multiple_confirmation);
    assert!(!merged.sources.enable_ml_prediction);
    assert!(merged.sources.enable_sentiment);
    assert_eq!(merged.signals.min_agreement, 0.35);
    assert_eq!(merged.check_interval_seconds, 60);
}

#[test]
fn test_aggregation_input_from_json() {
    let input: AggregationInput = serde_json::from_str(
        r#"{
            "asOf": "2024-06-03T15:30:00Z",
            "currentPrice": 187.2,
            "news": [
                {"sentimentResult": {"polarity": 0.4, "label": "positive"},
                 "datetime": "2024-06-03T14:00:00Z"}
            ],
            "forecast": {"predictions": [
                {"date": "2024-06-04", "day": 1, "predicted_price": 189.0, "confidence": 72}
            ]},
            "technical": [{"score": 35.0, "confidence": 0.6, "timestamp": 1717426800000}],
            "rlSignals": [{"signal": "buy", "confidence": 0.55, "horizon": "weekly"}]
        }"#,
    )
    .unwrap();

    assert_eq!(input.news.len(), 1);
    assert_eq!(input.forecast.as_ref().unwrap().predictions[0].day, 1.0);
    assert_eq!(input.rl_signals[0].horizon, Some(Horizon::Weekly));
    assert_eq!(input.rl_signals[0].signal, SignalAction::Buy);
    assert!(input.stock_series.is_none());
}

#[test]
fn test_weights_missing_fields_take_defaults() {
    let weights: SignalWeights = serde_json::from_str(r#"{"ml": 0.5, "rl": 0.5}"#).unwrap();
    // Missing sources fall back to the equal-weight default before normalizing.
    assert_eq!(weights.sentiment, 0.25);
    assert!((weights.normalized().sum() - 1.0).abs() < 1e-9);
}

#[test]
fn test_history_entry_json() {
    let entry = WeightHistoryEntry::new(
        "alice",
        SignalWeights::equal(),
        SignalWeights::new(0.2, 0.3, 0.25, 0.25),
        WeightChangeReason::AdaptiveLearning,
    );
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["reason"], "adaptive_learning");
    assert_eq!(json["traderId"], "alice");
    assert!(json["oldWeights"]["sentiment"].is_number());
    assert!(json["newWeights"]["technical"].is_number());
}

#[test]
fn test_outcome_json_round_trip() {
    let outcome = DecisionOutcome::from_contributions(
        "alice",
        Horizon::LongTerm,
        SignalAction::Sell,
        &[],
        -20.0,
        -0.4,
        chrono::Utc::now(),
    );
    let json = serde_json::to_string(&outcome).unwrap();
    assert!(json.contains("\"pnlPercent\""));
    assert!(json.contains("\"longTerm\""));

    let back: DecisionOutcome = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, outcome.id);
    assert_eq!(back.action, SignalAction::Sell);
    assert!(back.attributions.is_empty());
    assert_eq!(back.closed_at, outcome.closed_at);
}

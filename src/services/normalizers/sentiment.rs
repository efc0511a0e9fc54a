//! News sentiment normalizer.

use chrono::{DateTime, Utc};

use super::SignalNormalizer;
use crate::error::SourceUnavailable;
use crate::types::{
    AggregationInput, Horizon, NewsItem, NormalizedSignal, SignalSource, SourceDetail,
};

/// Items needed for full (capped) confidence.
pub const SATURATION_ITEMS: f64 = 10.0;

/// Confidence ceiling for sentiment, however many items corroborate.
pub const MAX_CONFIDENCE: f64 = 0.9;

/// Recency-weighted news polarity.
///
/// Only items inside the horizon's lookback window count. An item's weight
/// halves every half-window of age, so a 6 hour window halves every 3 hours.
pub struct SentimentNormalizer;

impl SignalNormalizer for SentimentNormalizer {
    fn source(&self) -> SignalSource {
        SignalSource::Sentiment
    }

    fn normalize(
        &self,
        input: &AggregationInput,
        horizon: Horizon,
    ) -> Result<NormalizedSignal, SourceUnavailable> {
        normalize_sentiment(&input.news, horizon, input.as_of)
    }
}

/// Aggregate news items for one horizon.
pub fn normalize_sentiment(
    items: &[NewsItem],
    horizon: Horizon,
    as_of: DateTime<Utc>,
) -> Result<NormalizedSignal, SourceUnavailable> {
    if items.is_empty() {
        return Err(SourceUnavailable::NoData);
    }

    let lookback = horizon.sentiment_lookback_secs() as f64;
    let half_life = lookback / 2.0;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut polarity_sum = 0.0;
    let mut used = 0usize;
    let mut finite = 0usize;

    for item in items {
        let polarity = item.sentiment_result.polarity;
        if !polarity.is_finite() {
            continue;
        }
        finite += 1;

        // Future-dated items count as fresh.
        let age = ((as_of - item.datetime).num_milliseconds() as f64 / 1000.0).max(0.0);
        if age >= lookback {
            continue;
        }

        let polarity = polarity.clamp(-1.0, 1.0);
        let weight = 0.5f64.powf(age / half_life);
        weighted_sum += polarity * weight;
        weight_total += weight;
        polarity_sum += polarity;
        used += 1;
    }

    if finite == 0 {
        return Err(SourceUnavailable::Invalid(
            "no finite sentiment polarity".to_string(),
        ));
    }
    if used == 0 || weight_total <= 0.0 {
        return Err(SourceUnavailable::NoData);
    }

    let score = weighted_sum / weight_total * 100.0;
    let confidence = (used as f64 / SATURATION_ITEMS).min(1.0) * MAX_CONFIDENCE;

    Ok(NormalizedSignal::new(
        SignalSource::Sentiment,
        horizon,
        score,
        confidence,
        SourceDetail::Sentiment {
            items_used: used,
            mean_polarity: polarity_sum / used as f64,
        },
    ))
}

/// Plain mean polarity of every finite news item, or 0 with no items.
pub fn average_polarity(items: &[NewsItem]) -> f64 {
    let values: Vec<f64> = items
        .iter()
        .map(|i| i.sentiment_result.polarity)
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(-1.0, 1.0))
        .collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

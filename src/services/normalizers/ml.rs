//! ML forecast normalizer.

use super::SignalNormalizer;
use crate::error::SourceUnavailable;
use crate::types::{
    AggregationInput, Forecast, ForecastPoint, Horizon, NormalizedSignal, SignalSource,
    SourceDetail,
};

/// Scores the forecast point nearest to the horizon's distance.
///
/// Score is the predicted move from the current price, scaled so that the
/// horizon's full-scale move maps to ±100.
pub struct MlNormalizer;

impl SignalNormalizer for MlNormalizer {
    fn source(&self) -> SignalSource {
        SignalSource::Ml
    }

    fn normalize(
        &self,
        input: &AggregationInput,
        horizon: Horizon,
    ) -> Result<NormalizedSignal, SourceUnavailable> {
        normalize_forecast(input.forecast.as_ref(), input.current_price, horizon)
    }
}

/// Normalize a forecast path against the current price.
pub fn normalize_forecast(
    forecast: Option<&Forecast>,
    current_price: f64,
    horizon: Horizon,
) -> Result<NormalizedSignal, SourceUnavailable> {
    let forecast = forecast.ok_or(SourceUnavailable::NoData)?;
    if forecast.predictions.is_empty() {
        return Err(SourceUnavailable::NoData);
    }
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(SourceUnavailable::Invalid(format!(
            "current price {} unusable",
            current_price
        )));
    }

    let target = horizon.forecast_target_day();
    let point = forecast
        .predictions
        .iter()
        .filter(|p| is_usable(p))
        .min_by(|a, b| {
            let da = (a.day - target).abs();
            let db = (b.day - target).abs();
            da.total_cmp(&db).then(a.day.total_cmp(&b.day))
        })
        .ok_or_else(|| SourceUnavailable::Invalid("no usable forecast point".to_string()))?;

    let change_pct = (point.predicted_price - current_price) / current_price * 100.0;
    let score = change_pct / horizon.forecast_full_scale_pct() * 100.0;

    Ok(NormalizedSignal::new(
        SignalSource::Ml,
        horizon,
        score,
        read_confidence(point.confidence),
        SourceDetail::Ml {
            forecast_day: point.day,
            predicted_price: point.predicted_price,
            change_pct,
        },
    ))
}

fn is_usable(point: &ForecastPoint) -> bool {
    point.day.is_finite()
        && point.day >= 0.0
        && point.predicted_price.is_finite()
        && point.predicted_price > 0.0
        && point.confidence.is_finite()
}

/// Forecasters sometimes report confidence as a percentage.
fn read_confidence(raw: f64) -> f64 {
    if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(day: f64, predicted_price: f64, confidence: f64) -> ForecastPoint {
        ForecastPoint {
            date: None,
            day,
            predicted_price,
            confidence,
            change_pct: None,
        }
    }

    fn forecast(points: Vec<ForecastPoint>) -> Forecast {
        Forecast {
            predictions: points,
        }
    }

    #[test]
    fn test_missing_forecast_is_no_data() {
        assert_eq!(
            normalize_forecast(None, 100.0, Horizon::Daily),
            Err(SourceUnavailable::NoData)
        );
        assert_eq!(
            normalize_forecast(Some(&forecast(vec![])), 100.0, Horizon::Daily),
            Err(SourceUnavailable::NoData)
        );
    }

    #[test]
    fn test_picks_nearest_point() {
        let f = forecast(vec![
            point(1.0, 101.0, 0.9),
            point(6.0, 104.0, 0.7),
            point(30.0, 90.0, 0.4),
        ]);

        let weekly = normalize_forecast(Some(&f), 100.0, Horizon::Weekly).unwrap();
        // 4% over a 5% full scale
        assert!((weekly.score - 80.0).abs() < 1e-9);
        assert_eq!(weekly.confidence, 0.7);

        let long_term = normalize_forecast(Some(&f), 100.0, Horizon::LongTerm).unwrap();
        assert!((long_term.score + 100.0).abs() < 1e-9);

        let hourly = normalize_forecast(Some(&f), 100.0, Horizon::Hourly).unwrap();
        assert!((hourly.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_prefers_earlier_point() {
        let f = forecast(vec![point(8.0, 110.0, 0.5), point(6.0, 95.0, 0.5)]);
        let weekly = normalize_forecast(Some(&f), 100.0, Horizon::Weekly).unwrap();
        assert!(weekly.score < 0.0);
    }

    #[test]
    fn test_percentage_confidence_is_scaled() {
        let f = forecast(vec![point(1.0, 101.0, 85.0)]);
        let daily = normalize_forecast(Some(&f), 100.0, Horizon::Daily).unwrap();
        assert!((daily.confidence - 0.85).abs() < 1e-9);
        assert!((daily.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_values_excluded() {
        let f = forecast(vec![point(1.0, f64::NAN, 0.9), point(f64::INFINITY, 105.0, 0.9)]);
        assert!(matches!(
            normalize_forecast(Some(&f), 100.0, Horizon::Daily),
            Err(SourceUnavailable::Invalid(_))
        ));

        let f = forecast(vec![point(1.0, 101.0, 0.9)]);
        assert!(matches!(
            normalize_forecast(Some(&f), 0.0, Horizon::Daily),
            Err(SourceUnavailable::Invalid(_))
        ));
    }
}

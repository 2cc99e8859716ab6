//! Weather-driven delay forecasting.
//!
//! Each forecast day gets a predicted impact. With enough site history, rainy
//! days are classified by the impact the site actually saw on days with similar
//! rainfall; otherwise fixed rainfall/wind rules apply. The expected delay is a
//! phase-weighted count of medium and high impact days, rounded to half days.
//!
//! Sourcing the forecast itself is the caller's concern. [`ForecastProvider`]
//! is the seam for it, and [`HistoricalAnalogForecast`] is a deterministic
//! stand-in built from the site's own history.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::model::{Phase, WeatherImpact, WeatherRecord};
use crate::{EngineConfig, Result};

/// Historical records needed before history replaces the fixed rules.
const MIN_HISTORY_RECORDS: usize = 5;
const HEAVY_RAIN_MM: f64 = 30.0;
const MODERATE_RAIN_MM: f64 = 10.0;
const HIGH_WIND_KMH: f64 = 25.0;
/// Expected delay (days) above which a schedule buffer is recommended.
const DELAY_BUFFER_THRESHOLD_DAYS: f64 = 3.0;
/// Mean daily rainfall at which a simulated day is described as rainy.
const ANALOG_RAIN_MM: f64 = 2.5;

// ============================================================================
// Types
// ============================================================================

/// One day of forecast weather.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub wind_speed_kmh: f64,
    /// Free-text conditions such as "light rain" or "clear".
    pub conditions: String,
}

impl ForecastDay {
    fn is_rain_bearing(&self) -> bool {
        let conditions = self.conditions.to_lowercase();
        ["rain", "drizzle", "shower", "storm", "thunder"]
            .iter()
            .any(|word| conditions.contains(word))
    }
}

/// A forecast day with its predicted impact.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DayImpact {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub wind_speed_kmh: f64,
    pub conditions: String,
    pub predicted_impact: WeatherImpact,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeatherImpactReport {
    pub site_id: String,
    pub phase: Phase,
    pub days: Vec<DayImpact>,
    pub high_impact_days: usize,
    pub medium_impact_days: usize,
    /// Expected delay in days, always a non-negative multiple of 0.5.
    pub predicted_delay_days: f64,
    pub recommendations: Vec<String>,
    /// Whether site history (rather than fixed rules) drove the classification.
    pub used_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RainBracket {
    Heavy,
    Moderate,
    Light,
}

impl RainBracket {
    fn of(rainfall_mm: f64) -> Self {
        if rainfall_mm > HEAVY_RAIN_MM {
            Self::Heavy
        } else if rainfall_mm >= MODERATE_RAIN_MM {
            Self::Moderate
        } else {
            Self::Light
        }
    }
}

// ============================================================================
// Forecast sources
// ============================================================================

/// Supplies daily forecasts for a site.
pub trait ForecastProvider {
    fn forecast(&self, site_id: &str, start: NaiveDate, days: usize) -> Result<Vec<ForecastDay>>;
}

/// Simulated forecast: each day gets the mean rainfall and wind of the
/// historical records from the same calendar month.
///
/// Months without history produce dry, calm days.
#[derive(Debug, Clone)]
pub struct HistoricalAnalogForecast<'a> {
    history: &'a [WeatherRecord],
}

impl<'a> HistoricalAnalogForecast<'a> {
    pub fn new(history: &'a [WeatherRecord]) -> Self {
        Self { history }
    }
}

impl ForecastProvider for HistoricalAnalogForecast<'_> {
    fn forecast(&self, _site_id: &str, start: NaiveDate, days: usize) -> Result<Vec<ForecastDay>> {
        // month -> (rain sum, wind sum, count)
        let mut monthly: HashMap<u32, (f64, f64, usize)> = HashMap::new();
        for record in self.history {
            let entry = monthly.entry(record.date.month()).or_default();
            entry.0 += record.rainfall_mm;
            entry.1 += record.wind_speed_kmh;
            entry.2 += 1;
        }

        Ok((0..days)
            .map(|offset| {
                let date = start + Duration::days(offset as i64);
                let (rainfall_mm, wind_speed_kmh) = match monthly.get(&date.month()) {
                    Some(&(rain, wind, n)) if n > 0 => (rain / n as f64, wind / n as f64),
                    _ => (0.0, 0.0),
                };
                let conditions = if rainfall_mm >= ANALOG_RAIN_MM { "rain" } else { "clear" };
                ForecastDay {
                    date,
                    rainfall_mm,
                    wind_speed_kmh,
                    conditions: conditions.to_string(),
                }
            })
            .collect())
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Fixed-rule impact for a forecast day.
fn static_impact(day: &ForecastDay) -> WeatherImpact {
    if day.rainfall_mm > HEAVY_RAIN_MM {
        WeatherImpact::High
    } else if day.rainfall_mm >= MODERATE_RAIN_MM || day.wind_speed_kmh > HIGH_WIND_KMH {
        WeatherImpact::Medium
    } else if day.is_rain_bearing() {
        WeatherImpact::Low
    } else {
        WeatherImpact::None
    }
}

/// Impact learned from past days in the same rainfall bracket, if any exist.
fn historical_impact(day: &ForecastDay, history: &[WeatherRecord]) -> Option<WeatherImpact> {
    let bracket = RainBracket::of(day.rainfall_mm);
    if bracket == RainBracket::Light {
        return None;
    }

    let matching: Vec<u8> = history
        .iter()
        .filter(|r| RainBracket::of(r.rainfall_mm) == bracket)
        .map(|r| r.impact.ordinal())
        .collect();
    if matching.is_empty() {
        return None;
    }

    let avg = matching.iter().map(|&o| o as f64).sum::<f64>() / matching.len() as f64;
    Some(if avg > 2.5 {
        WeatherImpact::High
    } else if avg > 1.5 {
        WeatherImpact::Medium
    } else {
        WeatherImpact::Low
    })
}

/// Delay days per (high, medium) impact day for a project phase.
fn phase_weights(phase: Phase) -> (f64, f64) {
    match phase {
        Phase::Construction | Phase::Installation => (1.0, 0.5),
        Phase::Design | Phase::Planning => (0.2, 0.1),
        _ => (0.5, 0.25),
    }
}

fn round_to_half(value: f64) -> f64 {
    ((value * 2.0).round() / 2.0).max(0.0)
}

// ============================================================================
// Forecaster
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct WeatherImpactForecaster {
    config: EngineConfig,
}

impl WeatherImpactForecaster {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Classify up to `forecast_days` days of `forecast` for a site in `phase`.
    ///
    /// # Example
    /// ```
    /// use chrono::NaiveDate;
    /// use site_intel::{ForecastDay, Phase, WeatherImpactForecaster};
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    /// let forecast = vec![ForecastDay {
    ///     date,
    ///     rainfall_mm: 45.0,
    ///     wind_speed_kmh: 12.0,
    ///     conditions: "heavy rain".to_string(),
    /// }];
    ///
    /// let report = WeatherImpactForecaster::default()
    ///     .forecast("WB-001", Phase::Construction, &forecast, &[]);
    /// assert_eq!(report.high_impact_days, 1);
    /// assert_eq!(report.predicted_delay_days, 1.0);
    /// ```
    pub fn forecast(
        &self,
        site_id: &str,
        phase: Phase,
        forecast: &[ForecastDay],
        history: &[WeatherRecord],
    ) -> WeatherImpactReport {
        let used_history = history.len() >= MIN_HISTORY_RECORDS;

        let days: Vec<DayImpact> = forecast
            .iter()
            .take(self.config.forecast_days)
            .map(|day| {
                let predicted_impact = used_history
                    .then(|| historical_impact(day, history))
                    .flatten()
                    .unwrap_or_else(|| static_impact(day));
                DayImpact {
                    date: day.date,
                    rainfall_mm: day.rainfall_mm,
                    wind_speed_kmh: day.wind_speed_kmh,
                    conditions: day.conditions.clone(),
                    predicted_impact,
                }
            })
            .collect();

        let high_impact_days = days.iter().filter(|d| d.predicted_impact == WeatherImpact::High).count();
        let medium_impact_days = days.iter().filter(|d| d.predicted_impact == WeatherImpact::Medium).count();

        let (high_weight, medium_weight) = phase_weights(phase);
        let predicted_delay_days =
            round_to_half(high_impact_days as f64 * high_weight + medium_impact_days as f64 * medium_weight);

        let mut recommendations = Vec::new();
        if predicted_delay_days > DELAY_BUFFER_THRESHOLD_DAYS {
            recommendations.push(format!(
                "Expect about {predicted_delay_days} days of weather delay over the next {} days; add buffer to the schedule",
                days.len()
            ));
        }
        if high_impact_days > 2 && matches!(phase, Phase::Construction | Phase::Installation) {
            recommendations.push(format!(
                "{high_impact_days} high-impact weather days are forecast during {phase}: move panel mounting and electrical work to clear days"
            ));
        }
        let heavy_rain_dates: Vec<String> = days
            .iter()
            .filter(|d| d.rainfall_mm > HEAVY_RAIN_MM)
            .map(|d| d.date.to_string())
            .collect();
        if !heavy_rain_dates.is_empty() {
            recommendations.push(format!(
                "Heavy rain forecast on {}: secure stored materials and check site drainage",
                heavy_rain_dates.join(", ")
            ));
        }

        debug!(
            "Weather forecast for {}: {} high, {} medium days, {} days delay (history: {})",
            site_id, high_impact_days, medium_impact_days, predicted_delay_days, used_history
        );

        WeatherImpactReport {
            site_id: site_id.to_string(),
            phase,
            days,
            high_impact_days,
            medium_impact_days,
            predicted_delay_days,
            recommendations,
            used_history,
        }
    }

    /// Fetch `forecast_days` days from `provider` starting at `start`, then classify them.
    pub fn forecast_with<P: ForecastProvider + ?Sized>(
        &self,
        provider: &P,
        site_id: &str,
        phase: Phase,
        history: &[WeatherRecord],
        start: NaiveDate,
    ) -> Result<WeatherImpactReport> {
        let forecast = provider.forecast(site_id, start, self.config.forecast_days)?;
        Ok(self.forecast(site_id, phase, &forecast, history))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn day(offset: i64, rainfall_mm: f64, wind_speed_kmh: f64, conditions: &str) -> ForecastDay {
        ForecastDay {
            date: start() + Duration::days(offset),
            rainfall_mm,
            wind_speed_kmh,
            conditions: conditions.to_string(),
        }
    }

    fn record(rainfall_mm: f64, impact: WeatherImpact) -> WeatherRecord {
        WeatherRecord {
            date: NaiveDate::from_ymd_opt(2023, 7, 10).unwrap(),
            rainfall_mm,
            wind_speed_kmh: 10.0,
            impact,
        }
    }

    #[test]
    fn test_static_rules() {
        assert_eq!(static_impact(&day(0, 31.0, 0.0, "storm")), WeatherImpact::High);
        assert_eq!(static_impact(&day(0, 10.0, 0.0, "rain")), WeatherImpact::Medium);
        assert_eq!(static_impact(&day(0, 0.0, 30.0, "clear")), WeatherImpact::Medium);
        assert_eq!(static_impact(&day(0, 2.0, 5.0, "Light Drizzle")), WeatherImpact::Low);
        assert_eq!(static_impact(&day(0, 0.0, 5.0, "sunny")), WeatherImpact::None);
    }

    #[test]
    fn test_history_drives_classification() {
        // This site has historically shrugged off moderate rain.
        let history = vec![
            record(15.0, WeatherImpact::Low),
            record(20.0, WeatherImpact::Low),
            record(12.0, WeatherImpact::Medium),
            record(40.0, WeatherImpact::High),
            record(0.0, WeatherImpact::None),
        ];
        let forecast = vec![day(0, 18.0, 5.0, "rain"), day(1, 50.0, 5.0, "rain"), day(2, 0.0, 5.0, "clear")];

        let report = WeatherImpactForecaster::default().forecast("s", Phase::Construction, &forecast, &history);
        assert!(report.used_history);
        let impacts: Vec<WeatherImpact> = report.days.iter().map(|d| d.predicted_impact).collect();
        // moderate avg 1.33 -> low, heavy avg 3 -> high, dry day -> fixed rules
        assert_eq!(impacts, vec![WeatherImpact::Low, WeatherImpact::High, WeatherImpact::None]);
    }

    #[test]
    fn test_short_history_uses_static_rules() {
        let history = vec![record(15.0, WeatherImpact::Low)];
        let forecast = vec![day(0, 18.0, 5.0, "rain")];
        let report = WeatherImpactForecaster::default().forecast("s", Phase::Construction, &forecast, &history);
        assert!(!report.used_history);
        assert_eq!(report.days[0].predicted_impact, WeatherImpact::Medium);
    }

    #[test]
    fn test_phase_weighted_delay() {
        let forecast = vec![
            day(0, 35.0, 0.0, "rain"),
            day(1, 35.0, 0.0, "rain"),
            day(2, 35.0, 0.0, "rain"),
            day(3, 15.0, 0.0, "rain"),
        ];
        let forecaster = WeatherImpactForecaster::default();

        let construction = forecaster.forecast("s", Phase::Construction, &forecast, &[]);
        assert_eq!(construction.high_impact_days, 3);
        assert_eq!(construction.medium_impact_days, 1);
        assert_eq!(construction.predicted_delay_days, 3.5);
        assert_eq!(construction.recommendations.len(), 3);

        let design = forecaster.forecast("s", Phase::Design, &forecast, &[]);
        // 3 * 0.2 + 0.1 = 0.7 -> 0.5
        assert_eq!(design.predicted_delay_days, 0.5);
        // Only the heavy-rain recommendation applies
        assert_eq!(design.recommendations.len(), 1);

        let procurement = forecaster.forecast("s", Phase::Procurement, &forecast, &[]);
        // 3 * 0.5 + 0.25 = 1.75 -> 2.0
        assert_eq!(procurement.predicted_delay_days, 2.0);
    }

    #[test]
    fn test_delay_is_non_negative_half_multiple() {
        let forecaster = WeatherImpactForecaster::default();
        for n in 0..12 {
            let forecast: Vec<ForecastDay> = (0..n)
                .map(|i| day(i, if i % 3 == 0 { 40.0 } else { 12.0 }, 0.0, "rain"))
                .collect();
            for phase in [Phase::Construction, Phase::Planning, Phase::Commissioning] {
                let report = forecaster.forecast("s", phase, &forecast, &[]);
                let doubled = report.predicted_delay_days * 2.0;
                assert!(report.predicted_delay_days >= 0.0);
                assert_eq!(doubled, doubled.round());
            }
        }
    }

    #[test]
    fn test_forecast_window_limited() {
        let forecast: Vec<ForecastDay> = (0..30).map(|i| day(i, 0.0, 0.0, "clear")).collect();
        let report = WeatherImpactForecaster::default().forecast("s", Phase::Construction, &forecast, &[]);
        assert_eq!(report.days.len(), 15);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_historical_analog_forecast() {
        let history = vec![
            WeatherRecord {
                date: NaiveDate::from_ymd_opt(2023, 7, 3).unwrap(),
                rainfall_mm: 20.0,
                wind_speed_kmh: 10.0,
                impact: WeatherImpact::Medium,
            },
            WeatherRecord {
                date: NaiveDate::from_ymd_opt(2022, 7, 9).unwrap(),
                rainfall_mm: 10.0,
                wind_speed_kmh: 20.0,
                impact: WeatherImpact::Low,
            },
        ];
        let provider = HistoricalAnalogForecast::new(&history);
        let days = provider.forecast("s", NaiveDate::from_ymd_opt(2024, 7, 30).unwrap(), 4).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0].rainfall_mm, 15.0);
        assert_eq!(days[0].conditions, "rain");
        // August has no history
        assert_eq!(days[2].rainfall_mm, 0.0);
        assert_eq!(days[2].conditions, "clear");

        let report = WeatherImpactForecaster::default()
            .forecast_with(&provider, "s", Phase::Construction, &history, start())
            .unwrap();
        assert_eq!(report.days.len(), 15);
        assert_eq!(report.medium_impact_days, 15);
    }
}

//! Completion-date prediction and composite delay-risk scoring.
//!
//! ## Completion prediction
//! Three tiers, first applicable wins:
//! 1. **Milestone variance** - with 3+ milestones, if at least 2 of the 3 most
//!    recently updated are completed with an actual date, shift the original
//!    estimate by their average slip.
//! 2. **Linear velocity** - extrapolate `completion / days elapsed` forward from today.
//! 3. **Original estimate** - no progress yet; risk is pinned to medium.
//!
//! ## Risk score
//! Additive components (schedule, weather, materials, critical path,
//! efficiency, staffing), classified with [`RiskLevel::from_score`].

use chrono::{Datelike, NaiveDate, TimeDelta};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo_utils::{degree_box, haversine_km};
use crate::model::{Milestone, MilestoneStatus, ProjectProgress, ProjectRecord, Task, TaskStatus};
use crate::{push_unique, EngineConfig, EngineError, Result, RiskLevel, Site, SiteStatus};

/// Efficiency score below which the risk score is raised.
const EFFICIENCY_RISK_THRESHOLD: u8 = 60;
/// Efficiency score below which a quality check is suggested.
const EFFICIENCY_REVIEW_THRESHOLD: u8 = 70;
/// Average task slip (days) at which the delay half of the efficiency score reaches zero.
const EFFICIENCY_DELAY_HORIZON_DAYS: f64 = 14.0;
/// Weather records considered for the weather component.
const RECENT_WEATHER_RECORDS: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// Which heuristic produced a completion date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PredictionMethod {
    MilestoneVariance,
    LinearVelocity,
    /// No progress evidence yet; the project's own estimate is reported as is.
    #[default]
    OriginalEstimate,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompletionPrediction {
    pub predicted_date: NaiveDate,
    pub method: PredictionMethod,
    /// Predicted date minus the original estimate, in days (negative = early).
    pub delay_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DelayCause {
    Schedule,
    Weather,
    Materials,
    CriticalPath,
    Efficiency,
    Staffing,
}

/// A risk factor that contributed to the score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PotentialDelay {
    pub cause: DelayCause,
    pub description: String,
    pub severity: RiskLevel,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NearbySite {
    pub site_id: String,
    pub distance_km: f64,
    pub status: SiteStatus,
}

/// Full risk assessment for one site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskReport {
    pub site_id: String,
    pub prediction: CompletionPrediction,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub efficiency_score: u8,
    pub potential_delays: Vec<PotentialDelay>,
    pub suggestions: Vec<String>,
    /// Closest related sites, nearest first.
    pub nearby_sites: Vec<NearbySite>,
}

/// Site position for R-tree queries.
#[derive(Debug, Clone, Copy)]
struct IndexedSite {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedSite {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

// ============================================================================
// Free-standing heuristics
// ============================================================================

/// Efficiency score (0-100) of completed tasks with both planned and actual end dates.
///
/// `round(100 * (on_time_rate * 0.7 + max(0, 1 - avg_delay_days / 14) * 0.3))`.
/// Returns 100 when no task has been measured yet.
pub fn efficiency_score(tasks: &[&Task]) -> u8 {
    let slips: Vec<i64> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| match (t.planned_end_date, t.actual_end_date) {
            (Some(planned), Some(actual)) => Some((actual - planned).num_days()),
            _ => None,
        })
        .collect();

    if slips.is_empty() {
        return 100;
    }

    let n = slips.len() as f64;
    let on_time_rate = slips.iter().filter(|&&d| d <= 0).count() as f64 / n;
    let avg_delay = slips.iter().map(|&d| d.max(0) as f64).sum::<f64>() / n;
    let delay_factor = (1.0 - avg_delay / EFFICIENCY_DELAY_HORIZON_DAYS).max(0.0);

    (100.0 * (on_time_rate * 0.7 + delay_factor * 0.3)).round() as u8
}

/// `base` shifted by `days` (rounded), saturating at the ends of the calendar.
fn offset_date(base: NaiveDate, days: f64) -> NaiveDate {
    let days = days.round() as i64;
    TimeDelta::try_days(days)
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Predict the completion date of a project as of `today`.
///
/// Predictions beyond the representable calendar saturate at `NaiveDate::MAX`.
pub fn predict_completion(progress: &ProjectProgress, today: NaiveDate) -> CompletionPrediction {
    let estimate = progress.estimated_completion_date;
    let build = |predicted_date: NaiveDate, method| CompletionPrediction {
        predicted_date,
        method,
        delay_days: (predicted_date - estimate).num_days(),
    };

    if let Some(slip) = recent_milestone_slip(&progress.milestones) {
        debug!("Completion predicted from milestone slip of {:.1} days", slip);
        return build(offset_date(estimate, slip), PredictionMethod::MilestoneVariance);
    }

    let completion = progress.overall_completion;
    if completion > 0.0 {
        let days_elapsed = (today - progress.start_date).num_days().max(1) as f64;
        let velocity = completion / days_elapsed;
        let days_remaining = (100.0 - completion).max(0.0) / velocity;
        debug!(
            "Completion predicted from velocity {:.3}%/day, {:.1} days remaining",
            velocity, days_remaining
        );
        return build(offset_date(today, days_remaining), PredictionMethod::LinearVelocity);
    }

    build(estimate, PredictionMethod::OriginalEstimate)
}

/// Average slip (days) of recently completed milestones, if enough evidence exists.
fn recent_milestone_slip(milestones: &[Milestone]) -> Option<f64> {
    if milestones.len() < 3 {
        return None;
    }

    let mut recent: Vec<&Milestone> = milestones.iter().collect();
    recent.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

    let slips: Vec<i64> = recent
        .iter()
        .take(3)
        .filter(|m| m.status == MilestoneStatus::Completed)
        .filter_map(|m| m.actual_date.map(|actual| (actual - m.planned_date).num_days()))
        .collect();

    if slips.len() < 2 {
        return None;
    }
    Some(slips.iter().sum::<i64>() as f64 / slips.len() as f64)
}

fn is_monsoon(date: NaiveDate) -> bool {
    (6..=9).contains(&date.month())
}

// ============================================================================
// Predictor
// ============================================================================

/// Scores delay risk for sites and proposes mitigations.
#[derive(Debug, Clone, Default)]
pub struct RiskPredictor {
    config: EngineConfig,
}

impl RiskPredictor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Sites within `radius_km` of `origin`, nearest first, excluding `origin` itself.
    ///
    /// Candidates are prefiltered with a square degree box before the exact
    /// Haversine check.
    pub fn nearby_sites(&self, origin: &Site, sites: &[Site], radius_km: f64) -> Vec<NearbySite> {
        let indexed: Vec<IndexedSite> = sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.id != origin.id && s.location.is_valid())
            .map(|(idx, s)| IndexedSite {
                idx,
                lat: s.location.latitude,
                lng: s.location.longitude,
            })
            .collect();
        let tree = RTree::bulk_load(indexed);

        let bounds = degree_box(&origin.location, self.config.nearby_prefilter_degrees);
        let envelope = AABB::from_corners([bounds.min_lng, bounds.min_lat], [bounds.max_lng, bounds.max_lat]);

        let mut nearby: Vec<NearbySite> = tree
            .locate_in_envelope(&envelope)
            .filter_map(|entry| {
                let site = &sites[entry.idx];
                let distance_km = haversine_km(&origin.location, &site.location);
                (distance_km <= radius_km).then(|| NearbySite {
                    site_id: site.id.clone(),
                    distance_km,
                    status: site.status,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby
    }

    /// Assess a site's delay risk as of `today`.
    ///
    /// `sites` is the pool searched for nearby related sites; it may include
    /// `site` itself.
    ///
    /// # Errors
    /// [`EngineError::InvalidInput`] if the project has no progress data.
    pub fn assess(
        &self,
        site: &Site,
        project: &ProjectRecord,
        sites: &[Site],
        today: NaiveDate,
    ) -> Result<RiskReport> {
        let progress = project.progress.as_ref().ok_or_else(|| {
            EngineError::InvalidInput(format!("site {} has no progress data", site.id))
        })?;

        let prediction = predict_completion(progress, today);
        let mut score = 0.0;
        let mut delays = Vec::new();
        let mut suggestions = Vec::new();

        // Schedule
        let total_days = (progress.estimated_completion_date - progress.start_date)
            .num_days()
            .max(1) as f64;
        let delay = prediction.delay_days;
        let severe_slip = delay as f64 > total_days * 0.2;
        if delay <= 0 {
            score += 1.0;
        } else {
            score += if severe_slip { 3.0 } else { 2.0 };
            delays.push(PotentialDelay {
                cause: DelayCause::Schedule,
                description: format!(
                    "Projected completion {} is {} days after the estimate {}",
                    prediction.predicted_date, delay, progress.estimated_completion_date
                ),
                severity: if severe_slip { RiskLevel::High } else { RiskLevel::Medium },
            });
            push_unique(
                &mut suggestions,
                format!("Add crews or extend shifts to recover the projected {delay}-day slip"),
            );
            if severe_slip {
                push_unique(
                    &mut suggestions,
                    "Re-baseline the schedule with stakeholders: the projected slip exceeds 20% of the project duration".to_string(),
                );
            }
        }

        // Weather
        let mut recent_weather: Vec<_> = project.weather_history.iter().collect();
        recent_weather.sort_by(|a, b| b.date.cmp(&a.date));
        recent_weather.truncate(RECENT_WEATHER_RECORDS);
        let bad_days = recent_weather.iter().filter(|w| w.impact.is_disruptive()).count();
        let frequent_bad_weather = bad_days >= 5;
        let monsoon_exposure = is_monsoon(today) && bad_days > 2;
        if frequent_bad_weather {
            score += 1.0;
        }
        if monsoon_exposure {
            score += 1.0;
        }
        if frequent_bad_weather || monsoon_exposure {
            delays.push(PotentialDelay {
                cause: DelayCause::Weather,
                description: format!(
                    "{} of the last {} recorded days had medium or high weather impact{}",
                    bad_days,
                    recent_weather.len(),
                    if monsoon_exposure { " during the monsoon season" } else { "" }
                ),
                severity: if frequent_bad_weather && monsoon_exposure {
                    RiskLevel::High
                } else {
                    RiskLevel::Medium
                },
            });
            push_unique(
                &mut suggestions,
                "Schedule weather-sensitive work in dry windows and protect stored materials".to_string(),
            );
        }

        // Materials
        let overdue: Vec<&str> = project
            .materials
            .iter()
            .filter(|m| m.status.is_pending())
            .filter(|m| {
                m.expected_delivery_date
                    .is_some_and(|d| (today - d).num_days() > self.config.material_overdue_days)
            })
            .map(|m| m.name.as_str())
            .collect();
        let any_pending = project.materials.iter().any(|m| m.status.is_pending());
        if !overdue.is_empty() {
            score += 1.5;
            delays.push(PotentialDelay {
                cause: DelayCause::Materials,
                description: format!(
                    "{} material deliveries are more than {} days overdue: {}",
                    overdue.len(),
                    self.config.material_overdue_days,
                    overdue.join(", ")
                ),
                severity: RiskLevel::High,
            });
            push_unique(
                &mut suggestions,
                format!("Escalate overdue deliveries with suppliers: {}", overdue.join(", ")),
            );
        } else if any_pending {
            score += 0.5;
            delays.push(PotentialDelay {
                cause: DelayCause::Materials,
                description: "Material deliveries are still pending".to_string(),
                severity: RiskLevel::Low,
            });
            push_unique(
                &mut suggestions,
                "Confirm delivery dates for pending materials with suppliers".to_string(),
            );
        }

        // Critical path
        for milestone in progress
            .milestones
            .iter()
            .filter(|m| m.critical_path && m.status == MilestoneStatus::Delayed)
        {
            score += 0.5;
            delays.push(PotentialDelay {
                cause: DelayCause::CriticalPath,
                description: format!("Critical-path milestone '{}' is delayed", milestone.name),
                severity: RiskLevel::High,
            });
            push_unique(
                &mut suggestions,
                format!(
                    "Prioritize crews and equipment on critical-path milestone '{}'",
                    milestone.name
                ),
            );
        }

        // Efficiency
        let tasks: Vec<&Task> = project.tasks().collect();
        let efficiency = efficiency_score(&tasks);
        if efficiency < EFFICIENCY_RISK_THRESHOLD {
            score += 1.5;
            delays.push(PotentialDelay {
                cause: DelayCause::Efficiency,
                description: format!("Task efficiency score is {efficiency}/100"),
                severity: RiskLevel::Medium,
            });
        }

        // Staffing
        if project.team.is_empty() {
            score += 1.0;
            delays.push(PotentialDelay {
                cause: DelayCause::Staffing,
                description: "No team members are assigned".to_string(),
                severity: RiskLevel::Medium,
            });
            push_unique(&mut suggestions, "Assign a project team to the site".to_string());
        }

        // Nearby sites
        let search_radius = self
            .config
            .nearby_radius_km
            .max(self.config.resource_sharing_radius_km);
        let mut nearby = self.nearby_sites(site, sites, search_radius);

        let partners: Vec<String> = nearby
            .iter()
            .filter(|n| {
                n.status == SiteStatus::UnderConstruction
                    && n.distance_km <= self.config.resource_sharing_radius_km
            })
            .take(self.config.resource_sharing_limit)
            .map(|n| format!("{} ({:.1} km)", n.site_id, n.distance_km))
            .collect();
        if !partners.is_empty() {
            push_unique(
                &mut suggestions,
                format!(
                    "Share crews and equipment with nearby sites under construction: {}",
                    partners.join(", ")
                ),
            );
        }

        if efficiency < EFFICIENCY_REVIEW_THRESHOLD {
            push_unique(
                &mut suggestions,
                format!("Schedule a quality check of completed work: task efficiency is {efficiency}/100"),
            );
        }

        nearby.retain(|n| n.distance_km <= self.config.nearby_radius_km);
        nearby.truncate(self.config.nearby_limit);

        let risk_level = if progress.overall_completion <= 0.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::from_score(score)
        };

        debug!(
            "Site {} risk score {:.1} ({}) via {:?}",
            site.id, score, risk_level, prediction.method
        );

        Ok(RiskReport {
            site_id: site.id.clone(),
            prediction,
            risk_score: score,
            risk_level,
            efficiency_score: efficiency,
            potential_delays: delays,
            suggestions,
            nearby_sites: nearby,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Material, MaterialStatus, Phase, Role, TeamMember, WeatherImpact, WeatherRecord};
    use crate::GeoPoint;
    use chrono::{Duration, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 3, 1)
    }

    fn milestone(name: &str, status: MilestoneStatus, planned: NaiveDate, actual: Option<NaiveDate>, updated_day: u32) -> Milestone {
        Milestone {
            name: name.to_string(),
            phase: None,
            planned_date: planned,
            actual_date: actual,
            status,
            completion_percentage: if status == MilestoneStatus::Completed { 100.0 } else { 40.0 },
            critical_path: false,
            tasks: Vec::new(),
            last_updated: Utc.with_ymd_and_hms(2024, 2, updated_day, 12, 0, 0).unwrap(),
        }
    }

    fn progress(completion: f64) -> ProjectProgress {
        let start = today() - Duration::days(60);
        ProjectProgress {
            overall_completion: completion,
            current_phase: Phase::Construction,
            start_date: start,
            estimated_completion_date: start + Duration::days(60),
            revised_completion_date: None,
            milestones: Vec::new(),
        }
    }

    fn site(id: &str, lat: f64, lng: f64, status: SiteStatus) -> Site {
        Site::new(id, GeoPoint::new(lat, lng), status, "WB")
    }

    fn staffed_project(completion: f64) -> ProjectRecord {
        let mut record = ProjectRecord::new("home");
        record.progress = Some(progress(completion));
        record.team = vec![TeamMember { name: "Asha".into(), role: Role::ProjectManager }];
        record
    }

    fn task(planned: NaiveDate, actual: NaiveDate) -> Task {
        Task {
            name: "task".into(),
            status: TaskStatus::Completed,
            completion_percentage: 100.0,
            planned_end_date: Some(planned),
            actual_end_date: Some(actual),
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_linear_velocity_scenario() {
        let prediction = predict_completion(&progress(50.0), today());
        assert_eq!(prediction.method, PredictionMethod::LinearVelocity);
        assert_eq!(prediction.predicted_date, today() + Duration::days(60));
        assert_eq!(prediction.delay_days, 60);
    }

    #[test]
    fn test_no_progress_uses_estimate() {
        let p = progress(0.0);
        let prediction = predict_completion(&p, today());
        assert_eq!(prediction.method, PredictionMethod::OriginalEstimate);
        assert_eq!(prediction.predicted_date, p.estimated_completion_date);
        assert_eq!(prediction.delay_days, 0);
    }

    #[test]
    fn test_milestone_variance() {
        let mut p = progress(30.0);
        p.milestones = vec![
            milestone("Survey", MilestoneStatus::Completed, date(2024, 1, 5), Some(date(2024, 1, 9)), 10),
            milestone("Design", MilestoneStatus::Completed, date(2024, 1, 20), Some(date(2024, 1, 26)), 12),
            milestone("Procurement", MilestoneStatus::InProgress, date(2024, 2, 20), None, 14),
            milestone("Old", MilestoneStatus::Completed, date(2023, 12, 1), Some(date(2023, 12, 30)), 1),
        ];
        let prediction = predict_completion(&p, today());
        assert_eq!(prediction.method, PredictionMethod::MilestoneVariance);
        // Slips of 4 and 6 days among the three most recent
        assert_eq!(prediction.predicted_date, p.estimated_completion_date + Duration::days(5));
    }

    #[test]
    fn test_milestone_variance_needs_two_completed() {
        let mut p = progress(30.0);
        p.milestones = vec![
            milestone("A", MilestoneStatus::Completed, date(2024, 1, 5), Some(date(2024, 1, 9)), 10),
            milestone("B", MilestoneStatus::InProgress, date(2024, 1, 20), None, 12),
            milestone("C", MilestoneStatus::Pending, date(2024, 2, 20), None, 14),
        ];
        assert_eq!(predict_completion(&p, today()).method, PredictionMethod::LinearVelocity);
    }

    #[test]
    fn test_efficiency_score() {
        let d = date(2024, 1, 10);
        let on_time = task(d, d);
        let late = task(d, d + Duration::days(14));
        assert_eq!(efficiency_score(&[]), 100);
        assert_eq!(efficiency_score(&[&on_time]), 100);
        // on_time_rate 0.5, avg delay 7 days -> 100 * (0.35 + 0.5 * 0.3) = 50
        assert_eq!(efficiency_score(&[&on_time, &late]), 50);
        let very_late = task(d, d + Duration::days(30));
        assert_eq!(efficiency_score(&[&very_late]), 0);
    }

    #[test]
    fn test_zero_completion_is_medium_risk() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::Planned)];
        let mut project = ProjectRecord::new("home");
        project.progress = Some(progress(0.0));
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.risk_level, RiskLevel::Medium);

        project.team = vec![TeamMember { name: "Asha".into(), role: Role::ProjectManager }];
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_missing_progress_is_invalid() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::Planned)];
        let project = ProjectRecord::new("home");
        let err = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_on_schedule_is_low_risk() {
        // 100% of the way in 60 of 60 days: on time.
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let report = RiskPredictor::default()
            .assess(&sites[0], &staffed_project(100.0), &sites, today())
            .unwrap();
        assert_eq!(report.risk_score, 1.0);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.potential_delays.is_empty());
    }

    #[test]
    fn test_score_components() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let mut project = staffed_project(50.0);
        project.team.clear();
        project.materials = vec![Material {
            name: "Inverters".into(),
            status: MaterialStatus::Shipped,
            expected_delivery_date: Some(today() - Duration::days(10)),
            actual_delivery_date: None,
        }];
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        // schedule 3 (60-day slip on 60-day project) + materials 1.5 + staffing 1
        assert_eq!(report.risk_score, 5.5);
        assert_eq!(report.risk_level, RiskLevel::High);
        assert!(report.suggestions.iter().any(|s| s.contains("Inverters")));
        let causes: Vec<DelayCause> = report.potential_delays.iter().map(|d| d.cause).collect();
        assert_eq!(causes, vec![DelayCause::Schedule, DelayCause::Materials, DelayCause::Staffing]);
    }

    #[test]
    fn test_weather_component_in_monsoon() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let july = date(2024, 7, 15);
        let mut project = staffed_project(100.0);
        if let Some(p) = project.progress.as_mut() {
            p.start_date = july - Duration::days(60);
            p.estimated_completion_date = july;
        }
        project.weather_history = (0..10)
            .map(|i| WeatherRecord {
                date: july - Duration::days(i),
                rainfall_mm: 20.0,
                wind_speed_kmh: 10.0,
                impact: if i < 5 { WeatherImpact::High } else { WeatherImpact::None },
            })
            .collect();
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, july).unwrap();
        // schedule 1 + frequent bad weather 1 + monsoon 1
        assert_eq!(report.risk_score, 3.0);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_tiny_completion_saturates_prediction() {
        for completion in [0.0001, 1e-9] {
            let mut p = progress(completion);
            p.start_date = today() - Duration::days(100);
            let prediction = predict_completion(&p, today());
            assert_eq!(prediction.method, PredictionMethod::LinearVelocity);
            assert_eq!(prediction.predicted_date, NaiveDate::MAX);
            assert!(prediction.delay_days > 0);
        }

        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let mut project = staffed_project(0.0001);
        if let Some(p) = project.progress.as_mut() {
            p.start_date = today() - Duration::days(100);
        }
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.prediction.predicted_date, NaiveDate::MAX);
        assert_eq!(report.risk_score, 3.0);
    }

    #[test]
    fn test_frequent_bad_weather_outside_monsoon() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let weather = |bad: i64| -> Vec<WeatherRecord> {
            (0..10)
                .map(|i| WeatherRecord {
                    date: today() - Duration::days(i),
                    rainfall_mm: 20.0,
                    wind_speed_kmh: 10.0,
                    impact: if i < bad { WeatherImpact::High } else { WeatherImpact::None },
                })
                .collect()
        };

        let mut project = staffed_project(100.0);
        project.weather_history = weather(5);
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.risk_score, 2.0);
        assert_eq!(report.potential_delays.len(), 1);
        let delay = &report.potential_delays[0];
        assert_eq!(delay.cause, DelayCause::Weather);
        assert_eq!(delay.severity, RiskLevel::Medium);
        assert!(!delay.description.contains("monsoon"));
        assert!(report.suggestions.contains(
            &"Schedule weather-sensitive work in dry windows and protect stored materials".to_string()
        ));

        project.weather_history = weather(4);
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.risk_score, 1.0);
        assert!(report.potential_delays.is_empty());
    }

    #[test]
    fn test_pending_material_adds_half_point() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let mut project = staffed_project(100.0);
        project.materials = vec![Material {
            name: "Cables".into(),
            status: MaterialStatus::Ordered,
            expected_delivery_date: Some(today() + Duration::days(5)),
            actual_delivery_date: None,
        }];
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.risk_score, 1.5);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.potential_delays.len(), 1);
        assert_eq!(report.potential_delays[0].cause, DelayCause::Materials);
        assert_eq!(report.potential_delays[0].severity, RiskLevel::Low);
        assert!(report
            .suggestions
            .contains(&"Confirm delivery dates for pending materials with suppliers".to_string()));
    }

    fn project_with_tasks(tasks: Vec<Task>) -> ProjectRecord {
        let mut project = staffed_project(100.0);
        if let Some(p) = project.progress.as_mut() {
            let mut m = milestone("Wiring", MilestoneStatus::InProgress, date(2024, 2, 1), None, 1);
            m.tasks = tasks;
            p.milestones = vec![m];
        }
        project
    }

    #[test]
    fn test_low_efficiency_adds_risk() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let d = date(2024, 1, 10);
        let project = project_with_tasks(vec![task(d, d + Duration::days(30))]);
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.efficiency_score, 0);
        assert_eq!(report.risk_score, 2.5);
        assert_eq!(report.potential_delays.len(), 1);
        assert_eq!(report.potential_delays[0].cause, DelayCause::Efficiency);
        assert_eq!(report.potential_delays[0].description, "Task efficiency score is 0/100");
        assert!(report.suggestions.contains(
            &"Schedule a quality check of completed work: task efficiency is 0/100".to_string()
        ));
    }

    #[test]
    fn test_middling_efficiency_suggests_quality_check_only() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let d = date(2024, 1, 10);
        // on_time_rate 2/3, avg delay 14/3 days -> 100 * (0.467 + 0.2) = 67
        let project = project_with_tasks(vec![task(d, d), task(d, d), task(d, d + Duration::days(14))]);
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        assert_eq!(report.efficiency_score, 67);
        assert_eq!(report.risk_score, 1.0);
        assert!(report.potential_delays.is_empty());
        assert_eq!(
            report.suggestions,
            vec!["Schedule a quality check of completed work: task efficiency is 67/100".to_string()]
        );
    }

    #[test]
    fn test_score_monotonic_in_delayed_critical_milestones() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let mut previous = f64::MIN;
        for delayed in 0..4 {
            let mut project = staffed_project(50.0);
            if let Some(p) = project.progress.as_mut() {
                p.milestones = (0..delayed)
                    .map(|i| {
                        let mut m = milestone(&format!("Critical {i}"), MilestoneStatus::Delayed, date(2024, 2, 1), None, 1);
                        m.critical_path = true;
                        m
                    })
                    .collect();
            }
            let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
            assert!(report.risk_score >= previous);
            previous = report.risk_score;
        }
    }

    #[test]
    fn test_nearby_sites_sorted_and_limited() {
        let mut sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        for i in 1..=7 {
            sites.push(site(&format!("n{i}"), 22.0 + i as f64 * 0.02, 87.0, SiteStatus::UnderConstruction));
        }
        // Inside the degree box but outside 50 km
        sites.push(site("edge", 22.0, 87.49, SiteStatus::Planned));
        // Outside the degree box entirely
        sites.push(site("far", 23.0, 87.0, SiteStatus::Planned));

        let report = RiskPredictor::default()
            .assess(&sites[0], &staffed_project(100.0), &sites, today())
            .unwrap();
        let ids: Vec<&str> = report.nearby_sites.iter().map(|n| n.site_id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2", "n3", "n4", "n5"]);
        assert!(report
            .nearby_sites
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km));

        let sharing = report
            .suggestions
            .iter()
            .find(|s| s.starts_with("Share crews"))
            .unwrap();
        assert!(sharing.contains("n1") && sharing.contains("n3"));
        assert!(!sharing.contains("n4"));
    }

    #[test]
    fn test_suggestions_are_unique() {
        let sites = vec![site("home", 22.0, 87.0, SiteStatus::UnderConstruction)];
        let mut project = staffed_project(50.0);
        if let Some(p) = project.progress.as_mut() {
            p.milestones = (0..3)
                .map(|_| {
                    let mut m = milestone("Grid tie-in", MilestoneStatus::Delayed, date(2024, 2, 1), None, 1);
                    m.critical_path = true;
                    m
                })
                .collect();
        }
        let report = RiskPredictor::default().assess(&sites[0], &project, &sites, today()).unwrap();
        let mut deduped = report.suggestions.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), report.suggestions.len());
        assert_eq!(
            report.suggestions.iter().filter(|s| s.contains("Grid tie-in")).count(),
            1
        );
    }
}

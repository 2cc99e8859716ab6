//! Progress-rate and issue-pattern anomaly detection for one site.
//!
//! Four independent checks feed one report:
//! - implausibly fast progress between close history readings
//! - task issue types that keep recurring
//! - a high share of tasks carrying issues
//! - as-built array parameters that deviate from the design
//!
//! Each check can only raise the risk level, never lower it.

use std::collections::BTreeMap;

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::model::{ArrayParameters, ProgressSnapshot, ProjectRecord};
use crate::{push_unique, RiskLevel};

/// Readings further apart than this are not compared.
const MAX_RATE_GAP_DAYS: i64 = 7;
/// Percentage points per day above which progress is implausible.
const MAX_PROGRESS_RATE: f64 = 3.0;
const RECURRING_ISSUE_COUNT: usize = 3;
const SEVERE_ISSUE_COUNT: usize = 5;
/// Percent of tasks with issues that triggers a review.
const ISSUE_RATE_PERCENT: f64 = 25.0;
const MAX_TILT_DEVIATION: f64 = 5.0;
const MAX_AZIMUTH_DEVIATION: f64 = 10.0;
const SEVERE_DEVIATION_COUNT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualityAnalysis {
    pub potential_issues: Vec<String>,
    pub recommended_checks: Vec<String>,
    pub risk_level: RiskLevel,
    pub affected_components: Vec<String>,
}

impl QualityAnalysis {
    fn raise(&mut self, level: RiskLevel) {
        self.risk_level = self.risk_level.max(level);
    }
}

/// Smallest angle between two compass bearings, in degrees (0-180).
pub fn azimuth_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Inspection template for a recurring issue type.
fn recurring_issue_check(issue_type: &str) -> String {
    let lower = issue_type.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["electric", "wiring", "cable", "inverter", "connector"]) {
        format!("Inspect electrical connections, cabling and inverter terminals for recurring '{issue_type}' issues")
    } else if has(&["structur", "mount", "racking", "foundation", "frame"]) {
        format!("Check mounting structures, fasteners and foundations for recurring '{issue_type}' issues")
    } else if has(&["water", "leak", "moisture", "ingress", "seal"]) {
        format!("Test enclosures and cable entries for water ingress after recurring '{issue_type}' issues")
    } else {
        format!("Review workmanship and procedures behind the recurring '{issue_type}' issues")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityAnomalyDetector;

impl QualityAnomalyDetector {
    pub fn new() -> Self {
        Self
    }

    /// Run every check against `project`.
    pub fn analyze(&self, project: &ProjectRecord) -> QualityAnalysis {
        let mut analysis = QualityAnalysis::default();

        self.check_progress_rate(&project.progress_history, &mut analysis);
        self.check_issues(project, &mut analysis);
        if let (Some(design), Some(actual)) = (&project.design_parameters, &project.actual_parameters) {
            self.check_parameters(design, actual, &mut analysis);
        }

        if analysis.potential_issues.is_empty() {
            analysis
                .recommended_checks
                .push("No quality issues detected; continue routine inspections".to_string());
        }

        debug!(
            "Quality analysis for {}: {} issues, risk {}",
            project.site_id,
            analysis.potential_issues.len(),
            analysis.risk_level
        );

        analysis
    }

    fn check_progress_rate(&self, history: &[ProgressSnapshot], analysis: &mut QualityAnalysis) {
        let mut readings = history.to_vec();
        readings.sort_by_key(|s| s.date);

        for pair in readings.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let days = (next.date - prev.date).num_days();
            if days <= 0 || days > MAX_RATE_GAP_DAYS {
                continue;
            }

            let delta = next.completion - prev.completion;
            let rate = delta / days as f64;
            if rate > MAX_PROGRESS_RATE {
                analysis.potential_issues.push(format!(
                    "Progress rose {delta:.1}% in {days} days ({rate:.1}%/day) between {} and {}",
                    prev.date, next.date
                ));
                push_unique(
                    &mut analysis.recommended_checks,
                    "Verify reported progress against an on-site inspection".to_string(),
                );
                analysis.raise(RiskLevel::Medium);
            }
        }
    }

    fn check_issues(&self, project: &ProjectRecord, analysis: &mut QualityAnalysis) {
        // issue type -> (count, components)
        let mut by_type: BTreeMap<&str, (usize, Vec<&str>)> = BTreeMap::new();
        let mut total_tasks = 0usize;
        let mut tasks_with_issues = 0usize;

        for task in project.tasks() {
            total_tasks += 1;
            if !task.issues.is_empty() {
                tasks_with_issues += 1;
            }
            for issue in &task.issues {
                let entry = by_type.entry(issue.issue_type.as_str()).or_default();
                entry.0 += 1;
                if let Some(component) = issue.component.as_deref() {
                    push_unique(&mut entry.1, component);
                }
            }
        }

        for (issue_type, (count, components)) in &by_type {
            if *count < RECURRING_ISSUE_COUNT {
                continue;
            }
            analysis
                .potential_issues
                .push(format!("Recurring issue '{issue_type}' reported {count} times"));
            push_unique(&mut analysis.recommended_checks, recurring_issue_check(issue_type));
            for component in components {
                push_unique(&mut analysis.affected_components, component.to_string());
            }
            if *count >= SEVERE_ISSUE_COUNT {
                analysis.raise(RiskLevel::High);
            }
        }

        if total_tasks > 0 {
            let rate = tasks_with_issues as f64 / total_tasks as f64 * 100.0;
            if rate >= ISSUE_RATE_PERCENT {
                analysis.potential_issues.push(format!(
                    "{tasks_with_issues} of {total_tasks} tasks ({rate:.0}%) reported issues"
                ));
                push_unique(
                    &mut analysis.recommended_checks,
                    "Review quality control procedures with the site team".to_string(),
                );
                analysis.raise(RiskLevel::Medium);
            }
        }
    }

    fn check_parameters(&self, design: &ArrayParameters, actual: &ArrayParameters, analysis: &mut QualityAnalysis) {
        let mut deviations = 0;

        if let (Some(planned), Some(built)) = (design.tilt_degrees, actual.tilt_degrees) {
            let diff = (planned - built).abs();
            if diff > MAX_TILT_DEVIATION {
                deviations += 1;
                analysis.potential_issues.push(format!(
                    "Array tilt {built:.1}° deviates {diff:.1}° from the design {planned:.1}°"
                ));
                push_unique(&mut analysis.affected_components, "array tilt".to_string());
            }
        }

        if let (Some(planned), Some(built)) = (design.azimuth_degrees, actual.azimuth_degrees) {
            let diff = azimuth_difference(planned, built);
            if diff > MAX_AZIMUTH_DEVIATION {
                deviations += 1;
                analysis.potential_issues.push(format!(
                    "Array azimuth {built:.1}° deviates {diff:.1}° from the design {planned:.1}°"
                ));
                push_unique(&mut analysis.affected_components, "array azimuth".to_string());
            }
        }

        if let (Some(planned), Some(built)) = (&design.string_configuration, &actual.string_configuration) {
            if !planned.trim().eq_ignore_ascii_case(built.trim()) {
                deviations += 1;
                analysis.potential_issues.push(format!(
                    "String configuration '{built}' does not match the design '{planned}'"
                ));
                push_unique(&mut analysis.affected_components, "string configuration".to_string());
            }
        }

        if deviations > 0 {
            push_unique(
                &mut analysis.recommended_checks,
                "Survey the installed array against the design parameters".to_string(),
            );
        }
        if deviations >= SEVERE_DEVIATION_COUNT {
            analysis.raise(RiskLevel::High);
        }
    }
}

//! Insight assembly for a site.
//!
//! Runs the risk, quality and resource analyses against a store snapshot and
//! folds their results into one [`AiInsights`] cache entry. Refreshing a site
//! writes that entry back through the [`ProjectStore`]; recomputing with the
//! same inputs yields the same insights apart from `last_updated`.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::quality::QualityAnomalyDetector;
use crate::resources::{ResourceAllocationAnalyzer, ResourceAnalysis, TransferKind};
use crate::risk::{NearbySite, PotentialDelay, PredictionMethod, RiskPredictor};
use crate::store::ProjectStore;
use crate::{push_unique, EngineConfig, EngineError, Result, RiskLevel};

/// Cached analysis output stored on a site's project record.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AiInsights {
    pub predicted_completion_date: NaiveDate,
    /// How `predicted_completion_date` was derived.
    pub prediction_method: PredictionMethod,
    pub risk_assessment: RiskLevel,
    pub potential_delays: Vec<PotentialDelay>,
    pub suggestions: Vec<String>,
    /// At most `nearby_limit` sites, nearest first.
    pub nearby_related_sites: Vec<NearbySite>,
    /// 0-100
    pub efficiency_score: u8,
    pub quality_issues: Vec<String>,
    pub resource_optimizations: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// Resource findings that mention `site_id`, phrased as actions.
fn resource_optimizations(analysis: &ResourceAnalysis, site_id: &str) -> Vec<String> {
    let mut out = Vec::new();

    for transfer in analysis.transfer_suggestions.iter().filter(|t| t.involves(site_id)) {
        let line = match (transfer.kind, transfer.to_site.as_deref()) {
            (TransferKind::Crew, Some(to)) => {
                format!("Reassign crew from {} to {}: {}", transfer.from_site, to, transfer.reason)
            }
            (TransferKind::Equipment, Some(to)) => format!(
                "Move idle {} from {} to {}: {}",
                transfer.resource, transfer.from_site, to, transfer.reason
            ),
            (_, None) => format!(
                "Offer {} from {} to nearby sites: {}",
                transfer.resource, transfer.from_site, transfer.reason
            ),
        };
        push_unique(&mut out, line);
    }

    for finding in analysis.overallocated_resources.iter().filter(|f| f.site_id == site_id) {
        push_unique(&mut out, format!("Rebalance {}: {}", finding.resource, finding.detail));
    }

    for gap in analysis.skill_gaps.iter().filter(|g| g.site_id == site_id) {
        push_unique(
            &mut out,
            format!("Assign a {} for the {} phase", gap.missing_role, gap.phase),
        );
    }

    out
}

/// Assembles and persists [`AiInsights`].
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    config: EngineConfig,
}

impl InsightEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute insights for `site_id` as of `today`, stamped with `now`.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] if the site or its project record is absent
    /// - [`EngineError::InvalidInput`] if the project has no progress data
    /// - [`EngineError::Store`] if the store fails
    pub fn compute_insights<S: ProjectStore + ?Sized>(
        &self,
        store: &S,
        site_id: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AiInsights> {
        let site = store
            .site(site_id)
            .map_err(EngineError::Store)?
            .ok_or_else(|| EngineError::site_not_found(site_id))?;
        let project = store
            .project(site_id)
            .map_err(EngineError::Store)?
            .ok_or_else(|| EngineError::project_not_found(site_id))?;
        let sites = store.sites().map_err(EngineError::Store)?;

        let risk = RiskPredictor::new(self.config.clone()).assess(&site, &project, &sites, today)?;
        let quality = QualityAnomalyDetector::new().analyze(&project);

        let projects = store.projects().map_err(EngineError::Store)?;
        let resources = ResourceAllocationAnalyzer::new(self.config.clone()).analyze(
            &sites,
            &projects,
            Some(site.region.as_str()),
        );

        debug!(
            "Site {}: risk {}, quality {}, {} resource transfers in region {}",
            site_id,
            risk.risk_level,
            quality.risk_level,
            resources.transfer_suggestions.len(),
            site.region
        );

        Ok(AiInsights {
            predicted_completion_date: risk.prediction.predicted_date,
            prediction_method: risk.prediction.method,
            risk_assessment: risk.risk_level,
            potential_delays: risk.potential_delays,
            suggestions: risk.suggestions,
            nearby_related_sites: risk.nearby_sites,
            efficiency_score: risk.efficiency_score,
            quality_issues: quality.potential_issues,
            resource_optimizations: resource_optimizations(&resources, site_id),
            last_updated: now,
        })
    }

    /// Recompute insights for `site_id` and save them on its project record.
    pub fn refresh_site<S: ProjectStore + ?Sized>(&self, store: &S, site_id: &str) -> Result<AiInsights> {
        let started = Instant::now();
        let now = Utc::now();

        let insights = self.compute_insights(store, site_id, now.date_naive(), now)?;
        store.save_insights(site_id, &insights).map_err(EngineError::Store)?;

        info!(
            "Refreshed insights for {} (risk {}) in {:?}",
            site_id,
            insights.risk_assessment,
            started.elapsed()
        );
        Ok(insights)
    }

    /// Refresh each site in turn. One site's failure does not stop the others.
    pub fn refresh_sites<S: ProjectStore + ?Sized>(
        &self,
        store: &S,
        site_ids: &[String],
    ) -> Vec<(String, Result<AiInsights>)> {
        site_ids
            .iter()
            .map(|id| (id.clone(), self.refresh_site(store, id)))
            .collect()
    }

    /// Refresh sites concurrently. Results keep the order of `site_ids`.
    #[cfg(feature = "parallel")]
    pub fn refresh_sites_parallel<S: ProjectStore + ?Sized>(
        &self,
        store: &S,
        site_ids: &[String],
    ) -> Vec<(String, Result<AiInsights>)> {
        use rayon::prelude::*;

        let started = Instant::now();
        let results: Vec<(String, Result<AiInsights>)> = site_ids
            .par_iter()
            .map(|id| (id.clone(), self.refresh_site(store, id)))
            .collect();

        info!(
            "Refreshed {} sites in parallel in {:?}",
            results.len(),
            started.elapsed()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Milestone, MilestoneStatus, Phase, ProjectProgress, ProjectRecord, Role, TeamMember,
    };
    use crate::store::InMemoryStore;
    use crate::{GeoPoint, Site, SiteStatus};
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn progress(completion: f64, phase: Phase, milestones: Vec<Milestone>) -> ProjectProgress {
        let start = today() - Duration::days(60);
        ProjectProgress {
            overall_completion: completion,
            current_phase: phase,
            start_date: start,
            estimated_completion_date: start + Duration::days(120),
            revised_completion_date: None,
            milestones,
        }
    }

    fn crew() -> Vec<TeamMember> {
        [Role::ProjectManager, Role::SiteEngineer, Role::Electrician, Role::SafetyOfficer]
            .into_iter()
            .map(|role| TeamMember { name: role.to_string(), role })
            .collect()
    }

    fn store() -> InMemoryStore {
        let sites = vec![
            Site::new("kgp-1", GeoPoint::new(22.3316, 87.3231), SiteStatus::UnderConstruction, "WB"),
            Site::new("kgp-2", GeoPoint::new(22.3500, 87.3500), SiteStatus::UnderConstruction, "WB"),
            Site::new("kgp-3", GeoPoint::new(22.4000, 87.2000), SiteStatus::Planned, "WB"),
            Site::new("kol-1", GeoPoint::new(22.5834, 88.3433), SiteStatus::UnderConstruction, "WB"),
        ];

        let mut kgp1 = ProjectRecord::new("kgp-1");
        kgp1.progress = Some(progress(90.0, Phase::Construction, Vec::new()));
        kgp1.team = crew();

        let mut kgp2 = ProjectRecord::new("kgp-2");
        kgp2.progress = Some(progress(50.0, Phase::Construction, Vec::new()));
        kgp2.team = crew();

        let mut kgp3 = ProjectRecord::new("kgp-3");
        kgp3.progress = Some(progress(
            0.0,
            Phase::Planning,
            vec![Milestone {
                name: "Site survey".to_string(),
                phase: Some(Phase::Planning),
                planned_date: today() + Duration::days(10),
                actual_date: None,
                status: MilestoneStatus::InProgress,
                completion_percentage: 10.0,
                critical_path: false,
                tasks: Vec::new(),
                last_updated: now(),
            }],
        ));
        kgp3.team = vec![TeamMember { name: "pm".to_string(), role: Role::ProjectManager }];

        InMemoryStore::with_records(sites, vec![kgp1, kgp2, kgp3])
    }

    #[test]
    fn test_missing_site_and_project() {
        let store = store();
        let engine = InsightEngine::default();

        let err = engine.compute_insights(&store, "nope", today(), now()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "site", .. }));

        let err = engine.compute_insights(&store, "kol-1", today(), now()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "project", .. }));
    }

    #[test]
    fn test_missing_progress_is_invalid_input() {
        let store = store();
        store.upsert_project(ProjectRecord::new("kol-1")).unwrap();
        let err = InsightEngine::default()
            .compute_insights(&store, "kol-1", today(), now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_compute_insights() {
        let store = store();
        let insights = InsightEngine::default()
            .compute_insights(&store, "kgp-2", today(), now())
            .unwrap();

        // 50% after 60 of 120 days: on schedule
        assert_eq!(insights.predicted_completion_date, today() + Duration::days(60));
        assert_eq!(insights.prediction_method, PredictionMethod::LinearVelocity);
        assert_eq!(insights.last_updated, now());
        assert_eq!(insights.efficiency_score, 100);
        assert!(insights.quality_issues.is_empty());

        let nearby: Vec<&str> = insights.nearby_related_sites.iter().map(|n| n.site_id.as_str()).collect();
        assert_eq!(nearby, vec!["kgp-1", "kgp-3"]);
        assert!(insights.suggestions.iter().any(|s| s.contains("kgp-1")));

        // kgp-2 is neither donor nor recipient
        assert!(insights.resource_optimizations.is_empty());
    }

    #[test]
    fn test_resource_optimizations_for_recipient() {
        let store = store();
        let insights = InsightEngine::default()
            .compute_insights(&store, "kgp-3", today(), now())
            .unwrap();

        assert_eq!(insights.risk_assessment, RiskLevel::Medium);
        // no progress yet: the original estimate is passed through
        assert_eq!(insights.prediction_method, PredictionMethod::OriginalEstimate);
        assert_eq!(insights.predicted_completion_date, today() + Duration::days(60));
        assert!(insights
            .resource_optimizations
            .iter()
            .any(|s| s.starts_with("Reassign crew from kgp-1 to kgp-3")));
        assert!(insights
            .resource_optimizations
            .iter()
            .any(|s| s == "Assign a surveyor for the planning phase"));
    }

    #[test]
    fn test_refresh_site_saves() {
        let store = store();
        let engine = InsightEngine::default();
        let insights = engine.refresh_site(&store, "kgp-1").unwrap();

        let saved = store.project("kgp-1").unwrap().and_then(|p| p.insights).unwrap();
        assert_eq!(saved, insights);
    }

    #[test]
    fn test_refresh_sites_reports_each() {
        let store = store();
        let ids = vec!["kgp-1".to_string(), "missing".to_string(), "kgp-2".to_string()];
        let results = InsightEngine::default().refresh_sites(&store, &ids);
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_refresh_sites_parallel_keeps_order() {
        let store = store();
        let ids = vec!["kgp-3".to_string(), "kgp-1".to_string(), "kgp-2".to_string()];
        let results = InsightEngine::default().refresh_sites_parallel(&store, &ids);
        let order: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["kgp-3", "kgp-1", "kgp-2"]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_insights_serde_round_trip() {
        let store = store();
        let insights = InsightEngine::default()
            .compute_insights(&store, "kgp-3", today(), now())
            .unwrap();
        let json = serde_json::to_string(&insights).unwrap();
        assert!(json.contains("\"risk_assessment\":\"medium\""));
        let back: AiInsights = serde_json::from_str(&json).unwrap();
        assert_eq!(back, insights);
    }
}

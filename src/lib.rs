//! # Site Intel
//!
//! Decision support for distributed solar installation projects.
//!
//! This library provides:
//! - Proximity clustering of sites around seed sites
//! - Constrained greedy planning of multi-stop field visits
//! - Completion-date prediction and composite delay-risk scoring
//! - Weather-driven delay forecasting
//! - Cross-site team and equipment allocation analysis
//! - Progress and quality anomaly detection
//!
//! Every analysis is a pure function of the records it is given. The only
//! side effect is [`InsightEngine::refresh_site`], which writes the assembled
//! [`AiInsights`] back through a [`ProjectStore`].
//!
//! ## Features
//!
//! - **`parallel`** - Refresh many sites concurrently with rayon
//! - **`serde`** - Serialize records, config and insights
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use site_intel::{cluster_sites, GeoPoint, Site, SiteStatus};
//!
//! let sites = vec![
//!     Site::new("KGP-1", GeoPoint::new(22.3316, 87.3231), SiteStatus::UnderConstruction, "WB"),
//!     Site::new("KGP-2", GeoPoint::new(22.3400, 87.3300), SiteStatus::Planned, "WB"),
//!     Site::new("KOL-1", GeoPoint::new(22.5834, 88.3433), SiteStatus::UnderConstruction, "WB"),
//! ];
//!
//! let clusters = cluster_sites(&sites, 100.0);
//! assert_eq!(clusters.len(), 2);
//! assert_eq!(clusters[0].site_ids, vec!["KGP-1", "KGP-2"]);
//! ```

pub mod error;
pub use error::{EngineError, Result, StoreError};

pub mod geo_utils;

pub mod model;
pub use model::{
    ArrayParameters, EquipmentItem, EquipmentStatus, Material, MaterialStatus, Milestone,
    MilestoneStatus, Phase, Priority, ProgressSnapshot, ProjectProgress, ProjectRecord, Role,
    Task, TaskIssue, TaskStatus, TeamMember, WeatherImpact, WeatherRecord,
};

// Star clustering around seed sites
pub mod cluster;
pub use cluster::{cluster_sites, SiteCluster};

// Greedy multi-stop visit planning
pub mod route;
pub use route::{plan_route, RouteConstraints, RoutePlan, RouteStop};

// Completion prediction and risk scoring
pub mod risk;
pub use risk::{
    CompletionPrediction, DelayCause, NearbySite, PotentialDelay, PredictionMethod, RiskPredictor,
    RiskReport,
};

// Weather delay forecasting
pub mod weather;
pub use weather::{
    ForecastDay, ForecastProvider, HistoricalAnalogForecast, WeatherImpactForecaster,
    WeatherImpactReport,
};

// Cross-site resource analysis
pub mod resources;
pub use resources::{
    ResourceAllocationAnalyzer, ResourceAnalysis, ResourceFinding, ResourceTransfer, SkillGap,
    TransferKind,
};

// Progress and quality anomalies
pub mod quality;
pub use quality::{QualityAnalysis, QualityAnomalyDetector};

// Insight assembly and the project store seam
pub mod store;
pub use store::{InMemoryStore, ProjectStore};

pub mod insights;
pub use insights::{AiInsights, InsightEngine};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use site_intel::GeoPoint;
/// let point = GeoPoint::new(22.5726, 88.3639); // Kolkata
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Latitude/longitude bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// Lifecycle status of a site as tracked by the CRUD layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SiteStatus {
    Planned,
    UnderConstruction,
    Commissioning,
    Operational,
    OnHold,
    Decommissioned,
}

impl SiteStatus {
    /// Sites that still need field work.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Planned | Self::UnderConstruction | Self::Commissioning)
    }
}

/// An installation site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Site {
    pub id: String,
    pub location: GeoPoint,
    pub status: SiteStatus,
    pub region: String,
}

impl Site {
    pub fn new(
        id: impl Into<String>,
        location: GeoPoint,
        status: SiteStatus,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            location,
            status,
            region: region.into(),
        }
    }
}

/// Three-level risk classification, ordered from low to high.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify an additive risk score: `<=2` low, `<=4` medium, otherwise high.
    pub fn from_score(score: f64) -> Self {
        if score <= 2.0 {
            Self::Low
        } else if score <= 4.0 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable thresholds for the engine.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Clustering radius for resource analysis.
    /// Default: 100.0 km
    pub cluster_radius_km: f64,

    /// Radius for the nearby related sites list.
    /// Default: 50.0 km
    pub nearby_radius_km: f64,

    /// Maximum number of nearby related sites kept.
    /// Default: 5
    pub nearby_limit: usize,

    /// Half-width of the bounding-box prefilter for nearby sites (degrees).
    /// Default: 0.5 (~55 km of latitude)
    pub nearby_prefilter_degrees: f64,

    /// Radius within which under-construction sites are proposed for
    /// crew and equipment sharing.
    /// Default: 30.0 km
    pub resource_sharing_radius_km: f64,

    /// Number of sharing partners named in a suggestion.
    /// Default: 3
    pub resource_sharing_limit: usize,

    /// Visit duration used when a route stop has none configured.
    /// Default: 60 minutes
    pub default_visit_minutes: u32,

    /// Number of forecast days considered by the weather forecaster.
    /// Default: 15
    pub forecast_days: usize,

    /// Days past the expected delivery date before a pending material
    /// counts as overdue.
    /// Default: 7
    pub material_overdue_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_radius_km: 100.0,
            nearby_radius_km: 50.0,
            nearby_limit: 5,
            nearby_prefilter_degrees: 0.5,
            resource_sharing_radius_km: 30.0,
            resource_sharing_limit: 3,
            default_visit_minutes: 60,
            forecast_days: 15,
            material_overdue_days: 7,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Push `item` unless an equal item is already present, keeping first-seen order.
pub(crate) fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(22.3316, 87.3231).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4.5), RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
    }

    #[test]
    fn test_site_status_active() {
        assert!(SiteStatus::UnderConstruction.is_active());
        assert!(SiteStatus::Planned.is_active());
        assert!(!SiteStatus::Operational.is_active());
        assert!(!SiteStatus::Decommissioned.is_active());
    }

    #[test]
    fn test_bounds_contains() {
        let b = geo_utils::degree_box(&GeoPoint::new(22.0, 87.0), 0.5);
        assert!(b.contains(&GeoPoint::new(22.4, 86.6)));
        assert!(!b.contains(&GeoPoint::new(22.6, 87.0)));
    }

    #[test]
    fn test_push_unique() {
        let mut items = vec!["a".to_string()];
        push_unique(&mut items, "b".to_string());
        push_unique(&mut items, "a".to_string());
        assert_eq!(items, vec!["a", "b"]);
    }
}

//! Input records read from the project store.
//!
//! These mirror the extended project record kept by the CRUD layer. The engine
//! never mutates them; optional fields carry explicit defaults (an absent team
//! is an empty team, an absent material list has nothing pending).

use chrono::{DateTime, NaiveDate, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::AiInsights;

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle phase of an installation project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    Planning,
    Design,
    Procurement,
    Construction,
    Installation,
    Commissioning,
    Completed,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Design => "design",
            Self::Procurement => "procurement",
            Self::Construction => "construction",
            Self::Installation => "installation",
            Self::Commissioning => "commissioning",
            Self::Completed => "completed",
        }
    }

    /// Infer a phase from free text such as a milestone name.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        [
            Self::Commissioning,
            Self::Installation,
            Self::Construction,
            Self::Procurement,
            Self::Design,
            Self::Planning,
        ]
        .into_iter()
        .find(|phase| label.contains(phase.as_str()))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MaterialStatus {
    Ordered,
    Shipped,
    Delivered,
    Installed,
    Defective,
}

impl MaterialStatus {
    /// Ordered or shipped but not yet on site.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Ordered | Self::Shipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EquipmentStatus {
    InUse,
    Idle,
    Maintenance,
    Reserved,
}

/// Observed (or predicted) weather impact on site work. Ordered from none to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WeatherImpact {
    None,
    Low,
    Medium,
    High,
}

impl WeatherImpact {
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn is_disruptive(self) -> bool {
        self >= Self::Medium
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Team roles relevant to staffing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    ProjectManager,
    Surveyor,
    Designer,
    ProcurementOfficer,
    SiteEngineer,
    Electrician,
    Technician,
    SafetyOfficer,
    QualityInspector,
    CommissioningEngineer,
    #[cfg_attr(feature = "serde", serde(other))]
    Other,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProjectManager => "project_manager",
            Self::Surveyor => "surveyor",
            Self::Designer => "designer",
            Self::ProcurementOfficer => "procurement_officer",
            Self::SiteEngineer => "site_engineer",
            Self::Electrician => "electrician",
            Self::Technician => "technician",
            Self::SafetyOfficer => "safety_officer",
            Self::QualityInspector => "quality_inspector",
            Self::CommissioningEngineer => "commissioning_engineer",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaskIssue {
    pub issue_type: String,
    pub component: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Task {
    pub name: String,
    pub status: TaskStatus,
    pub completion_percentage: f64,
    pub planned_end_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub issues: Vec<TaskIssue>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Milestone {
    pub name: String,
    /// Phase this milestone belongs to. Inferred from the name when absent.
    pub phase: Option<Phase>,
    pub planned_date: NaiveDate,
    pub actual_date: Option<NaiveDate>,
    pub status: MilestoneStatus,
    pub completion_percentage: f64,
    pub critical_path: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tasks: Vec<Task>,
    pub last_updated: DateTime<Utc>,
}

impl Milestone {
    pub fn phase(&self) -> Option<Phase> {
        self.phase.or_else(|| Phase::from_label(&self.name))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectProgress {
    /// 0-100
    pub overall_completion: f64,
    pub current_phase: Phase,
    pub start_date: NaiveDate,
    pub estimated_completion_date: NaiveDate,
    pub revised_completion_date: Option<NaiveDate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    pub name: String,
    pub status: MaterialStatus,
    pub expected_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TeamMember {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquipmentItem {
    pub id: String,
    pub equipment_type: String,
    pub status: EquipmentStatus,
    pub scheduled_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub rainfall_mm: f64,
    pub wind_speed_kmh: f64,
    pub impact: WeatherImpact,
}

/// Panel array parameters, either as designed or as measured on site.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArrayParameters {
    pub tilt_degrees: Option<f64>,
    pub azimuth_degrees: Option<f64>,
    pub string_configuration: Option<String>,
}

/// One reading of overall completion over time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressSnapshot {
    pub date: NaiveDate,
    pub completion: f64,
}

/// Extended project record for one site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectRecord {
    pub site_id: String,
    pub progress: Option<ProjectProgress>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: Priority,
    #[cfg_attr(feature = "serde", serde(default))]
    pub materials: Vec<Material>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub team: Vec<TeamMember>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub weather_history: Vec<WeatherRecord>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub equipment: Vec<EquipmentItem>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub progress_history: Vec<ProgressSnapshot>,
    pub design_parameters: Option<ArrayParameters>,
    pub actual_parameters: Option<ArrayParameters>,
    /// Cached output of the last insight refresh.
    pub insights: Option<AiInsights>,
}

impl ProjectRecord {
    /// Empty record for a site with no tracking data yet.
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            progress: None,
            priority: Priority::Normal,
            materials: Vec::new(),
            team: Vec::new(),
            weather_history: Vec::new(),
            equipment: Vec::new(),
            progress_history: Vec::new(),
            design_parameters: None,
            actual_parameters: None,
            insights: None,
        }
    }

    pub fn milestones(&self) -> &[Milestone] {
        self.progress
            .as_ref()
            .map(|p| p.milestones.as_slice())
            .unwrap_or(&[])
    }

    pub fn overall_completion(&self) -> f64 {
        self.progress.as_ref().map_or(0.0, |p| p.overall_completion)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.milestones().iter().flat_map(|m| m.tasks.iter())
    }
}

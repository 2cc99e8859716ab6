//! Cross-site team and equipment allocation analysis.
//!
//! ## Algorithm
//! 1. Cluster active sites around seeds (see [`cluster_sites`]); clusters with
//!    fewer than two tracked sites are skipped
//! 2. Check each site's team against the roles its dominant phase needs
//! 3. Measure equipment utilization per type and look for idle units to share
//! 4. Pair nearly complete sites with new sites for crew transfers
//! 5. Merge findings across clusters and score overall efficiency

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cluster::cluster_sites;
use crate::geo_utils::haversine_km;
use crate::model::{EquipmentStatus, MilestoneStatus, Phase, ProjectRecord, Role};
use crate::{push_unique, EngineConfig, Site};

/// Utilization (%) below which idle equipment is offered to other sites.
const LOW_UTILIZATION_PERCENT: f64 = 60.0;
/// Completion (%) at which a construction site counts as nearly complete.
const NEARLY_COMPLETE_PERCENT: f64 = 85.0;
/// People in one role at one site before the role counts as overallocated.
const MAX_PER_ROLE: usize = 2;

// ============================================================================
// Types
// ============================================================================

/// An over- or under-used resource at a site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceFinding {
    pub site_id: String,
    pub resource: String,
    pub detail: String,
}

/// A role the site's current phase needs but nobody on the team holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkillGap {
    pub site_id: String,
    pub phase: Phase,
    pub missing_role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransferKind {
    Crew,
    Equipment,
}

/// A proposed movement of crew or equipment between sites.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceTransfer {
    pub kind: TransferKind,
    pub from_site: String,
    /// Receiving site, when a specific one could be chosen.
    pub to_site: Option<String>,
    pub resource: String,
    pub reason: String,
}

impl ResourceTransfer {
    pub fn involves(&self, site_id: &str) -> bool {
        self.from_site == site_id || self.to_site.as_deref() == Some(site_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceAnalysis {
    pub overallocated_resources: Vec<ResourceFinding>,
    pub underallocated_resources: Vec<ResourceFinding>,
    pub transfer_suggestions: Vec<ResourceTransfer>,
    /// Equipment type -> utilization percent, averaged across clusters.
    pub equipment_utilization: BTreeMap<String, f64>,
    pub skill_gaps: Vec<SkillGap>,
    /// 0-100
    pub overall_efficiency: f64,
    pub clusters_analyzed: usize,
    pub sites_analyzed: usize,
}

/// Findings for a single cluster before merging.
#[derive(Debug, Default)]
struct ClusterFindings {
    overallocated: Vec<ResourceFinding>,
    underallocated: Vec<ResourceFinding>,
    transfers: Vec<ResourceTransfer>,
    utilization: BTreeMap<String, f64>,
    skill_gaps: Vec<SkillGap>,
}

/// A tracked site with its record and dominant phase.
struct TrackedSite<'a> {
    site: &'a Site,
    record: &'a ProjectRecord,
    phase: Option<Phase>,
}

// ============================================================================
// Phase helpers
// ============================================================================

/// Rank used to pick the dominant phase when several are in progress.
fn phase_rank(phase: Phase) -> u8 {
    match phase {
        Phase::Commissioning => 5,
        Phase::Construction | Phase::Installation => 4,
        Phase::Procurement => 3,
        Phase::Design => 2,
        Phase::Planning => 1,
        Phase::Completed => 0,
    }
}

/// Highest-ranked phase with an in-progress milestone, else the project's current phase.
pub fn dominant_phase(record: &ProjectRecord) -> Option<Phase> {
    let in_progress = record
        .milestones()
        .iter()
        .filter(|m| m.status == MilestoneStatus::InProgress)
        .filter_map(|m| m.phase())
        .max_by_key(|&p| phase_rank(p));

    in_progress
        .or_else(|| record.progress.as_ref().map(|p| p.current_phase))
        .filter(|&p| p != Phase::Completed)
}

/// Roles every site in `phase` should have on its team.
pub fn required_roles(phase: Phase) -> &'static [Role] {
    match phase {
        Phase::Planning => &[Role::ProjectManager, Role::Surveyor],
        Phase::Design => &[Role::ProjectManager, Role::Designer],
        Phase::Procurement => &[Role::ProjectManager, Role::ProcurementOfficer],
        Phase::Construction | Phase::Installation => &[
            Role::ProjectManager,
            Role::SiteEngineer,
            Role::Electrician,
            Role::SafetyOfficer,
        ],
        Phase::Commissioning => &[
            Role::ProjectManager,
            Role::CommissioningEngineer,
            Role::Electrician,
        ],
        Phase::Completed => &[],
    }
}

// ============================================================================
// Analyzer
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResourceAllocationAnalyzer {
    config: EngineConfig,
}

impl ResourceAllocationAnalyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Analyze allocation across the active sites in `sites`, optionally limited to `region`.
    ///
    /// `projects` supplies tracking data; sites without a record are clustered
    /// but not analyzed.
    pub fn analyze(&self, sites: &[Site], projects: &[ProjectRecord], region: Option<&str>) -> ResourceAnalysis {
        let started = Instant::now();

        let active: Vec<Site> = sites
            .iter()
            .filter(|s| s.status.is_active())
            .filter(|s| region.map_or(true, |r| s.region.eq_ignore_ascii_case(r)))
            .cloned()
            .collect();
        let records: HashMap<&str, &ProjectRecord> =
            projects.iter().map(|p| (p.site_id.as_str(), p)).collect();
        let by_id: HashMap<&str, &Site> = active.iter().map(|s| (s.id.as_str(), s)).collect();

        let clusters = cluster_sites(&active, self.config.cluster_radius_km);
        let mut analysis = ResourceAnalysis::default();
        let mut utilization_samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for cluster in &clusters {
            let tracked: Vec<TrackedSite> = cluster
                .site_ids
                .iter()
                .filter_map(|id| {
                    let site = *by_id.get(id.as_str())?;
                    let record = *records.get(id.as_str())?;
                    Some(TrackedSite { site, record, phase: dominant_phase(record) })
                })
                .collect();

            if tracked.len() < 2 {
                debug!(
                    "Skipping cluster seeded at {} with {} tracked sites",
                    cluster.seed_id(),
                    tracked.len()
                );
                continue;
            }

            let findings = analyze_cluster(&tracked);
            analysis.clusters_analyzed += 1;
            analysis.sites_analyzed += tracked.len();

            for (equipment_type, percent) in findings.utilization {
                utilization_samples.entry(equipment_type).or_default().push(percent);
            }
            for finding in findings.overallocated {
                push_unique(&mut analysis.overallocated_resources, finding);
            }
            for finding in findings.underallocated {
                push_unique(&mut analysis.underallocated_resources, finding);
            }
            for transfer in findings.transfers {
                push_unique(&mut analysis.transfer_suggestions, transfer);
            }
            for gap in findings.skill_gaps {
                push_unique(&mut analysis.skill_gaps, gap);
            }
        }

        analysis.equipment_utilization = utilization_samples
            .into_iter()
            .map(|(equipment_type, samples)| {
                let avg = samples.iter().sum::<f64>() / samples.len() as f64;
                (equipment_type, avg)
            })
            .collect();

        let avg_utilization = if analysis.equipment_utilization.is_empty() {
            100.0
        } else {
            analysis.equipment_utilization.values().sum::<f64>() / analysis.equipment_utilization.len() as f64
        };
        let transfer_pressure = if analysis.sites_analyzed == 0 {
            0.0
        } else {
            analysis.transfer_suggestions.len() as f64 / analysis.sites_analyzed as f64 * 20.0
        };
        analysis.overall_efficiency = (avg_utilization - transfer_pressure).clamp(0.0, 100.0);

        info!(
            "Resource analysis: {} of {} clusters, {} sites, {} transfers, efficiency {:.1} in {:?}",
            analysis.clusters_analyzed,
            clusters.len(),
            analysis.sites_analyzed,
            analysis.transfer_suggestions.len(),
            analysis.overall_efficiency,
            started.elapsed()
        );

        analysis
    }
}

fn analyze_cluster(tracked: &[TrackedSite]) -> ClusterFindings {
    let mut findings = ClusterFindings::default();

    // Team allocation
    for entry in tracked {
        let team = &entry.record.team;
        if team.is_empty() {
            findings.underallocated.push(ResourceFinding {
                site_id: entry.site.id.clone(),
                resource: "team".to_string(),
                detail: "No team members assigned".to_string(),
            });
        }

        if let Some(phase) = entry.phase {
            for &role in required_roles(phase) {
                if !team.iter().any(|m| m.role == role) {
                    findings.skill_gaps.push(SkillGap {
                        site_id: entry.site.id.clone(),
                        phase,
                        missing_role: role,
                    });
                }
            }
        }

        let mut role_counts: BTreeMap<Role, usize> = BTreeMap::new();
        for member in team {
            *role_counts.entry(member.role).or_default() += 1;
        }
        for (role, count) in role_counts {
            if count > MAX_PER_ROLE && role != Role::Other {
                findings.overallocated.push(ResourceFinding {
                    site_id: entry.site.id.clone(),
                    resource: role.to_string(),
                    detail: format!("{count} people assigned as {role}"),
                });
            }
        }
    }

    // Equipment usage: type -> (in use, total)
    let mut usage: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for entry in tracked {
        for item in &entry.record.equipment {
            let counts = usage.entry(item.equipment_type.as_str()).or_default();
            counts.1 += 1;
            if item.status == EquipmentStatus::InUse {
                counts.0 += 1;
            }
        }
    }

    let mut equipment_transfers = Vec::new();
    for (&equipment_type, &(in_use, total)) in &usage {
        let percent = in_use as f64 / total as f64 * 100.0;
        findings.utilization.insert(equipment_type.to_string(), percent);

        if percent >= LOW_UTILIZATION_PERCENT || total < 2 {
            continue;
        }

        for donor in tracked {
            let idle = donor
                .record
                .equipment
                .iter()
                .filter(|e| e.equipment_type == equipment_type && e.status == EquipmentStatus::Idle)
                .count();
            if idle < 2 {
                continue;
            }

            findings.underallocated.push(ResourceFinding {
                site_id: donor.site.id.clone(),
                resource: equipment_type.to_string(),
                detail: format!("{idle} idle units (cluster utilization {percent:.0}%)"),
            });

            let recipient = tracked
                .iter()
                .filter(|t| t.site.id != donor.site.id)
                .filter(|t| !t.record.equipment.iter().any(|e| e.equipment_type == equipment_type))
                .min_by(|a, b| {
                    haversine_km(&donor.site.location, &a.site.location)
                        .total_cmp(&haversine_km(&donor.site.location, &b.site.location))
                });

            equipment_transfers.push(ResourceTransfer {
                kind: TransferKind::Equipment,
                from_site: donor.site.id.clone(),
                to_site: recipient.map(|r| r.site.id.clone()),
                resource: equipment_type.to_string(),
                reason: format!(
                    "{idle} idle {equipment_type} units while {equipment_type} utilization in the cluster is {percent:.0}%"
                ),
            });
        }
    }

    // Crew transfers from nearly complete sites to new ones
    let recipients: Vec<&TrackedSite> = tracked
        .iter()
        .filter(|t| matches!(t.phase, Some(Phase::Planning | Phase::Design)))
        .collect();

    for donor in tracked {
        let completion = donor.record.overall_completion();
        let nearly_complete = match donor.phase {
            Some(Phase::Commissioning) => true,
            Some(Phase::Construction | Phase::Installation) => completion >= NEARLY_COMPLETE_PERCENT,
            _ => false,
        };
        if !nearly_complete {
            continue;
        }

        let recipient = recipients.iter().min_by(|a, b| {
            b.record
                .priority
                .cmp(&a.record.priority)
                .then_with(|| {
                    haversine_km(&donor.site.location, &a.site.location)
                        .total_cmp(&haversine_km(&donor.site.location, &b.site.location))
                })
        });

        if let Some(recipient) = recipient {
            findings.transfers.push(ResourceTransfer {
                kind: TransferKind::Crew,
                from_site: donor.site.id.clone(),
                to_site: Some(recipient.site.id.clone()),
                resource: "crew".to_string(),
                reason: format!(
                    "{} is nearly complete ({:.0}%); {} is starting {}",
                    donor.site.id,
                    completion,
                    recipient.site.id,
                    recipient.phase.map_or("work", |p| p.as_str())
                ),
            });
        }
    }

    findings.transfers.extend(equipment_transfers);
    findings
}

// ============================================================================
// Tests
// ============================================================================

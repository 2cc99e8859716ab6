//! Star clustering of sites around seed sites.
//!
//! Sites are taken in input order. The first unassigned site becomes a seed,
//! and every other unassigned site within `max_distance_km` of that seed joins
//! its cluster. Membership depends only on distance to the seed, so two members
//! of one cluster may be up to twice the radius apart. This is not single-linkage
//! clustering: a site that is close to a member but not to the seed starts or
//! joins another cluster.

use std::collections::HashSet;
use std::time::Instant;

use log::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_km;
use crate::{GeoPoint, Site};

/// A group of sites within range of a seed site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SiteCluster {
    /// Coordinates of the seed site.
    pub centroid: GeoPoint,
    /// Member site IDs, seed first, then in input order.
    pub site_ids: Vec<String>,
}

impl SiteCluster {
    pub fn seed_id(&self) -> &str {
        &self.site_ids[0]
    }

    pub fn len(&self) -> usize {
        self.site_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.site_ids.is_empty()
    }
}

/// Cluster `sites` around seeds taken in input order.
///
/// Every site with valid coordinates appears in exactly one cluster. Sites with
/// invalid coordinates are skipped. Duplicate IDs are clustered once.
///
/// # Example
/// ```
/// use site_intel::{cluster_sites, GeoPoint, Site, SiteStatus};
///
/// let sites = vec![
///     Site::new("a", GeoPoint::new(22.3316, 87.3231), SiteStatus::Planned, "WB"),
///     Site::new("b", GeoPoint::new(22.5834, 88.3433), SiteStatus::Planned, "WB"),
/// ];
///
/// let clusters = cluster_sites(&sites, 100.0);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters[1].centroid, sites[1].location);
/// ```
pub fn cluster_sites(sites: &[Site], max_distance_km: f64) -> Vec<SiteCluster> {
    let started = Instant::now();
    let mut processed: HashSet<&str> = HashSet::with_capacity(sites.len());
    let mut clusters = Vec::new();

    for (i, seed) in sites.iter().enumerate() {
        if processed.contains(seed.id.as_str()) {
            continue;
        }
        if !seed.location.is_valid() {
            warn!("Skipping site {} with invalid coordinates", seed.id);
            processed.insert(seed.id.as_str());
            continue;
        }

        processed.insert(seed.id.as_str());
        let mut site_ids = vec![seed.id.clone()];

        for candidate in &sites[i + 1..] {
            if processed.contains(candidate.id.as_str()) || !candidate.location.is_valid() {
                continue;
            }
            if haversine_km(&seed.location, &candidate.location) <= max_distance_km {
                processed.insert(candidate.id.as_str());
                site_ids.push(candidate.id.clone());
            }
        }

        clusters.push(SiteCluster {
            centroid: seed.location,
            site_ids,
        });
    }

    info!(
        "Clustered {} sites into {} clusters (radius {:.1} km) in {:?}",
        sites.len(),
        clusters.len(),
        max_distance_km,
        started.elapsed()
    );

    clusters
}

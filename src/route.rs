//! Constrained greedy route planning for field visits.
//!
//! ## Algorithm
//! 1. Build the pairwise Haversine matrix over the start site and the sites to visit
//! 2. Visit priority sites in the order given (skipping any that must be visited last)
//! 3. Visit must-visit-first sites, nearest to the current position first
//! 4. Repeatedly visit the nearest remaining site until the distance or time
//!    budget would be exceeded
//! 5. Visit must-visit-last sites, nearest to the current position first
//!
//! The planner is a heuristic. It does not search for the shortest tour, and
//! its input/output contract is what callers should rely on, not the exact order.
//!
//! Every stop is checked against the budget. A mandated site that would break
//! the budget is left out and reported in [`RoutePlan::unvisited_sites`].

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use log::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo_utils::distance_matrix;
use crate::{EngineConfig, EngineError, GeoPoint, Result, Site};

/// Constraints applied while planning a route. All unset by default.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouteConstraints {
    /// Upper bound on the summed leg distances (km).
    pub max_travel_distance_km: Option<f64>,
    /// Upper bound on the summed visit durations (minutes).
    pub max_travel_minutes: Option<u32>,
    /// Sites visited first, in exactly this order.
    pub priority_sites: Vec<String>,
    /// Per-site visit durations in minutes.
    pub visit_minutes: HashMap<String, u32>,
    pub must_visit_first: Vec<String>,
    pub must_visit_last: Vec<String>,
}

/// One stop on a planned route.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteStop {
    pub site_id: String,
    pub location: GeoPoint,
    pub distance_from_previous_km: f64,
    pub estimated_visit_minutes: u32,
}

/// A planned multi-stop route. The starting site is the origin, not a stop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoutePlan {
    pub starting_site: String,
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    /// Sum of the visit durations of all stops.
    pub total_estimated_minutes: u32,
    /// Sites that could not be placed within the budget, in request order.
    pub unvisited_sites: Vec<String>,
}

impl RoutePlan {
    pub fn is_complete(&self) -> bool {
        self.unvisited_sites.is_empty()
    }
}

/// Working state of a single planning run. Node 0 is the start site.
struct RouteBuilder<'a> {
    nodes: Vec<&'a Site>,
    matrix: Vec<Vec<f64>>,
    visit_minutes: Vec<u32>,
    visited: Vec<bool>,
    current: usize,
    total_distance: f64,
    total_minutes: u32,
    stops: Vec<RouteStop>,
    max_distance: Option<f64>,
    max_minutes: Option<u32>,
}

impl RouteBuilder<'_> {
    /// Whether moving from the current position to `idx` stays within budget.
    fn fits(&self, idx: usize) -> bool {
        let leg = self.matrix[self.current][idx];
        if let Some(max) = self.max_distance {
            if self.total_distance + leg > max {
                return false;
            }
        }
        if let Some(max) = self.max_minutes {
            if self.total_minutes.saturating_add(self.visit_minutes[idx]) > max {
                return false;
            }
        }
        true
    }

    fn visit(&mut self, idx: usize) {
        let leg = self.matrix[self.current][idx];
        self.total_distance += leg;
        self.total_minutes = self.total_minutes.saturating_add(self.visit_minutes[idx]);
        self.visited[idx] = true;
        self.current = idx;
        self.stops.push(RouteStop {
            site_id: self.nodes[idx].id.clone(),
            location: self.nodes[idx].location,
            distance_from_previous_km: leg,
            estimated_visit_minutes: self.visit_minutes[idx],
        });
    }

    /// Visit each of `indices` in order, skipping visited ones and any that break the budget.
    fn visit_in_order(&mut self, indices: &[usize]) {
        for &idx in indices {
            if self.visited[idx] {
                continue;
            }
            if self.fits(idx) {
                self.visit(idx);
            } else {
                debug!("Budget exceeded before mandated site {}", self.nodes[idx].id);
            }
        }
    }

    /// Unvisited `indices` sorted by distance from the current position.
    fn nearest_first(&self, indices: &[usize]) -> Vec<usize> {
        let mut pending: Vec<usize> = indices.iter().copied().filter(|&i| !self.visited[i]).collect();
        pending.sort_by(|&a, &b| self.matrix[self.current][a].total_cmp(&self.matrix[self.current][b]));
        pending
    }
}

/// Plan a visit route from `starting_site` over `sites_to_visit`.
///
/// `sites` is the lookup of all known sites. Unknown or invalid visit IDs are
/// skipped; the start site is never a stop.
///
/// # Errors
/// - [`EngineError::NotFound`] if the starting site is unknown
/// - [`EngineError::InvalidInput`] if the start has invalid coordinates or no
///   visitable site remains
///
/// # Example
/// ```
/// use site_intel::{plan_route, EngineConfig, GeoPoint, RouteConstraints, Site, SiteStatus};
///
/// let sites = vec![
///     Site::new("depot", GeoPoint::new(22.00, 87.00), SiteStatus::Operational, "WB"),
///     Site::new("far", GeoPoint::new(22.20, 87.00), SiteStatus::Planned, "WB"),
///     Site::new("near", GeoPoint::new(22.05, 87.00), SiteStatus::Planned, "WB"),
/// ];
///
/// let plan = plan_route(&sites, "depot", &["far", "near"], &RouteConstraints::default(),
///     &EngineConfig::default()).unwrap();
/// let order: Vec<&str> = plan.stops.iter().map(|s| s.site_id.as_str()).collect();
/// assert_eq!(order, vec!["near", "far"]);
/// assert_eq!(plan.total_estimated_minutes, 120);
/// ```
pub fn plan_route<S: AsRef<str>>(
    sites: &[Site],
    starting_site: &str,
    sites_to_visit: &[S],
    constraints: &RouteConstraints,
    config: &EngineConfig,
) -> Result<RoutePlan> {
    let started = Instant::now();
    let lookup: HashMap<&str, &Site> = sites.iter().map(|s| (s.id.as_str(), s)).collect();

    let start = *lookup
        .get(starting_site)
        .ok_or_else(|| EngineError::site_not_found(starting_site))?;
    if !start.location.is_valid() {
        return Err(EngineError::InvalidInput(format!(
            "starting site {} has invalid coordinates",
            start.id
        )));
    }

    // Resolve the visit set: dedupe, drop the start, drop unknown/invalid sites.
    let mut nodes: Vec<&Site> = vec![start];
    let mut seen: HashSet<&str> = HashSet::from([start.id.as_str()]);
    for id in sites_to_visit {
        let id = id.as_ref();
        if !seen.insert(id) {
            continue;
        }
        match lookup.get(id) {
            Some(site) if site.location.is_valid() => nodes.push(site),
            Some(_) => warn!("Skipping site {} with invalid coordinates", id),
            None => warn!("Skipping unknown site {}", id),
        }
    }

    if nodes.len() < 2 {
        return Err(EngineError::InvalidInput(
            "no valid sites to visit".to_string(),
        ));
    }

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    let resolve = |ids: &[String]| -> Vec<usize> {
        ids.iter()
            .filter_map(|id| index.get(id.as_str()).copied())
            .filter(|&i| i != 0)
            .collect()
    };

    let last = resolve(&constraints.must_visit_last);
    let last_set: HashSet<usize> = last.iter().copied().collect();
    let priority: Vec<usize> = resolve(&constraints.priority_sites)
        .into_iter()
        .filter(|i| !last_set.contains(i))
        .collect();
    let first = resolve(&constraints.must_visit_first);

    let points: Vec<GeoPoint> = nodes.iter().map(|s| s.location).collect();
    let visit_minutes: Vec<u32> = nodes
        .iter()
        .map(|s| {
            constraints
                .visit_minutes
                .get(&s.id)
                .copied()
                .unwrap_or(config.default_visit_minutes)
        })
        .collect();

    let mut builder = RouteBuilder {
        matrix: distance_matrix(&points),
        visited: vec![false; nodes.len()],
        nodes,
        visit_minutes,
        current: 0,
        total_distance: 0.0,
        total_minutes: 0,
        stops: Vec::new(),
        max_distance: constraints.max_travel_distance_km,
        max_minutes: constraints.max_travel_minutes,
    };
    builder.visited[0] = true;

    // Priority sites keep their constraint-list order.
    builder.visit_in_order(&priority);

    let first = builder.nearest_first(&first);
    builder.visit_in_order(&first);

    // Greedy nearest neighbour over the remaining sites.
    loop {
        let nearest = (1..builder.nodes.len())
            .filter(|&i| !builder.visited[i] && !last_set.contains(&i))
            .min_by(|&a, &b| {
                builder.matrix[builder.current][a].total_cmp(&builder.matrix[builder.current][b])
            });

        let Some(idx) = nearest else { break };
        if !builder.fits(idx) {
            debug!(
                "Route budget exhausted after {} stops ({:.1} km)",
                builder.stops.len(),
                builder.total_distance
            );
            break;
        }
        builder.visit(idx);
    }

    let last = builder.nearest_first(&last);
    builder.visit_in_order(&last);

    let unvisited_sites: Vec<String> = (1..builder.nodes.len())
        .filter(|&i| !builder.visited[i])
        .map(|i| builder.nodes[i].id.clone())
        .collect();

    info!(
        "Planned route from {}: {} stops, {:.1} km, {} unvisited in {:?}",
        starting_site,
        builder.stops.len(),
        builder.total_distance,
        unvisited_sites.len(),
        started.elapsed()
    );

    Ok(RoutePlan {
        starting_site: starting_site.to_string(),
        stops: builder.stops,
        total_distance_km: builder.total_distance,
        total_estimated_minutes: builder.total_minutes,
        unvisited_sites,
    })
}

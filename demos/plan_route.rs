//! Plan a day of field visits across sites around Kharagpur.
//!
//! Run with: cargo run --example plan_route

use site_intel::{
    cluster_sites, plan_route, EngineConfig, GeoPoint, RouteConstraints, Site, SiteStatus,
};

fn main() {
    let sites = vec![
        Site::new("KGP-DEPOT", GeoPoint::new(22.3316, 87.3231), SiteStatus::Operational, "WB"),
        Site::new("KGP-101", GeoPoint::new(22.3460, 87.2320), SiteStatus::UnderConstruction, "WB"),
        Site::new("KGP-102", GeoPoint::new(22.4250, 87.3190), SiteStatus::UnderConstruction, "WB"),
        Site::new("MDN-201", GeoPoint::new(22.4240, 87.3190), SiteStatus::Planned, "WB"),
        Site::new("MDN-202", GeoPoint::new(22.2300, 87.1500), SiteStatus::Commissioning, "WB"),
        Site::new("HLD-301", GeoPoint::new(22.0667, 88.0698), SiteStatus::UnderConstruction, "WB"),
        Site::new("KOL-401", GeoPoint::new(22.5834, 88.3433), SiteStatus::Planned, "WB"),
    ];
    let config = EngineConfig::default();

    println!("Site clusters ({} km radius)\n", config.cluster_radius_km);
    for cluster in cluster_sites(&sites, config.cluster_radius_km) {
        println!(
            "   {} ({:.4}, {:.4}): {}",
            cluster.seed_id(),
            cluster.centroid.latitude,
            cluster.centroid.longitude,
            cluster.site_ids.join(", ")
        );
    }

    let to_visit = ["KGP-101", "KGP-102", "MDN-201", "MDN-202", "HLD-301", "KOL-401"];

    // Unconstrained greedy route
    let plan = plan_route(&sites, "KGP-DEPOT", &to_visit, &RouteConstraints::default(), &config).unwrap();
    println!("\n1. Nearest-first route:");
    print_plan(&plan);

    // Commissioning site first, Kolkata office last, 150 km budget
    let mut constraints = RouteConstraints {
        max_travel_distance_km: Some(150.0),
        must_visit_first: vec!["MDN-202".to_string()],
        must_visit_last: vec!["KOL-401".to_string()],
        ..Default::default()
    };
    constraints.visit_minutes.insert("MDN-202".to_string(), 180);
    constraints.visit_minutes.insert("KGP-102".to_string(), 30);

    let plan = plan_route(&sites, "KGP-DEPOT", &to_visit, &constraints, &config).unwrap();
    println!("\n2. Constrained route (150 km budget):");
    print_plan(&plan);
}

fn print_plan(plan: &site_intel::RoutePlan) {
    println!("   Start: {}", plan.starting_site);
    for (i, stop) in plan.stops.iter().enumerate() {
        println!(
            "   {}. {:<8} +{:>6.1} km  {:>3} min",
            i + 1,
            stop.site_id,
            stop.distance_from_previous_km,
            stop.estimated_visit_minutes
        );
    }
    println!(
        "   Total: {:.1} km, {} min on site",
        plan.total_distance_km, plan.total_estimated_minutes
    );
    if !plan.is_complete() {
        println!("   Not visited: {}", plan.unvisited_sites.join(", "));
    }
}

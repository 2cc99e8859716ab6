//! Build and store insights for a small portfolio, then print one site's report.
//!
//! Run with: cargo run --example site_report

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use site_intel::{
    EquipmentItem, EquipmentStatus, GeoPoint, HistoricalAnalogForecast, InMemoryStore,
    InsightEngine, Material, MaterialStatus, Milestone, MilestoneStatus, Phase, ProjectProgress,
    ProjectRecord, ProjectStore, QualityAnomalyDetector, Role, Site, SiteStatus, Task, TaskIssue,
    TaskStatus, TeamMember, WeatherImpact, WeatherImpactForecaster, WeatherRecord,
};

fn main() {
    let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap();
    let start = today - Duration::days(90);

    let sites = vec![
        Site::new("KGP-101", GeoPoint::new(22.3460, 87.2320), SiteStatus::UnderConstruction, "WB"),
        Site::new("KGP-102", GeoPoint::new(22.4250, 87.3190), SiteStatus::UnderConstruction, "WB"),
        Site::new("MDN-201", GeoPoint::new(22.4240, 87.3190), SiteStatus::Planned, "WB"),
    ];

    let wiring_task = |day: i64| Task {
        name: format!("String wiring block {day}"),
        status: TaskStatus::Completed,
        completion_percentage: 100.0,
        planned_end_date: Some(start + Duration::days(day)),
        actual_end_date: Some(start + Duration::days(day + 6)),
        issues: vec![TaskIssue {
            issue_type: "loose MC4 connector".to_string(),
            component: Some("string combiner".to_string()),
        }],
    };

    let mut kgp101 = ProjectRecord::new("KGP-101");
    kgp101.progress = Some(ProjectProgress {
        overall_completion: 45.0,
        current_phase: Phase::Construction,
        start_date: start,
        estimated_completion_date: start + Duration::days(150),
        revised_completion_date: None,
        milestones: vec![Milestone {
            name: "Module mounting".to_string(),
            phase: None,
            planned_date: today - Duration::days(5),
            actual_date: None,
            status: MilestoneStatus::Delayed,
            completion_percentage: 70.0,
            critical_path: true,
            tasks: vec![wiring_task(30), wiring_task(40), wiring_task(50)],
            last_updated: now,
        }],
    });
    kgp101.team = vec![
        TeamMember { name: "A. Das".to_string(), role: Role::ProjectManager },
        TeamMember { name: "R. Sen".to_string(), role: Role::SiteEngineer },
        TeamMember { name: "M. Roy".to_string(), role: Role::Electrician },
    ];
    kgp101.materials = vec![Material {
        name: "Inverters".to_string(),
        status: MaterialStatus::Shipped,
        expected_delivery_date: Some(today - Duration::days(12)),
        actual_delivery_date: None,
    }];
    kgp101.equipment = vec![
        EquipmentItem {
            id: "PD-1".to_string(),
            equipment_type: "pile driver".to_string(),
            status: EquipmentStatus::Idle,
            scheduled_until: None,
        },
        EquipmentItem {
            id: "PD-2".to_string(),
            equipment_type: "pile driver".to_string(),
            status: EquipmentStatus::Idle,
            scheduled_until: None,
        },
    ];
    kgp101.weather_history = (0..8)
        .map(|i| WeatherRecord {
            date: today - Duration::days(i),
            rainfall_mm: 18.0 + i as f64 * 4.0,
            wind_speed_kmh: 15.0,
            impact: if i % 2 == 0 { WeatherImpact::High } else { WeatherImpact::Medium },
        })
        .collect();

    let mut kgp102 = ProjectRecord::new("KGP-102");
    kgp102.progress = Some(ProjectProgress {
        overall_completion: 30.0,
        current_phase: Phase::Construction,
        start_date: start,
        estimated_completion_date: start + Duration::days(150),
        revised_completion_date: None,
        milestones: Vec::new(),
    });

    let mut mdn201 = ProjectRecord::new("MDN-201");
    mdn201.progress = Some(ProjectProgress {
        overall_completion: 0.0,
        current_phase: Phase::Design,
        start_date: today,
        estimated_completion_date: today + Duration::days(180),
        revised_completion_date: None,
        milestones: Vec::new(),
    });

    let history = kgp101.weather_history.clone();
    let quality = QualityAnomalyDetector::new().analyze(&kgp101);
    let store = InMemoryStore::with_records(sites, vec![kgp101, kgp102, mdn201]);

    let engine = InsightEngine::default();
    let insights = engine.compute_insights(&store, "KGP-101", today, now).unwrap();
    store.save_insights("KGP-101", &insights).unwrap();

    println!("Site KGP-101 as of {today}\n");
    println!(
        "Predicted completion: {} ({:?})",
        insights.predicted_completion_date, insights.prediction_method
    );
    println!("Risk: {}", insights.risk_assessment);
    println!("Efficiency: {}/100", insights.efficiency_score);

    println!("\nPotential delays:");
    for delay in &insights.potential_delays {
        println!("   [{}] {:?}: {}", delay.severity, delay.cause, delay.description);
    }

    println!("\nSuggestions:");
    for suggestion in &insights.suggestions {
        println!("   - {suggestion}");
    }

    println!("\nNearby sites:");
    for site in &insights.nearby_related_sites {
        println!("   {} at {:.1} km ({:?})", site.site_id, site.distance_km, site.status);
    }

    println!("\nQuality ({}):", quality.risk_level);
    for issue in &quality.potential_issues {
        println!("   ! {issue}");
    }
    for check in &quality.recommended_checks {
        println!("   > {check}");
    }

    println!("\nResource optimizations:");
    for line in &insights.resource_optimizations {
        println!("   - {line}");
    }

    let provider = HistoricalAnalogForecast::new(&history);
    let weather = WeatherImpactForecaster::default()
        .forecast_with(&provider, "KGP-101", Phase::Construction, &history, today)
        .unwrap();
    println!(
        "\nWeather ({} days): {} high, {} medium impact, ~{} days delay",
        weather.days.len(),
        weather.high_impact_days,
        weather.medium_impact_days,
        weather.predicted_delay_days
    );
    for recommendation in &weather.recommendations {
        println!("   - {recommendation}");
    }
}

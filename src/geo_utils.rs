//! # Geographic Utilities
//!
//! Distance and bounding-box helpers shared by the clustering, routing and
//! nearby-site searches.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_km`] | Great-circle distance between two coordinates in kilometres |
//! | [`distance_matrix`] | Full pairwise distance matrix over a list of coordinates |
//! | [`degree_box`] | Square lat/lng box of a given half-width around a point |
//!
//! ## Example
//!
//! ```rust
//! use site_intel::{GeoPoint, geo_utils};
//!
//! let kharagpur = GeoPoint::new(22.3316, 87.3231);
//! let kolkata = GeoPoint::new(22.5834, 88.3433);
//!
//! let km = geo_utils::haversine_km(&kharagpur, &kolkata);
//! assert!(km > 100.0 && km < 115.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! The haversine formula treats the Earth as a sphere. `geo` uses the mean
//! Earth radius (6,371.0088 km), which differs from a flat 6,371 km sphere by
//! less than 0.0002%.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GeoPoint};

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates, in kilometres.
///
/// Symmetric, and exactly zero for identical points.
///
/// # Example
///
/// ```rust
/// use site_intel::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let km = geo_utils::haversine_km(&london, &paris);
/// assert!((km - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_km(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2) / 1000.0
}

/// Build the full pairwise distance matrix (km) over `points`.
///
/// `matrix[i][j] == matrix[j][i]` and the diagonal is zero.
pub fn distance_matrix(points: &[GeoPoint]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = haversine_km(&points[i], &points[j]);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }

    matrix
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Square box extending `half_width_deg` degrees in each direction from `center`.
///
/// Latitude is clamped to the valid range; longitude is left unclamped so the
/// box can be compared against points near the antimeridian without wrapping.
pub fn degree_box(center: &GeoPoint, half_width_deg: f64) -> Bounds {
    Bounds {
        min_lat: (center.latitude - half_width_deg).max(-90.0),
        max_lat: (center.latitude + half_width_deg).min(90.0),
        min_lng: center.longitude - half_width_deg,
        max_lng: center.longitude + half_width_deg,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

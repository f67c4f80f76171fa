//! Geofence evaluation against a fixed list of circular zones
//!
//! Distances use the haversine formula on a spherical Earth with the mean
//! radius. A point lying exactly on a zone boundary counts as inside.

use crate::domain::types::{GeoPoint, GeoZone};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Absorbs float rounding so a point at exactly `radius_km` stays inside (1 µm)
const BOUNDARY_TOLERANCE_KM: f64 = 1e-9;

/// Great-circle distance between two points in kilometers
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h marginally above 1 for antipodal points.
    // Not f64::min, which would turn a NaN into 1.0.
    let h = if h > 1.0 { 1.0 } else { h };
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub struct GeofenceEvaluator {
    zones: Vec<GeoZone>,
}

impl GeofenceEvaluator {
    pub fn new(zones: Vec<GeoZone>) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[GeoZone] {
        &self.zones
    }

    /// True if `point` lies inside (or on the edge of) any configured zone
    pub fn is_within_any_zone(&self, point: GeoPoint) -> bool {
        self.zones.iter().any(|zone| Self::zone_contains(zone, point))
    }

    /// Zone whose boundary is closest to `point`, with the distance to its center
    ///
    /// Zones the point is inside of have a negative boundary distance, so they
    /// always win over zones it is outside of. Returns `None` for an empty
    /// zone list or a point outside valid coordinate ranges.
    pub fn nearest_zone(&self, point: GeoPoint) -> Option<(&GeoZone, f64)> {
        if !point.is_valid() {
            return None;
        }

        let mut best: Option<(&GeoZone, f64, f64)> = None;

        for zone in &self.zones {
            let dist = distance_km(point, zone.center);
            if !dist.is_finite() {
                continue;
            }
            let to_edge = dist - zone.radius_km;
            match best {
                Some((_, _, best_edge)) if best_edge <= to_edge => {}
                _ => best = Some((zone, dist, to_edge)),
            }
        }

        best.map(|(zone, dist, _)| (zone, dist))
    }

    /// Inclusive membership test for a single zone
    #[inline]
    pub fn zone_contains(zone: &GeoZone, point: GeoPoint) -> bool {
        // Haversine wraps every 360 degrees, so out-of-range points must not reach it
        point.is_valid()
            && distance_km(point, zone.center) <= zone.radius_km + BOUNDARY_TOLERANCE_KM
    }
}

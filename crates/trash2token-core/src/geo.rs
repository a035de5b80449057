//! ============================================================================
//! Geo - Distance and arrival checks for collection tasks
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::db::CollectionTask;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A collector counts as on site strictly inside this radius
pub const ARRIVAL_RADIUS_METERS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<&CollectionTask> for GeoPoint {
    fn from(task: &CollectionTask) -> Self {
        Self::new(task.latitude, task.longitude)
    }
}

/// Great-circle distance in metres (haversine).
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c * 1000.0
}

/// Whether the collector is close enough to start the task from the map.
/// Unknown positions and tasks without usable coordinates never count.
pub fn has_arrived(position: Option<GeoPoint>, task: &CollectionTask) -> bool {
    let destination = GeoPoint::from(task);
    match position {
        Some(here) if here.is_valid() && destination.is_valid() => {
            within_arrival_radius(haversine_meters(here, destination))
        }
        _ => false,
    }
}

pub fn within_arrival_radius(meters: f64) -> bool {
    meters < ARRIVAL_RADIUS_METERS
}

/// Google Maps driving directions to the task, from the current position when known.
pub fn navigation_url(origin: Option<GeoPoint>, task: &CollectionTask) -> String {
    let origin = origin
        .map(|o| format!("&origin={},{}", o.latitude, o.longitude))
        .unwrap_or_default();
    format!(
        "https://www.google.com/maps/dir/?api=1{}&destination={},{}&travelmode=driving",
        origin, task.latitude, task.longitude
    )
}

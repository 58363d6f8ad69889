use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe in decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

pub type LocationCallback = Box<dyn FnOnce(Option<GeoPoint>) + Send>;

/// Device location source, consumed only by session discovery.
pub trait LocationProvider: Send + Sync {
    fn request_location(&self, callback: LocationCallback);
    fn is_available(&self) -> bool;
}

/// Provider that always answers with the same point (or with nothing).
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedLocation {
    point: Option<GeoPoint>,
}

impl FixedLocation {
    pub fn new(point: GeoPoint) -> Self {
        Self { point: Some(point) }
    }

    pub fn unavailable() -> Self {
        Self { point: None }
    }
}

impl LocationProvider for FixedLocation {
    fn request_location(&self, callback: LocationCallback) {
        callback(self.point);
    }

    fn is_available(&self) -> bool {
        self.point.is_some()
    }
}

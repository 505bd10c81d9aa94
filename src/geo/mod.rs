use crate::models::common::{GeoPoint, Location};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance between two coordinates.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let half_dlat = ((b.lat - a.lat).to_radians() / 2.0).sin();
    let half_dlng = ((b.lng - a.lng).to_radians() / 2.0).sin();

    let h = half_dlat * half_dlat + lat1.cos() * lat2.cos() * half_dlng * half_dlng;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Distance from a point to a location, when the location has been geocoded.
pub fn distance_to(point: &GeoPoint, location: &Location) -> Option<f64> {
    location
        .coordinates
        .as_ref()
        .map(|coordinates| haversine_km(point, coordinates))
}

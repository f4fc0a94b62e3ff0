//! Great-circle distances and the fixed metropolitan reference points.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

const LON_BOUNDS: (f64, f64) = (124.0, 132.0);
const LAT_BOUNDS: (f64, f64) = (33.0, 39.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Accepts only coordinates strictly inside the service-area bounding box.
    pub fn within_service_area(lon: f64, lat: f64) -> Option<Self> {
        let lon_ok = lon > LON_BOUNDS.0 && lon < LON_BOUNDS.1;
        let lat_ok = lat > LAT_BOUNDS.0 && lat < LAT_BOUNDS.1;
        (lon_ok && lat_ok).then_some(Self { lon, lat })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferencePoint {
    Gangnam,
    CityHall,
    Yeouido,
}

impl ReferencePoint {
    pub const ALL: [ReferencePoint; 3] = [Self::Gangnam, Self::CityHall, Self::Yeouido];

    pub fn location(self) -> GeoPoint {
        match self {
            Self::Gangnam => GeoPoint::new(127.0276, 37.4979),
            Self::CityHall => GeoPoint::new(126.9784, 37.5665),
            Self::Yeouido => GeoPoint::new(126.9246, 37.5219),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gangnam => "gangnam",
            Self::CityHall => "cityhall",
            Self::Yeouido => "yeouido",
        }
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        for reference in ReferencePoint::ALL {
            let p = reference.location();
            assert!(haversine_km(p, p).abs() < 1e-9);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = ReferencePoint::Gangnam.location();
        let b = ReferencePoint::Yeouido.location();
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn known_distance_between_city_hall_and_gangnam() {
        let d = haversine_km(
            ReferencePoint::CityHall.location(),
            ReferencePoint::Gangnam.location(),
        );
        assert!((d - 8.77).abs() < 0.1, "unexpected distance {d}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_km(GeoPoint::new(127.0, 37.0), GeoPoint::new(127.0, 38.0));
        assert!((d - 111.19).abs() < 0.01, "unexpected distance {d}");
    }

    #[test]
    fn bounding_box_is_exclusive() {
        assert!(GeoPoint::within_service_area(127.0, 37.5).is_some());
        assert!(GeoPoint::within_service_area(124.0, 37.5).is_none());
        assert!(GeoPoint::within_service_area(127.0, 39.0).is_none());
        assert!(GeoPoint::within_service_area(0.0, 0.0).is_none());
        assert!(GeoPoint::within_service_area(200_000.0, 450_000.0).is_none());
    }
}

//! Per-district coordinate accumulation and centroids.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::accumulate::DISPLAY_PRICE_UNIT;
use crate::coerce::round_to;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Default, PartialEq)]
struct CoordinateSeries {
    lons: Vec<f64>,
    lats: Vec<f64>,
    prices: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictCentroid {
    pub gu: String,
    pub lon: f64,
    pub lat: f64,
    pub avg_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialAggregator {
    districts: BTreeMap<String, CoordinateSeries>,
}

impl SpatialAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only coordinates already validated against the service area reach here.
    pub fn observe(&mut self, district: &str, location: GeoPoint, price: f64) {
        let series = self.districts.entry(district.to_string()).or_default();
        series.lons.push(location.lon);
        series.lats.push(location.lat);
        series.prices.push(price);
    }

    pub fn merge(&mut self, other: &SpatialAggregator) {
        for (district, series) in &other.districts {
            let target = self.districts.entry(district.clone()).or_default();
            target.lons.extend_from_slice(&series.lons);
            target.lats.extend_from_slice(&series.lats);
            target.prices.extend_from_slice(&series.prices);
        }
    }

    pub fn district_count(&self) -> usize {
        self.districts.len()
    }

    /// Centroids ordered by district name. Districts without any located
    /// record never appear.
    pub fn centroids(&self) -> Vec<DistrictCentroid> {
        self.districts
            .iter()
            .filter(|(_, series)| !series.lons.is_empty())
            .map(|(district, series)| {
                let n = series.lons.len() as f64;
                DistrictCentroid {
                    gu: district.clone(),
                    lon: round_to(series.lons.iter().sum::<f64>() / n, 5),
                    lat: round_to(series.lats.iter().sum::<f64>() / n, 5),
                    avg_price: round_to(
                        series.prices.iter().sum::<f64>() / n / DISPLAY_PRICE_UNIT,
                        2,
                    ),
                    count: series.prices.len() as u64,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_arithmetic_mean() {
        let mut spatial = SpatialAggregator::new();
        spatial.observe("강남구", GeoPoint::new(127.0, 37.4), 100_000.0);
        spatial.observe("강남구", GeoPoint::new(127.1, 37.6), 200_000.0);
        spatial.observe("노원구", GeoPoint::new(127.06, 37.65), 50_000.0);

        let centroids = spatial.centroids();
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids[0].gu, "강남구");
        assert_eq!(centroids[0].lon, 127.05);
        assert_eq!(centroids[0].lat, 37.5);
        assert_eq!(centroids[0].avg_price, 15.0);
        assert_eq!(centroids[0].count, 2);
        assert_eq!(centroids[1].gu, "노원구");
        assert_eq!(centroids[1].avg_price, 5.0);
    }

    #[test]
    fn empty_aggregator_has_no_centroids() {
        assert!(SpatialAggregator::new().centroids().is_empty());
    }

    #[test]
    fn merge_concatenates_series() {
        let mut left = SpatialAggregator::new();
        left.observe("마포구", GeoPoint::new(126.9, 37.55), 80_000.0);
        let mut right = SpatialAggregator::new();
        right.observe("마포구", GeoPoint::new(126.95, 37.56), 120_000.0);
        right.observe("서초구", GeoPoint::new(127.03, 37.48), 300_000.0);

        left.merge(&right);
        assert_eq!(left.district_count(), 2);
        let centroids = left.centroids();
        assert_eq!(centroids[0].count, 2);
        assert_eq!(centroids[0].avg_price, 10.0);
    }
}

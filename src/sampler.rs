//! Deterministic stride sampling into bounded scatter collections.
//!
//! The sampler never counts rows itself: callers hand it the 1-based ordinal
//! of each priced record, so chunked or partitioned runs select exactly the
//! same rows as a single sequential pass as long as ordinals are assigned in
//! stream order.

use serde::{Deserialize, Serialize};

use crate::accumulate::DISPLAY_PRICE_UNIT;
use crate::coerce::round_to;
use crate::features::{is_plausible_floor, DerivedFeatures};
use crate::geo::ReferencePoint;
use crate::record::Record;

const MAX_PLAUSIBLE_AGE: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaPoint {
    pub area: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgePoint {
    pub age: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorPoint {
    pub floor: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub x: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistancePoint {
    pub dist: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScatterSets {
    pub area: Vec<AreaPoint>,
    pub building_age: Vec<AgePoint>,
    pub floor: Vec<FloorPoint>,
    pub area_x_floor: Vec<FeaturePoint>,
    pub area_per_age: Vec<FeaturePoint>,
    pub parking_per_household: Vec<FeaturePoint>,
    pub households_per_building: Vec<FeaturePoint>,
    pub dist_gangnam: Vec<DistancePoint>,
    pub dist_cityhall: Vec<DistancePoint>,
    pub dist_yeouido: Vec<DistancePoint>,
    pub dist_nearest: Vec<DistancePoint>,
}

impl ScatterSets {
    /// Appends `other` after `self`, preserving stream order when partitions
    /// are merged in order.
    pub fn append(&mut self, other: &mut ScatterSets) {
        self.area.append(&mut other.area);
        self.building_age.append(&mut other.building_age);
        self.floor.append(&mut other.floor);
        self.area_x_floor.append(&mut other.area_x_floor);
        self.area_per_age.append(&mut other.area_per_age);
        self.parking_per_household
            .append(&mut other.parking_per_household);
        self.households_per_building
            .append(&mut other.households_per_building);
        self.dist_gangnam.append(&mut other.dist_gangnam);
        self.dist_cityhall.append(&mut other.dist_cityhall);
        self.dist_yeouido.append(&mut other.dist_yeouido);
        self.dist_nearest.append(&mut other.dist_nearest);
    }

    /// Keeps the first `max_points` of every collection.
    pub fn truncate(&mut self, max_points: usize) {
        self.area.truncate(max_points);
        self.building_age.truncate(max_points);
        self.floor.truncate(max_points);
        self.area_x_floor.truncate(max_points);
        self.area_per_age.truncate(max_points);
        self.parking_per_household.truncate(max_points);
        self.households_per_building.truncate(max_points);
        self.dist_gangnam.truncate(max_points);
        self.dist_cityhall.truncate(max_points);
        self.dist_yeouido.truncate(max_points);
        self.dist_nearest.truncate(max_points);
    }

    pub fn total_points(&self) -> usize {
        self.area.len()
            + self.building_age.len()
            + self.floor.len()
            + self.area_x_floor.len()
            + self.area_per_age.len()
            + self.parking_per_household.len()
            + self.households_per_building.len()
            + self.dist_gangnam.len()
            + self.dist_cityhall.len()
            + self.dist_yeouido.len()
            + self.dist_nearest.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrideSampler {
    stride: u64,
    sampled_records: u64,
    sets: ScatterSets,
}

impl StrideSampler {
    pub fn new(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
            sampled_records: 0,
            sets: ScatterSets::default(),
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn is_selected(&self, ordinal: u64) -> bool {
        ordinal > 0 && ordinal % self.stride == 0
    }

    /// Feeds one priced record at its 1-based `ordinal`. Returns whether the
    /// record was selected.
    pub fn observe(
        &mut self,
        ordinal: u64,
        record: &Record,
        features: &DerivedFeatures,
        price: f64,
    ) -> bool {
        if !self.is_selected(ordinal) {
            return false;
        }
        self.sampled_records += 1;

        let price = round_to(price / DISPLAY_PRICE_UNIT, 2);
        let sets = &mut self.sets;

        if let Some(area) = record.area_m2 {
            sets.area.push(AreaPoint {
                area: round_to(area, 1),
                price,
            });
        }
        if let Some(age) = features
            .building_age
            .filter(|age| (0..=MAX_PLAUSIBLE_AGE).contains(age))
        {
            sets.building_age.push(AgePoint { age, price });
        }
        if let Some(floor) = record.floor.filter(|floor| is_plausible_floor(*floor)) {
            sets.floor.push(FloorPoint { floor, price });
        }

        if let Some(x) = features.area_x_floor {
            sets.area_x_floor.push(FeaturePoint {
                x: round_to(x, 1),
                price,
            });
        }
        if let Some(x) = features.area_per_age {
            sets.area_per_age.push(FeaturePoint {
                x: round_to(x, 2),
                price,
            });
        }
        if let Some(x) = features.parking_per_household {
            sets.parking_per_household.push(FeaturePoint {
                x: round_to(x, 3),
                price,
            });
        }
        if let Some(x) = features.households_per_building {
            sets.households_per_building.push(FeaturePoint {
                x: round_to(x, 1),
                price,
            });
        }

        if let Some(distances) = features.distances {
            let point = |dist: f64| DistancePoint {
                dist: round_to(dist, 2),
                price,
            };
            sets.dist_gangnam
                .push(point(distances.to(ReferencePoint::Gangnam)));
            sets.dist_cityhall
                .push(point(distances.to(ReferencePoint::CityHall)));
            sets.dist_yeouido
                .push(point(distances.to(ReferencePoint::Yeouido)));
            sets.dist_nearest.push(point(distances.nearest_km));
        }

        true
    }

    pub fn sampled_records(&self) -> u64 {
        self.sampled_records
    }

    pub fn sets(&self) -> &ScatterSets {
        &self.sets
    }

    /// Merges a later partition into this one.
    pub fn merge(&mut self, mut other: StrideSampler) {
        self.sampled_records += other.sampled_records;
        self.sets.append(&mut other.sets);
    }

    pub fn into_sets(self) -> ScatterSets {
        self.sets
    }
}

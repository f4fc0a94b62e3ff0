//! Per-record derived features.
//!
//! Every attribute is computed independently from the fields it needs, so a
//! missing construction year only removes the age-based features and a bad
//! coordinate only removes the spatial ones.

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, GeoPoint, ReferencePoint};
use crate::record::Record;

const AGE_BIN_WIDTH: i64 = 5;
const REBUILD_AGE_YEARS: i64 = 30;
const MAX_PLAUSIBLE_FLOOR: i64 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FloorSegment {
    Low,
    Mid,
    High,
    VeryHigh,
}

impl FloorSegment {
    pub const ALL: [FloorSegment; 4] = [Self::Low, Self::Mid, Self::High, Self::VeryHigh];

    pub fn from_floor(floor: i64) -> Self {
        match floor {
            i64::MIN..=3 => Self::Low,
            4..=10 => Self::Mid,
            11..=20 => Self::High,
            _ => Self::VeryHigh,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "저층(~3층)",
            Self::Mid => "중층(4~10층)",
            Self::High => "고층(11~20층)",
            Self::VeryHigh => "초고층(21+층)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AreaSegment {
    Small,
    Standard,
    Mid,
    Large,
}

impl AreaSegment {
    pub const ALL: [AreaSegment; 4] = [Self::Small, Self::Standard, Self::Mid, Self::Large];

    pub fn from_area(area_m2: f64) -> Self {
        if area_m2 <= 59.0 {
            Self::Small
        } else if area_m2 <= 84.0 {
            Self::Standard
        } else if area_m2 <= 135.0 {
            Self::Mid
        } else {
            Self::Large
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Small => "소형(~59㎡)",
            Self::Standard => "국민평형(60~84㎡)",
            Self::Mid => "중형(85~135㎡)",
            Self::Large => "대형(135+㎡)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=3 => Some(Self::Q1),
            4..=6 => Some(Self::Q2),
            7..=9 => Some(Self::Q3),
            10..=12 => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Half {
    First,
    Second,
}

impl Half {
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=6 => Some(Self::First),
            7..=12 => Some(Self::Second),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::First => "상반기",
            Self::Second => "하반기",
        }
    }
}

/// Rebuild-candidate split at 30 years of building age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RebuildClass {
    Candidate,
    NotCandidate,
}

impl RebuildClass {
    pub const ALL: [RebuildClass; 2] = [Self::Candidate, Self::NotCandidate];

    pub fn from_age(building_age: i64) -> Self {
        if building_age >= REBUILD_AGE_YEARS {
            Self::Candidate
        } else {
            Self::NotCandidate
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Candidate => "재건축 후보(30+년)",
            Self::NotCandidate => "비해당(<30년)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDistances {
    pub gangnam_km: f64,
    pub cityhall_km: f64,
    pub yeouido_km: f64,
    pub nearest_km: f64,
}

impl ReferenceDistances {
    pub fn from_point(point: GeoPoint) -> Self {
        let gangnam_km = haversine_km(point, ReferencePoint::Gangnam.location());
        let cityhall_km = haversine_km(point, ReferencePoint::CityHall.location());
        let yeouido_km = haversine_km(point, ReferencePoint::Yeouido.location());
        Self {
            gangnam_km,
            cityhall_km,
            yeouido_km,
            nearest_km: gangnam_km.min(cityhall_km).min(yeouido_km),
        }
    }

    pub fn to(&self, reference: ReferencePoint) -> f64 {
        match reference {
            ReferencePoint::Gangnam => self.gangnam_km,
            ReferencePoint::CityHall => self.cityhall_km,
            ReferencePoint::Yeouido => self.yeouido_km,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub building_age: Option<i64>,
    pub age_bin: Option<i64>,
    pub rebuild: Option<RebuildClass>,
    pub floor_segment: Option<FloorSegment>,
    pub area_segment: Option<AreaSegment>,
    pub quarter: Option<Quarter>,
    pub half: Option<Half>,
    pub area_x_floor: Option<f64>,
    pub area_per_age: Option<f64>,
    pub parking_per_household: Option<f64>,
    pub households_per_building: Option<f64>,
    pub location: Option<GeoPoint>,
    pub distances: Option<ReferenceDistances>,
}

pub fn building_age(contract_year: i64, construction_year: i64) -> i64 {
    (contract_year - construction_year).max(0)
}

pub fn age_bin(building_age: i64) -> i64 {
    building_age.div_euclid(AGE_BIN_WIDTH) * AGE_BIN_WIDTH
}

pub fn is_plausible_floor(floor: i64) -> bool {
    (1..=MAX_PLAUSIBLE_FLOOR).contains(&floor)
}

fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

pub fn derive_features(record: &Record) -> DerivedFeatures {
    let age = match (
        record.contract_year().filter(|y| *y != 0),
        record.construction_year.filter(|y| *y != 0),
    ) {
        (Some(contract_year), Some(built)) => Some(building_age(contract_year, built)),
        _ => None,
    };

    let month = record.contract_month();
    let area = record.area_m2;

    let area_x_floor = match (nonzero(area), record.floor) {
        (Some(area), Some(floor)) if is_plausible_floor(floor) => Some(area * floor as f64),
        _ => None,
    };

    let area_per_age = match (nonzero(area), age) {
        (Some(area), Some(age)) => Some(area / (age as f64 + 1.0)),
        _ => None,
    };

    let parking_per_household = match (record.parking, record.total_households) {
        (Some(parking), Some(households)) if households > 0.0 => {
            Some(parking / (households + 1.0))
        }
        _ => None,
    };

    let households_per_building =
        match (nonzero(record.total_households), record.total_buildings) {
            (Some(households), Some(buildings)) if buildings > 0.0 => {
                Some(households / (buildings + 1.0))
            }
            _ => None,
        };

    let location = match (record.coord_x, record.coord_y) {
        (Some(lon), Some(lat)) => GeoPoint::within_service_area(lon, lat),
        _ => None,
    };

    DerivedFeatures {
        building_age: age,
        age_bin: age.map(age_bin),
        rebuild: age.map(RebuildClass::from_age),
        floor_segment: record.floor.map(FloorSegment::from_floor),
        area_segment: area.map(AreaSegment::from_area),
        quarter: month.and_then(Quarter::from_month),
        half: month.and_then(Half::from_month),
        area_x_floor,
        area_per_age,
        parking_per_household,
        households_per_building,
        location,
        distances: location.map(ReferenceDistances::from_point),
    }
}

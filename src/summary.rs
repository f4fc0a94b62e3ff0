//! The nested summary document and its assembly from finalized accumulators.
//!
//! Field names follow the keys the dashboard front end reads, so the JSON is
//! camelCase and a few Rust names are renamed explicitly.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::accumulate::{GroupStat, PriceAggregates, DISPLAY_PRICE_UNIT};
use crate::config::PipelineConfig;
use crate::features::{AreaSegment, FloorSegment, RebuildClass};
use crate::histogram::PriceDistribution;
use crate::sampler::{AgePoint, AreaPoint, DistancePoint, FeaturePoint, FloorPoint, ScatterSets};
use crate::spatial::{DistrictCentroid, SpatialAggregator};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub year: String,
    pub count: u64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: String,
    pub count: u64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictSummary {
    pub gu: String,
    pub count: u64,
    pub avg_price: f64,
}

/// One heatmap row: the year followed by one cell per district, `null` where
/// the year has no sales in that district.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapRow {
    pub year: String,
    pub cells: Vec<(String, Option<f64>)>,
}

impl HeatmapRow {
    pub fn cell(&self, district: &str) -> Option<Option<f64>> {
        self.cells
            .iter()
            .find(|(name, _)| name == district)
            .map(|(_, value)| *value)
    }
}

impl Serialize for HeatmapRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        map.serialize_entry("year", &self.year)?;
        for (district, value) in &self.cells {
            map.serialize_entry(district, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthStat {
    pub month: u32,
    pub avg_price: f64,
    pub med_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterStat {
    pub quarter: String,
    pub avg_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HalfStat {
    pub half: String,
    pub avg_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalSection {
    pub by_month: Vec<MonthStat>,
    pub by_quarter: Vec<QuarterStat>,
    pub by_half: Vec<HalfStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeBinStat {
    pub age_bin: String,
    pub avg_price: f64,
    pub med_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildStat {
    pub label: String,
    pub avg_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentStat {
    pub seg: String,
    pub avg_price: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingSection {
    pub by_age_bin: Vec<AgeBinStat>,
    pub rebuild: Vec<RebuildStat>,
    pub by_floor_seg: Vec<SegmentStat>,
    pub by_area_seg: Vec<SegmentStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSection {
    pub area_x_floor: Vec<FeaturePoint>,
    #[serde(rename = "areaAgeRatio")]
    pub area_per_age: Vec<FeaturePoint>,
    #[serde(rename = "parkingRatio")]
    pub parking_per_household: Vec<FeaturePoint>,
    #[serde(rename = "dongDensity")]
    pub households_per_building: Vec<FeaturePoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialSection {
    pub dist_gangnam: Vec<DistancePoint>,
    pub dist_cityhall: Vec<DistancePoint>,
    pub dist_yeouido: Vec<DistancePoint>,
    #[serde(rename = "minDistJob")]
    pub dist_nearest: Vec<DistancePoint>,
    pub gu_centers: Vec<DistrictCentroid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    pub total_rows: u64,
    pub valid_rows: u64,
    pub yearly_summary: Vec<YearSummary>,
    pub monthly_summary: Vec<MonthSummary>,
    pub gu_summary: Vec<DistrictSummary>,
    pub area_vs_price: Vec<AreaPoint>,
    pub building_age_vs_price: Vec<AgePoint>,
    pub floor_vs_price: Vec<FloorPoint>,
    pub heatmap_data: Vec<HeatmapRow>,
    pub all_gus: Vec<String>,
    #[serde(rename = "top5Gus")]
    pub top_gus: Vec<String>,
    pub temporal: TemporalSection,
    pub building: BuildingSection,
    pub interaction: InteractionSection,
    pub spatial: SpatialSection,
    pub price_dist: PriceDistribution,
}

impl SummaryDocument {
    /// Document for a run with no priced records: every section is empty.
    pub fn empty(total_rows: u64) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }
}

/// Everything the assembler reads, already merged across partitions.
pub struct SummaryParts<'a> {
    pub total_rows: u64,
    pub valid_rows: u64,
    pub aggregates: &'a PriceAggregates,
    pub scatters: ScatterSets,
    pub spatial: &'a SpatialAggregator,
    pub prices: &'a [f64],
}

pub fn assemble_summary(parts: SummaryParts<'_>, config: &PipelineConfig) -> SummaryDocument {
    if parts.valid_rows == 0 {
        return SummaryDocument::empty(parts.total_rows);
    }

    let aggregates = parts.aggregates;
    let mut scatters = parts.scatters;
    scatters.truncate(config.max_points);

    let yearly_summary = aggregates
        .yearly
        .finalize_all(DISPLAY_PRICE_UNIT)
        .into_iter()
        .map(|(year, stat)| YearSummary {
            year,
            count: stat.count,
            avg_price: stat.avg_or_zero(),
        })
        .collect();

    let monthly_summary = aggregates
        .monthly
        .finalize_all(DISPLAY_PRICE_UNIT)
        .into_iter()
        .map(|(month, stat)| MonthSummary {
            month,
            count: stat.count,
            avg_price: stat.avg_or_zero(),
        })
        .collect();

    let gu_summary = district_ranking(aggregates);
    let top_gus = gu_summary
        .iter()
        .take(config.top_districts)
        .map(|row| row.gu.clone())
        .collect();
    let all_gus: Vec<String> = aggregates.district.keys().cloned().collect();
    let heatmap_data = heatmap(aggregates, &all_gus);

    SummaryDocument {
        total_rows: parts.total_rows,
        valid_rows: parts.valid_rows,
        yearly_summary,
        monthly_summary,
        gu_summary,
        area_vs_price: scatters.area,
        building_age_vs_price: scatters.building_age,
        floor_vs_price: scatters.floor,
        heatmap_data,
        all_gus,
        top_gus,
        temporal: temporal_section(aggregates),
        building: building_section(aggregates),
        interaction: InteractionSection {
            area_x_floor: scatters.area_x_floor,
            area_per_age: scatters.area_per_age,
            parking_per_household: scatters.parking_per_household,
            households_per_building: scatters.households_per_building,
        },
        spatial: SpatialSection {
            dist_gangnam: scatters.dist_gangnam,
            dist_cityhall: scatters.dist_cityhall,
            dist_yeouido: scatters.dist_yeouido,
            dist_nearest: scatters.dist_nearest,
            gu_centers: parts.spatial.centroids(),
        },
        price_dist: PriceDistribution::from_prices(
            parts.prices,
            config.histogram_bins,
            config.raw_price_cap,
        ),
    }
}

/// Districts by descending average price; ties fall back to name order.
fn district_ranking(aggregates: &PriceAggregates) -> Vec<DistrictSummary> {
    let mut rows: Vec<DistrictSummary> = aggregates
        .district
        .finalize_all(DISPLAY_PRICE_UNIT)
        .into_iter()
        .map(|(gu, stat)| DistrictSummary {
            gu,
            count: stat.count,
            avg_price: stat.avg_or_zero(),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.avg_price
            .total_cmp(&a.avg_price)
            .then_with(|| a.gu.cmp(&b.gu))
    });
    rows
}

fn heatmap(aggregates: &PriceAggregates, districts: &[String]) -> Vec<HeatmapRow> {
    aggregates
        .yearly
        .keys()
        .map(|year| {
            let cells = districts
                .iter()
                .map(|district| {
                    let key = (year.clone(), district.clone());
                    let cell = aggregates.year_district.finalize(&key, DISPLAY_PRICE_UNIT);
                    (district.clone(), cell.avg)
                })
                .collect();
            HeatmapRow {
                year: year.clone(),
                cells,
            }
        })
        .collect()
}

fn temporal_section(aggregates: &PriceAggregates) -> TemporalSection {
    TemporalSection {
        by_month: aggregates
            .by_month
            .finalize_all(DISPLAY_PRICE_UNIT)
            .into_iter()
            .map(|(month, stat)| MonthStat {
                month,
                avg_price: stat.avg_or_zero(),
                med_price: stat.median_or_zero(),
                count: stat.count,
            })
            .collect(),
        by_quarter: aggregates
            .by_quarter
            .finalize_all(DISPLAY_PRICE_UNIT)
            .into_iter()
            .map(|(quarter, stat)| QuarterStat {
                quarter: quarter.label().to_string(),
                avg_price: stat.avg_or_zero(),
                count: stat.count,
            })
            .collect(),
        by_half: aggregates
            .by_half
            .finalize_all(DISPLAY_PRICE_UNIT)
            .into_iter()
            .map(|(half, stat)| HalfStat {
                half: half.label().to_string(),
                avg_price: stat.avg_or_zero(),
                count: stat.count,
            })
            .collect(),
    }
}

fn building_section(aggregates: &PriceAggregates) -> BuildingSection {
    let segment = |label: &str, stat: GroupStat| SegmentStat {
        seg: label.to_string(),
        avg_price: stat.avg_or_zero(),
        count: stat.count,
    };

    BuildingSection {
        by_age_bin: aggregates
            .by_age_bin
            .finalize_all(DISPLAY_PRICE_UNIT)
            .into_iter()
            .map(|(bin, stat)| AgeBinStat {
                age_bin: format!("{bin}~{}년", bin + 4),
                avg_price: stat.avg_or_zero(),
                med_price: stat.median_or_zero(),
                count: stat.count,
            })
            .collect(),
        rebuild: RebuildClass::ALL
            .into_iter()
            .map(|class| {
                let stat = aggregates.rebuild.finalize(&class, DISPLAY_PRICE_UNIT);
                RebuildStat {
                    label: class.label().to_string(),
                    avg_price: stat.avg_or_zero(),
                    count: stat.count,
                }
            })
            .collect(),
        by_floor_seg: FloorSegment::ALL
            .into_iter()
            .map(|seg| (seg, aggregates.floor_segment.finalize(&seg, DISPLAY_PRICE_UNIT)))
            .filter(|(_, stat)| stat.count > 0)
            .map(|(seg, stat)| segment(seg.label(), stat))
            .collect(),
        by_area_seg: AreaSegment::ALL
            .into_iter()
            .map(|seg| (seg, aggregates.area_segment.finalize(&seg, DISPLAY_PRICE_UNIT)))
            .filter(|(_, stat)| stat.count > 0)
            .map(|(seg, stat)| segment(seg.label(), stat))
            .collect(),
    }
}

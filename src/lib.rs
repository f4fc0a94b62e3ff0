//! Apartment transaction summary crate.
//!
//! One forward pass over raw sale records produces the pre-aggregated
//! document the dashboard front end renders:
//! - grouped price statistics (yearly, monthly, district, year x district)
//! - derived building, temporal and interaction features
//! - stride-sampled scatter sets, district centroids and price histograms

mod accumulate;
mod coerce;
mod config;
mod features;
mod geo;
mod histogram;
mod observability;
mod pipeline;
mod record;
mod sampler;
mod spatial;
mod summary;

pub use accumulate::{
    mean, median, CountSum, DistributionAccumulator, GroupStat, GroupedAccumulator,
    PriceAggregates, DISPLAY_PRICE_UNIT,
};
pub use coerce::{parse_integer, parse_integer_or, parse_number, parse_number_or};
pub use config::{pipeline_config_from_env, PipelineConfig};
pub use features::{
    age_bin, building_age, derive_features, is_plausible_floor, AreaSegment, DerivedFeatures,
    FloorSegment, Half, Quarter, RebuildClass, ReferenceDistances,
};
pub use geo::{haversine_km, GeoPoint, ReferencePoint};
pub use histogram::{build_histogram, skewness, HistogramBin, LabeledBin, PriceDistribution};
pub use observability::{
    init_logging, log_app_start, log_output_written, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use pipeline::{
    payload_sha256_hex, summarize_csv, summarize_csv_path, summarize_records, write_summary,
    PipelineError, RunReport, SummaryPipeline, SummaryRun, WrittenSummary,
};
pub use record::{parse_address, ColumnMap, ContractPeriod, Record, RecordReader};
pub use sampler::{
    AgePoint, AreaPoint, DistancePoint, FeaturePoint, FloorPoint, ScatterSets, StrideSampler,
};
pub use spatial::{DistrictCentroid, SpatialAggregator};
pub use summary::{
    assemble_summary, AgeBinStat, BuildingSection, DistrictSummary, HalfStat, HeatmapRow,
    InteractionSection, MonthStat, MonthSummary, QuarterStat, RebuildStat, SegmentStat,
    SpatialSection, SummaryDocument, SummaryParts, TemporalSection, YearSummary,
};

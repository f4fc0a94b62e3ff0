//! Pipeline tuning knobs and their environment overrides.

use std::env;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Every `sample_stride`-th priced record feeds the scatter collections.
    pub sample_stride: u64,
    /// Cap applied to every scatter collection in the output document.
    pub max_points: usize,
    pub histogram_bins: usize,
    /// Ceiling (raw price units) applied to the raw-price histogram input.
    pub raw_price_cap: f64,
    pub top_districts: usize,
    /// `1` runs a single sequential pass.
    pub partitions: usize,
    /// Priced records buffered per partition before a parallel batch runs.
    pub partition_batch_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_stride: 30,
            max_points: 5_000,
            histogram_bins: 40,
            raw_price_cap: 500_000.0,
            top_districts: 5,
            partitions: 1,
            partition_batch_rows: 16_384,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sample_stride == 0 {
            return Err(PipelineError::InvalidConfig(
                "sample_stride must be > 0".to_string(),
            ));
        }
        if self.histogram_bins == 0 {
            return Err(PipelineError::InvalidConfig(
                "histogram_bins must be > 0".to_string(),
            ));
        }
        if self.partitions == 0 {
            return Err(PipelineError::InvalidConfig(
                "partitions must be > 0".to_string(),
            ));
        }
        if self.partition_batch_rows == 0 {
            return Err(PipelineError::InvalidConfig(
                "partition_batch_rows must be > 0".to_string(),
            ));
        }
        if !(self.raw_price_cap.is_finite() && self.raw_price_cap > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "raw_price_cap must be a positive number".to_string(),
            ));
        }
        Ok(())
    }

    /// Priced records held in memory at once by the partitioned mode.
    pub fn partition_buffer_len(&self) -> usize {
        self.partitions.saturating_mul(self.partition_batch_rows)
    }
}

pub fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Some(stride) = env_parse::<u64>("APT_SUMMARY_SAMPLE_STRIDE").filter(|v| *v > 0) {
        config.sample_stride = stride;
    }
    if let Some(max_points) = env_parse::<usize>("APT_SUMMARY_MAX_POINTS") {
        config.max_points = max_points;
    }
    if let Some(bins) = env_parse::<usize>("APT_SUMMARY_HISTOGRAM_BINS").filter(|v| *v > 0) {
        config.histogram_bins = bins;
    }
    if let Some(cap) =
        env_parse::<f64>("APT_SUMMARY_RAW_PRICE_CAP").filter(|v| v.is_finite() && *v > 0.0)
    {
        config.raw_price_cap = cap;
    }
    if let Some(top) = env_parse::<usize>("APT_SUMMARY_TOP_DISTRICTS") {
        config.top_districts = top;
    }
    if let Some(partitions) = env_parse::<usize>("APT_SUMMARY_PARTITIONS").filter(|v| *v > 0) {
        config.partitions = partitions;
    }
    if let Some(rows) =
        env_parse::<usize>("APT_SUMMARY_PARTITION_BATCH_ROWS").filter(|v| *v > 0)
    {
        config.partition_batch_rows = rows;
    }

    config
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse::<T>().ok()
}

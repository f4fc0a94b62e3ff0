//! Single-pass summary pipeline.
//!
//! [`SummaryPipeline`] owns every accumulator for one run. Records are fed in
//! stream order through [`SummaryPipeline::observe`], or with an explicit
//! ordinal through [`SummaryPipeline::observe_at`] when the caller partitions
//! the stream itself. Partial pipelines merge in partition order.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accumulate::PriceAggregates;
use crate::config::PipelineConfig;
use crate::features::derive_features;
use crate::record::{ColumnMap, Record, RecordReader};
use crate::sampler::StrideSampler;
use crate::spatial::SpatialAggregator;
use crate::summary::{assemble_summary, SummaryDocument, SummaryParts};

const MAX_LOGGED_MALFORMED_ROWS: u64 = 16;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),
    #[error("input source {path} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub rows_read: u64,
    pub valid_rows: u64,
    /// Rows without a usable price.
    pub skipped_rows: u64,
    /// Rows the CSV reader could not decode.
    pub malformed_rows: u64,
    pub sampled_rows: u64,
    pub year_range: Option<(String, String)>,
    pub district_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRun {
    pub summary: SummaryDocument,
    pub report: RunReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct SummaryPipeline {
    config: PipelineConfig,
    rows_read: u64,
    valid_rows: u64,
    malformed_rows: u64,
    aggregates: PriceAggregates,
    sampler: StrideSampler,
    spatial: SpatialAggregator,
    prices: Vec<f64>,
}

impl SummaryPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: PipelineConfig) -> Self {
        let sampler = StrideSampler::new(config.sample_stride);
        Self {
            config,
            rows_read: 0,
            valid_rows: 0,
            malformed_rows: 0,
            aggregates: PriceAggregates::new(),
            sampler,
            spatial: SpatialAggregator::new(),
            prices: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Feeds the next record in stream order. The sampling ordinal is the
    /// record's position among priced records.
    pub fn observe(&mut self, record: &Record) {
        self.rows_read += 1;
        let Some(price) = record.sale_price() else {
            return;
        };
        let ordinal = self.valid_rows + 1;
        self.observe_priced(ordinal, record, price);
    }

    /// Feeds a priced record at an explicit 1-based ordinal. Records without
    /// a usable price are counted and otherwise ignored.
    pub fn observe_at(&mut self, ordinal: u64, record: &Record) {
        self.rows_read += 1;
        if let Some(price) = record.sale_price() {
            self.observe_priced(ordinal, record, price);
        }
    }

    /// Counts a row the reader could not decode.
    pub fn record_malformed(&mut self) {
        self.rows_read += 1;
        self.malformed_rows += 1;
    }

    fn observe_priced(&mut self, ordinal: u64, record: &Record, price: f64) {
        self.valid_rows += 1;
        let features = derive_features(record);

        self.aggregates.observe(record, &features, price);
        self.sampler.observe(ordinal, record, &features, price);
        if let Some(location) = features.location {
            self.spatial.observe(&record.district, location, price);
        }
        self.prices.push(price);
    }

    /// Absorbs a pipeline that covered the records following this one's.
    pub fn merge(&mut self, other: SummaryPipeline) {
        self.rows_read += other.rows_read;
        self.valid_rows += other.valid_rows;
        self.malformed_rows += other.malformed_rows;
        self.aggregates.merge(&other.aggregates);
        self.spatial.merge(&other.spatial);
        self.sampler.merge(other.sampler);
        self.prices.extend(other.prices);
    }

    pub fn finish(self) -> SummaryRun {
        let aggregates = &self.aggregates;
        let year_range = match (aggregates.yearly.keys().next(), aggregates.yearly.keys().last()) {
            (Some(first), Some(last)) => Some((first.clone(), last.clone())),
            _ => None,
        };

        let report = RunReport {
            rows_read: self.rows_read,
            valid_rows: self.valid_rows,
            skipped_rows: self.rows_read - self.valid_rows - self.malformed_rows,
            malformed_rows: self.malformed_rows,
            sampled_rows: self.sampler.sampled_records(),
            year_range,
            district_count: aggregates.district.len(),
        };

        if self.valid_rows == 0 {
            warn!(
                component = "pipeline",
                event = "summary.input.empty",
                rows_read = self.rows_read,
                malformed_rows = self.malformed_rows
            );
        }

        let summary = assemble_summary(
            SummaryParts {
                total_rows: self.rows_read,
                valid_rows: self.valid_rows,
                aggregates,
                scatters: self.sampler.into_sets(),
                spatial: &self.spatial,
                prices: &self.prices,
            },
            &self.config,
        );

        info!(
            component = "pipeline",
            event = "summary.run.finish",
            rows_read = report.rows_read,
            valid_rows = report.valid_rows,
            skipped_rows = report.skipped_rows,
            malformed_rows = report.malformed_rows,
            sampled_rows = report.sampled_rows,
            district_count = report.district_count
        );

        SummaryRun { summary, report }
    }
}

/// Summarizes an in-memory record stream, honouring `config.partitions`.
pub fn summarize_records<I>(records: I, config: &PipelineConfig) -> Result<SummaryRun, PipelineError>
where
    I: IntoIterator<Item = Record>,
{
    let mut pipeline = SummaryPipeline::new(config.clone())?;
    log_run_start(config, None);

    if config.partitions <= 1 {
        for record in records {
            pipeline.observe(&record);
        }
        return Ok(pipeline.finish());
    }

    let mut batch = Vec::new();
    for record in records {
        if record.sale_price().is_none() {
            pipeline.observe(&record);
            continue;
        }
        batch.push(record);
        if batch.len() >= config.partition_buffer_len() {
            flush_partitioned(&mut pipeline, &mut batch);
        }
    }
    flush_partitioned(&mut pipeline, &mut batch);
    Ok(pipeline.finish())
}

/// Summarizes a headed CSV source. Rows the CSV reader rejects are counted
/// and skipped; a header that cannot be read is fatal.
pub fn summarize_csv<R: Read>(
    source: R,
    config: &PipelineConfig,
    columns: &ColumnMap,
) -> Result<SummaryRun, PipelineError> {
    let mut pipeline = SummaryPipeline::new(config.clone())?;
    let reader = RecordReader::new(source, columns)?;

    if !reader.missing_columns().is_empty() {
        warn!(
            component = "pipeline",
            event = "summary.input.missing_columns",
            missing = ?reader.missing_columns()
        );
    }

    let partitioned = config.partitions > 1;
    let mut batch = Vec::new();
    for (idx, row) in reader.enumerate() {
        match row {
            Ok(record) if partitioned && record.sale_price().is_some() => {
                batch.push(record);
                if batch.len() >= config.partition_buffer_len() {
                    flush_partitioned(&mut pipeline, &mut batch);
                }
            }
            Ok(record) => pipeline.observe(&record),
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(err.into()),
            Err(err) => {
                if pipeline.malformed_rows < MAX_LOGGED_MALFORMED_ROWS {
                    warn!(
                        component = "pipeline",
                        event = "summary.row.malformed",
                        line = idx + 2,
                        error = %err
                    );
                }
                pipeline.record_malformed();
            }
        }
    }

    flush_partitioned(&mut pipeline, &mut batch);
    Ok(pipeline.finish())
}

pub fn summarize_csv_path(
    path: &Path,
    config: &PipelineConfig,
    columns: &ColumnMap,
) -> Result<SummaryRun, PipelineError> {
    config.validate()?;
    let file = fs::File::open(path).map_err(|source| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    log_run_start(config, Some(path));
    summarize_csv(std::io::BufReader::new(file), config, columns)
}

/// Runs the buffered priced records as one parallel batch and merges the
/// result. Every earlier priced record is already merged, so the batch
/// continues the pipeline's ordinal sequence.
fn flush_partitioned(pipeline: &mut SummaryPipeline, batch: &mut Vec<Record>) {
    if batch.is_empty() {
        return;
    }
    let first_ordinal = pipeline.valid_rows + 1;
    let partial = summarize_partitioned(batch.as_slice(), first_ordinal, &pipeline.config);
    pipeline.merge(partial);
    batch.clear();
}

/// Runs priced records through `config.partitions` independent pipelines.
/// Ordinals are fixed from stream position before the split, so sampling
/// matches a sequential pass exactly.
fn summarize_partitioned(
    priced: &[Record],
    first_ordinal: u64,
    config: &PipelineConfig,
) -> SummaryPipeline {
    let chunk_size = priced.len().div_ceil(config.partitions).max(1);

    let partials: Vec<SummaryPipeline> = priced
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let first_ordinal = first_ordinal + (chunk_idx * chunk_size) as u64;
            let mut partial = SummaryPipeline::with_valid_config(config.clone());
            for (offset, record) in chunk.iter().enumerate() {
                partial.observe_at(first_ordinal + offset as u64, record);
            }
            partial
        })
        .collect();

    debug!(
        component = "pipeline",
        event = "summary.partitions.merge",
        partitions = partials.len(),
        records = priced.len()
    );

    let mut merged = SummaryPipeline::with_valid_config(config.clone());
    for partial in partials {
        merged.merge(partial);
    }
    merged
}

/// Writes the document as compact JSON through a temp file and rename.
pub fn write_summary(path: &Path, summary: &SummaryDocument) -> Result<WrittenSummary, PipelineError> {
    let payload = serde_json::to_vec(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_atomic(path, &payload)?;

    Ok(WrittenSummary {
        path: path.to_path_buf(),
        bytes: payload.len() as u64,
        sha256: payload_sha256_hex(&payload),
    })
}

pub fn payload_sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| {
            PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid output path: {}", path.display()),
            ))
        })?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

fn log_run_start(config: &PipelineConfig, path: Option<&Path>) {
    match path {
        Some(path) => info!(
            component = "pipeline",
            event = "summary.run.start",
            input = %path.display(),
            sample_stride = config.sample_stride,
            max_points = config.max_points,
            partitions = config.partitions
        ),
        None => info!(
            component = "pipeline",
            event = "summary.run.start",
            sample_stride = config.sample_stride,
            max_points = config.max_points,
            partitions = config.partitions
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ContractPeriod;

    fn priced(district: &str, price: Option<f64>) -> Record {
        Record {
            contract: ContractPeriod::parse("202107"),
            district: district.to_string(),
            floor: Some(5),
            price,
            ..Record::default()
        }
    }

    #[test]
    fn unpriced_records_count_as_read_only() {
        let mut pipeline = SummaryPipeline::new(PipelineConfig::default()).expect("valid config");
        pipeline.observe(&priced("강남구", Some(10_000.0)));
        pipeline.observe(&priced("강남구", None));
        pipeline.record_malformed();

        let run = pipeline.finish();
        assert_eq!(run.report.rows_read, 3);
        assert_eq!(run.report.valid_rows, 1);
        assert_eq!(run.report.skipped_rows, 1);
        assert_eq!(run.report.malformed_rows, 1);
        assert_eq!(run.summary.total_rows, 3);
        assert_eq!(run.summary.valid_rows, 1);
    }

    #[test]
    fn ordinal_advances_only_on_priced_records() {
        let config = PipelineConfig {
            sample_stride: 2,
            ..PipelineConfig::default()
        };
        let mut pipeline = SummaryPipeline::new(config).expect("valid config");
        pipeline.observe(&priced("강남구", Some(10_000.0)));
        pipeline.observe(&priced("강남구", None));
        pipeline.observe(&priced("강남구", Some(20_000.0)));

        let run = pipeline.finish();
        assert_eq!(run.report.sampled_rows, 1);
        assert_eq!(run.summary.floor_vs_price.len(), 1);
        assert_eq!(run.summary.floor_vs_price[0].price, 2.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            partitions: 0,
            ..PipelineConfig::default()
        };
        let err = SummaryPipeline::new(config).expect_err("zero partitions is invalid");
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn partitioned_run_matches_sequential_run() {
        let records: Vec<Record> = (0..97)
            .map(|i| {
                let price = if i % 11 == 0 {
                    None
                } else {
                    Some(10_000.0 + (i * 731 % 50) as f64 * 1_000.0)
                };
                let district = ["강남구", "노원구", "마포구"][i % 3];
                priced(district, price)
            })
            .collect();

        let sequential_cfg = PipelineConfig {
            sample_stride: 3,
            ..PipelineConfig::default()
        };
        let partitioned_cfg = PipelineConfig {
            partitions: 4,
            ..sequential_cfg.clone()
        };

        let sequential =
            summarize_records(records.clone(), &sequential_cfg).expect("sequential run");
        let partitioned = summarize_records(records, &partitioned_cfg).expect("partitioned run");

        assert_eq!(sequential.report, partitioned.report);
        assert_eq!(sequential.summary, partitioned.summary);
    }

    #[test]
    fn negative_prices_are_skipped_like_missing_ones() {
        let mut pipeline = SummaryPipeline::new(PipelineConfig::default()).expect("valid config");
        pipeline.observe(&priced("강남구", Some(-5.0)));
        pipeline.observe(&priced("강남구", Some(-1.0)));
        pipeline.observe(&priced("강남구", Some(70_000.0)));
        pipeline.observe(&priced("강남구", Some(90_000.0)));

        let run = pipeline.finish();
        assert_eq!(run.report.valid_rows, 2);
        assert_eq!(run.report.skipped_rows, 2);
        let dist = &run.summary.price_dist;
        assert_eq!(dist.log.iter().map(|b| b.count).sum::<u64>(), 2);
        assert!(dist.log.iter().all(|b| !b.bin.contains("NaN")));
        assert!(dist.log_skew.is_finite());
        assert!(dist.raw_skew.is_finite());
    }

    #[test]
    fn small_partition_batches_match_sequential_run() {
        let records: Vec<Record> = (0..53)
            .map(|i| {
                let price = if i % 7 == 0 {
                    Some(-1.0)
                } else {
                    Some(20_000.0 + (i * 37 % 40) as f64 * 1_000.0)
                };
                priced(["강남구", "마포구"][i % 2], price)
            })
            .collect();

        let sequential_cfg = PipelineConfig {
            sample_stride: 4,
            ..PipelineConfig::default()
        };
        let batched_cfg = PipelineConfig {
            partitions: 3,
            partition_batch_rows: 2,
            ..sequential_cfg.clone()
        };

        let sequential =
            summarize_records(records.clone(), &sequential_cfg).expect("sequential run");
        let batched = summarize_records(records, &batched_cfg).expect("batched run");

        assert_eq!(sequential.report, batched.report);
        assert_eq!(sequential.summary, batched.summary);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let digest = payload_sha256_hex(b"{}");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}

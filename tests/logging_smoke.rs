use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use apt_summary::{
    log_app_start, log_output_written, summarize_csv, summarize_csv_path, ColumnMap,
    LoggingConfig, PipelineConfig, RunReport, WrittenSummary,
};
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

#[test]
fn fixture_run_emits_start_and_finish_events() {
    let logs = capture_logs(Level::INFO, || {
        let run = summarize_csv_path(
            Path::new("tests/fixtures/train_sample.csv"),
            &PipelineConfig::default(),
            &ColumnMap::default(),
        )
        .expect("fixture should summarize");
        assert_eq!(run.report.valid_rows, 10);
    });

    assert!(logs.contains("\"event\":\"summary.run.start\""));
    assert!(logs.contains("\"event\":\"summary.run.finish\""));
    assert!(!logs.contains("\"event\":\"summary.input.empty\""));
}

#[test]
fn header_without_expected_columns_warns_and_yields_empty_run() {
    let logs = capture_logs(Level::INFO, || {
        let csv = "foo,bar\n1,2\n";
        let run = summarize_csv(
            csv.as_bytes(),
            &PipelineConfig::default(),
            &ColumnMap::default(),
        )
        .expect("unknown columns are not fatal");
        assert_eq!(run.report.rows_read, 1);
        assert_eq!(run.report.valid_rows, 0);
    });

    assert!(logs.contains("\"event\":\"summary.input.missing_columns\""));
    assert!(logs.contains("\"event\":\"summary.input.empty\""));
}

#[test]
fn partitioned_run_logs_merge_at_debug() {
    let logs = capture_logs(Level::DEBUG, || {
        summarize_csv_path(
            Path::new("tests/fixtures/train_sample.csv"),
            &PipelineConfig {
                partitions: 2,
                ..PipelineConfig::default()
            },
            &ColumnMap::default(),
        )
        .expect("fixture should summarize");
    });

    assert!(logs.contains("\"event\":\"summary.partitions.merge\""));
}

#[test]
fn binary_lifecycle_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        let cfg = LoggingConfig::default();
        log_app_start(
            &cfg,
            Path::new("temp_data/train.csv"),
            Path::new("public/data/summary.json"),
        );
        log_output_written(
            &WrittenSummary {
                path: PathBuf::from("public/data/summary.json"),
                bytes: 2,
                sha256: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
                    .to_string(),
            },
            &RunReport {
                rows_read: 12,
                valid_rows: 10,
                year_range: Some(("2017".to_string(), "2021".to_string())),
                district_count: 4,
                ..RunReport::default()
            },
        );
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"input\":\"temp_data/train.csv\""));
    assert!(logs.contains("\"output\":\"public/data/summary.json\""));
    assert!(logs.contains("\"event\":\"output.written\""));
    assert!(logs.contains("\"first_year\":\"2017\""));
    assert!(logs.contains("\"last_year\":\"2021\""));
    assert!(logs.contains("\"district_count\":4"));
}

#[test]
fn output_written_without_priced_rows_omits_year_range() {
    let logs = capture_logs(Level::INFO, || {
        log_output_written(
            &WrittenSummary {
                path: PathBuf::from("out/summary.json"),
                bytes: 512,
                sha256: "00".repeat(32),
            },
            &RunReport {
                rows_read: 3,
                ..RunReport::default()
            },
        );
    });

    assert!(logs.contains("\"event\":\"output.written\""));
    assert!(logs.contains("\"rows_read\":3"));
    assert!(logs.contains("\"bytes\":512"));
    assert!(!logs.contains("first_year"));
}

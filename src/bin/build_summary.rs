use std::path::PathBuf;

use apt_summary::{
    init_logging, log_app_start, log_output_written, logging_config_from_env,
    pipeline_config_from_env, summarize_csv_path, write_summary, ColumnMap,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let input = std::env::var("APT_SUMMARY_INPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("temp_data/train.csv"));
    let output = std::env::var("APT_SUMMARY_OUTPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public/data/summary.json"));
    log_app_start(&logging_cfg, &input, &output);

    let config = pipeline_config_from_env();
    let run = summarize_csv_path(&input, &config, &ColumnMap::default())?;
    let written = write_summary(&output, &run.summary)?;
    log_output_written(&written, &run.report);

    println!(
        "Summary written | rows={} valid={} path={}",
        run.report.rows_read,
        run.report.valid_rows,
        written.path.display()
    );
    if let Some((first_year, last_year)) = &run.report.year_range {
        println!(
            "  years: {first_year}~{last_year}, districts: {}",
            run.report.district_count
        );
    }
    println!(
        "  size: {:.1}MB sha256={}",
        written.bytes as f64 / (1024.0 * 1024.0),
        written.sha256
    );

    Ok(())
}

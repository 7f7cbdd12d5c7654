mod config;
mod error;
mod input;
mod normalize;
mod output;
mod pipeline;
mod schema;
mod scorer;
mod sector;
mod types;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Normalize a Bursa Malaysia end-of-day CSV export into the web front-end's JSON files.
#[derive(Debug, Parser)]
#[command(name = "eod", version)]
#[command(about = "Normalize Bursa EOD CSV exports and emit latest_price / picks JSON")]
struct Cli {
    /// Input CSV or TSV. Defaults to the newest CSV in --search-dir.
    input: Option<PathBuf>,

    /// Log filter, e.g. `info` or `bursa_eod=debug` [env: LOG_LEVEL]
    #[arg(long)]
    log_level: Option<String>,

    /// Config document; created with defaults when absent [env: EOD_CONFIG]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for latest_price.json and picks_latest.json [env: OUTPUT_DIR]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory for dated picks files [env: HISTORY_DIR]
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Where to look for the newest CSV when no input is given [env: EOD_SEARCH_DIR]
    #[arg(long)]
    search_dir: Option<PathBuf>,

    /// Number of picks to emit [env: TOP_N]
    #[arg(short = 'n', long = "top")]
    top_n: Option<usize>,

    /// Delete dated picks older than this many days, 0 keeps all [env: HISTORY_RETENTION_DAYS]
    #[arg(long)]
    retention_days: Option<u64>,

    /// Copy previous outputs here before replacing them [env: BACKUP_DIR]
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Extra sector mapping file, loaded before the config's own tables. Repeatable.
    #[arg(long = "sector-map")]
    sector_maps: Vec<PathBuf>,

    /// Also write <input stem>_normalized.csv to the output directory
    #[arg(long)]
    normalized_csv: bool,

    /// Write a data-quality audit document to this path
    #[arg(long)]
    audit: Option<PathBuf>,

    /// Data date stamped on the outputs (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl Cli {
    fn apply(self, cfg: &mut Config) {
        if let Some(v) = self.log_level {
            cfg.log_level = v;
        }
        if let Some(v) = self.config {
            cfg.config_path = v;
        }
        if let Some(v) = self.output_dir {
            cfg.output_dir = v;
        }
        if self.history_dir.is_some() {
            cfg.history_dir = self.history_dir;
        }
        if self.search_dir.is_some() {
            cfg.search_dir = self.search_dir;
        }
        if let Some(v) = self.top_n {
            cfg.top_n = v;
        }
        if let Some(v) = self.retention_days {
            cfg.retention_days = v;
        }
        if self.backup_dir.is_some() {
            cfg.backup_dir = self.backup_dir;
        }
        cfg.input = self.input;
        cfg.sector_maps = self.sector_maps;
        cfg.normalized_csv = self.normalized_csv;
        cfg.audit_path = self.audit;
        cfg.data_date = self.date;
    }
}

fn main() {
    let cli = Cli::parse();

    let mut cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };
    cli.apply(&mut cfg);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    match pipeline::run(&cfg) {
        Ok(report) => {
            info!(
                "Done: {} -> {} files; {} rows in, {} priced, {} picks, match rate {:.1}%, {} unknown sectors, {} degraded",
                report.source.display(),
                report.outputs.len(),
                report.rows_in,
                report.rows_priced,
                report.picks,
                report.match_rate,
                report.sector.unknown_rows,
                report.degraded,
            );
            for (reason, count) in &report.degrade_reasons {
                warn!("Degraded scoring: {count} rows ({reason})");
            }
            if report.resolved_fields == 0 {
                warn!("No columns of {} were recognised", report.source.display());
            }
        }
        Err(e) => {
            error!("Fatal error: {e}");
            std::process::exit(1);
        }
    }
}

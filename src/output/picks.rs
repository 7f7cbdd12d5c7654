use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::config::PICKS_LATEST_FILE;
use crate::error::Result;
use crate::types::Pick;

use super::atomic::write_json;
use super::DISPLAY_TIME_FORMAT;

#[derive(Debug, Clone, Serialize)]
pub struct PicksDoc<'a> {
    pub date: String,
    pub last_updated: String,
    pub total_picks: usize,
    pub market: &'a str,
    pub source_file: String,
    pub picks: &'a [Pick],
}

impl<'a> PicksDoc<'a> {
    pub fn new(
        picks: &'a [Pick],
        market: &'a str,
        source: &Path,
        data_date: NaiveDate,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            date: data_date.format("%Y-%m-%d").to_string(),
            last_updated: now.format(DISPLAY_TIME_FORMAT).to_string(),
            total_picks: picks.len(),
            market,
            source_file: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            picks,
        }
    }
}

/// `picks_YYYYMMDD.json`
pub fn history_file_name(date: NaiveDate) -> String {
    format!("picks_{}.json", date.format("%Y%m%d"))
}

/// Write the dated copy into the history directory and `picks_latest.json` into
/// the output directory. Returns both paths.
pub fn write(
    output_dir: &Path,
    history_dir: &Path,
    data_date: NaiveDate,
    doc: &PicksDoc,
) -> Result<(PathBuf, PathBuf)> {
    let dated = history_dir.join(history_file_name(data_date));
    write_json(&dated, doc)?;
    let latest = output_dir.join(PICKS_LATEST_FILE);
    write_json(&latest, doc)?;
    Ok((dated, latest))
}

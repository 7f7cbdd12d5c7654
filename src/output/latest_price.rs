use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::config::{DEFAULT_LAST_UPDATED, LATEST_PRICE_FILE};
use crate::error::Result;
use crate::types::{CodePolicy, Row};

use super::atomic::{finite, round_to, write_json};
use super::DISPLAY_TIME_FORMAT;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEntry {
    pub code: String,
    pub name: String,
    pub last_price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: f64,
    pub volume: u64,
    pub sector: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestPrice {
    pub last_updated: String,
    pub data_date: String,
    pub total_stocks: usize,
    pub market: String,
    pub stocks: Vec<PriceEntry>,
}

impl PriceEntry {
    fn from_row(row: &Row) -> Self {
        Self {
            code: row.code.clone(),
            name: row.name.clone(),
            last_price: finite(row.last_price),
            change: finite(row.change).map(|v| round_to(v, 4)),
            change_percent: if row.change_percent.is_finite() {
                round_to(row.change_percent, 2)
            } else {
                0.0
            },
            volume: row.volume,
            sector: row.sector_name.clone(),
            open: finite(row.open),
            high: finite(row.high),
            low: finite(row.low),
            last_updated: row
                .last_updated
                .clone()
                .unwrap_or_else(|| DEFAULT_LAST_UPDATED.to_string()),
        }
    }
}

/// Price feed over every row the code policy admits, in input order.
pub fn build(
    rows: &[Row],
    policy: CodePolicy,
    market: &str,
    data_date: NaiveDate,
    now: DateTime<Local>,
) -> LatestPrice {
    let stocks: Vec<PriceEntry> = rows
        .iter()
        .filter(|r| policy.admits(r))
        .map(PriceEntry::from_row)
        .collect();
    LatestPrice {
        last_updated: now.format(DISPLAY_TIME_FORMAT).to_string(),
        data_date: data_date.format("%Y-%m-%d").to_string(),
        total_stocks: stocks.len(),
        market: market.to_string(),
        stocks,
    }
}

pub fn write(output_dir: &Path, doc: &LatestPrice) -> Result<PathBuf> {
    let path = output_dir.join(LATEST_PRICE_FILE);
    write_json(&path, doc)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn stamp() -> (NaiveDate, DateTime<Local>) {
        let date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let now = Local.with_ymd_and_hms(2024, 5, 31, 17, 5, 9).unwrap();
        (date, now)
    }

    fn row(code: &str, last: Option<f64>) -> Row {
        Row {
            code: code.into(),
            name: "Test".into(),
            last_price: last,
            ..Row::default()
        }
    }

    #[test]
    fn strict_policy_drops_empty_codes() {
        let (date, now) = stamp();
        let rows = vec![row("1023", Some(5.0)), row("", Some(1.0))];

        let strict = build(&rows, CodePolicy::Strict, "Bursa Malaysia", date, now);
        assert_eq!(strict.total_stocks, 1);
        assert_eq!(strict.stocks[0].code, "1023");

        let lenient = build(&rows, CodePolicy::Lenient, "Bursa Malaysia", date, now);
        assert_eq!(lenient.total_stocks, 2);
    }

    #[test]
    fn document_shape_and_stamps() {
        let (date, now) = stamp();
        let doc = build(&[row("1023", Some(5.0))], CodePolicy::Strict, "Bursa Malaysia", date, now);
        assert_eq!(doc.data_date, "2024-05-31");
        assert_eq!(doc.last_updated, "2024-05-31 17:05:09");
        assert_eq!(doc.stocks[0].last_updated, "15:30:22");
        assert_eq!(doc.stocks[0].sector, "Unknown");
    }

    #[test]
    fn no_nan_or_infinity_reaches_the_file() {
        let (date, now) = stamp();
        let mut bad = row("0002", Some(f64::NAN));
        bad.change = Some(f64::INFINITY);
        bad.change_percent = f64::NEG_INFINITY;
        bad.high = Some(f64::NAN);
        let doc = build(&[row("0001", Some(1.5)), bad], CodePolicy::Strict, "Bursa Malaysia", date, now);

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), &doc).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        let second = &value["stocks"][1];
        assert!(second["last_price"].is_null());
        assert!(second["change"].is_null());
        assert!(second["high"].is_null());
        assert_eq!(second["change_percent"], 0.0);
        assert_eq!(value["stocks"][0]["last_price"], 1.5);
    }
}

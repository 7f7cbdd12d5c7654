use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

// ---------------------------------------------------------------------------
// File shapes (mirror output/picks.rs and output/latest_price.rs)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct PicksFile {
    pub date: String,
    pub last_updated: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    pub picks: Vec<PickRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PickRecord {
    pub rank: usize,
    pub code: String,
    pub name: String,
    pub instrument_type: String,
    pub sector: String,
    pub current_price: Option<f64>,
    pub daily_change: f64,
    pub score: f64,
    pub potential_score: f64,
    pub potential_reasons: String,
    pub recommendation: String,
    pub risk_level: String,
    pub rsi: f64,
    pub volume: u64,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct PriceFile {
    pub last_updated: String,
    pub data_date: String,
    pub total_stocks: usize,
    pub market: String,
    pub stocks: Vec<PriceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PriceRecord {
    pub code: String,
    pub name: String,
    pub last_price: Option<f64>,
    pub change_percent: f64,
    pub volume: u64,
    pub sector: String,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Loaded,
    Error(String),
    Loading,
}

/// One line of the sector breakdown pane.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorSummary {
    pub name: String,
    pub count: usize,
    pub avg_change: f64,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: LoadStatus,
    pub picks: PicksFile,
    pub prices: PriceFile,
    pub sectors: Vec<SectorSummary>,
    pub last_refresh: std::time::Instant,
    pub dir: PathBuf,
}

impl AppState {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            status: LoadStatus::Loading,
            picks: PicksFile::default(),
            prices: PriceFile::default(),
            sectors: Vec::new(),
            last_refresh: std::time::Instant::now(),
            dir,
        }
    }

    /// Re-read both files. A missing or unreadable picks file is an error state;
    /// the price feed is optional and only drives the sector pane.
    pub fn refresh(&mut self) {
        match read_json::<PicksFile>(&self.dir.join("picks_latest.json")) {
            Ok(picks) => {
                self.picks = picks;
                self.status = LoadStatus::Loaded;
            }
            Err(e) => {
                self.status = LoadStatus::Error(e);
                return;
            }
        }
        if let Ok(prices) = read_json::<PriceFile>(&self.dir.join("latest_price.json")) {
            self.sectors = sector_breakdown(&prices.stocks);
            self.prices = prices;
        }
        self.last_refresh = std::time::Instant::now();
    }

    pub fn selected_pick(&self, index: Option<usize>) -> Option<&PickRecord> {
        index.and_then(|i| self.picks.picks.get(i))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

/// Stocks per sector with mean daily change, largest sectors first.
pub fn sector_breakdown(stocks: &[PriceRecord]) -> Vec<SectorSummary> {
    let mut acc: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for s in stocks {
        let e = acc.entry(s.sector.as_str()).or_insert((0, 0.0));
        e.0 += 1;
        e.1 += s.change_percent;
    }
    let mut out: Vec<SectorSummary> = acc
        .into_iter()
        .map(|(name, (count, sum))| SectorSummary {
            name: name.to_string(),
            count,
            avg_change: sum / count as f64,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_price(v: Option<f64>) -> String {
    v.map_or("—".to_string(), |p| format!("{p:.3}"))
}

pub fn format_change(v: f64) -> String {
    format!("{v:+.2}%")
}

pub fn format_volume(v: u64) -> String {
    if v >= 1_000_000 {
        format!("{:.1}M", v as f64 / 1_000_000.0)
    } else if v >= 1_000 {
        format!("{:.1}K", v as f64 / 1_000.0)
    } else {
        v.to_string()
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, Result};
use crate::output::atomic;
use crate::types::CodePolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/eod_config.json";
pub const DEFAULT_OUTPUT_DIR: &str = "web";
pub const DEFAULT_MARKET: &str = "Bursa Malaysia";

pub const LATEST_PRICE_FILE: &str = "latest_price.json";
pub const PICKS_LATEST_FILE: &str = "picks_latest.json";
pub const HISTORY_INDEX_FILE: &str = "history_index.json";

/// Picks emitted per run unless overridden (TOP_N / --top).
pub const DEFAULT_TOP_N: usize = 20;

/// History picks files older than this are deleted. 0 keeps everything.
pub const DEFAULT_RETENTION_DAYS: u64 = 30;

/// Numeric codes are left-padded with zeros to this width. Never truncates.
pub const DEFAULT_CODE_PAD_WIDTH: usize = 4;

/// Bytes sampled from the head of the input for delimiter detection.
pub const DELIMITER_SAMPLE_BYTES: usize = 4096;

/// Tab wins only with strictly more tabs than commas and at least this many tabs.
pub const MIN_TAB_COUNT: usize = 5;

/// Warn when fewer than this percentage of canonical fields resolve.
pub const LOW_MATCH_RATE_PCT: f64 = 70.0;

/// Score and potential given to a row whose scoring degraded.
pub const DEGRADED_SCORE: f64 = 50.0;

/// Stamp used for `last_updated` when neither the input nor `fill` supplies one.
pub const DEFAULT_LAST_UPDATED: &str = "15:30:22";

/// Header match scores, highest wins.
pub mod match_scores {
    pub const EXACT_NAME: u8 = 10;
    pub const EXACT_ALIAS: u8 = 8;
    pub const ALIAS_SUBSTRING: u8 = 7;
    pub const CJK_SUBSTRING: u8 = 7;
    pub const NAME_TOKEN: u8 = 6;
    pub const TOKEN_OVERLAP: u8 = 4;
    /// Minimum score for a canonical field to count as resolved.
    pub const RESOLVED_MIN: u8 = 4;
    /// At or above this a resolution is reported as a full match, below as partial.
    pub const FULL_MIN: u8 = 6;
}

/// Final-score floors for each recommendation tier.
pub mod tier_thresholds {
    pub const STRONG_BUY: f64 = 80.0;
    pub const BUY: f64 = 70.0;
    pub const CONSIDER_BUY: f64 = 60.0;
    pub const NEUTRAL: f64 = 50.0;
    pub const CONSIDER_SELL: f64 = 40.0;
}

/// Triggers for the human-readable `potential_reasons` text.
pub mod reason_thresholds {
    pub const UPTREND_CHANGE_PCT: f64 = 2.0;
    pub const ACTIVE_VOLUME: u64 = 100_000;
    pub const HIGH_SCORE: f64 = 70.0;
    pub const OVERSOLD_RSI: f64 = 40.0;
    pub const STRONG_RSI: f64 = 60.0;
    pub const MAX_REASONS: usize = 3;
}

// ---------------------------------------------------------------------------
// Runtime config (env, then CLI overrides applied in main)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Path of the EodConfig JSON document (EOD_CONFIG)
    pub config_path: PathBuf,
    /// Directory receiving latest_price.json / picks_latest.json (OUTPUT_DIR)
    pub output_dir: PathBuf,
    /// Directory receiving picks_YYYYMMDD.json (HISTORY_DIR, default <output_dir>/history)
    pub history_dir: Option<PathBuf>,
    /// Where to look for the newest CSV when no input path is given (EOD_SEARCH_DIR)
    pub search_dir: Option<PathBuf>,
    /// Number of picks to emit (TOP_N)
    pub top_n: usize,
    /// History retention in days, 0 disables cleanup (HISTORY_RETENTION_DAYS)
    pub retention_days: u64,
    /// Previous outputs are copied here before being replaced (BACKUP_DIR)
    pub backup_dir: Option<PathBuf>,
    pub input: Option<PathBuf>,
    /// Extra sector mapping files, loaded before the config's own sources.
    pub sector_maps: Vec<PathBuf>,
    pub normalized_csv: bool,
    pub audit_path: Option<PathBuf>,
    /// Overrides the data date (YYYY-MM-DD); defaults to today.
    pub data_date: Option<chrono::NaiveDate>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            config_path: std::env::var("EOD_CONFIG")
                .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
                .into(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string())
                .into(),
            history_dir: std::env::var("HISTORY_DIR").ok().map(PathBuf::from),
            search_dir: std::env::var("EOD_SEARCH_DIR").ok().map(PathBuf::from),
            top_n: std::env::var("TOP_N")
                .unwrap_or_else(|_| DEFAULT_TOP_N.to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("TOP_N must be a non-negative integer".to_string()))?,
            retention_days: std::env::var("HISTORY_RETENTION_DAYS")
                .unwrap_or_else(|_| DEFAULT_RETENTION_DAYS.to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("HISTORY_RETENTION_DAYS must be a non-negative integer".to_string())
                })?,
            backup_dir: std::env::var("BACKUP_DIR").ok().map(PathBuf::from),
            input: None,
            sector_maps: Vec::new(),
            normalized_csv: false,
            audit_path: None,
            data_date: None,
        })
    }

    pub fn history_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("history"))
    }
}

// ---------------------------------------------------------------------------
// Scoring bands
// ---------------------------------------------------------------------------

/// One scoring band. Bounds are strict; a band with neither bound always matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
    pub points: f64,
}

impl Band {
    pub const fn above(threshold: f64, points: f64) -> Self {
        Self { above: Some(threshold), below: None, points }
    }

    pub const fn below(threshold: f64, points: f64) -> Self {
        Self { above: None, below: Some(threshold), points }
    }

    pub const fn between(low: f64, high: f64, points: f64) -> Self {
        Self { above: Some(low), below: Some(high), points }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.above.map_or(true, |a| value > a) && self.below.map_or(true, |b| value < b)
    }
}

/// Points of the first band containing `value`, or 0.
pub fn band_points(bands: &[Band], value: f64) -> f64 {
    bands
        .iter()
        .find(|b| b.contains(value))
        .map_or(0.0, |b| b.points)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotentialConfig {
    pub multiplier: f64,
    pub change_bands: Vec<Band>,
    pub volume_bands: Vec<Band>,
}

impl Default for PotentialConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            change_bands: vec![
                Band::above(5.0, 10.0),
                Band::above(2.0, 5.0),
                Band::below(-5.0, -5.0),
            ],
            volume_bands: vec![Band::above(500_000.0, 5.0)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base: f64,
    pub change_bands: Vec<Band>,
    pub volume_bands: Vec<Band>,
    pub rsi_bands: Vec<Band>,
    /// Added when last price is above the 5-period SMA.
    pub sma_bonus: f64,
    /// RSI assumed when the input carries none.
    pub neutral_rsi: f64,
    pub potential: PotentialConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 50.0,
            change_bands: vec![
                Band::above(5.0, 15.0),
                Band::above(2.0, 10.0),
                Band::above(0.0, 5.0),
                Band::below(-5.0, -10.0),
                Band::below(0.0, -5.0),
            ],
            volume_bands: vec![
                Band::above(1_000_000.0, 10.0),
                Band::above(100_000.0, 5.0),
                Band::below(10_000.0, -5.0),
            ],
            rsi_bands: vec![
                Band::between(30.0, 70.0, 5.0),
                Band::below(30.0, 10.0),
                Band::above(70.0, -5.0),
            ],
            sma_bonus: 5.0,
            neutral_rsi: 50.0,
            potential: PotentialConfig::default(),
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<()> {
        let bands = self
            .change_bands
            .iter()
            .chain(&self.volume_bands)
            .chain(&self.rsi_bands)
            .chain(&self.potential.change_bands)
            .chain(&self.potential.volume_bands);
        for band in bands {
            let bounds_ok = band.above.map_or(true, f64::is_finite) && band.below.map_or(true, f64::is_finite);
            if !bounds_ok || !band.points.is_finite() {
                return Err(AppError::Config(format!("scoring band {band:?} is not finite")));
            }
        }
        for (name, v) in [
            ("base", self.base),
            ("sma_bonus", self.sma_bonus),
            ("neutral_rsi", self.neutral_rsi),
            ("potential.multiplier", self.potential.multiplier),
        ] {
            if !v.is_finite() {
                return Err(AppError::Config(format!("scoring.{name} must be finite")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EodConfig document
// ---------------------------------------------------------------------------

/// The JSON document describing the target schema and lookup tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EodConfig {
    /// Ordered canonical column list.
    pub schema: Vec<String>,
    /// Exact alias -> canonical name, on top of the built-in alias table.
    pub map: BTreeMap<String, String>,
    /// CJK alias -> canonical name, matched as a substring of the inbound header.
    pub cjk_map: BTreeMap<String, String>,
    /// Canonical name -> default used when the cleaned cell is missing.
    pub fill: BTreeMap<String, String>,
    /// Sector code -> sector name. Merged after `sector_files`.
    pub sector_lookup: BTreeMap<String, String>,
    /// Sector mapping files, relative to this document.
    pub sector_files: Vec<PathBuf>,
    pub market: String,
    pub code_pad_width: usize,
    pub price_feed_codes: CodePolicy,
    pub picks_codes: CodePolicy,
    /// Resolve unmapped codes to `Unknown (<code>)` instead of `Unknown`.
    pub unknown_with_code: bool,
    pub scoring: ScoringConfig,
}

impl Default for EodConfig {
    fn default() -> Self {
        let schema = [
            "code", "name", "sector", "open", "last_price", "prev_close", "change_percent",
            "change", "high", "low", "year_high", "year_low", "volume", "dividend_yield", "beta",
            "volume_ma_20", "rsi", "macd", "eps", "pe_ratio", "status", "last_updated",
        ];
        let map = [
            ("股票代码", "code"),
            ("代码", "code"),
            ("股票名称", "name"),
            ("名称", "name"),
            ("行业", "sector"),
            ("开盘", "open"),
            ("开盘价", "open"),
            ("最新价", "last_price"),
            ("前收盘", "prev_close"),
            ("昨收", "prev_close"),
            ("涨跌幅", "change_percent"),
            ("涨跌", "change"),
            ("最高", "high"),
            ("最高价", "high"),
            ("最低", "low"),
            ("最低价", "low"),
            ("成交量", "volume"),
            ("更新时间", "last_updated"),
            ("PE", "pe_ratio"),
            ("DY", "dividend_yield"),
        ];
        let cjk_map = [
            ("代码", "code"),
            ("代号", "code"),
            ("股号", "code"),
            ("名称", "name"),
            ("公司", "name"),
            ("行业", "sector"),
            ("板块", "sector"),
            ("开盘", "open"),
            ("今开", "open"),
            ("最新价", "last_price"),
            ("现价", "last_price"),
            ("当前价", "last_price"),
            ("收盘价", "last_price"),
            ("成交价", "last_price"),
            ("前收", "prev_close"),
            ("昨收", "prev_close"),
            ("涨跌幅", "change_percent"),
            ("涨幅", "change_percent"),
            ("变化率", "change_percent"),
            ("涨跌", "change"),
            ("变动", "change"),
            ("最高", "high"),
            ("最低", "low"),
            ("年最高", "year_high"),
            ("52周最高", "year_high"),
            ("年最低", "year_low"),
            ("52周最低", "year_low"),
            ("成交量", "volume"),
            ("交易量", "volume"),
            ("成交股数", "volume"),
            ("股息", "dividend_yield"),
            ("贝塔", "beta"),
            ("均量", "volume_ma_20"),
            ("成交量均线", "volume_ma_20"),
            ("相对强弱", "rsi"),
            ("平滑异同", "macd"),
            ("每股收益", "eps"),
            ("每股盈利", "eps"),
            ("市盈率", "pe_ratio"),
            ("本益比", "pe_ratio"),
            ("状态", "status"),
            ("更新时间", "last_updated"),
        ];
        let fill = [
            ("sector", "Unknown"),
            ("last_updated", DEFAULT_LAST_UPDATED),
            ("status", "Active"),
        ];
        Self {
            schema: schema.iter().map(|s| s.to_string()).collect(),
            map: map.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            cjk_map: cjk_map.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            fill: fill.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            sector_lookup: default_sector_lookup(),
            sector_files: Vec::new(),
            market: DEFAULT_MARKET.to_string(),
            code_pad_width: DEFAULT_CODE_PAD_WIDTH,
            price_feed_codes: CodePolicy::Strict,
            picks_codes: CodePolicy::Lenient,
            unknown_with_code: false,
            scoring: ScoringConfig::default(),
        }
    }
}

impl EodConfig {
    /// Load the document at `path`, writing the built-in default there first when absent.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config {} not found, writing built-in default", path.display());
            let cfg = Self::default();
            atomic::write_json(path, &cfg)?;
            return Ok(cfg);
        }
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema.is_empty() {
            return Err(AppError::Config("schema must list at least one column".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.schema {
            if field.trim().is_empty() {
                return Err(AppError::Config("schema contains an empty column name".to_string()));
            }
            if !seen.insert(field.to_lowercase()) {
                return Err(AppError::Config(format!("schema lists '{field}' twice")));
            }
        }
        self.scoring.validate()
    }

    /// `sector_files` resolved against the directory holding the config document.
    pub fn sector_file_paths(&self, config_path: &Path) -> Vec<PathBuf> {
        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        self.sector_files
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect()
    }
}

/// Bursa sector codes seen in broker exports, with single-digit family fallbacks.
fn default_sector_lookup() -> BTreeMap<String, String> {
    const ICP: &str = "Industrial & Consumer Products";
    const TECH: &str = "Technology";
    const PROP: &str = "Property";
    const TEL: &str = "Telecommunications & Media";
    const TRANS: &str = "Transportation & Logistics";
    const UTIL: &str = "Utilities";

    let mut m = BTreeMap::new();
    let mut put = |codes: &[&str], name: &str| {
        for c in codes {
            m.insert(c.to_string(), name.to_string());
        }
    };
    put(
        &["101", "102", "103", "105", "110", "120", "125", "150", "155", "161", "162", "163", "164", "165", "166"],
        ICP,
    );
    put(
        &["301", "302", "303", "305", "310", "320", "325", "358", "361", "362", "363", "364", "365"],
        TECH,
    );
    put(
        &["401", "402", "403", "405", "410", "420", "425", "461", "462", "463", "464", "465"],
        PROP,
    );
    put(&["501", "502", "520", "560"], TEL);
    put(&["653", "654", "656", "657"], TRANS);
    put(&["701", "702", "703", "705", "710", "725", "762"], UTIL);
    put(&["0162"], "Medical Devices & Supplies");
    put(&["0405"], "Software & IT Services");
    put(&["1701"], "Industrial Holding Firms");
    put(&["1702"], ICP);
    put(&["1703"], "Industrial Support Services");
    put(&["1704"], "Building Materials");
    put(&["1705"], "Construction & Infrastructure");
    put(&["1706"], TRANS);
    put(&["1801"], "Consumer Product Holding Firms");
    put(&["1802"], "Food, Beverage & Tobacco");
    put(&["1803"], "Retail & Distribution");
    put(&["1804"], "Hotel, Resort & Recreational Services");
    put(&["1805"], "Media & Entertainment");
    put(&["1806"], "Other Consumer Services");
    put(&["1807"], "Health Care Equipment & Services");
    put(&["1808"], "Pharmaceuticals & Biotechnology");
    put(&["1809"], TECH);
    put(&["1810"], TEL);
    put(&["0200"], "Plantation");
    put(&["0501"], "Property Holding Firms");
    put(&["0502"], "Property Development");
    put(&["0503"], "Real Estate Investment Trusts (REITs)");
    put(&["0504"], "Other Property-related Services");
    put(&["1201"], "Financial Holding Firms");
    put(&["1202"], "Commercial Banks");
    put(&["1203"], "Insurance");
    put(&["1204"], "Investment Banks");
    put(&["1205"], "Other Finance");
    put(&["0301"], "Energy Holding Firms");
    put(&["0302"], "Energy-related Equipment & Services");
    put(&["0303"], "Oil & Gas");
    put(&["0401"], "Utilities Holding Firms");
    put(&["0402"], "Gas, Water & Multi-utilities");
    put(&["0403"], "Electricity");
    put(&["0080"], "Special Purpose Acquisition");
    // Family fallbacks by leading digit
    put(&["1"], ICP);
    put(&["2"], TECH);
    put(&["3"], PROP);
    put(&["4"], TEL);
    put(&["5"], TRANS);
    put(&["6"], UTIL);
    put(&["7"], "Medical");
    put(&["8"], "Financial");
    put(&["9"], "Energy");
    put(&["10"], "Consumer");
    m
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label used whenever a sector code is absent or cannot be resolved.
pub const UNKNOWN_SECTOR: &str = "Unknown";

// ---------------------------------------------------------------------------
// Field kinds and cells
// ---------------------------------------------------------------------------

/// How a canonical column is cleaned before it lands on a [`Row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Instrument code: formula quoting stripped, numeric codes zero-padded.
    Identifier,
    Decimal,
    /// Decimal, truncated toward zero and clamped to >= 0.
    Integer,
    /// Decimal that may carry a trailing `%`.
    Percentage,
    Text,
}

impl FieldKind {
    /// Kind of a canonical field. Names the pipeline does not know are text.
    pub fn for_field(name: &str) -> Self {
        match name {
            "code" => FieldKind::Identifier,
            "volume" | "volume_ma_20" => FieldKind::Integer,
            "change_percent" | "dividend_yield" | "beta" => FieldKind::Percentage,
            "last_price" | "open" | "high" | "low" | "prev_close" | "change" | "year_high"
            | "year_low" | "rsi" | "macd" | "eps" | "pe_ratio" | "sma_5" => FieldKind::Decimal,
            _ => FieldKind::Text,
        }
    }
}

/// One cleaned cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Number(n) if n.is_finite() => Some(n.to_string()),
            _ => None,
        }
    }

    /// CSV rendering. Missing and non-finite values become an empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.is_finite() => n.to_string(),
            _ => String::new(),
        }
    }
}

/// What to do with a row whose code is empty after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePolicy {
    /// Drop the row.
    Strict,
    /// Keep the row with an empty code.
    #[default]
    Lenient,
}

impl CodePolicy {
    pub fn admits(&self, row: &Row) -> bool {
        match self {
            CodePolicy::Strict => !row.code.is_empty(),
            CodePolicy::Lenient => true,
        }
    }
}

impl std::fmt::Display for CodePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodePolicy::Strict => write!(f, "strict"),
            CodePolicy::Lenient => write!(f, "lenient"),
        }
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One instrument observation for one trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub code: String,
    pub name: String,
    pub sector_code: String,
    /// Never empty; `Unknown` until the sector mapper labels the row.
    pub sector_name: String,
    pub last_price: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub prev_close: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: f64,
    pub volume: u64,
    pub rsi: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub sma_5: Option<f64>,
    pub status: Option<String>,
    pub last_updated: Option<String>,
    /// Canonical fields without a dedicated slot (year_high, macd, ...).
    pub other: BTreeMap<String, Cell>,
    /// Passthrough values, aligned with `Resolution::extras`.
    pub extras: Vec<String>,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            sector_code: String::new(),
            sector_name: UNKNOWN_SECTOR.to_string(),
            last_price: None,
            open: None,
            high: None,
            low: None,
            prev_close: None,
            change: None,
            change_percent: 0.0,
            volume: 0,
            rsi: None,
            pe_ratio: None,
            dividend_yield: None,
            beta: None,
            sma_5: None,
            status: None,
            last_updated: None,
            other: BTreeMap::new(),
            extras: Vec::new(),
        }
    }
}

impl Row {
    /// Cleaned value of a canonical field, as it would be written back out.
    pub fn cell(&self, field: &str) -> Cell {
        fn num(v: Option<f64>) -> Cell {
            v.map_or(Cell::Missing, Cell::Number)
        }
        fn text(s: &str) -> Cell {
            if s.is_empty() {
                Cell::Missing
            } else {
                Cell::Text(s.to_string())
            }
        }
        match field {
            "code" => text(&self.code),
            "name" => text(&self.name),
            "sector" => text(&self.sector_code),
            "last_price" => num(self.last_price),
            "open" => num(self.open),
            "high" => num(self.high),
            "low" => num(self.low),
            "prev_close" => num(self.prev_close),
            "change" => num(self.change),
            "change_percent" => Cell::Number(self.change_percent),
            "volume" => Cell::Number(self.volume as f64),
            "rsi" => num(self.rsi),
            "pe_ratio" => num(self.pe_ratio),
            "dividend_yield" => num(self.dividend_yield),
            "beta" => num(self.beta),
            "sma_5" => num(self.sma_5),
            "status" => self.status.as_deref().map_or(Cell::Missing, text),
            "last_updated" => self.last_updated.as_deref().map_or(Cell::Missing, text),
            other => self.other.get(other).cloned().unwrap_or(Cell::Missing),
        }
    }

    /// Store a cleaned cell into the slot for `field`.
    pub fn set(&mut self, field: &str, cell: Cell) {
        match field {
            "code" => self.code = cell.into_text().unwrap_or_default(),
            "name" => self.name = cell.into_text().unwrap_or_default(),
            "sector" => self.sector_code = cell.into_text().unwrap_or_default(),
            "last_price" => self.last_price = cell.as_number(),
            "open" => self.open = cell.as_number(),
            "high" => self.high = cell.as_number(),
            "low" => self.low = cell.as_number(),
            "prev_close" => self.prev_close = cell.as_number(),
            "change" => self.change = cell.as_number(),
            "change_percent" => self.change_percent = cell.as_number().unwrap_or(0.0),
            "volume" => self.volume = cell.as_number().map_or(0, |v| v.max(0.0) as u64),
            "rsi" => self.rsi = cell.as_number(),
            "pe_ratio" => self.pe_ratio = cell.as_number(),
            "dividend_yield" => self.dividend_yield = cell.as_number(),
            "beta" => self.beta = cell.as_number(),
            "sma_5" => self.sma_5 = cell.as_number(),
            "status" => self.status = cell.into_text(),
            "last_updated" => self.last_updated = cell.into_text(),
            other => {
                self.other.insert(other.to_string(), cell);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    #[serde(rename = "Buy")]
    Buy,
    #[serde(rename = "Consider Buy")]
    ConsiderBuy,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Consider Sell")]
    ConsiderSell,
    #[serde(rename = "Sell")]
    Sell,
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        use crate::config::tier_thresholds::*;
        if score >= STRONG_BUY {
            Recommendation::StrongBuy
        } else if score >= BUY {
            Recommendation::Buy
        } else if score >= CONSIDER_BUY {
            Recommendation::ConsiderBuy
        } else if score >= NEUTRAL {
            Recommendation::Neutral
        } else if score >= CONSIDER_SELL {
            Recommendation::ConsiderSell
        } else {
            Recommendation::Sell
        }
    }

    /// Fixed risk label per tier; risk rises as the tier falls.
    pub fn risk_level(&self) -> RiskLevel {
        match self {
            Recommendation::StrongBuy => RiskLevel::Low,
            Recommendation::Buy => RiskLevel::MediumLow,
            Recommendation::ConsiderBuy => RiskLevel::Medium,
            Recommendation::Neutral => RiskLevel::MediumHigh,
            Recommendation::ConsiderSell => RiskLevel::High,
            Recommendation::Sell => RiskLevel::VeryHigh,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::ConsiderBuy => "Consider Buy",
            Recommendation::Neutral => "Neutral",
            Recommendation::ConsiderSell => "Consider Sell",
            Recommendation::Sell => "Sell",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Medium-Low")]
    MediumLow,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    #[serde(rename = "High")]
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

/// Best-effort instrument type derived from code conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentType {
    Stock,
    Warrant,
    Preference,
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentType::Stock => write!(f, "Stock"),
            InstrumentType::Warrant => write!(f, "Warrant"),
            InstrumentType::Preference => write!(f, "Preference"),
        }
    }
}

/// Bounded scores for one row. Both values are always within [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreCard {
    pub score: f64,
    pub potential_score: f64,
}

/// Why a row fell back to the neutral score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DegradeReason {
    NonFiniteInput(&'static str),
    NonFiniteScore,
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::NonFiniteInput(field) => write!(f, "non_finite_input:{field}"),
            DegradeReason::NonFiniteScore => write!(f, "non_finite_score"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    Scored(ScoreCard),
    /// Scoring could not run cleanly; the card holds the neutral score.
    Degraded { card: ScoreCard, reason: DegradeReason },
}

impl ScoreOutcome {
    pub fn card(&self) -> ScoreCard {
        match self {
            ScoreOutcome::Scored(card) => *card,
            ScoreOutcome::Degraded { card, .. } => *card,
        }
    }

    pub fn degrade_reason(&self) -> Option<DegradeReason> {
        match self {
            ScoreOutcome::Scored(_) => None,
            ScoreOutcome::Degraded { reason, .. } => Some(*reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Pick
// ---------------------------------------------------------------------------

/// One ranked entry of `picks_*.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub rank: usize,
    pub code: String,
    pub name: String,
    pub instrument_type: InstrumentType,
    pub sector: String,
    pub current_price: Option<f64>,
    pub daily_change: f64,
    pub score: f64,
    pub potential_score: f64,
    pub potential_reasons: String,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
    pub rsi: f64,
    pub volume: u64,
    pub status: String,
}

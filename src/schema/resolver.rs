use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::match_scores::*;
use crate::config::EodConfig;

/// English header variants seen in broker exports, per canonical field.
/// Scored as exact (8) or substring in either direction (7).
const BUILTIN_ALIASES: &[(&str, &[&str])] = &[
    ("code", &["Code", "Stock Code", "Symbol", "Ticker"]),
    ("name", &["Stock", "Name", "Stock Name", "Company"]),
    ("sector", &["Sector", "Industry", "Sector Code"]),
    ("open", &["Open", "Opening Price"]),
    ("last_price", &["Last", "Last Price", "Last Done", "Price", "Current"]),
    ("prev_close", &["Prv Close", "Prev Close", "Previous Close"]),
    ("change_percent", &["Chg%", "Change%", "Change %", "% Chg", "Pct Chg"]),
    ("change", &["Chg", "Change", "Net Chg"]),
    ("high", &["High"]),
    ("low", &["Low"]),
    ("year_high", &["Y-High", "Year High", "Year-High", "52W High"]),
    ("year_low", &["Y-Low", "Year Low", "Year-Low", "52W Low"]),
    ("volume", &["Vol", "Volume"]),
    ("dividend_yield", &["DY*", "Dividend Yield"]),
    ("beta", &["B%", "Beta"]),
    ("volume_ma_20", &["Vol MA (20)", "Vol MA(20)", "Vol MA 20", "Volume MA 20"]),
    ("rsi", &["RSI (14)", "RSI(14)", "RSI 14", "RSI"]),
    ("macd", &["MACD (26,12)", "MACD(26,12)", "MACD (26,12,9)", "MACD"]),
    ("eps", &["EPS*", "EPS", "Earnings Per Share"]),
    ("pe_ratio", &["P/E", "PE Ratio", "P/E Ratio"]),
    ("status", &["Status"]),
    ("last_updated", &["Last Updated", "Updated", "Update Time", "Time"]),
    ("sma_5", &["SMA 5", "SMA5", "SMA (5)", "MA5"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Partial,
    Unmatched,
    Extra,
}

impl MatchStatus {
    fn from_score(score: u8) -> Self {
        if score >= FULL_MIN {
            MatchStatus::Matched
        } else if score >= RESOLVED_MIN {
            MatchStatus::Partial
        } else {
            MatchStatus::Unmatched
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "matched"),
            MatchStatus::Partial => write!(f, "partial"),
            MatchStatus::Unmatched => write!(f, "unmatched"),
            MatchStatus::Extra => write!(f, "extra"),
        }
    }
}

/// Outcome for one canonical field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub field: String,
    /// Index of the inbound column, when resolved.
    pub source: Option<usize>,
    pub source_header: Option<String>,
    pub score: u8,
    pub status: MatchStatus,
}

/// An inbound column no canonical field consumed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraColumn {
    pub index: usize,
    pub header: String,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// One entry per canonical field, in schema order.
    pub fields: Vec<FieldMatch>,
    pub extras: Vec<ExtraColumn>,
    /// Resolved fields / schema length x 100.
    pub match_rate: f64,
}

impl Resolution {
    pub fn resolved_count(&self) -> usize {
        self.fields.iter().filter(|m| m.source.is_some()).count()
    }

    #[cfg(test)]
    pub fn source_of(&self, field: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|m| m.field == field)
            .and_then(|m| m.source)
    }
}

/// Maps inbound headers onto the canonical schema.
pub struct SchemaResolver {
    schema: Vec<String>,
    /// canonical -> lowercased built-in aliases
    aliases: BTreeMap<String, Vec<String>>,
    /// canonical -> lowercased exact-only aliases from the config `map`
    exact: BTreeMap<String, Vec<String>>,
    /// canonical -> CJK keywords from the config `cjk_map`
    cjk: BTreeMap<String, Vec<String>>,
}

fn tokens(s: &str) -> Vec<&str> {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE
        .get_or_init(|| Regex::new(r"[a-z0-9]+").expect("token regex"))
        .find_iter(s)
        .map(|m| m.as_str())
        .collect()
}

impl SchemaResolver {
    pub fn new(cfg: &EodConfig) -> Self {
        let mut aliases: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, variants) in BUILTIN_ALIASES {
            aliases
                .entry(field.to_string())
                .or_default()
                .extend(variants.iter().map(|v| v.to_lowercase()));
        }
        Self {
            schema: cfg.schema.clone(),
            aliases,
            exact: invert(&cfg.map),
            cjk: invert(&cfg.cjk_map),
        }
    }

    /// Match score of one inbound header against one canonical field, 0..=10.
    pub fn score(&self, header: &str, field: &str) -> u8 {
        let actual = clean_header(header);
        let canonical = field.trim().to_lowercase();
        if actual.is_empty() || canonical.is_empty() {
            return 0;
        }

        if actual == canonical {
            return EXACT_NAME;
        }

        let exact_hit = |list: Option<&Vec<String>>| list.is_some_and(|l| l.iter().any(|a| *a == actual));
        if exact_hit(self.aliases.get(&canonical)) || exact_hit(self.exact.get(&canonical)) {
            return EXACT_ALIAS;
        }

        if let Some(list) = self.aliases.get(&canonical) {
            if list.iter().any(|a| actual.contains(a.as_str()) || a.contains(actual.as_str())) {
                return ALIAS_SUBSTRING;
            }
        }

        if let Some(list) = self.cjk.get(&canonical) {
            if list.iter().any(|k| actual.contains(k.as_str())) {
                return CJK_SUBSTRING;
            }
        }

        let canonical_tokens = tokens(&canonical);
        if canonical_tokens.iter().any(|&t| t.len() > 2 && actual.contains(t)) {
            return NAME_TOKEN;
        }

        let actual_tokens = tokens(&actual);
        let overlap = canonical_tokens.iter().filter(|t| t.len() > 3).any(|&t| {
            actual_tokens
                .iter()
                .filter(|a| a.len() > 3)
                .any(|&a| a.contains(t) || t.contains(a))
        });
        if overlap {
            return TOKEN_OVERLAP;
        }

        0
    }

    /// Assign inbound columns to canonical fields, first-come in schema order.
    pub fn resolve(&self, header: &[String]) -> Resolution {
        let mut used = vec![false; header.len()];
        let mut fields = Vec::with_capacity(self.schema.len());

        for field in &self.schema {
            let mut best: Option<(usize, u8)> = None;
            for (idx, inbound) in header.iter().enumerate() {
                if used[idx] || clean_header(inbound).is_empty() {
                    continue;
                }
                let score = self.score(inbound, field);
                // Strict comparison keeps the earliest column on ties
                if score > best.map_or(0, |(_, s)| s) {
                    best = Some((idx, score));
                }
            }

            match best.filter(|&(_, s)| s >= RESOLVED_MIN) {
                Some((idx, score)) => {
                    used[idx] = true;
                    debug!("[SCHEMA] {field:<15} <- {:<20} ({score}/10)", header[idx]);
                    fields.push(FieldMatch {
                        field: field.clone(),
                        source: Some(idx),
                        source_header: Some(header[idx].clone()),
                        score,
                        status: MatchStatus::from_score(score),
                    });
                }
                None => {
                    debug!("[SCHEMA] {field:<15} <- [unmatched]");
                    fields.push(FieldMatch {
                        field: field.clone(),
                        source: None,
                        source_header: None,
                        score: 0,
                        status: MatchStatus::Unmatched,
                    });
                }
            }
        }

        let extras = header
            .iter()
            .enumerate()
            .filter(|(idx, _)| !used[*idx])
            .map(|(index, h)| {
                let cleaned = h.trim().trim_start_matches('\u{feff}').trim();
                // Unnamed columns keep their data under a positional name
                let header = if cleaned.is_empty() {
                    format!("column_{}", index + 1)
                } else {
                    cleaned.to_string()
                };
                ExtraColumn { index, header, status: MatchStatus::Extra }
            })
            .collect();

        let resolved = fields.iter().filter(|m| m.source.is_some()).count();
        let match_rate = if self.schema.is_empty() {
            0.0
        } else {
            resolved as f64 / self.schema.len() as f64 * 100.0
        };

        Resolution { fields, extras, match_rate }
    }
}

fn clean_header(h: &str) -> String {
    h.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// alias -> canonical becomes canonical -> [alias], lowercased.
fn invert(map: &BTreeMap<String, String>) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (alias, canonical) in map {
        let alias = alias.trim().to_lowercase();
        if alias.is_empty() {
            continue;
        }
        out.entry(canonical.trim().to_lowercase()).or_default().push(alias);
    }
    out
}

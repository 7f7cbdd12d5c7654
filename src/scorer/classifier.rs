use crate::config::reason_thresholds::*;
use crate::types::{InstrumentType, Row};

const WARRANT_SUFFIXES: &[&str] = &["WA", "WB", "WC", "WR"];

/// Best-effort instrument type from Bursa code conventions. Not authoritative.
pub fn instrument_type(code: &str) -> InstrumentType {
    let code = code.trim().to_ascii_uppercase();
    if code.contains('-') || WARRANT_SUFFIXES.iter().any(|s| code.ends_with(s)) {
        return InstrumentType::Warrant;
    }
    if code.chars().count() >= 5 && code.chars().last().is_some_and(|c| c.is_ascii_alphabetic()) {
        return InstrumentType::Preference;
    }
    InstrumentType::Stock
}

/// Up to three short reasons behind a pick, joined with ", ".
pub fn potential_reasons(row: &Row, score: f64, rsi: f64) -> String {
    let mut reasons = Vec::with_capacity(MAX_REASONS);
    if row.change_percent > UPTREND_CHANGE_PCT {
        reasons.push("Price trending up");
    }
    if row.volume > ACTIVE_VOLUME {
        reasons.push("Active trading volume");
    }
    if score > HIGH_SCORE {
        reasons.push("High AI score");
    }
    if rsi < OVERSOLD_RSI {
        reasons.push("RSI suggests oversold rebound");
    } else if rsi > STRONG_RSI {
        reasons.push("RSI shows strength");
    }

    if reasons.is_empty() {
        return "Neutral overall assessment".to_string();
    }
    reasons.truncate(MAX_REASONS);
    reasons.join(", ")
}

use crate::types::{Cell, FieldKind};

/// Literal placeholders brokers use for "no value".
const MISSING_TOKENS: &[&str] = &["", "-", "--", "n/a"];

fn is_missing_token(s: &str) -> bool {
    let s = s.trim();
    MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
}

/// Clean one raw cell according to the field kind. Never fails; bad input becomes `Missing`.
pub fn normalize_cell(raw: &str, kind: FieldKind, pad_width: usize) -> Cell {
    if is_missing_token(raw) {
        return Cell::Missing;
    }
    match kind {
        FieldKind::Identifier => {
            let code = clean_code(raw, pad_width);
            if code.is_empty() {
                Cell::Missing
            } else {
                Cell::Text(code)
            }
        }
        FieldKind::Decimal => parse_decimal(raw, false).map_or(Cell::Missing, Cell::Number),
        FieldKind::Percentage => parse_decimal(raw, true).map_or(Cell::Missing, Cell::Number),
        FieldKind::Integer => parse_decimal(raw, false)
            .map_or(Cell::Missing, |v| Cell::Number(v.trunc().max(0.0))),
        FieldKind::Text => Cell::Text(raw.trim().to_string()),
    }
}

/// Strip spreadsheet formula quoting (`="0001"`) and zero-pad all-digit codes.
/// Padding only ever widens; width 0 disables it.
pub fn clean_code(raw: &str, pad_width: usize) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("=\"") {
        s = rest.strip_suffix('"').unwrap_or(rest);
    }
    let bare: String = s
        .chars()
        .filter(|c| !matches!(c, '=' | '"' | '\'' | '\\') && !c.is_whitespace())
        .collect();

    if !bare.is_empty() && bare.len() < pad_width && bare.chars().all(|c| c.is_ascii_digit()) {
        format!("{bare:0>pad_width$}")
    } else {
        bare
    }
}

/// Parse a broker-formatted number: thousands separators, optional `RM` prefix,
/// and a trailing `%` when `percent` is set. Non-finite results are rejected.
pub fn parse_decimal(raw: &str, percent: bool) -> Option<f64> {
    let mut s = raw.trim();
    if is_missing_token(s) {
        return None;
    }
    if percent {
        s = s.strip_suffix('%').unwrap_or(s).trim_end();
    }
    if s.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("rm")) {
        s = s[2..].trim_start();
    }
    let cleaned: String = s.chars().filter(|&c| c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

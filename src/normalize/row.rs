use std::collections::BTreeMap;

use crate::schema::Resolution;
use crate::types::{FieldKind, Row};

use super::cell::normalize_cell;

/// Per-run settings the row normalizer needs from the config document.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub pad_width: usize,
    /// Canonical field -> default for cells that are missing after cleaning.
    pub fill: &'a BTreeMap<String, String>,
}

/// Build one [`Row`] from a raw record using a header resolution.
///
/// Missing cells take the `fill` default where one exists. The sector code is
/// never filled: an absent code stays empty and the sector mapper labels it.
/// `change_percent` is derived from last and previous close when no source
/// value survives cleaning; absolute `change` likewise.
pub fn normalize_record(record: &[String], resolution: &Resolution, ctx: &NormalizeContext) -> Row {
    let mut row = Row::default();
    let mut has_change_percent = false;

    for m in &resolution.fields {
        let kind = FieldKind::for_field(&m.field);
        let raw = m
            .source
            .and_then(|i| record.get(i))
            .map_or("", String::as_str);
        let mut cell = normalize_cell(raw, kind, ctx.pad_width);

        if cell.is_missing() && m.field != "sector" {
            if let Some(default) = ctx.fill.get(&m.field) {
                cell = normalize_cell(default, kind, ctx.pad_width);
            }
        }
        if m.field == "change_percent" && !cell.is_missing() {
            has_change_percent = true;
        }
        row.set(&m.field, cell);
    }

    if !has_change_percent {
        row.change_percent = derive_change_percent(row.last_price, row.prev_close);
    }
    if row.change.is_none() {
        row.change = match (row.last_price, row.prev_close) {
            (Some(last), Some(prev)) => Some(last - prev).filter(|v| v.is_finite()),
            _ => None,
        };
    }

    row.extras = resolution
        .extras
        .iter()
        .map(|e| record.get(e.index).map_or(String::new(), |v| v.trim().to_string()))
        .collect();

    row
}

/// `(last - prev) / prev * 100`, or 0 when either side is absent or prev is 0.
pub fn derive_change_percent(last: Option<f64>, prev: Option<f64>) -> f64 {
    match (last, prev) {
        (Some(last), Some(prev)) if prev != 0.0 => {
            let pct = (last - prev) / prev * 100.0;
            if pct.is_finite() {
                pct
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Canonical cells of `row` in schema order followed by its extras, as text.
pub fn render_record(row: &Row, schema: &[String]) -> Vec<String> {
    schema
        .iter()
        .map(|f| row.cell(f).render())
        .chain(row.extras.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EodConfig;
    use crate::schema::SchemaResolver;

    fn strings(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn normalize(header: &[&str], record: &[&str]) -> Row {
        let cfg = EodConfig::default();
        let res = SchemaResolver::new(&cfg).resolve(&strings(header));
        let ctx = NormalizeContext { pad_width: cfg.code_pad_width, fill: &cfg.fill };
        normalize_record(&strings(record), &res, &ctx)
    }

    #[test]
    fn bursa_row_is_cleaned() {
        let row = normalize(
            &["Code", "Stock", "Sector", "Last", "Prv Close", "Chg%", "Vol"],
            &["=\"1023\"", "Test Bank", "801", "5.00", "4.80", "+4.17%", "250000"],
        );
        assert_eq!(row.code, "1023");
        assert_eq!(row.name, "Test Bank");
        assert_eq!(row.sector_code, "801");
        assert_eq!(row.last_price, Some(5.0));
        assert_eq!(row.prev_close, Some(4.8));
        assert!((row.change_percent - 4.17).abs() < 1e-9);
        assert_eq!(row.volume, 250_000);
        let change = row.change.unwrap();
        assert!((change - 0.2).abs() < 1e-9, "change {change}");
        assert_eq!(row.status.as_deref(), Some("Active"));
        assert_eq!(row.last_updated.as_deref(), Some("15:30:22"));
        assert_eq!(row.rsi, None);
    }

    #[test]
    fn change_percent_derived_when_absent() {
        let row = normalize(&["Code", "Last", "Prv Close"], &["1", "1.10", "1.00"]);
        assert!((row.change_percent - 10.0).abs() < 1e-9, "pct {}", row.change_percent);

        let row = normalize(&["Code", "Last", "Prv Close", "Chg%"], &["1", "1.10", "1.00", "-"]);
        assert!((row.change_percent - 10.0).abs() < 1e-9, "placeholder should derive");
    }

    #[test]
    fn zero_prev_close_gives_zero_change_percent() {
        let row = normalize(&["Code", "Last", "Prv Close"], &["1", "1.10", "0"]);
        assert_eq!(row.change_percent, 0.0);
        assert_eq!(derive_change_percent(Some(1.0), None), 0.0);
    }

    #[test]
    fn malformed_cells_degrade_without_failing() {
        let row = normalize(&["Code", "Last", "Vol"], &["0001", "n/a", "lots"]);
        assert_eq!(row.code, "0001");
        assert_eq!(row.last_price, None);
        assert_eq!(row.volume, 0);
    }

    #[test]
    fn short_record_reads_missing_cells() {
        let row = normalize(&["Code", "Stock", "Last"], &["5"]);
        assert_eq!(row.code, "0005");
        assert_eq!(row.name, "");
        assert_eq!(row.last_price, None);
    }

    #[test]
    fn sector_code_is_not_filled() {
        let row = normalize(&["Code", "Sector"], &["1", ""]);
        assert_eq!(row.sector_code, "");
        assert_eq!(row.sector_name, "Unknown");
    }

    #[test]
    fn extras_follow_resolution_order() {
        let row = normalize(&["Code", "Broker Note", "Rating"], &["1", " watch ", "A"]);
        assert_eq!(row.extras, vec!["watch", "A"]);
    }

    #[test]
    fn renormalizing_a_normalized_row_is_identity() {
        let cfg = EodConfig::default();
        let resolver = SchemaResolver::new(&cfg);
        let ctx = NormalizeContext { pad_width: cfg.code_pad_width, fill: &cfg.fill };

        let header = strings(&["Code", "Stock", "Sector", "Last", "Prv Close", "Chg%", "Vol", "Broker Note"]);
        let record = strings(&["=\"7\"", "Acme", "301", "1,234.5", "1,200", "N/A", "12,345.9", "hold"]);
        let first = normalize_record(&record, &resolver.resolve(&header), &ctx);

        let mut canonical_header = cfg.schema.clone();
        canonical_header.push("Broker Note".to_string());
        let rendered = render_record(&first, &cfg.schema);
        let second = normalize_record(&rendered, &resolver.resolve(&canonical_header), &ctx);

        assert_eq!(first, second);
    }
}

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::schema::resolver::{ExtraColumn, FieldMatch};

use super::atomic::{round_to, write_json};

/// Data-quality record of one run, written with `--audit`.
#[derive(Debug, Clone, Serialize)]
pub struct AuditDoc<'a> {
    pub source_file: String,
    pub generated_at: String,
    pub delimiter: &'static str,
    pub original_header: &'a [String],
    pub match_rate: f64,
    pub resolved_fields: usize,
    pub total_fields: usize,
    pub fields: &'a [FieldMatch],
    pub extras: &'a [ExtraColumn],
    pub rows_in: usize,
    /// Rows in the price feed after the code policy.
    pub rows_out: usize,
    pub rows_dropped: usize,
    pub sector_distribution: &'a BTreeMap<String, usize>,
    pub unmapped_sector_codes: Vec<&'a str>,
    pub unknown_sector_pct: f64,
    pub degraded_rows: usize,
    pub degrade_reasons: &'a BTreeMap<String, usize>,
}

impl AuditDoc<'_> {
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut doc = self.clone();
        doc.match_rate = round_to(doc.match_rate, 1);
        doc.unknown_sector_pct = round_to(doc.unknown_sector_pct, 1);
        write_json(path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::resolver::MatchStatus;
    use serde_json::Value;

    #[test]
    fn audit_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("run.json");
        let header = vec!["Code".to_string(), "Junk".to_string()];
        let fields = vec![FieldMatch {
            field: "code".into(),
            source: Some(0),
            source_header: Some("Code".into()),
            score: 10,
            status: MatchStatus::Matched,
        }];
        let extras = vec![ExtraColumn { index: 1, header: "Junk".into(), status: MatchStatus::Extra }];
        let distribution: BTreeMap<String, usize> = [("Unknown".to_string(), 2)].into_iter().collect();
        let reasons = BTreeMap::new();

        let doc = AuditDoc {
            source_file: "eod.csv".into(),
            generated_at: "2024-05-31T17:05:09+08:00".into(),
            delimiter: "comma",
            original_header: &header,
            match_rate: 100.0 / 3.0,
            resolved_fields: 1,
            total_fields: 3,
            fields: &fields,
            extras: &extras,
            rows_in: 2,
            rows_out: 1,
            rows_dropped: 1,
            sector_distribution: &distribution,
            unmapped_sector_codes: vec!["999"],
            unknown_sector_pct: 100.0,
            degraded_rows: 0,
            degrade_reasons: &reasons,
        };
        doc.write(&path).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["match_rate"], 33.3);
        assert_eq!(value["fields"][0]["status"], "matched");
        assert_eq!(value["extras"][0]["status"], "extra");
        assert_eq!(value["unmapped_sector_codes"][0], "999");
        assert_eq!(value["rows_dropped"], 1);
    }
}

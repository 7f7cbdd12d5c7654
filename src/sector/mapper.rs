use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::types::{Row, UNKNOWN_SECTOR};

use super::table::SectorTable;

/// Which lookup step produced a sector name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorMatch {
    Exact,
    Prefix3,
    Prefix2,
    FirstDigit,
    CaseInsensitive,
    Range,
    Unmapped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorResolution {
    pub name: String,
    pub matched: SectorMatch,
}

impl SectorResolution {
    pub fn is_mapped(&self) -> bool {
        self.matched != SectorMatch::Unmapped
    }
}

/// Batch statistics from labelling one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectorStats {
    pub total_rows: usize,
    /// Rows per resolved sector name.
    pub distribution: BTreeMap<String, usize>,
    /// Distinct non-empty raw codes with no mapping.
    pub unmapped_codes: BTreeSet<String>,
    pub unknown_rows: usize,
}

impl SectorStats {
    pub fn unknown_pct(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.unknown_rows as f64 / self.total_rows as f64 * 100.0
        }
    }
}

pub struct SectorMapper {
    table: SectorTable,
    /// Label unmapped codes `Unknown (<code>)`.
    unknown_with_code: bool,
}

impl SectorMapper {
    pub fn new(table: SectorTable, unknown_with_code: bool) -> Self {
        Self { table, unknown_with_code }
    }

    /// Exact code, then 3/2/1-digit prefixes for numeric codes, then a
    /// case-insensitive match, then numeric ranges, else Unknown.
    pub fn resolve(&self, code: &str) -> SectorResolution {
        let code = code.trim();
        let hit = |name: &str, matched| SectorResolution { name: name.to_string(), matched };

        if code.is_empty() {
            return hit(UNKNOWN_SECTOR, SectorMatch::Unmapped);
        }
        if let Some(name) = self.table.get(code) {
            return hit(name, SectorMatch::Exact);
        }

        let numeric = code.chars().all(|c| c.is_ascii_digit());
        if numeric {
            for (len, matched) in [(3, SectorMatch::Prefix3), (2, SectorMatch::Prefix2), (1, SectorMatch::FirstDigit)] {
                if code.len() >= len {
                    if let Some(name) = self.table.get(&code[..len]) {
                        return hit(name, matched);
                    }
                }
            }
        }

        if let Some(name) = self.table.get_folded(code) {
            return hit(name, SectorMatch::CaseInsensitive);
        }

        if numeric {
            if let Some(name) = code.parse::<u64>().ok().and_then(|n| self.table.get_range(n)) {
                return hit(name, SectorMatch::Range);
            }
        }

        if self.unknown_with_code {
            hit(&format!("{UNKNOWN_SECTOR} ({code})"), SectorMatch::Unmapped)
        } else {
            hit(UNKNOWN_SECTOR, SectorMatch::Unmapped)
        }
    }

    /// Set `sector_name` on every row and collect statistics.
    pub fn label(&self, rows: &mut [Row]) -> SectorStats {
        let mut stats = SectorStats {
            total_rows: rows.len(),
            ..SectorStats::default()
        };
        for row in rows.iter_mut() {
            let resolved = self.resolve(&row.sector_code);
            if !resolved.is_mapped() {
                stats.unknown_rows += 1;
                if !row.sector_code.trim().is_empty() {
                    stats.unmapped_codes.insert(row.sector_code.trim().to_string());
                }
            }
            *stats.distribution.entry(resolved.name.clone()).or_insert(0) += 1;
            row.sector_name = resolved.name;
        }
        debug!(
            "[SECTOR] labelled {} rows, {} unknown, {} distinct unmapped codes",
            stats.total_rows,
            stats.unknown_rows,
            stats.unmapped_codes.len()
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(pairs: &[(&str, &str)], with_code: bool) -> SectorMapper {
        let mut table = SectorTable::new();
        for (k, v) in pairs {
            table.insert_if_absent(k, v);
        }
        SectorMapper::new(table, with_code)
    }

    fn row(sector_code: &str) -> Row {
        Row {
            sector_code: sector_code.to_string(),
            ..Row::default()
        }
    }

    #[test]
    fn falls_through_to_three_digit_prefix() {
        let m = mapper(&[("301", "Technology")], false);
        let r = m.resolve("3012");
        assert_eq!(r.name, "Technology");
        assert_eq!(r.matched, SectorMatch::Prefix3);
    }

    #[test]
    fn no_prefix_match_is_unknown() {
        let m = mapper(&[("301", "Technology")], false);
        let r = m.resolve("999");
        assert_eq!(r.name, "Unknown");
        assert!(!r.is_mapped());
    }

    #[test]
    fn prefix_order_is_three_two_one() {
        let m = mapper(&[("8", "Financial"), ("80", "Eighty")], false);
        assert_eq!(m.resolve("801").name, "Eighty");
        assert_eq!(m.resolve("891").name, "Financial");
        assert_eq!(m.resolve("801").matched, SectorMatch::Prefix2);
    }

    #[test]
    fn symbolic_codes_skip_prefixes() {
        let m = mapper(&[("R", "Prefix"), ("REIT", "Real Estate")], false);
        assert_eq!(m.resolve("reit").name, "Real Estate");
        assert_eq!(m.resolve("reit").matched, SectorMatch::CaseInsensitive);
        assert_eq!(m.resolve("RX").name, "Unknown");
    }

    #[test]
    fn range_keys_are_the_last_lookup() {
        let m = mapper(&[("101-166", "Industrial & Consumer Products")], false);
        let r = m.resolve("150");
        assert_eq!(r.name, "Industrial & Consumer Products");
        assert_eq!(r.matched, SectorMatch::Range);
        assert_eq!(m.resolve("101").matched, SectorMatch::Range);
        assert_eq!(m.resolve("166").matched, SectorMatch::Range);
        assert!(!m.resolve("167").is_mapped());
        // The key itself still resolves exactly; symbolic codes never hit a range
        assert_eq!(m.resolve("101-166").matched, SectorMatch::Exact);
        assert!(!m.resolve("15O").is_mapped());

        let m = mapper(&[("101-166", "Range"), ("15", "Prefix"), ("ab", "Folded")], false);
        assert_eq!(m.resolve("150").name, "Prefix");
        assert_eq!(m.resolve("150").matched, SectorMatch::Prefix2);
        assert_eq!(m.resolve("AB").matched, SectorMatch::CaseInsensitive);
        assert_eq!(m.resolve("120").name, "Range");
    }

    #[test]
    fn traceable_unknowns_carry_the_code() {
        let m = mapper(&[], true);
        assert_eq!(m.resolve("ZZ").name, "Unknown (ZZ)");
        assert_eq!(m.resolve("").name, "Unknown");
    }

    #[test]
    fn label_sets_names_and_counts() {
        let m = mapper(&[("801", "Financial Services"), ("301", "Technology")], false);
        let mut rows = vec![row("801"), row("3015"), row("999"), row(""), row("999"), row("ABC")];
        let stats = m.label(&mut rows);

        assert!(rows.iter().all(|r| !r.sector_name.is_empty()));
        assert_eq!(rows[0].sector_name, "Financial Services");
        assert_eq!(rows[1].sector_name, "Technology");
        assert_eq!(stats.total_rows, 6);
        assert_eq!(stats.unknown_rows, 4);
        assert_eq!(stats.distribution.get("Unknown"), Some(&4));
        let unmapped: Vec<&str> = stats.unmapped_codes.iter().map(String::as_str).collect();
        assert_eq!(unmapped, vec!["999", "ABC"]);
        assert!((stats.unknown_pct() - 4.0 / 6.0 * 100.0).abs() < 1e-9);
    }
}

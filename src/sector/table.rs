use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Sector code -> sector name. Earlier sources win on key collisions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorTable {
    entries: BTreeMap<String, String>,
    /// Lowercased key -> name, for the case-insensitive pass.
    folded: BTreeMap<String, String>,
    /// Inclusive numeric ranges from keys such as `101-166`.
    ranges: Vec<(u64, u64, String)>,
}

impl SectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Add `code -> name` unless the code is already present. Returns whether it was added.
    pub fn insert_if_absent(&mut self, code: &str, name: &str) -> bool {
        let code = code.trim();
        let name = name.trim();
        if code.is_empty() || name.is_empty() || self.entries.contains_key(code) {
            return false;
        }
        self.entries.insert(code.to_string(), name.to_string());
        self.folded
            .entry(code.to_lowercase())
            .or_insert_with(|| name.to_string());
        if let Some((lo, hi)) = parse_range(code) {
            self.ranges.push((lo, hi, name.to_string()));
        }
        true
    }

    /// Merge a whole map with first-wins semantics. Returns the number of new keys.
    pub fn merge(&mut self, map: &BTreeMap<String, String>) -> usize {
        map.iter()
            .filter(|(code, name)| self.insert_if_absent(code, name))
            .count()
    }

    /// Merge a mapping file: `{"mapping": {..}}` or a flat object.
    /// A missing file is skipped with a warning; invalid JSON is an error.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            warn!("[SECTOR] mapping file {} not found, skipping", path.display());
            return Ok(0);
        }
        let text = std::fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
        let object = match doc.get("mapping").and_then(Value::as_object) {
            Some(inner) => inner,
            None => match doc.as_object() {
                Some(flat) => flat,
                None => {
                    warn!("[SECTOR] {} is not a JSON object, skipping", path.display());
                    return Ok(0);
                }
            },
        };

        let mut added = 0;
        for (code, value) in object {
            match value.as_str() {
                Some(name) => {
                    if self.insert_if_absent(code, name) {
                        added += 1;
                    }
                }
                None => warn!("[SECTOR] {}: value for '{code}' is not a string, skipping", path.display()),
            }
        }
        debug!("[SECTOR] {} new codes from {}", added, path.display());
        Ok(added)
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn get_folded(&self, code: &str) -> Option<&str> {
        self.folded.get(&code.to_lowercase()).map(String::as_str)
    }

    pub fn get_range(&self, code: u64) -> Option<&str> {
        self.ranges
            .iter()
            .find(|(lo, hi, _)| (*lo..=*hi).contains(&code))
            .map(|(_, _, name)| name.as_str())
    }
}

fn parse_range(key: &str) -> Option<(u64, u64)> {
    let (lo, hi) = key.split_once('-')?;
    let lo = lo.trim().parse::<u64>().ok()?;
    let hi = hi.trim().parse::<u64>().ok()?;
    (lo <= hi).then_some((lo, hi))
}

/// Build the run's table. Order: CLI mapping files, config mapping files, then the
/// inline lookup from the config document. First-loaded wins.
pub fn load_merged(
    cli_files: &[PathBuf],
    config_files: &[PathBuf],
    inline: &BTreeMap<String, String>,
) -> Result<SectorTable> {
    let mut table = SectorTable::new();
    for path in cli_files.iter().chain(config_files) {
        table.load_file(path)?;
    }
    let inline_added = table.merge(inline);
    info!(
        "[SECTOR] lookup table ready: {} codes ({} from inline lookup)",
        table.len(),
        inline_added
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn first_loaded_source_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        std::fs::write(&first, r#"{"mapping": {"801": "Financial Services"}}"#).unwrap();
        std::fs::write(&second, r#"{"801": "Banks", "802": "Insurance"}"#).unwrap();

        let table = load_merged(&[first], &[second], &map(&[("802", "Other"), ("803", "Leasing")])).unwrap();
        assert_eq!(table.get("801"), Some("Financial Services"));
        assert_eq!(table.get("802"), Some("Insurance"));
        assert_eq!(table.get("803"), Some("Leasing"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let table = load_merged(&[dir.path().join("absent.json")], &[], &map(&[("1", "X")])).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn non_string_values_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, r#"{"301": "Technology", "302": 7, "303": null}"#).unwrap();

        let mut table = SectorTable::new();
        assert_eq!(table.load_file(&path).unwrap(), 1);
        assert_eq!(table.get("302"), None);
    }

    #[test]
    fn invalid_mapping_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(SectorTable::new().load_file(&path).is_err());
    }

    #[test]
    fn case_folded_and_range_lookups() {
        let mut table = SectorTable::new();
        table.merge(&map(&[("REIT", "Real Estate"), ("101-166", "Industrial")]));
        assert_eq!(table.get("reit"), None);
        assert_eq!(table.get_folded("reit"), Some("Real Estate"));
        assert_eq!(table.get_range(150), Some("Industrial"));
        assert_eq!(table.get_range(167), None);
    }
}

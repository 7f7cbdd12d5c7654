use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HISTORY_INDEX_FILE;
use crate::error::Result;

use super::atomic::write_json;
use super::DISPLAY_TIME_FORMAT;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub filename: String,
    /// Path relative to the output directory, `/`-separated.
    pub path: String,
    pub date: String,
    pub date_code: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryIndex {
    pub generated_at: String,
    pub last_updated: String,
    pub count: usize,
    pub files: Vec<HistoryEntry>,
    pub latest: Option<HistoryEntry>,
}

/// Date code of a `picks_YYYYMMDD.json` name, if it is one.
fn date_code(file_name: &str) -> Option<(String, NaiveDate)> {
    let code = file_name.strip_prefix("picks_")?.strip_suffix(".json")?;
    if code.len() != 8 {
        return None;
    }
    let date = NaiveDate::parse_from_str(code, "%Y%m%d").ok()?;
    Some((code.to_string(), date))
}

fn dated_files(history_dir: &Path) -> Result<Vec<(PathBuf, String, NaiveDate)>> {
    if !history_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(history_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some((code, date)) = date_code(&name) {
            out.push((entry.path(), code, date));
        }
    }
    Ok(out)
}

const SECS_PER_DAY: u64 = 24 * 3600;

/// Delete dated picks files last modified more than `retention_days` ago.
/// 0 keeps everything. Returns the number of files removed.
pub fn cleanup(history_dir: &Path, retention_days: u64, now: SystemTime) -> Result<usize> {
    if retention_days == 0 {
        return Ok(0);
    }
    let max_age = Duration::from_secs(retention_days.saturating_mul(SECS_PER_DAY));
    let mut removed = 0;
    for (path, _, _) in dated_files(history_dir)? {
        let modified = std::fs::metadata(&path)?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("[OUTPUT] removed expired {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("[OUTPUT] could not remove {}: {e}", path.display()),
            }
        }
    }
    if removed > 0 {
        info!("[OUTPUT] retention: removed {removed} history files older than {retention_days} days");
    }
    Ok(removed)
}

/// Rebuild `history_index.json` in the output directory, newest first.
pub fn rebuild_index(output_dir: &Path, history_dir: &Path) -> Result<HistoryIndex> {
    let prefix = match history_dir.strip_prefix(output_dir) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => history_dir.display().to_string(),
    };

    let mut files = Vec::new();
    for (path, code, date) in dated_files(history_dir)? {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel = if prefix.is_empty() {
            filename.clone()
        } else {
            format!("{prefix}/{filename}")
        };
        files.push(HistoryEntry {
            size: std::fs::metadata(&path)?.len(),
            path: rel,
            date: date.format("%Y-%m-%d").to_string(),
            date_code: code,
            filename,
        });
    }
    files.sort_by(|a, b| b.date_code.cmp(&a.date_code));

    let now = Local::now();
    let index = HistoryIndex {
        generated_at: now.to_rfc3339(),
        last_updated: now.format(DISPLAY_TIME_FORMAT).to_string(),
        count: files.len(),
        latest: files.first().cloned(),
        files,
    };
    write_json(&output_dir.join(HISTORY_INDEX_FILE), &index)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, age: Duration) {
        std::fs::write(path, "{}").unwrap();
        let t = SystemTime::now() - age;
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(t)
            .unwrap();
    }

    #[test]
    fn recognises_dated_names_only() {
        assert!(date_code("picks_20240531.json").is_some());
        assert!(date_code("picks_latest.json").is_none());
        assert!(date_code("picks_20241399.json").is_none());
        assert!(date_code("notes_20240531.json").is_none());
    }

    #[test]
    fn index_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("history");
        std::fs::create_dir_all(&history).unwrap();
        for name in ["picks_20240530.json", "picks_20240531.json", "picks_20240101.json", "picks_latest.json"] {
            std::fs::write(history.join(name), "{}").unwrap();
        }

        let index = rebuild_index(dir.path(), &history).unwrap();
        assert_eq!(index.count, 3);
        let codes: Vec<&str> = index.files.iter().map(|f| f.date_code.as_str()).collect();
        assert_eq!(codes, vec!["20240531", "20240530", "20240101"]);
        let latest = index.latest.unwrap();
        assert_eq!(latest.path, "history/picks_20240531.json");
        assert_eq!(latest.date, "2024-05-31");
        assert_eq!(latest.size, 2);
        assert!(dir.path().join("history_index.json").exists());
    }

    #[test]
    fn empty_history_gives_null_latest() {
        let dir = tempfile::tempdir().unwrap();
        let index = rebuild_index(dir.path(), &dir.path().join("history")).unwrap();
        assert_eq!(index.count, 0);
        assert!(index.latest.is_none());
    }

    #[test]
    fn retention_removes_only_expired_dated_files() {
        let dir = tempfile::tempdir().unwrap();
        let day = Duration::from_secs(24 * 3600);
        let old = dir.path().join("picks_20240101.json");
        let fresh = dir.path().join("picks_20240530.json");
        let other = dir.path().join("keep.json");
        touch(&old, day * 40);
        touch(&fresh, day);
        touch(&other, day * 40);

        let removed = cleanup(dir.path(), 30, SystemTime::now()).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());

        touch(&old, day * 400);
        assert_eq!(cleanup(dir.path(), 0, SystemTime::now()).unwrap(), 0);
        assert!(old.exists());
    }

    #[test]
    fn huge_retention_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("picks_20200101.json");
        touch(&old, Duration::from_secs(24 * 3600 * 2000));

        assert_eq!(cleanup(dir.path(), u64::MAX / 1000, SystemTime::now()).unwrap(), 0);
        assert_eq!(cleanup(dir.path(), u64::MAX, SystemTime::now()).unwrap(), 0);
        assert!(old.exists());
    }
}

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::config::{LATEST_PRICE_FILE, PICKS_LATEST_FILE};
use crate::error::Result;

/// Copy the current `latest_price.json` and `picks_latest.json` into
/// `<backup_dir>/backup_YYYYMMDD_HHMMSS/` before they are replaced.
/// Returns the backup folder, or `None` when there was nothing to save.
pub fn backup_outputs(output_dir: &Path, backup_dir: &Path, now: DateTime<Local>) -> Result<Option<PathBuf>> {
    let existing: Vec<PathBuf> = [LATEST_PRICE_FILE, PICKS_LATEST_FILE]
        .iter()
        .map(|name| output_dir.join(name))
        .filter(|p| p.is_file())
        .collect();
    if existing.is_empty() {
        return Ok(None);
    }

    let folder = backup_dir.join(format!("backup_{}", now.format("%Y%m%d_%H%M%S")));
    std::fs::create_dir_all(&folder)?;
    for src in &existing {
        if let Some(name) = src.file_name() {
            std::fs::copy(src, folder.join(name))?;
        }
    }
    info!("[OUTPUT] backed up {} files to {}", existing.len(), folder.display());
    Ok(Some(folder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn copies_existing_outputs_into_stamped_folder() {
        let out = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        std::fs::write(out.path().join("latest_price.json"), "{\"v\":1}").unwrap();
        let now = Local.with_ymd_and_hms(2024, 5, 31, 17, 5, 9).unwrap();

        let folder = backup_outputs(out.path(), backups.path(), now).unwrap().unwrap();
        assert_eq!(folder, backups.path().join("backup_20240531_170509"));
        assert_eq!(std::fs::read_to_string(folder.join("latest_price.json")).unwrap(), "{\"v\":1}");
        assert!(!folder.join("picks_latest.json").exists());
    }

    #[test]
    fn nothing_to_back_up() {
        let out = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 5, 31, 17, 5, 9).unwrap();
        assert_eq!(backup_outputs(out.path(), backups.path(), now).unwrap(), None);
        assert_eq!(std::fs::read_dir(backups.path()).unwrap().count(), 0);
    }
}

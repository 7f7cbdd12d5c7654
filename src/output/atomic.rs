use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

/// Sibling path the payload is staged at before the rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to `<path>.tmp`, then rename over `path`. Parent directories are created.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = staging_path(path);
    if let Err(e) = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Pretty-printed JSON, written atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_bytes(path, &bytes)
}

/// `None` for NaN and infinities so they serialize as `null`.
pub fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Round to `places` decimals. Non-finite input is returned unchanged.
pub fn round_to(v: f64, places: i32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let factor = 10f64.powi(places);
    (v * factor).round() / factor
}

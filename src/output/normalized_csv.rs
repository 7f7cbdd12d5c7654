use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::normalize::render_record;
use crate::schema::resolver::ExtraColumn;
use crate::types::Row;

use super::atomic::write_bytes;

/// `<output_dir>/<input stem>_normalized.csv`
pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "eod".to_string());
    output_dir.join(format!("{stem}_normalized.csv"))
}

/// Canonical columns, then `sector_name`, then passthrough extras. One line per row.
pub fn write(path: &Path, schema: &[String], extras: &[ExtraColumn], rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let header = schema
        .iter()
        .map(String::as_str)
        .chain(std::iter::once("sector_name"))
        .chain(extras.iter().map(|e| e.header.as_str()));
    writer.write_record(header)?;

    for row in rows {
        let mut record = render_record(row, schema);
        record.insert(schema.len(), row.sector_name.clone());
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?;
    write_bytes(path, &bytes)
}

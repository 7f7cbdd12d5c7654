use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::config::{Config, DELIMITER_SAMPLE_BYTES, MIN_TAB_COUNT};
use crate::error::{AppError, Result};

/// Header plus raw string records of one input file.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub source: PathBuf,
    pub delimiter: u8,
    pub header: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn delimiter_name(&self) -> &'static str {
        if self.delimiter == b'\t' {
            "tab"
        } else {
            "comma"
        }
    }
}

/// Pick tab or comma from a sample of the file head.
pub fn detect_delimiter(sample: &[u8]) -> u8 {
    let tabs = sample.iter().filter(|&&b| b == b'\t').count();
    let commas = sample.iter().filter(|&&b| b == b',').count();
    if tabs > commas && tabs >= MIN_TAB_COUNT {
        b'\t'
    } else {
        b','
    }
}

/// Read a delimited text file fully into memory.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::InputNotFound(path.display().to_string()),
        _ => AppError::Io(e),
    })?;
    let text = String::from_utf8(bytes).map_err(|e| {
        AppError::Decode(format!("{}: {e}", path.display()))
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    if text.trim().is_empty() {
        return Err(AppError::EmptyInput(path.display().to_string()));
    }

    let sample = &text.as_bytes()[..text.len().min(DELIMITER_SAMPLE_BYTES)];
    let delimiter = detect_delimiter(sample);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(AppError::EmptyInput(path.display().to_string()));
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(record.iter().map(str::to_string).collect());
    }

    debug!(
        "Read {} records x {} columns from {}",
        records.len(),
        header.len(),
        path.display()
    );

    Ok(RawTable {
        source: path.to_path_buf(),
        delimiter,
        header,
        records,
    })
}

/// Newest `.csv` file in `dir` by modification time.
pub fn discover_latest(dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv || !path.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        match &newest {
            Some((t, _)) if *t >= modified => {}
            _ => newest = Some((modified, path)),
        }
    }
    Ok(newest.map(|(_, p)| p))
}

/// Input path from the CLI, else the newest CSV in the search dir, else an interactive prompt.
pub fn resolve_input(cfg: &Config) -> Result<PathBuf> {
    if let Some(path) = &cfg.input {
        return Ok(path.clone());
    }
    if let Some(dir) = &cfg.search_dir {
        if let Some(path) = discover_latest(dir)? {
            info!("[INPUT] auto-discovered {}", path.display());
            return Ok(path);
        }
        info!("[INPUT] no CSV files found in {}", dir.display());
    }
    if std::io::stdin().is_terminal() {
        print!("CSV file path: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        let line = line.trim();
        if !line.is_empty() {
            return Ok(PathBuf::from(line));
        }
    }
    Err(AppError::InputNotFound(
        "no input file given and none discovered".to_string(),
    ))
}

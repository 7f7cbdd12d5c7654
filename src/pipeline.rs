use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::{Config, EodConfig, LOW_MATCH_RATE_PCT};
use crate::error::Result;
use crate::input::{read_table, resolve_input};
use crate::normalize::{normalize_record, NormalizeContext};
use crate::output::audit::AuditDoc;
use crate::output::picks::PicksDoc;
use crate::output::{backup, history, latest_price, normalized_csv, picks};
use crate::schema::SchemaResolver;
use crate::scorer::{rank, StockScorer};
use crate::sector::{table, SectorMapper, SectorStats};
use crate::types::ScoreOutcome;

/// Counts a caller needs to see data quality run over run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: PathBuf,
    pub rows_in: usize,
    pub rows_priced: usize,
    pub match_rate: f64,
    pub resolved_fields: usize,
    pub sector: SectorStats,
    pub degraded: usize,
    pub degrade_reasons: BTreeMap<String, usize>,
    pub picks: usize,
    pub outputs: Vec<PathBuf>,
}

/// One batch run: read, resolve, normalize, label, score, rank, write.
pub fn run(cfg: &Config) -> Result<RunReport> {
    // --- Input ---
    // Input first: a failed read must leave the config path untouched
    let source = resolve_input(cfg)?;
    let raw = read_table(&source)?;
    info!(
        "[INPUT] {}: {} rows, {} columns, delimiter={}",
        source.display(),
        raw.records.len(),
        raw.header.len(),
        raw.delimiter_name()
    );

    let eod = EodConfig::load_or_create(&cfg.config_path)?;
    info!(
        "Config loaded from {} ({} schema fields, pad width {}, price feed {}, picks {})",
        cfg.config_path.display(),
        eod.schema.len(),
        eod.code_pad_width,
        eod.price_feed_codes,
        eod.picks_codes,
    );

    // --- Schema ---
    let resolver = SchemaResolver::new(&eod);
    let resolution = resolver.resolve(&raw.header);
    let resolved = resolution.resolved_count();
    info!(
        "[SCHEMA] match rate {:.1}% ({}/{} fields), {} extra columns",
        resolution.match_rate,
        resolved,
        eod.schema.len(),
        resolution.extras.len()
    );
    if resolved == 0 {
        warn!("[SCHEMA] no canonical field matched; every field falls back to defaults");
    } else if resolution.match_rate < LOW_MATCH_RATE_PCT {
        let missing: Vec<&str> = resolution
            .fields
            .iter()
            .filter(|m| m.source.is_none())
            .map(|m| m.field.as_str())
            .collect();
        warn!(
            "[SCHEMA] match rate below {LOW_MATCH_RATE_PCT:.0}%, unmatched: {}",
            missing.join(", ")
        );
    }

    // --- Normalize ---
    let ctx = NormalizeContext {
        pad_width: eod.code_pad_width,
        fill: &eod.fill,
    };
    let mut rows: Vec<_> = raw
        .records
        .iter()
        .map(|rec| normalize_record(rec, &resolution, &ctx))
        .collect();
    let empty_codes = rows.iter().filter(|r| r.code.is_empty()).count();
    if empty_codes > 0 {
        warn!("[INPUT] {empty_codes} rows have no usable code");
    }

    // --- Sector ---
    let sector_table = table::load_merged(
        &cfg.sector_maps,
        &eod.sector_file_paths(&cfg.config_path),
        &eod.sector_lookup,
    )?;
    let mapper = SectorMapper::new(sector_table, eod.unknown_with_code);
    let sector_stats = mapper.label(&mut rows);
    info!(
        "[SECTOR] {} sectors, {} rows unknown ({:.1}%), {} distinct unmapped codes",
        sector_stats.distribution.len(),
        sector_stats.unknown_rows,
        sector_stats.unknown_pct(),
        sector_stats.unmapped_codes.len()
    );
    if !sector_stats.unmapped_codes.is_empty() {
        let sample: Vec<&str> = sector_stats.unmapped_codes.iter().take(10).map(String::as_str).collect();
        warn!("[SECTOR] unmapped codes (first 10): {}", sample.join(", "));
    }

    // --- Score ---
    let scorer = StockScorer::new(eod.scoring.clone());
    let outcomes: Vec<ScoreOutcome> = rows.iter().map(|r| scorer.score_row(r)).collect();
    let mut degrade_reasons: BTreeMap<String, usize> = BTreeMap::new();
    for (row, outcome) in rows.iter().zip(&outcomes) {
        if let Some(reason) = outcome.degrade_reason() {
            debug!("[SCORE] {} degraded: {reason}", row.code);
            *degrade_reasons.entry(reason.to_string()).or_insert(0) += 1;
        }
    }
    let degraded: usize = degrade_reasons.values().sum();
    let top = rank(&rows, &outcomes, cfg.top_n, eod.picks_codes, scorer.neutral_rsi());
    info!(
        "[SCORE] scored {} rows, {} degraded to neutral, {} picks",
        rows.len(),
        degraded,
        top.len()
    );
    if degraded > 0 {
        warn!("[SCORE] {degraded} rows fell back to the neutral score");
    }

    // --- Output ---
    let now = Local::now();
    let data_date = cfg.data_date.unwrap_or_else(|| now.date_naive());
    let history_dir = cfg.history_dir();
    let mut outputs = Vec::new();

    if let Some(dir) = &cfg.backup_dir {
        backup::backup_outputs(&cfg.output_dir, dir, now)?;
    }

    let price_doc = latest_price::build(&rows, eod.price_feed_codes, &eod.market, data_date, now);
    let rows_priced = price_doc.total_stocks;
    outputs.push(latest_price::write(&cfg.output_dir, &price_doc)?);

    let picks_doc = PicksDoc::new(&top, &eod.market, &source, data_date, now);
    let (dated, latest) = picks::write(&cfg.output_dir, &history_dir, data_date, &picks_doc)?;
    outputs.push(dated);
    outputs.push(latest);

    history::cleanup(&history_dir, cfg.retention_days, SystemTime::now())?;
    let index = history::rebuild_index(&cfg.output_dir, &history_dir)?;
    debug!("[OUTPUT] history index lists {} files", index.count);

    if cfg.normalized_csv {
        let path = normalized_csv::output_path(&cfg.output_dir, &source);
        normalized_csv::write(&path, &eod.schema, &resolution.extras, &rows)?;
        outputs.push(path);
    }

    if let Some(path) = &cfg.audit_path {
        let audit = AuditDoc {
            source_file: source.display().to_string(),
            generated_at: now.to_rfc3339(),
            delimiter: raw.delimiter_name(),
            original_header: &raw.header,
            match_rate: resolution.match_rate,
            resolved_fields: resolved,
            total_fields: eod.schema.len(),
            fields: &resolution.fields,
            extras: &resolution.extras,
            rows_in: rows.len(),
            rows_out: rows_priced,
            rows_dropped: rows.len() - rows_priced,
            sector_distribution: &sector_stats.distribution,
            unmapped_sector_codes: sector_stats.unmapped_codes.iter().map(String::as_str).collect(),
            unknown_sector_pct: sector_stats.unknown_pct(),
            degraded_rows: degraded,
            degrade_reasons: &degrade_reasons,
        };
        audit.write(path)?;
        outputs.push(path.clone());
    }

    for path in &outputs {
        info!("[OUTPUT] wrote {}", path.display());
    }

    Ok(RunReport {
        source,
        rows_in: rows.len(),
        rows_priced,
        match_rate: resolution.match_rate,
        resolved_fields: resolved,
        sector: sector_stats,
        degraded,
        degrade_reasons,
        picks: top.len(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::path::Path;

    fn test_config(root: &Path, input: PathBuf) -> Config {
        Config {
            log_level: "debug".into(),
            config_path: root.join("config").join("eod_config.json"),
            output_dir: root.join("web"),
            history_dir: None,
            search_dir: None,
            top_n: 20,
            retention_days: 30,
            backup_dir: None,
            input: Some(input),
            sector_maps: Vec::new(),
            normalized_csv: false,
            audit_path: None,
            data_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 31),
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn write_sector_config(root: &Path) {
        let dir = root.join("config");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("eod_config.json"),
            r#"{ "sector_lookup": { "801": "Financial Services" } }"#,
        )
        .unwrap();
    }

    #[test]
    fn reference_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_sector_config(dir.path());
        let input = dir.path().join("eod.csv");
        std::fs::write(
            &input,
            "Code,Stock,Sector,Last,Prv Close,Chg%,Vol\n=\"1023\",Test Bank,801,5.00,4.80,+4.17%,250000\n",
        )
        .unwrap();
        let mut cfg = test_config(dir.path(), input);
        cfg.normalized_csv = true;
        cfg.audit_path = Some(dir.path().join("audit.json"));

        let report = run(&cfg).unwrap();
        assert_eq!(report.rows_in, 1);
        assert_eq!(report.resolved_fields, 7);
        assert_eq!(report.degraded, 0);
        assert_eq!(report.picks, 1);

        let picks = read_json(&cfg.output_dir.join("picks_latest.json"));
        let pick = &picks["picks"][0];
        assert_eq!(pick["rank"], 1);
        assert_eq!(pick["code"], "1023");
        assert_eq!(pick["sector"], "Financial Services");
        assert_eq!(pick["daily_change"], 4.17);
        assert_eq!(pick["score"], 70.0);
        assert_eq!(pick["potential_score"], 75.0);
        assert_eq!(pick["recommendation"], "Buy");
        assert_eq!(pick["risk_level"], "Medium-Low");
        assert_eq!(pick["status"], "Active");
        assert_eq!(picks["date"], "2024-05-31");

        let prices = read_json(&cfg.output_dir.join("latest_price.json"));
        assert_eq!(prices["total_stocks"], 1);
        assert_eq!(prices["stocks"][0]["sector"], "Financial Services");
        assert_eq!(prices["stocks"][0]["change"], 0.2);

        assert!(cfg.history_dir().join("picks_20240531.json").exists());
        let index = read_json(&cfg.output_dir.join("history_index.json"));
        assert_eq!(index["count"], 1);
        assert_eq!(index["latest"]["path"], "history/picks_20240531.json");

        assert!(report.outputs.contains(&cfg.output_dir.join("eod_normalized.csv")));
        assert!(report.degrade_reasons.is_empty());
        let audit = read_json(&dir.path().join("audit.json"));
        assert_eq!(audit["delimiter"], "comma");
        assert_eq!(audit["resolved_fields"], 7);
    }

    #[test]
    fn strict_price_feed_and_lenient_picks() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("eod.csv");
        std::fs::write(&input, "Code,Stock,Last,Chg%,Vol\n=\"\",Ghost,1.00,9.5%,2000000\n0002,Real,2.00,0.5%,500\n").unwrap();
        let cfg = test_config(dir.path(), input);

        let report = run(&cfg).unwrap();
        assert_eq!(report.rows_in, 2);
        assert_eq!(report.rows_priced, 1);

        let picks = read_json(&cfg.output_dir.join("picks_latest.json"));
        assert_eq!(picks["picks"].as_array().unwrap().len(), 2);
        assert_eq!(picks["picks"][0]["code"], "");
        assert_eq!(picks["picks"][1]["code"], "0002");
    }

    #[test]
    fn unmatched_header_still_produces_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("odd.csv");
        std::fs::write(&input, "foo,bar\n1,2\n").unwrap();
        let cfg = test_config(dir.path(), input);

        let report = run(&cfg).unwrap();
        assert_eq!(report.resolved_fields, 0);
        assert_eq!(report.match_rate, 0.0);
        // Lenient picks keep the row; strict price feed drops it
        assert_eq!(report.picks, 1);
        assert_eq!(report.rows_priced, 0);
        assert_eq!(report.sector.unknown_rows, 1);
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), dir.path().join("absent.csv"));
        assert!(matches!(run(&cfg), Err(crate::error::AppError::InputNotFound(_))));
        assert!(!cfg.config_path.exists(), "config written for a failed run");
        assert!(!cfg.output_dir.exists());
    }
}

use crate::config::{band_points, ScoringConfig, DEGRADED_SCORE};
use crate::output::atomic::round_to;
use crate::types::{DegradeReason, Row, ScoreCard, ScoreOutcome};

/// Banded heuristic scorer. Thresholds and points come from the config document.
pub struct StockScorer {
    cfg: ScoringConfig,
}

impl StockScorer {
    pub fn new(cfg: ScoringConfig) -> Self {
        Self { cfg }
    }

    pub fn neutral_rsi(&self) -> f64 {
        self.cfg.neutral_rsi
    }

    /// Score one row. Never fails: rows that cannot be scored cleanly come back
    /// `Degraded` with the neutral card.
    pub fn score_row(&self, row: &Row) -> ScoreOutcome {
        let inputs = [
            ("change_percent", Some(row.change_percent)),
            ("rsi", row.rsi),
            ("last_price", row.last_price),
            ("sma_5", row.sma_5),
        ];
        if let Some((field, _)) = inputs.iter().find(|(_, v)| v.is_some_and(|x| !x.is_finite())) {
            return degraded(DegradeReason::NonFiniteInput(*field));
        }

        let score = self.compute_score(row);
        if !score.is_finite() {
            return degraded(DegradeReason::NonFiniteScore);
        }
        let score = round_to(score.clamp(0.0, 100.0), 1);

        let potential = self.compute_potential(score, row);
        if !potential.is_finite() {
            return degraded(DegradeReason::NonFiniteScore);
        }
        let potential_score = round_to(potential.clamp(0.0, 100.0), 0);

        ScoreOutcome::Scored(ScoreCard { score, potential_score })
    }

    /// Base plus change, volume, RSI and moving-average contributions. Unclamped.
    fn compute_score(&self, row: &Row) -> f64 {
        let cfg = &self.cfg;
        let rsi = row.rsi.unwrap_or(cfg.neutral_rsi);
        let above_sma = matches!((row.last_price, row.sma_5), (Some(p), Some(s)) if p > s);

        cfg.base
            + band_points(&cfg.change_bands, row.change_percent)
            + band_points(&cfg.volume_bands, row.volume as f64)
            + band_points(&cfg.rsi_bands, rsi)
            + if above_sma { cfg.sma_bonus } else { 0.0 }
    }

    fn compute_potential(&self, score: f64, row: &Row) -> f64 {
        let p = &self.cfg.potential;
        score * p.multiplier
            + band_points(&p.change_bands, row.change_percent)
            + band_points(&p.volume_bands, row.volume as f64)
    }
}

fn degraded(reason: DegradeReason) -> ScoreOutcome {
    ScoreOutcome::Degraded {
        card: ScoreCard {
            score: DEGRADED_SCORE,
            potential_score: DEGRADED_SCORE,
        },
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Band;

    fn row(change_percent: f64, volume: u64, rsi: Option<f64>) -> Row {
        Row {
            code: "1023".into(),
            change_percent,
            volume,
            rsi,
            last_price: Some(5.0),
            ..Row::default()
        }
    }

    fn scorer() -> StockScorer {
        StockScorer::new(ScoringConfig::default())
    }

    #[test]
    fn reference_row_scores_seventy() {
        let out = scorer().score_row(&row(4.17, 250_000, None));
        let card = out.card();
        assert!(out.degrade_reason().is_none());
        assert!((card.score - 70.0).abs() < 1e-9, "score {}", card.score);
        assert!((card.potential_score - 75.0).abs() < 1e-9, "potential {}", card.potential_score);
    }

    #[test]
    fn oversold_rsi_and_strong_move() {
        // 50 + 15 + 10 + 10
        let card = scorer().score_row(&row(6.0, 2_000_000, Some(25.0))).card();
        assert_eq!(card.score, 85.0);
        // 85 + 10 + 5
        assert_eq!(card.potential_score, 100.0);
    }

    #[test]
    fn weak_row_scores_low() {
        // 50 - 10 - 5 - 5
        let card = scorer().score_row(&row(-7.0, 500, Some(80.0))).card();
        assert_eq!(card.score, 30.0);
        assert_eq!(card.potential_score, 25.0);
    }

    #[test]
    fn price_above_sma_adds_bonus() {
        let mut r = row(0.0, 50_000, Some(50.0));
        r.sma_5 = Some(4.5);
        assert_eq!(scorer().score_row(&r).card().score, 60.0);
        r.sma_5 = Some(5.5);
        assert_eq!(scorer().score_row(&r).card().score, 55.0);
    }

    #[test]
    fn scores_are_always_bounded() {
        let mut cfg = ScoringConfig::default();
        cfg.change_bands.insert(0, Band::above(50.0, 500.0));
        cfg.change_bands.insert(0, Band::below(-50.0, -500.0));
        let s = StockScorer::new(cfg);

        for change in [-1e6, -60.0, -5.0, 0.0, 3.0, 60.0, 1e6] {
            for volume in [0, 9_999, 150_000, u64::MAX] {
                for rsi in [None, Some(0.0), Some(50.0), Some(100.0)] {
                    let card = s.score_row(&row(change, volume, rsi)).card();
                    assert!((0.0..=100.0).contains(&card.score), "score {} for {change}", card.score);
                    assert!(
                        (0.0..=100.0).contains(&card.potential_score),
                        "potential {} for {change}",
                        card.potential_score
                    );
                }
            }
        }
    }

    #[test]
    fn non_finite_input_degrades_to_neutral() {
        let out = scorer().score_row(&row(f64::NAN, 1_000, None));
        assert_eq!(out.degrade_reason(), Some(DegradeReason::NonFiniteInput("change_percent")));
        assert_eq!(out.card().score, 50.0);
        assert_eq!(out.card().potential_score, 50.0);
    }

    #[test]
    fn overflowing_bands_degrade() {
        let mut cfg = ScoringConfig::default();
        cfg.base = f64::MAX;
        cfg.sma_bonus = f64::MAX;
        let mut r = row(1.0, 1_000, None);
        r.sma_5 = Some(1.0);
        let out = StockScorer::new(cfg).score_row(&r);
        assert_eq!(out.degrade_reason(), Some(DegradeReason::NonFiniteScore));
    }
}

use crate::output::atomic::{finite, round_to};
use crate::types::{CodePolicy, Pick, Recommendation, Row, ScoreOutcome};

use super::classifier::{instrument_type, potential_reasons};

/// Order rows by potential score, highest first, and emit the top `top_n` as picks.
///
/// The sort is stable so equal potentials keep input order. Rows the code policy
/// rejects are skipped before ranking. Ranks run 1..=N with no gaps.
pub fn rank(
    rows: &[Row],
    outcomes: &[ScoreOutcome],
    top_n: usize,
    policy: CodePolicy,
    neutral_rsi: f64,
) -> Vec<Pick> {
    let mut candidates: Vec<(&Row, &ScoreOutcome)> = rows
        .iter()
        .zip(outcomes)
        .filter(|(row, _)| policy.admits(row))
        .collect();

    candidates.sort_by(|a, b| {
        b.1.card()
            .potential_score
            .total_cmp(&a.1.card().potential_score)
    });

    candidates
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (row, outcome))| to_pick(i + 1, row, outcome, neutral_rsi))
        .collect()
}

fn to_pick(rank: usize, row: &Row, outcome: &ScoreOutcome, neutral_rsi: f64) -> Pick {
    let card = outcome.card();
    let rsi = row.rsi.filter(|v| v.is_finite()).unwrap_or(neutral_rsi);
    let recommendation = Recommendation::from_score(card.score);
    Pick {
        rank,
        code: row.code.clone(),
        name: row.name.clone(),
        instrument_type: instrument_type(&row.code),
        sector: row.sector_name.clone(),
        current_price: finite(row.last_price),
        daily_change: if row.change_percent.is_finite() {
            round_to(row.change_percent, 2)
        } else {
            0.0
        },
        score: card.score,
        potential_score: card.potential_score,
        potential_reasons: potential_reasons(row, card.score, rsi),
        recommendation,
        risk_level: recommendation.risk_level(),
        rsi: round_to(rsi, 1),
        volume: row.volume,
        status: row.status.clone().unwrap_or_else(|| "Active".to_string()),
    }
}

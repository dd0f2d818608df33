//! Rank-based long/short portfolio construction.
//!
//! Each date's scores are ranked independently; a row of the resulting
//! [`WeightPanel`] depends on nothing but that date's scores.

use crate::domain::error::{LsquantError, Stage};
use crate::domain::panel::{Panel, WeightPanel};
use crate::domain::walk_forward::ScoreRecord;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Smallest cross-section that is split into long and short books.
pub const MIN_CROSS_SECTION: usize = 5;

/// How weight is spread across the symbols of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightingScheme {
    /// Every long gets `0.5·g/kL`, every short `-0.5·g/kS`.
    EqualWeight,
    /// Weight proportional to the clipped score, each book summing to `0.5·g`.
    #[default]
    ScoreProportional,
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingScheme::EqualWeight => f.write_str("equal"),
            WeightingScheme::ScoreProportional => f.write_str("score"),
        }
    }
}

impl FromStr for WeightingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" | "equal_weight" => Ok(WeightingScheme::EqualWeight),
            "score" | "score_proportional" => Ok(WeightingScheme::ScoreProportional),
            other => Err(format!("unknown weighting scheme '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioParams {
    pub long_frac: f64,
    pub short_frac: f64,
    pub gross_leverage: f64,
    pub dollar_neutral: bool,
    pub weighting: WeightingScheme,
    pub min_symbols: usize,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        Self {
            long_frac: 0.2,
            short_frac: 0.2,
            gross_leverage: 1.0,
            dollar_neutral: true,
            weighting: WeightingScheme::default(),
            min_symbols: MIN_CROSS_SECTION,
        }
    }
}

impl PortfolioParams {
    pub fn new(long_frac: f64, short_frac: f64, gross_leverage: f64, dollar_neutral: bool) -> Self {
        Self {
            long_frac,
            short_frac,
            gross_leverage,
            dollar_neutral,
            ..Self::default()
        }
    }

    pub fn with_weighting(self, weighting: WeightingScheme) -> Self {
        Self { weighting, ..self }
    }
}

/// Turn per-date scores into a weight panel.
///
/// Dates with fewer than `min_symbols` defined scores are skipped. Symbols
/// without a score on a kept date get weight zero.
pub fn construct(
    scores: &[ScoreRecord],
    params: &PortfolioParams,
) -> Result<WeightPanel, LsquantError> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<&str, f64>> = BTreeMap::new();
    for rec in scores.iter().filter(|r| r.score.is_finite()) {
        by_date
            .entry(rec.date)
            .or_default()
            .insert(rec.symbol.as_str(), rec.score);
    }

    let mut kept: Vec<(NaiveDate, Vec<(&str, f64)>)> = Vec::with_capacity(by_date.len());
    let mut skipped = 0usize;
    for (date, section) in &by_date {
        let section: Vec<(&str, f64)> = section.iter().map(|(s, v)| (*s, *v)).collect();
        let values: Vec<f64> = section.iter().map(|(_, v)| *v).collect();
        match cross_section_weights(&values, params) {
            Some(w) => kept.push((
                *date,
                section.iter().map(|(s, _)| *s).zip(w).collect(),
            )),
            None => {
                skipped += 1;
                tracing::debug!(%date, symbols = section.len(), "skipping degenerate cross-section");
            }
        }
    }

    if kept.is_empty() {
        return Err(LsquantError::insufficient(
            Stage::Portfolio,
            format!(
                "none of {} scored dates has at least {} symbols",
                by_date.len(),
                params.min_symbols
            ),
        ));
    }

    let symbols: Vec<String> = kept
        .iter()
        .flat_map(|(_, row)| row.iter().map(|(s, _)| *s))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let column: BTreeMap<&str, usize> = symbols
        .iter()
        .enumerate()
        .map(|(j, s)| (s.as_str(), j))
        .collect();

    let mut dates = Vec::with_capacity(kept.len());
    let mut rows = Vec::with_capacity(kept.len());
    for (date, row) in &kept {
        let mut dense = vec![0.0; symbols.len()];
        for (symbol, w) in row {
            dense[column[symbol]] = *w;
        }
        dates.push(*date);
        rows.push(dense);
    }

    tracing::info!(
        rebalances = dates.len(),
        skipped,
        symbols = symbols.len(),
        weighting = %params.weighting,
        "constructed weight panel"
    );
    Panel::new(dates, symbols, rows)
}

/// Weights for one cross-section, aligned with `scores`.
///
/// Returns `None` when the cross-section is too small to split.
pub fn cross_section_weights(scores: &[f64], params: &PortfolioParams) -> Option<Vec<f64>> {
    let n = scores.len();
    if n < params.min_symbols || n == 0 {
        return None;
    }
    let k_long = ((n as f64 * params.long_frac).floor() as usize).clamp(1, n);
    let k_short = ((n as f64 * params.short_frac).floor() as usize).clamp(1, n);

    // Stable sort: ties keep symbol order.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    let long_book = &order[..k_long];
    let short_book = &order[n - k_short..];

    let half = 0.5 * params.gross_leverage;
    let mut w = vec![0.0; n];
    match params.weighting {
        WeightingScheme::EqualWeight => {
            for &i in long_book {
                w[i] = half / k_long as f64;
            }
            for &i in short_book {
                w[i] = -half / k_short as f64;
            }
        }
        WeightingScheme::ScoreProportional => {
            let long_raw: Vec<f64> = long_book.iter().map(|&i| scores[i].max(0.0)).collect();
            for (&i, share) in long_book.iter().zip(book_shares(&long_raw)) {
                w[i] = share * half;
            }
            let short_raw: Vec<f64> = short_book.iter().map(|&i| -scores[i].min(0.0)).collect();
            for (&i, share) in short_book.iter().zip(book_shares(&short_raw)) {
                w[i] = -share * half;
            }
        }
    }

    Some(normalize(w, params.gross_leverage, params.dollar_neutral))
}

/// Fractions summing to one; equal split when the clipped magnitudes vanish.
fn book_shares(magnitudes: &[f64]) -> Vec<f64> {
    let total: f64 = magnitudes.iter().sum();
    if total > 0.0 {
        magnitudes.iter().map(|m| m / total).collect()
    } else {
        vec![1.0 / magnitudes.len() as f64; magnitudes.len()]
    }
}

/// Leverage and neutrality post-processing.
///
/// A dollar-neutral vector with no short position is only rescaled; the mean
/// is subtracted only when at least one weight is negative.
fn normalize(mut w: Vec<f64>, gross_leverage: f64, dollar_neutral: bool) -> Vec<f64> {
    if gross(&w) == 0.0 {
        return w;
    }
    if dollar_neutral && w.iter().any(|&v| v < 0.0) {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        for v in w.iter_mut() {
            *v -= mean;
        }
    }
    let g = gross(&w);
    if g > 0.0 {
        for v in w.iter_mut() {
            *v = *v / g * gross_leverage;
        }
    }
    w
}

fn gross(w: &[f64]) -> f64 {
    w.iter().map(|v| v.abs()).sum()
}

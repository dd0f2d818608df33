//! Walk-forward training and cross-sectional scoring.
//!
//! The retrain cadence is an explicit [`ScheduleState`] threaded through
//! [`RetrainSchedule::step`], so the schedule can be checked without fitting
//! anything. A model fitted at step `i` only ever sees the `train_window`
//! valid dates strictly before `i`.

use crate::domain::error::LsquantError;
use crate::domain::features::FeatureBuild;
use crate::domain::model::{build_model, ModelParams, Regressor};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use std::ops::Range;

/// Steps always skipped before the first fit, whatever the window.
pub const STARTUP_OFFSET: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Not enough history; nothing is fitted or scored.
    Warmup,
    /// Refit on the trailing window, then score.
    Retrain,
    /// Score with the model carried over from the last retrain.
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleState {
    pub last_retrain: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrainSchedule {
    pub train_window: usize,
    pub retrain_freq: usize,
}

impl RetrainSchedule {
    pub fn new(train_window: usize, retrain_freq: usize) -> Self {
        Self {
            train_window,
            retrain_freq,
        }
    }

    /// First step index that may fit a model.
    pub fn first_eligible(&self) -> usize {
        STARTUP_OFFSET.max(self.train_window)
    }

    pub fn step(&self, state: ScheduleState, i: usize) -> (ScheduleState, StepAction) {
        if i < self.first_eligible() {
            return (state, StepAction::Warmup);
        }
        match state.last_retrain {
            Some(last) if i.saturating_sub(last) < self.retrain_freq => (state, StepAction::Score),
            _ => (
                ScheduleState {
                    last_retrain: Some(i),
                },
                StepAction::Retrain,
            ),
        }
    }

    /// Indices of the training dates for a retrain at step `i`.
    pub fn training_window(&self, i: usize) -> Range<usize> {
        i.saturating_sub(self.train_window)..i
    }

    /// Steps at which a model is refitted over `n` dates.
    pub fn retrain_points(&self, n: usize) -> Vec<usize> {
        let mut state = ScheduleState::default();
        let mut points = Vec::new();
        for i in 0..n {
            let (next, action) = self.step(state, i);
            state = next;
            if action == StepAction::Retrain {
                points.push(i);
            }
        }
        points
    }
}

/// Resolve `model_kind`, then run the walk-forward loop with it.
///
/// The model kind is checked before any data is read.
pub fn train_and_score(
    features: &FeatureBuild,
    train_window: usize,
    retrain_freq: usize,
    model_kind: &str,
    params: &ModelParams,
) -> Result<Vec<ScoreRecord>, LsquantError> {
    let mut model = build_model(model_kind, params)?;
    let schedule = RetrainSchedule::new(train_window, retrain_freq);
    walk_forward(features, &schedule, model.as_mut())
}

/// Score every eligible date in order, refitting `model` on schedule.
///
/// Output is sorted by `(date, symbol)`.
pub fn walk_forward(
    features: &FeatureBuild,
    schedule: &RetrainSchedule,
    model: &mut dyn Regressor,
) -> Result<Vec<ScoreRecord>, LsquantError> {
    let dates = &features.valid_dates;
    let mut state = ScheduleState::default();
    let mut scores = Vec::new();
    let mut retrains = 0usize;

    for (i, &date) in dates.iter().enumerate() {
        let (next, action) = schedule.step(state, i);
        state = next;

        match action {
            StepAction::Warmup => continue,
            StepAction::Retrain => {
                let window = schedule.training_window(i);
                let label = window_label(dates, &window);
                let (x, y) = training_matrix(features, &dates[window]);
                model.fit(&x, &y).map_err(|source| LsquantError::Model {
                    date,
                    window: label.clone(),
                    source,
                })?;
                retrains += 1;
                tracing::debug!(%date, step = i, window = %label, rows = y.len(), "retrained model");
            }
            StepAction::Score => {}
        }

        let (symbols, x) = cross_section_matrix(features, date);
        if symbols.is_empty() {
            continue;
        }
        let predictions = model.predict(&x).map_err(|source| LsquantError::Model {
            date,
            window: "scoring".to_string(),
            source,
        })?;
        scores.extend(
            symbols
                .into_iter()
                .zip(predictions.iter())
                .map(|(symbol, &score)| ScoreRecord {
                    date,
                    symbol,
                    score,
                }),
        );
    }

    if scores.is_empty() {
        return Err(LsquantError::EmptyScoreSet {
            reason: format!(
                "train_window {} leaves no scorable date among {} valid dates",
                schedule.train_window,
                dates.len()
            ),
        });
    }

    tracing::info!(
        scores = scores.len(),
        retrains,
        first_scored = %scores[0].date,
        "walk-forward scoring complete"
    );
    Ok(scores)
}

fn window_label(dates: &[NaiveDate], window: &Range<usize>) -> String {
    match (dates.get(window.start), window.end.checked_sub(1).and_then(|e| dates.get(e))) {
        (Some(first), Some(last)) if !window.is_empty() => format!("{first}..{last}"),
        _ => "empty".to_string(),
    }
}

fn training_matrix(features: &FeatureBuild, dates: &[NaiveDate]) -> (Array2<f64>, Array1<f64>) {
    let width = features.features.width();
    let mut rows: Vec<&[f64]> = Vec::new();
    let mut labels: Vec<f64> = Vec::new();
    for &date in dates {
        for (symbol, row) in features.features.cross_section(date) {
            if let Some(y) = features.labels.get(date, symbol) {
                rows.push(row);
                labels.push(y);
            }
        }
    }
    (stack_rows(&rows, width), Array1::from(labels))
}

fn cross_section_matrix(features: &FeatureBuild, date: NaiveDate) -> (Vec<String>, Array2<f64>) {
    let (symbols, rows): (Vec<String>, Vec<&[f64]>) = features
        .features
        .cross_section(date)
        .map(|(s, row)| (s.to_string(), row))
        .unzip();
    (symbols, stack_rows(&rows, features.features.width()))
}

fn stack_rows(rows: &[&[f64]], width: usize) -> Array2<f64> {
    let mut x = Array2::<f64>::zeros((rows.len(), width));
    for (i, row) in rows.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            x[[i, j]] = *v;
        }
    }
    x
}

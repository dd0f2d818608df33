//! Cross-sectional feature and forward-return label construction.
//!
//! Every signal is computed per symbol from forward-filled prices using only
//! observations at or before the row's date, then z-scored across symbols
//! date by date. Labels are the only quantity that looks forward.

use crate::domain::error::{LsquantError, Stage};
use crate::domain::panel::PricePanel;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Period of the short-horizon mean-reversion signal.
pub const MEAN_REVERSION_PERIOD: usize = 5;

const RSI_EPSILON: f64 = 1e-12;

/// Record key: `(date, symbol)`.
pub type Key = (NaiveDate, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `p(t)/p(t-lookback) - 1`
    Momentum,
    /// `-(p(t)/p(t-5) - 1)`
    MeanReversion,
    /// Rolling sample std of returns over `lookback`.
    Volatility,
    /// Volatility relative to its own rolling mean, minus one.
    VolatilityRegime,
    /// Mean positive return over mean absolute return.
    RsiProxy,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::Momentum,
        Signal::MeanReversion,
        Signal::Volatility,
        Signal::VolatilityRegime,
        Signal::RsiProxy,
    ];

    pub const CORE: [Signal; 3] = [Signal::Momentum, Signal::MeanReversion, Signal::Volatility];

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Momentum => "mom",
            Signal::MeanReversion => "mr",
            Signal::Volatility => "vol",
            Signal::VolatilityRegime => "vol_chg",
            Signal::RsiProxy => "rsi",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .iter()
            .copied()
            .find(|sig| sig.name() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown signal '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureParams {
    pub lookback: usize,
    pub label_horizon: usize,
    pub min_history: usize,
    pub signals: Vec<Signal>,
}

impl FeatureParams {
    /// All five signals.
    pub fn new(lookback: usize, label_horizon: usize, min_history: usize) -> Self {
        Self {
            lookback,
            label_horizon,
            min_history,
            signals: Signal::ALL.to_vec(),
        }
    }

    /// Momentum, mean reversion and volatility only.
    pub fn core(lookback: usize, label_horizon: usize, min_history: usize) -> Self {
        Self {
            signals: Signal::CORE.to_vec(),
            ..Self::new(lookback, label_horizon, min_history)
        }
    }
}

/// Standardized features keyed by `(date, symbol)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    rows: BTreeMap<Key, Vec<f64>>,
}

impl FeatureMatrix {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<&[f64]> {
        self.rows
            .get(&(date, symbol.to_string()))
            .map(|v| v.as_slice())
    }

    /// All records on `date`, in symbol order.
    pub fn cross_section(&self, date: NaiveDate) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.rows
            .range((date, String::new())..)
            .take_while(move |((d, _), _)| *d == date)
            .map(|((_, s), v)| (s.as_str(), v.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &[f64])> + '_ {
        self.rows.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Forward returns keyed by `(date, symbol)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    horizon: usize,
    values: BTreeMap<Key, f64>,
}

impl Labels {
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        self.values.get(&(date, symbol.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBuild {
    pub features: FeatureMatrix,
    pub labels: Labels,
    /// Sorted distinct dates with at least one complete record.
    pub valid_dates: Vec<NaiveDate>,
}

impl FeatureBuild {
    /// Assemble a feature set from precomputed `(date, symbol, features, label)`
    /// records. Records with a non-finite value are excluded, as in [`build`].
    pub fn from_records(
        names: Vec<String>,
        label_horizon: usize,
        records: impl IntoIterator<Item = (NaiveDate, String, Vec<f64>, f64)>,
    ) -> Result<Self, LsquantError> {
        let mut rows = BTreeMap::new();
        let mut values = BTreeMap::new();
        for (date, symbol, features, label) in records {
            if features.len() != names.len() {
                return Err(LsquantError::Data {
                    reason: format!(
                        "record ({date}, {symbol}) has {} features, expected {}",
                        features.len(),
                        names.len()
                    ),
                });
            }
            if label.is_finite() && features.iter().all(|v| v.is_finite()) {
                rows.insert((date, symbol.clone()), features);
                values.insert((date, symbol), label);
            }
        }
        let mut valid_dates: Vec<NaiveDate> = rows.keys().map(|(d, _)| *d).collect();
        valid_dates.dedup();
        Ok(Self {
            features: FeatureMatrix { names, rows },
            labels: Labels {
                horizon: label_horizon,
                values,
            },
            valid_dates,
        })
    }
}

pub fn build(prices: &PricePanel, params: &FeatureParams) -> Result<FeatureBuild, LsquantError> {
    let px = prices.forward_fill();
    let n = px.len();
    let rets = px.pct_change();

    let end = n.saturating_sub(params.label_horizon);
    if params.min_history >= end {
        return Err(LsquantError::insufficient(
            Stage::Features,
            format!(
                "{} dates leave nothing after dropping {} warmup and {} label dates",
                n, params.min_history, params.label_horizon
            ),
        ));
    }
    let window = params.min_history..end;

    let mut feature_maps: Vec<BTreeMap<Key, f64>> = Vec::with_capacity(params.signals.len());
    for signal in &params.signals {
        let raw = raw_signal(*signal, &px, &rets, params.lookback);
        let mut map = BTreeMap::new();
        for t in window.clone() {
            let z = zscore_cross_section(&raw[t]);
            for (j, symbol) in px.symbols().iter().enumerate() {
                if z[j].is_finite() {
                    map.insert((px.dates()[t], symbol.clone()), z[j]);
                }
            }
        }
        feature_maps.push(map);
    }

    let mut label_map = BTreeMap::new();
    for t in window {
        for (j, symbol) in px.symbols().iter().enumerate() {
            let y = px.row(t + params.label_horizon)[j] / px.row(t)[j] - 1.0;
            if y.is_finite() {
                label_map.insert((px.dates()[t], symbol.clone()), y);
            }
        }
    }

    let (rows, values) = join_on_key(&feature_maps, label_map);
    if rows.is_empty() {
        return Err(LsquantError::insufficient(
            Stage::Features,
            "no (date, symbol) record has every feature and a label defined",
        ));
    }

    let mut valid_dates: Vec<NaiveDate> = rows.keys().map(|(d, _)| *d).collect();
    valid_dates.dedup();

    tracing::info!(
        records = rows.len(),
        dates = valid_dates.len(),
        features = params.signals.len(),
        "built feature matrix"
    );

    Ok(FeatureBuild {
        features: FeatureMatrix {
            names: params.signals.iter().map(|s| s.name().to_string()).collect(),
            rows,
        },
        labels: Labels {
            horizon: params.label_horizon,
            values,
        },
        valid_dates,
    })
}

/// Inner join of the label map with every feature map.
fn join_on_key(
    feature_maps: &[BTreeMap<Key, f64>],
    label_map: BTreeMap<Key, f64>,
) -> (BTreeMap<Key, Vec<f64>>, BTreeMap<Key, f64>) {
    let mut rows = BTreeMap::new();
    let mut values = BTreeMap::new();
    for (key, y) in label_map {
        let features: Option<Vec<f64>> = feature_maps.iter().map(|m| m.get(&key).copied()).collect();
        if let Some(features) = features {
            rows.insert(key.clone(), features);
            values.insert(key, y);
        }
    }
    (rows, values)
}

/// Raw (unstandardized) signal rows, date-major. Non-finite cells are `NaN`.
fn raw_signal(
    signal: Signal,
    px: &PricePanel,
    rets: &PricePanel,
    lookback: usize,
) -> Vec<Vec<f64>> {
    let m = px.symbols().len();
    let columns: Vec<Vec<f64>> = (0..m)
        .map(|j| {
            let prices = px.column(j);
            let returns = rets.column(j);
            match signal {
                Signal::Momentum => ratio_change(&prices, lookback),
                Signal::MeanReversion => ratio_change(&prices, MEAN_REVERSION_PERIOD)
                    .into_iter()
                    .map(|v| -v)
                    .collect(),
                Signal::Volatility => rolling_std(&returns, lookback),
                Signal::VolatilityRegime => {
                    let vol = rolling_std(&returns, lookback);
                    let base = rolling_mean(&vol, lookback);
                    vol.iter().zip(&base).map(|(v, b)| v / b - 1.0).collect()
                }
                Signal::RsiProxy => {
                    let gains: Vec<f64> = returns
                        .iter()
                        .map(|r| if r.is_nan() { f64::NAN } else { r.max(0.0) })
                        .collect();
                    let moves: Vec<f64> = returns.iter().map(|r| r.abs()).collect();
                    let up = rolling_mean(&gains, lookback);
                    let total = rolling_mean(&moves, lookback);
                    up.iter()
                        .zip(&total)
                        .map(|(u, t)| u / (t + RSI_EPSILON))
                        .collect()
                }
            }
        })
        .collect();

    (0..px.len())
        .map(|t| {
            columns
                .iter()
                .map(|c| if c[t].is_finite() { c[t] } else { f64::NAN })
                .collect()
        })
        .collect()
}

/// `x(t)/x(t-period) - 1`, `NaN` until `period` observations back exist.
fn ratio_change(values: &[f64], period: usize) -> Vec<f64> {
    (0..values.len())
        .map(|t| {
            if t < period {
                f64::NAN
            } else {
                values[t] / values[t - period] - 1.0
            }
        })
        .collect()
}

/// Trailing mean over a full window of defined values.
pub(crate) fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Trailing sample standard deviation (ddof = 1) over a full window.
pub(crate) fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, sample_std)
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    (0..values.len())
        .map(|t| {
            if window == 0 || t + 1 < window {
                return f64::NAN;
            }
            let w = &values[t + 1 - window..=t];
            if w.iter().all(|v| v.is_finite()) {
                f(w)
            } else {
                f64::NAN
            }
        })
        .collect()
}

pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Standardize one date's values across symbols.
///
/// Undefined inputs stay undefined. If fewer than two values are defined or
/// they are all equal, every output is `NaN`.
pub fn zscore_cross_section(row: &[f64]) -> Vec<f64> {
    let defined: Vec<f64> = row.iter().copied().filter(|v| v.is_finite()).collect();
    let all_nan = || vec![f64::NAN; row.len()];
    if defined.len() < 2 {
        return all_nan();
    }
    let min = defined.iter().copied().fold(f64::INFINITY, f64::min);
    let max = defined.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return all_nan();
    }
    let mean = defined.iter().sum::<f64>() / defined.len() as f64;
    let sd = sample_std(&defined);
    if sd == 0.0 || !sd.is_finite() {
        return all_nan();
    }
    row.iter()
        .map(|v| if v.is_finite() { (v - mean) / sd } else { f64::NAN })
        .collect()
}

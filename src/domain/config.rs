//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once from a [`ConfigPort`] and passed by
//! reference to every stage. Keys absent from the file take the defaults of
//! [`PipelineConfig::default`].

use crate::domain::error::LsquantError;
use crate::domain::features::{FeatureParams, Signal};
use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use crate::domain::model::ModelParams;
use crate::domain::portfolio::{MIN_CROSS_SECTION, PortfolioParams, WeightingScheme};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const CONFIG_VERSION: i64 = 1;

pub const DEFAULT_UNIVERSE: [&str; 12] = [
    "SPY", "QQQ", "IWM", "DIA", "XLF", "XLK", "XLE", "XLV", "XLI", "XLY", "XLP", "XLU",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub version: i64,
    pub universe: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    pub lookback: usize,
    pub label_horizon: usize,
    pub min_history: usize,
    pub signals: Vec<Signal>,

    pub train_window: usize,
    pub retrain_freq: usize,

    pub model_kind: String,
    pub alpha: f64,

    pub long_frac: f64,
    pub short_frac: f64,
    pub gross_leverage: f64,
    pub dollar_neutral: bool,
    pub weighting: WeightingScheme,
    pub min_symbols: usize,

    pub commission_bps: f64,
    pub slippage_bps: f64,
    pub ann_factor: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            universe: DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            start_date: NaiveDate::from_ymd_opt(2012, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            lookback: 20,
            label_horizon: 1,
            min_history: 60,
            signals: Signal::ALL.to_vec(),
            train_window: 252,
            retrain_freq: 21,
            model_kind: "ridge".to_string(),
            alpha: 10.0,
            long_frac: 0.2,
            short_frac: 0.2,
            gross_leverage: 1.0,
            dollar_neutral: true,
            weighting: WeightingScheme::default(),
            min_symbols: MIN_CROSS_SECTION,
            commission_bps: 0.5,
            slippage_bps: 1.0,
            ann_factor: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl PipelineConfig {
    pub fn feature_params(&self) -> FeatureParams {
        FeatureParams {
            lookback: self.lookback,
            label_horizon: self.label_horizon,
            min_history: self.min_history,
            signals: self.signals.clone(),
        }
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams { alpha: self.alpha }
    }

    pub fn portfolio_params(&self) -> PortfolioParams {
        PortfolioParams {
            long_frac: self.long_frac,
            short_frac: self.short_frac,
            gross_leverage: self.gross_leverage,
            dollar_neutral: self.dollar_neutral,
            weighting: self.weighting,
            min_symbols: self.min_symbols,
        }
    }
}

pub fn build_pipeline_config(adapter: &dyn ConfigPort) -> Result<PipelineConfig, LsquantError> {
    let d = PipelineConfig::default();

    let version = adapter.get_int("pipeline", "version", CONFIG_VERSION)?;
    if version != CONFIG_VERSION {
        return Err(invalid(
            "pipeline",
            "version",
            format!("unsupported config version {version}, expected {CONFIG_VERSION}"),
        ));
    }

    let universe = match adapter.get_string("universe", "symbols") {
        Some(s) => parse_symbols(&s),
        None => d.universe,
    };
    let signals = match adapter.get_string("features", "signals") {
        Some(s) => parse_signals(&s)?,
        None => d.signals,
    };
    let weighting = match adapter.get_string("portfolio", "weighting") {
        Some(s) => s
            .parse::<WeightingScheme>()
            .map_err(|reason| invalid("portfolio", "weighting", reason))?,
        None => d.weighting,
    };

    Ok(PipelineConfig {
        version,
        universe,
        start_date: get_date(adapter, "universe", "start_date", d.start_date)?,
        end_date: get_date(adapter, "universe", "end_date", d.end_date)?,
        lookback: get_count(adapter, "features", "lookback", d.lookback)?,
        label_horizon: get_count(adapter, "features", "label_horizon", d.label_horizon)?,
        min_history: get_count(adapter, "features", "min_history", d.min_history)?,
        signals,
        train_window: get_count(adapter, "walk_forward", "train_window", d.train_window)?,
        retrain_freq: get_count(adapter, "walk_forward", "retrain_freq", d.retrain_freq)?,
        model_kind: adapter
            .get_string("model", "kind")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or(d.model_kind),
        alpha: adapter.get_double("model", "alpha", d.alpha)?,
        long_frac: adapter.get_double("portfolio", "long_frac", d.long_frac)?,
        short_frac: adapter.get_double("portfolio", "short_frac", d.short_frac)?,
        gross_leverage: adapter.get_double("portfolio", "gross_leverage", d.gross_leverage)?,
        dollar_neutral: adapter.get_bool("portfolio", "dollar_neutral", d.dollar_neutral)?,
        weighting,
        min_symbols: get_count(adapter, "portfolio", "min_symbols", d.min_symbols)?,
        commission_bps: adapter.get_double("costs", "commission_bps", d.commission_bps)?,
        slippage_bps: adapter.get_double("costs", "slippage_bps", d.slippage_bps)?,
        ann_factor: adapter.get_double("metrics", "ann_factor", d.ann_factor)?,
    })
}

/// Split a symbol list on commas or whitespace and upper-case each entry.
pub fn parse_symbols(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect()
}

pub fn parse_signals(s: &str) -> Result<Vec<Signal>, LsquantError> {
    let mut signals = Vec::new();
    for token in s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let signal = token
            .parse::<Signal>()
            .map_err(|reason| invalid("features", "signals", reason))?;
        if !signals.contains(&signal) {
            signals.push(signal);
        }
    }
    if signals.is_empty() {
        return Err(invalid("features", "signals", "no signals listed".to_string()));
    }
    Ok(signals)
}

pub(crate) fn parse_date(section: &str, key: &str, s: &str) -> Result<NaiveDate, LsquantError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        invalid(
            section,
            key,
            "invalid date format (expected YYYY-MM-DD)".to_string(),
        )
    })
}

fn get_date(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: NaiveDate,
) -> Result<NaiveDate, LsquantError> {
    match adapter.get_string(section, key) {
        Some(s) => parse_date(section, key, &s),
        None => Ok(default),
    }
}

fn get_count(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, LsquantError> {
    let value = adapter.get_int(section, key, default as i64)?;
    usize::try_from(value)
        .map_err(|_| invalid(section, key, format!("{key} must be non-negative, got {value}")))
}

pub(crate) fn invalid(section: &str, key: &str, reason: String) -> LsquantError {
    LsquantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

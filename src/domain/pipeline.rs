//! End-to-end run: features, walk-forward scores, weights, backtest, stats.

use crate::domain::backtest::{self, BacktestResult};
use crate::domain::config::PipelineConfig;
use crate::domain::error::{LsquantError, Stage};
use crate::domain::features::{self, FeatureBuild};
use crate::domain::metrics::{self, PerformanceStats, TradingActivity};
use crate::domain::panel::{PricePanel, WeightPanel};
use crate::domain::portfolio;
use crate::domain::walk_forward::{self, ScoreRecord};
use chrono::NaiveDate;

/// Shape of the feature set a run trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    pub names: Vec<String>,
    pub records: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub dates: usize,
}

impl FeatureSummary {
    fn of(build: &FeatureBuild) -> Option<Self> {
        Some(Self {
            names: build.features.names().to_vec(),
            records: build.features.len(),
            first_date: *build.valid_dates.first()?,
            last_date: *build.valid_dates.last()?,
            dates: build.valid_dates.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub features: FeatureSummary,
    pub scores: Vec<ScoreRecord>,
    pub weights: WeightPanel,
    pub backtest: BacktestResult,
    pub stats: PerformanceStats,
    pub activity: TradingActivity,
}

pub fn run_pipeline(
    prices: &PricePanel,
    config: &PipelineConfig,
) -> Result<PipelineOutput, LsquantError> {
    let span = tracing::info_span!(
        "pipeline",
        symbols = prices.symbols().len(),
        dates = prices.len()
    );
    let _guard = span.enter();

    let build = features::build(prices, &config.feature_params())?;
    let summary = FeatureSummary::of(&build)
        .ok_or_else(|| LsquantError::insufficient(Stage::Features, "no valid dates"))?;
    tracing::info!(records = summary.records, dates = summary.dates, "stage: features");

    let scores = walk_forward::train_and_score(
        &build,
        config.train_window,
        config.retrain_freq,
        &config.model_kind,
        &config.model_params(),
    )?;
    tracing::info!(scores = scores.len(), "stage: training");

    let weights = portfolio::construct(&scores, &config.portfolio_params())?;
    tracing::info!(rebalances = weights.len(), "stage: portfolio");

    let result = backtest::simulate(
        prices,
        &weights,
        config.commission_bps,
        config.slippage_bps,
    )?;
    tracing::info!(days = result.len(), "stage: simulation");

    let stats = metrics::summarize(&result.equity_curve, &result.daily_pnl, config.ann_factor)?;
    let activity = metrics::trading_activity(&result);

    Ok(PipelineOutput {
        features: summary,
        scores,
        weights,
        backtest: result,
        stats,
        activity,
    })
}

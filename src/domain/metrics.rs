//! Performance statistics over a backtest.

use super::backtest::BacktestResult;
use super::error::{LsquantError, Stage};
use super::features::sample_std;
use serde::Serialize;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fewer scored days than this cannot be summarized.
pub const MIN_SUMMARY_DAYS: usize = 10;

const SHARPE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub cagr: f64,
    pub ann_vol: f64,
    pub sharpe: f64,
    /// Worst peak-to-trough move, as a non-positive fraction.
    pub max_drawdown: f64,
    pub total_return: f64,
    pub num_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingActivity {
    pub avg_turnover: f64,
    pub total_costs: f64,
}

pub fn summarize(
    equity_curve: &[f64],
    daily_pnl: &[f64],
    ann_factor: f64,
) -> Result<PerformanceStats, LsquantError> {
    let pnl: Vec<f64> = daily_pnl.iter().copied().filter(|p| !p.is_nan()).collect();
    let n = pnl.len();
    if n < MIN_SUMMARY_DAYS {
        return Err(LsquantError::insufficient(
            Stage::Summary,
            format!("{n} days of pnl, need at least {MIN_SUMMARY_DAYS}"),
        ));
    }
    let last = equity_curve.last().copied().ok_or_else(|| {
        LsquantError::insufficient(Stage::Summary, "equity curve is empty")
    })?;

    let mean = pnl.iter().sum::<f64>() / n as f64;
    let sd = sample_std(&pnl);
    let root_ann = ann_factor.sqrt();

    let stats = PerformanceStats {
        cagr: last.powf(ann_factor / n as f64) - 1.0,
        ann_vol: sd * root_ann,
        sharpe: mean / (sd + SHARPE_EPSILON) * root_ann,
        max_drawdown: max_drawdown(equity_curve),
        total_return: last - 1.0,
        num_days: n,
    };
    tracing::info!(
        sharpe = stats.sharpe,
        cagr = stats.cagr,
        max_drawdown = stats.max_drawdown,
        "summarized performance"
    );
    Ok(stats)
}

pub fn trading_activity(result: &BacktestResult) -> TradingActivity {
    let avg_turnover = if result.is_empty() {
        0.0
    } else {
        result.turnover.iter().sum::<f64>() / result.len() as f64
    };
    TradingActivity {
        avg_turnover,
        total_costs: result.costs.iter().sum(),
    }
}

fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &e in equity_curve {
        if e > peak {
            peak = e;
        }
        if peak > 0.0 {
            worst = worst.min(e / peak - 1.0);
        }
    }
    worst
}

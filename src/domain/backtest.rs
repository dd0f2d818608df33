//! Close-to-close backtest of a weight panel against a price panel.
//!
//! The weight held over `(t-1, t]` is the one decided at `t-1`, and the cost
//! of a rebalance at `t-1` is charged to the period starting there:
//!
//! ```text
//! pnl(t) = Σ w(t-1)·r(t) − turnover(t-1)·(commission_bps + slippage_bps)/1e4
//! ```

use crate::domain::error::{LsquantError, Stage};
use crate::domain::panel::{Panel, PricePanel, WeightPanel};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_bps: f64,
    pub slippage_bps: f64,
}

impl CostModel {
    /// Cost per unit of turnover.
    pub fn rate(&self) -> f64 {
        (self.commission_bps + self.slippage_bps) / 10_000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub dates: Vec<NaiveDate>,
    pub daily_pnl: Vec<f64>,
    pub equity_curve: Vec<f64>,
    pub turnover: Vec<f64>,
    pub costs: Vec<f64>,
    /// Weights aligned to `dates`, forward-filled between rebalances.
    pub weights: WeightPanel,
}

impl BacktestResult {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

pub fn simulate(
    prices: &PricePanel,
    weights: &WeightPanel,
    commission_bps: f64,
    slippage_bps: f64,
) -> Result<BacktestResult, LsquantError> {
    if prices.is_empty() {
        return Err(LsquantError::insufficient(
            Stage::Simulation,
            "price panel has no dates",
        ));
    }
    let costs = CostModel {
        commission_bps,
        slippage_bps,
    };

    let px = prices.forward_fill();
    let rets = px.pct_change();
    let aligned = align_weights(&px, weights)?;

    let start = aligned
        .rows()
        .iter()
        .position(|row| row.iter().any(|w| *w != 0.0))
        .unwrap_or(0);
    let rets = rets.slice_from(start);
    let w = aligned.slice_from(start);

    let n = w.len();
    let mut turnover = vec![0.0; n];
    let mut cost = vec![0.0; n];
    let mut daily_pnl = vec![0.0; n];
    let mut equity_curve = vec![0.0; n];

    let mut equity = 1.0;
    for t in 0..n {
        if t > 0 {
            let prev = w.row(t - 1);
            turnover[t] = w
                .row(t)
                .iter()
                .zip(prev)
                .map(|(a, b)| (a - b).abs())
                .sum();
            let gross: f64 = prev
                .iter()
                .zip(rets.row(t))
                .map(|(wt, r)| if r.is_finite() { wt * r } else { 0.0 })
                .sum();
            cost[t] = turnover[t - 1] * costs.rate();
            daily_pnl[t] = gross - cost[t];
        }
        equity *= 1.0 + daily_pnl[t];
        equity_curve[t] = equity;
    }

    tracing::info!(
        days = n,
        start = %w.dates()[0],
        final_equity = equity,
        "simulated backtest"
    );

    Ok(BacktestResult {
        dates: w.dates().to_vec(),
        daily_pnl,
        equity_curve,
        turnover,
        costs: cost,
        weights: w,
    })
}

/// Put `weights` on the price calendar.
///
/// Each price date takes the latest weight row dated on or before it; dates
/// before the first rebalance hold nothing. Price symbols with no weight
/// column hold zero.
fn align_weights(px: &PricePanel, weights: &WeightPanel) -> Result<Panel, LsquantError> {
    let columns: Vec<usize> = weights
        .symbols()
        .iter()
        .map(|s| {
            px.symbol_index(s).ok_or_else(|| LsquantError::InvalidPanel {
                reason: format!("weight symbol {s} has no price column"),
            })
        })
        .collect::<Result<_, _>>()?;

    let mut rows = Vec::with_capacity(px.len());
    let mut current = vec![0.0; px.symbols().len()];
    let mut next = 0usize;
    for &date in px.dates() {
        while next < weights.len() && weights.dates()[next] <= date {
            current = vec![0.0; px.symbols().len()];
            for (k, &j) in columns.iter().enumerate() {
                current[j] = weights.row(next)[k];
            }
            next += 1;
        }
        rows.push(current.clone());
    }
    if next < weights.len() {
        tracing::warn!(
            dropped = weights.len() - next,
            "weight rows dated after the last price date are ignored"
        );
    }

    Panel::new(px.dates().to_vec(), px.symbols().to_vec(), rows)
}

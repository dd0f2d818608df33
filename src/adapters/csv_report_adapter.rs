//! CSV report adapter implementing ReportPort.
//!
//! Writes three files into the output directory:
//! `summary.csv` (one row of statistics), `series.csv` (daily backtest
//! series) and `weights_tail.csv` (the most recent weight rows).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::error::LsquantError;
use crate::domain::panel::Panel;
use crate::domain::pipeline::PipelineOutput;
use crate::ports::report_port::ReportPort;

pub const SUMMARY_FILE: &str = "summary.csv";
pub const SERIES_FILE: &str = "series.csv";
pub const WEIGHTS_TAIL_FILE: &str = "weights_tail.csv";

/// Weight rows kept in `weights_tail.csv`.
pub const WEIGHTS_TAIL_ROWS: usize = 50;

#[derive(Serialize)]
struct SummaryRow {
    cagr: f64,
    ann_vol: f64,
    sharpe: f64,
    max_drawdown: f64,
    total_return: f64,
    num_days: usize,
    avg_turnover: f64,
    total_costs: f64,
}

#[derive(Serialize)]
struct SeriesRow {
    date: String,
    daily_pnl: f64,
    equity: f64,
    turnover: f64,
    costs: f64,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        output: &PipelineOutput,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LsquantError> {
        fs::create_dir_all(output_dir)?;

        let summary = output_dir.join(SUMMARY_FILE);
        write_summary(&summary, output)?;

        let series = output_dir.join(SERIES_FILE);
        write_series(&series, output)?;

        let weights = output_dir.join(WEIGHTS_TAIL_FILE);
        write_weights_tail(&weights, &output.weights, WEIGHTS_TAIL_ROWS)?;

        tracing::info!(dir = %output_dir.display(), "report written");
        Ok(vec![summary, series, weights])
    }
}

fn write_summary(path: &Path, output: &PipelineOutput) -> Result<(), LsquantError> {
    let stats = &output.stats;
    let mut wtr = csv::Writer::from_path(path).map_err(io_error)?;
    wtr.serialize(SummaryRow {
        cagr: stats.cagr,
        ann_vol: stats.ann_vol,
        sharpe: stats.sharpe,
        max_drawdown: stats.max_drawdown,
        total_return: stats.total_return,
        num_days: stats.num_days,
        avg_turnover: output.activity.avg_turnover,
        total_costs: output.activity.total_costs,
    })
    .map_err(io_error)?;
    wtr.flush()?;
    Ok(())
}

fn write_series(path: &Path, output: &PipelineOutput) -> Result<(), LsquantError> {
    let bt = &output.backtest;
    let mut wtr = csv::Writer::from_path(path).map_err(io_error)?;
    for t in 0..bt.len() {
        wtr.serialize(SeriesRow {
            date: bt.dates[t].format("%Y-%m-%d").to_string(),
            daily_pnl: bt.daily_pnl[t],
            equity: bt.equity_curve[t],
            turnover: bt.turnover[t],
            costs: bt.costs[t],
        })
        .map_err(io_error)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_weights_tail(path: &Path, weights: &Panel, rows: usize) -> Result<(), LsquantError> {
    let mut wtr = csv::Writer::from_path(path).map_err(io_error)?;

    let mut header = vec!["date".to_string()];
    header.extend(weights.symbols().iter().cloned());
    wtr.write_record(&header).map_err(io_error)?;

    let start = weights.len().saturating_sub(rows);
    for i in start..weights.len() {
        let mut record = vec![weights.dates()[i].format("%Y-%m-%d").to_string()];
        record.extend(weights.row(i).iter().map(|w| w.to_string()));
        wtr.write_record(&record).map_err(io_error)?;
    }
    wtr.flush()?;
    Ok(())
}

fn io_error(e: csv::Error) -> LsquantError {
    LsquantError::Io(std::io::Error::other(e.to_string()))
}

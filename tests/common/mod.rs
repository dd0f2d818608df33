#![allow(dead_code)]

use chrono::NaiveDate;
use lsquant::domain::config::PipelineConfig;
use lsquant::domain::error::LsquantError;
use lsquant::domain::panel::{Panel, PricePanel};
use lsquant::domain::pipeline::PipelineOutput;
use lsquant::ports::data_port::PriceDataPort;
use lsquant::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

pub struct MockPriceDataPort {
    pub panel: Option<PricePanel>,
    pub error: Option<String>,
    pub requests: RefCell<Vec<Vec<String>>>,
}

impl MockPriceDataPort {
    pub fn new(panel: PricePanel) -> Self {
        Self {
            panel: Some(panel),
            error: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            panel: None,
            error: Some(reason.to_string()),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl PriceDataPort for MockPriceDataPort {
    fn load_panel(
        &self,
        universe: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PricePanel, LsquantError> {
        self.requests.borrow_mut().push(universe.to_vec());
        if let Some(reason) = &self.error {
            return Err(LsquantError::Data {
                reason: reason.clone(),
            });
        }
        let panel = self.panel.as_ref().ok_or_else(|| LsquantError::Data {
            reason: "no panel".into(),
        })?;
        Ok(panel.between(start, end))
    }

    fn list_symbols(&self) -> Result<Vec<String>, LsquantError> {
        Ok(self
            .panel
            .as_ref()
            .map(|p| p.symbols().to_vec())
            .unwrap_or_default())
    }
}

/// Records the output directories it was asked to write to.
#[derive(Default)]
pub struct RecordingReportPort {
    pub writes: RefCell<Vec<(PathBuf, usize)>>,
}

impl ReportPort for RecordingReportPort {
    fn write(
        &self,
        output: &PipelineOutput,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LsquantError> {
        self.writes
            .borrow_mut()
            .push((output_dir.to_path_buf(), output.backtest.len()));
        Ok(Vec::new())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive calendar days starting 2020-01-01.
pub fn days(n: usize) -> Vec<NaiveDate> {
    let start = date(2020, 1, 1);
    (0..n)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect()
}

pub fn symbols(n: usize) -> Vec<String> {
    (0..n).map(|j| format!("S{j:02}")).collect()
}

/// Deterministic 64-bit LCG so generated panels are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1))
    }

    pub fn uniform(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Roughly standard normal (Irwin–Hall with twelve draws).
    pub fn normal(&mut self) -> f64 {
        (0..12).map(|_| self.uniform()).sum::<f64>() - 6.0
    }
}

/// Random-walk prices with per-symbol drift and volatility.
pub fn random_walk_panel(n_symbols: usize, n_days: usize, seed: u64) -> PricePanel {
    let mut rng = Lcg::new(seed);
    let params: Vec<(f64, f64)> = (0..n_symbols)
        .map(|j| (0.0002 * (j as f64 - n_symbols as f64 / 2.0), 0.008 + 0.002 * j as f64))
        .collect();

    let mut price: Vec<f64> = (0..n_symbols).map(|j| 50.0 + 10.0 * j as f64).collect();
    let mut rows = Vec::with_capacity(n_days);
    for t in 0..n_days {
        if t > 0 {
            for (j, p) in price.iter_mut().enumerate() {
                let (drift, vol) = params[j];
                *p *= 1.0 + drift + vol * rng.normal();
            }
        }
        rows.push(price.clone());
    }
    Panel::new(days(n_days), symbols(n_symbols), rows).unwrap()
}

/// Each symbol grows at a constant, distinct daily rate.
pub fn trending_panel(rates: &[f64], n_days: usize) -> PricePanel {
    let rows = (0..n_days)
        .map(|t| {
            rates
                .iter()
                .map(|r| 100.0 * (1.0 + r).powi(t as i32))
                .collect()
        })
        .collect();
    Panel::new(days(n_days), symbols(rates.len()), rows).unwrap()
}

/// Config sized for small synthetic panels.
pub fn small_config(panel: &PricePanel) -> PipelineConfig {
    PipelineConfig {
        universe: panel.symbols().to_vec(),
        start_date: panel.dates()[0],
        end_date: *panel.dates().last().unwrap(),
        lookback: 10,
        min_history: 25,
        train_window: 40,
        retrain_freq: 10,
        min_symbols: 5,
        ..PipelineConfig::default()
    }
}

/// Write one `<SYMBOL>.csv` per column of `panel` with `Date,Close` headers.
pub fn write_price_csvs(dir: &Path, panel: &PricePanel) {
    for (j, symbol) in panel.symbols().iter().enumerate() {
        let mut content = String::from("Date,Close\n");
        for (i, d) in panel.dates().iter().enumerate() {
            content.push_str(&format!("{},{}\n", d.format("%Y-%m-%d"), panel.row(i)[j]));
        }
        fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
    }
}

//! Date × symbol panels for prices and weights.
//!
//! A [`Panel`] stores one row per date and one column per symbol. Dates are
//! strictly increasing and symbols are unique; missing cells are `NaN`.

use crate::domain::error::LsquantError;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    rows: Vec<Vec<f64>>,
}

/// Daily close prices, one column per symbol.
pub type PricePanel = Panel;

/// Target portfolio weights, one row per rebalance date.
pub type WeightPanel = Panel;

impl Panel {
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, LsquantError> {
        if dates.len() != rows.len() {
            return Err(LsquantError::InvalidPanel {
                reason: format!("{} dates but {} rows", dates.len(), rows.len()),
            });
        }
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(LsquantError::InvalidPanel {
                reason: format!("dates not strictly increasing at {} -> {}", w[0], w[1]),
            });
        }
        let mut seen = BTreeSet::new();
        for s in &symbols {
            if !seen.insert(s.as_str()) {
                return Err(LsquantError::InvalidPanel {
                    reason: format!("duplicate symbol {s}"),
                });
            }
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != symbols.len()) {
            return Err(LsquantError::InvalidPanel {
                reason: format!(
                    "row for {} has {} values, expected {}",
                    dates[i],
                    row.len(),
                    symbols.len()
                ),
            });
        }
        Ok(Self {
            dates,
            symbols,
            rows,
        })
    }

    /// Outer-join per-symbol series on the union of their dates.
    ///
    /// Cells with no observation are `NaN`; no filling is applied.
    pub fn from_series(series: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Result<Self, LsquantError> {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, obs)| obs.iter().map(|(d, _)| *d))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let date_index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let symbols: Vec<String> = series.iter().map(|(s, _)| s.clone()).collect();
        let mut rows = vec![vec![f64::NAN; symbols.len()]; dates.len()];
        for (j, (symbol, obs)) in series.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for (date, value) in obs {
                if !seen.insert(*date) {
                    return Err(LsquantError::InvalidPanel {
                        reason: format!("{symbol} has two observations on {date}"),
                    });
                }
                rows[date_index[date]][j] = *value;
            }
        }
        Self::new(dates, symbols, rows)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        let i = self.dates.binary_search(&date).ok()?;
        let j = self.symbol_index(symbol)?;
        Some(self.rows[i][j])
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }

    /// Carry the last observed value forward; leading gaps stay `NaN`.
    pub fn forward_fill(&self) -> Panel {
        let mut rows = self.rows.clone();
        for i in 1..rows.len() {
            for j in 0..self.symbols.len() {
                if rows[i][j].is_nan() {
                    rows[i][j] = rows[i - 1][j];
                }
            }
        }
        Panel {
            dates: self.dates.clone(),
            symbols: self.symbols.clone(),
            rows,
        }
    }

    /// Simple period returns `p(t)/p(t-1) - 1`. The first row and any cell
    /// with an undefined neighbour are `NaN`.
    pub fn pct_change(&self) -> Panel {
        let rows = (0..self.rows.len())
            .map(|i| {
                (0..self.symbols.len())
                    .map(|j| {
                        if i == 0 {
                            f64::NAN
                        } else {
                            self.rows[i][j] / self.rows[i - 1][j] - 1.0
                        }
                    })
                    .collect()
            })
            .collect();
        Panel {
            dates: self.dates.clone(),
            symbols: self.symbols.clone(),
            rows,
        }
    }

    /// Rows whose date lies in `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Panel {
        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|&i| self.dates[i] >= start && self.dates[i] <= end)
            .collect();
        Panel {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            symbols: self.symbols.clone(),
            rows: keep.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Rows from index `start` onward.
    pub fn slice_from(&self, start: usize) -> Panel {
        Panel {
            dates: self.dates[start..].to_vec(),
            symbols: self.symbols.clone(),
            rows: self.rows[start..].to_vec(),
        }
    }
}

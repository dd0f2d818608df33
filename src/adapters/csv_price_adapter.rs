//! Per-symbol CSV price files.
//!
//! A data directory holds one `<SYMBOL>.csv` per asset with a `Date` column
//! and an `Adj Close` or `Close` column. `Adj Close` wins when both exist.

use crate::domain::error::LsquantError;
use crate::domain::panel::{Panel, PricePanel};
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_COLUMN: &str = "Date";
const PRICE_COLUMNS: [&str; 2] = ["Adj Close", "Close"];

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Map of upper-cased symbol to file path for every CSV in the directory.
    fn files(&self) -> Result<BTreeMap<String, PathBuf>, LsquantError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| LsquantError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut files = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| LsquantError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.insert(stem.to_uppercase(), path);
            }
        }
        Ok(files)
    }
}

impl PriceDataPort for CsvPriceAdapter {
    fn load_panel(
        &self,
        universe: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PricePanel, LsquantError> {
        let files = self.files()?;
        let mut wanted: Vec<String> = if universe.is_empty() {
            files.keys().cloned().collect()
        } else {
            universe.iter().map(|s| s.trim().to_uppercase()).collect()
        };
        let mut seen = std::collections::BTreeSet::new();
        wanted.retain(|s| seen.insert(s.clone()));

        let mut series = Vec::with_capacity(wanted.len());
        for symbol in wanted {
            match files.get(&symbol) {
                Some(path) => series.push((symbol, read_series(path)?)),
                None => tracing::warn!(%symbol, dir = %self.base_path.display(), "no price file"),
            }
        }
        if series.is_empty() {
            return Err(LsquantError::Data {
                reason: format!("no price files found in {}", self.base_path.display()),
            });
        }

        let panel = Panel::from_series(series)?.forward_fill().between(start, end);
        if panel.is_empty() {
            return Err(LsquantError::Data {
                reason: format!("no prices between {start} and {end}"),
            });
        }
        tracing::info!(
            symbols = panel.symbols().len(),
            dates = panel.len(),
            "loaded price panel"
        );
        Ok(panel)
    }

    fn list_symbols(&self) -> Result<Vec<String>, LsquantError> {
        Ok(self.files()?.into_keys().collect())
    }
}

/// Read one symbol's `(date, price)` observations, sorted by date.
///
/// Rows with an empty or `null` price are skipped.
fn read_series(path: &Path) -> Result<Vec<(NaiveDate, f64)>, LsquantError> {
    let content = fs::read_to_string(path).map_err(|e| LsquantError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());

    let headers = rdr.headers().map_err(|e| LsquantError::Data {
        reason: format!("{}: CSV header error: {}", path.display(), e),
    })?;
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let date_idx = column(DATE_COLUMN).ok_or_else(|| LsquantError::Data {
        reason: format!("{}: missing {} column", path.display(), DATE_COLUMN),
    })?;
    let price_idx = PRICE_COLUMNS
        .iter()
        .find_map(|name| column(name))
        .ok_or_else(|| LsquantError::Data {
            reason: format!(
                "{}: missing price column (expected one of {})",
                path.display(),
                PRICE_COLUMNS.join(", ")
            ),
        })?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LsquantError::Data {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;

        let date_str = record.get(date_idx).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            LsquantError::Data {
                reason: format!("{}: invalid date '{}': {}", path.display(), date_str, e),
            }
        })?;

        let price_str = record.get(price_idx).unwrap_or("").trim();
        if price_str.is_empty() || price_str.eq_ignore_ascii_case("null") {
            continue;
        }
        let price: f64 = price_str.parse().map_err(|e| LsquantError::Data {
            reason: format!(
                "{}: invalid price '{}' on {}: {}",
                path.display(),
                price_str,
                date,
                e
            ),
        })?;
        rows.push((date, price));
    }

    rows.sort_by_key(|(d, _)| *d);
    Ok(rows)
}

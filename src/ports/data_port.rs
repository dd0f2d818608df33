//! Price data port.

use crate::domain::error::LsquantError;
use crate::domain::panel::PricePanel;
use chrono::NaiveDate;

pub trait PriceDataPort {
    /// Load a forward-filled price panel for `universe`, clipped to
    /// `[start, end]`. An empty universe loads every available symbol.
    fn load_panel(
        &self,
        universe: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PricePanel, LsquantError>;

    fn list_symbols(&self) -> Result<Vec<String>, LsquantError>;
}

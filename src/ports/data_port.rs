//! Data access port trait.

use crate::domain::error::SimError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Load every bar from `source` in file order. Implementations report
    /// unparsable rows as [`SimError::Data`] with the row index; semantic bar
    /// checks are left to [`crate::domain::ohlcv::validate_bars`].
    fn fetch_bars(&self, source: &str) -> Result<Vec<Bar>, SimError>;
}

//! CSV file data adapter.
//!
//! Expects a header row followed by `timestamp,open,high,low,close,volume`
//! records. Row indices in errors count data rows from zero, matching bar
//! indices.

use crate::domain::error::SimError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    /// Relative sources resolve against `base_path`; absolute ones are used
    /// as given.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Parse bars from any reader.
    pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, SimError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut bars = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| SimError::data(index, format!("CSV error: {}", e)))?;
            if record.len() < 6 {
                return Err(SimError::data(
                    index,
                    format!("expected 6 columns, found {}", record.len()),
                ));
            }

            let number = |column: usize, name: &str| -> Result<f64, SimError> {
                record[column].parse::<f64>().map_err(|e| {
                    SimError::data(
                        index,
                        format!("invalid {} value '{}': {}", name, &record[column], e),
                    )
                })
            };

            bars.push(Bar {
                timestamp: parse_timestamp(&record[0])
                    .ok_or_else(|| {
                        SimError::data(index, format!("invalid timestamp '{}'", &record[0]))
                    })?,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")?,
            });
        }
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, source: &str) -> Result<Vec<Bar>, SimError> {
        let path = self.base_path.join(source);
        let file = File::open(&path)?;
        let bars = Self::read_bars(file)?;
        tracing::debug!(path = %path.display(), bars = bars.len(), "loaded bars");
        Ok(bars)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DDTHH:MM:SS`
/// with an optional trailing `Z`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

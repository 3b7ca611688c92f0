use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::bar::Bar;
use crate::constant::DataError;
use crate::engine::{BarOutcome, Engine};

/// Anything that can hand over a time-ordered batch of bars for one
/// instrument.
pub trait BarSource {
    fn symbol(&self) -> &str;
    fn load(&mut self) -> Result<Vec<Bar>, DataError>;
}

/// Bars read from a CSV file with a `datetime, open, high, low, close,
/// volume` header.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    path: PathBuf,
    symbol: String,
}

impl CsvBarSource {
    pub fn new(path: impl AsRef<Path>, symbol: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            symbol: symbol.into(),
        }
    }
}

impl BarSource for CsvBarSource {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn load(&mut self) -> Result<Vec<Bar>, DataError> {
        load_csv_bars(&self.path, &self.symbol)
    }
}

impl BarSource for Vec<Bar> {
    fn symbol(&self) -> &str {
        self.first().map_or("", |x| x.symbol.as_str())
    }

    fn load(&mut self) -> Result<Vec<Bar>, DataError> {
        Ok(std::mem::take(self))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Feeds bars from any source into an owned engine.
#[derive(Debug)]
pub struct DataReceiver {
    engine: Engine,
    stats: IngestStats,
}

impl DataReceiver {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            stats: IngestStats::default(),
        }
    }

    pub fn ingest_bar(&mut self, bar: Bar) -> BarOutcome {
        let outcome = self.engine.on_bar(bar);
        if outcome.is_accepted() {
            self.stats.accepted += 1;
        } else {
            self.stats.rejected += 1;
        }
        outcome
    }

    pub fn ingest_batch(&mut self, bars: Vec<Bar>) -> IngestStats {
        let before = self.stats;
        for bar in bars {
            self.ingest_bar(bar);
        }
        IngestStats {
            accepted: self.stats.accepted - before.accepted,
            rejected: self.stats.rejected - before.rejected,
        }
    }

    pub fn ingest_source(&mut self, source: &mut impl BarSource) -> Result<IngestStats, DataError> {
        let bars = source.load()?;
        let stats = self.ingest_batch(bars);
        info!(
            symbol = source.symbol(),
            accepted = stats.accepted,
            rejected = stats.rejected,
            "source ingested"
        );
        Ok(stats)
    }

    pub fn ingest_csv(&mut self, file_path: impl AsRef<Path>) -> Result<IngestStats, DataError> {
        let mut source = CsvBarSource::new(file_path, self.engine.symbol());
        self.ingest_source(&mut source)
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }
}

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    datetime: String,
    #[serde(alias = "open")]
    open_price: f64,
    #[serde(alias = "high")]
    high_price: f64,
    #[serde(alias = "low")]
    low_price: f64,
    #[serde(alias = "close")]
    close_price: f64,
    #[serde(default)]
    volume: f64,
}

pub fn load_csv_bars(file_path: impl AsRef<Path>, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::Reader::from_path(file_path)?;
    let mut out = Vec::new();

    for row in reader.deserialize::<CsvBarRow>() {
        let row = row?;
        out.push(Bar {
            symbol: symbol.to_string(),
            datetime: parse_datetime(&row.datetime)?,
            open_price: row.open_price,
            high_price: row.high_price,
            low_price: row.low_price,
            close_price: row.close_price,
            volume: row.volume,
        });
    }

    Ok(out)
}

pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, DataError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let patterns = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y%m%d%H%M%S%.f",
    ];

    for pattern in patterns {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(DataError::InvalidDatetime(value.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_parse_datetime_patterns() {
        for value in [
            "2024-03-01T09:30:00Z",
            "2024-03-01 09:30:00",
            "2024/03/01 09:30:00.000",
            "20240301093000",
        ] {
            let dt = parse_datetime(value).unwrap();
            assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 1));
            assert_eq!((dt.hour(), dt.minute()), (9, 30));
        }
        assert!(matches!(
            parse_datetime("yesterday"),
            Err(DataError::InvalidDatetime(_))
        ));
    }
}

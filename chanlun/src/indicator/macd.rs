use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MacdConfig;

use super::ema::EmaIndicator;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub datetime: DateTime<Utc>,
    pub dif: f64,
    pub dea: f64,
    pub histogram: f64,
}

/// MACD over closes. The histogram is `2 * (dif - dea)`.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    fast: EmaIndicator,
    slow: EmaIndicator,
    signal: EmaIndicator,
    last: Option<MacdPoint>,
}

impl MacdIndicator {
    pub fn new(config: &MacdConfig) -> Self {
        Self {
            fast: EmaIndicator::new(config.fast),
            slow: EmaIndicator::new(config.slow),
            signal: EmaIndicator::new(config.signal),
            last: None,
        }
    }

    pub fn next(&mut self, datetime: DateTime<Utc>, close: f64) -> MacdPoint {
        let dif = self.fast.next(close) - self.slow.next(close);
        let dea = self.signal.next(dif);
        let point = MacdPoint {
            datetime,
            dif,
            dea,
            histogram: (dif - dea) * 2.0,
        };
        self.last = Some(point);
        point
    }

    pub fn last(&self) -> Option<MacdPoint> {
        self.last
    }
}

impl Default for MacdIndicator {
    fn default() -> Self {
        Self::new(&MacdConfig::default())
    }
}

/// Sum of the histogram over `(start, end]` keeping only values whose sign
/// matches `sign`. `series` must be ordered by datetime.
pub fn histogram_mass(series: &[MacdPoint], start: DateTime<Utc>, end: DateTime<Utc>, sign: i64) -> f64 {
    if end <= start {
        return 0.0;
    }
    let from = series.partition_point(|x| x.datetime <= start);
    let to = series.partition_point(|x| x.datetime <= end);
    series[from..to.max(from)]
        .iter()
        .map(|x| x.histogram)
        .filter(|h| match sign.signum() {
            1 => *h > 0.0,
            -1 => *h < 0.0,
            _ => false,
        })
        .sum()
}

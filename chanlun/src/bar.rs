use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constant::{Direction, FractalPower, Mark};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub datetime: DateTime<Utc>,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
}

impl Bar {
    pub(crate) fn is_well_formed(&self) -> bool {
        [
            self.open_price,
            self.high_price,
            self.low_price,
            self.close_price,
            self.volume,
        ]
        .iter()
        .all(|x| x.is_finite())
            && self.high_price >= self.low_price
    }
}

/// A bar after inclusion processing. `run` is signed: its magnitude counts
/// consecutive raw bars moving the same way, its sign is the direction.
/// Zero only on the first merged bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedBar {
    pub datetime: DateTime<Utc>,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub run: i64,
    pub bar_start_index: usize,
    pub bar_end_index: usize,
}

impl MergedBar {
    pub fn direction(&self) -> Direction {
        Direction::from_sign(self.run)
    }

    pub fn is_inclusive(&self, high: f64, low: f64) -> bool {
        is_inclusive(self.high_price, self.low_price, high, low)
    }

    /// The price this bar reached in the given mark's sense.
    pub fn extreme(&self, mark: Mark) -> f64 {
        match mark {
            Mark::Peak => self.high_price,
            Mark::Trough => self.low_price,
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.high_price + self.low_price) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fractal {
    pub datetime: DateTime<Utc>,
    pub mark: Mark,
    pub value: f64,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    /// Index of the middle merged bar.
    pub merged_index: usize,
    pub power: FractalPower,
}

impl Fractal {
    /// Three-bar turning-point rule. Strict on both sides.
    pub fn verify(left: &MergedBar, middle: &MergedBar, right: &MergedBar) -> Option<Mark> {
        if left.high_price < middle.high_price && middle.high_price > right.high_price {
            return Some(Mark::Peak);
        }
        if left.low_price > middle.low_price && middle.low_price < right.low_price {
            return Some(Mark::Trough);
        }
        None
    }
}

pub(crate) fn is_inclusive(a_high: f64, a_low: f64, b_high: f64, b_low: f64) -> bool {
    (a_high >= b_high && a_low <= b_low) || (a_high <= b_high && a_low >= b_low)
}

/// Traded volume over `(start, end]`. `bars` must be ordered by datetime.
pub fn volume_between(bars: &[Bar], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    if end <= start {
        return 0.0;
    }
    let from = bars.partition_point(|x| x.datetime <= start);
    let to = bars.partition_point(|x| x.datetime <= end);
    bars[from..to.max(from)].iter().map(|x| x.volume).sum()
}

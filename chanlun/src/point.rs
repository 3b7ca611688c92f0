use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constant::{Direction, Mark};

/// Only the tail of a list can be `Open`. `anchor` indexes the list below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Point {
    Open {
        datetime: DateTime<Utc>,
        direction: Direction,
        value: f64,
        anchor: usize,
    },
    Confirmed {
        datetime: DateTime<Utc>,
        mark: Mark,
        value: f64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        anchor: usize,
    },
}

impl Point {
    pub fn open(datetime: DateTime<Utc>, mark: Mark, value: f64, anchor: usize) -> Self {
        Self::Open {
            datetime,
            direction: mark.direction(),
            value,
            anchor,
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        match self {
            Self::Open { datetime, .. } | Self::Confirmed { datetime, .. } => *datetime,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Open { value, .. } | Self::Confirmed { value, .. } => *value,
        }
    }

    pub fn mark(&self) -> Mark {
        match self {
            Self::Open { direction, .. } => match direction {
                Direction::Up => Mark::Peak,
                _ => Mark::Trough,
            },
            Self::Confirmed { mark, .. } => *mark,
        }
    }

    pub fn anchor(&self) -> usize {
        match self {
            Self::Open { anchor, .. } | Self::Confirmed { anchor, .. } => *anchor,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub(crate) fn freeze(&mut self, range_start: DateTime<Utc>, range_end: DateTime<Utc>) {
        if let Self::Open {
            datetime,
            value,
            anchor,
            ..
        } = *self
        {
            *self = Self::Confirmed {
                datetime,
                mark: self.mark(),
                value,
                range_start,
                range_end,
                anchor,
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelPoint {
    pub point: Point,
    /// Signed number of lower-level points covered by the move ending here.
    pub span: i64,
    /// Histogram mass of the move ending here, same sign as the move.
    pub macd: f64,
    pub volume: f64,
}

impl LevelPoint {
    pub fn momentum(&self) -> f64 {
        if self.span == 0 {
            self.macd
        } else {
            self.macd / self.span.unsigned_abs() as f64
        }
    }
}

pub trait StructurePoint {
    fn datetime(&self) -> DateTime<Utc>;
    fn value(&self) -> f64;
    fn mark(&self) -> Mark;
    fn is_confirmed(&self) -> bool;
}

impl StructurePoint for Point {
    fn datetime(&self) -> DateTime<Utc> {
        Point::datetime(self)
    }

    fn value(&self) -> f64 {
        Point::value(self)
    }

    fn mark(&self) -> Mark {
        Point::mark(self)
    }

    fn is_confirmed(&self) -> bool {
        !self.is_open()
    }
}

impl StructurePoint for LevelPoint {
    fn datetime(&self) -> DateTime<Utc> {
        self.point.datetime()
    }

    fn value(&self) -> f64 {
        self.point.value()
    }

    fn mark(&self) -> Mark {
        self.point.mark()
    }

    fn is_confirmed(&self) -> bool {
        !self.point.is_open()
    }
}

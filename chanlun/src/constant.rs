use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a move. `None` only appears on the very first merged bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    None,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::None => Self::None,
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
            Self::None => 0,
        }
    }

    pub fn from_sign(value: i64) -> Self {
        match value.signum() {
            1 => Self::Up,
            -1 => Self::Down,
            _ => Self::None,
        }
    }

    /// The turning point a move in this direction ends on.
    pub fn end_mark(self) -> Option<Mark> {
        match self {
            Self::Up => Some(Mark::Peak),
            Self::Down => Some(Mark::Trough),
            Self::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    Peak,
    Trough,
}

impl Mark {
    pub fn opposite(self) -> Self {
        match self {
            Self::Peak => Self::Trough,
            Self::Trough => Self::Peak,
        }
    }

    /// Direction of the move that ends on this mark.
    pub fn direction(self) -> Direction {
        match self {
            Self::Peak => Direction::Up,
            Self::Trough => Direction::Down,
        }
    }

    /// Strictly beyond `reference` in this mark's sense: higher for a peak,
    /// lower for a trough. Equality never counts.
    pub fn exceeds(self, value: f64, reference: f64) -> bool {
        match self {
            Self::Peak => value > reference,
            Self::Trough => value < reference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractalPower {
    Strong,
    Weak,
}

/// Result of a single update against an append-or-replace list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ListChange {
    Unchanged,
    Replaced,
    Appended,
}

impl ListChange {
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }

    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    BarAccepted,
    BarRejected,
    MergedBarChanged,
    FractalCreated,
    StrokeChanged,
    LevelChanged,
    SignalEmitted,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Internal precondition failures of a level. Never escapes `Engine::on_bar`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureError {
    #[error("level {level}: need at least {required} points, have {actual}")]
    InsufficientPoints {
        level: usize,
        required: usize,
        actual: usize,
    },
    #[error("level {level}: no open pivot")]
    MissingPivot { level: usize },
    #[error("level {level}: point {index} breaks mark alternation")]
    Alternation { level: usize, index: usize },
}

pub struct Const;

impl Const {
    pub const MIN_FRACTAL_BARS: usize = 3;
    pub const MIN_PIVOT_POINTS: usize = 3;
    pub const DEFAULT_STROKE_MIN_GAP: usize = 4;
    pub const DEFAULT_BOOTSTRAP_POINTS: usize = 4;
}

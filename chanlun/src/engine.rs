use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bar::{Bar, Fractal, MergedBar};
use crate::config::EngineConfig;
use crate::constant::{DataError, EventType, ListChange};
use crate::events::{EventPayload, Observable, Subscriber};
use crate::fractal::FractalDetector;
use crate::indicator::{MacdIndicator, MacdPoint};
use crate::level::{Level, LevelChain, LevelUpdate};
use crate::merger::BarMerger;
use crate::pivot::Pivot;
use crate::point::{LevelPoint, Point};
use crate::signal::Signal;
use crate::stroke::StrokeBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    OutOfOrder,
    Duplicate,
    SymbolMismatch,
    InvalidPrice,
}

/// Everything a single accepted bar changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarUpdate {
    pub merged: ListChange,
    pub fractal: bool,
    pub stroke: ListChange,
    pub levels: Vec<LevelUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarOutcome {
    Accepted(BarUpdate),
    Rejected(RejectReason),
}

impl BarOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn update(&self) -> Option<&BarUpdate> {
        match self {
            Self::Accepted(update) => Some(update),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAnalysis {
    pub level: usize,
    pub latest_segment: Option<LevelPoint>,
    pub latest_pivot: Option<Pivot>,
    pub latest_signal: Option<Signal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub symbol: String,
    pub bar_count: usize,
    pub latest_merged: Option<MergedBar>,
    pub latest_fractal: Option<Fractal>,
    pub latest_stroke: Option<Point>,
    pub latest_macd: Option<MacdPoint>,
    pub levels: Vec<LevelAnalysis>,
}

/// Structure engine for one instrument. Bars go in through [`Engine::on_bar`],
/// every derived list is read back through the accessors.
#[derive(Debug)]
pub struct Engine {
    symbol: String,
    config: EngineConfig,
    bars: Vec<Bar>,
    merger: BarMerger,
    fractals: FractalDetector,
    strokes: StrokeBuilder,
    levels: LevelChain,
    macd: MacdIndicator,
    macd_series: Vec<MacdPoint>,
    observable: Observable,
}

impl Engine {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::build(symbol.into(), EngineConfig::default())
    }

    pub fn with_config(symbol: impl Into<String>, config: EngineConfig) -> Result<Self, DataError> {
        config.validate()?;
        Ok(Self::build(symbol.into(), config))
    }

    fn build(symbol: String, config: EngineConfig) -> Self {
        Self {
            symbol,
            config,
            bars: Vec::new(),
            merger: BarMerger::new(),
            fractals: FractalDetector::new(),
            strokes: StrokeBuilder::new(config.stroke.min_gap),
            levels: LevelChain::new(config.level),
            macd: MacdIndicator::new(&config.macd),
            macd_series: Vec::new(),
            observable: Observable::default(),
        }
    }

    pub fn subscribe(&mut self, event_type: Option<EventType>, subscriber: Subscriber) {
        self.observable.subscribe(event_type, subscriber);
    }

    pub fn on_bar(&mut self, bar: Bar) -> BarOutcome {
        if let Some(reason) = self.check(&bar) {
            warn!(
                symbol = %bar.symbol,
                datetime = %bar.datetime,
                ?reason,
                "bar dropped"
            );
            self.observable.notify(
                EventType::BarRejected,
                EventPayload {
                    datetime: Some(bar.datetime),
                    note: Some(format!("{reason:?}")),
                    ..EventPayload::default()
                },
            );
            return BarOutcome::Rejected(reason);
        }

        let datetime = bar.datetime;
        let macd = self.macd.next(bar.datetime, bar.close_price);
        self.macd_series.push(macd);
        self.bars.push(bar);
        let bar_index = self.bars.len() - 1;

        let merge = self.merger.on_bar(&self.bars[bar_index], bar_index);
        self.observable.notify(
            EventType::MergedBarChanged,
            EventPayload {
                datetime: self.merger.last().map(|x| x.datetime),
                change: Some(merge.change),
                ..EventPayload::default()
            },
        );

        let fractal = self
            .fractals
            .on_merge(self.merger.rows(), merge)
            .map(|x| x.datetime);
        if fractal.is_some() {
            self.observable.notify(
                EventType::FractalCreated,
                EventPayload {
                    datetime: fractal,
                    ..EventPayload::default()
                },
            );
        }

        let stroke = self
            .strokes
            .update(self.merger.rows(), self.fractals.rows(), fractal.is_some());
        let levels = if stroke.changed() {
            self.observable.notify(
                EventType::StrokeChanged,
                EventPayload {
                    datetime: self.strokes.last().map(Point::datetime),
                    change: Some(stroke),
                    ..EventPayload::default()
                },
            );
            self.levels.update(self.strokes.rows(), &self.bars, &self.macd_series)
        } else {
            Vec::new()
        };
        self.notify_levels(&levels);

        self.observable.notify(
            EventType::BarAccepted,
            EventPayload {
                datetime: Some(datetime),
                ..EventPayload::default()
            },
        );
        debug!(
            %datetime,
            merged = self.merger.len(),
            strokes = self.strokes.len(),
            levels = self.levels.len(),
            "bar accepted"
        );
        BarOutcome::Accepted(BarUpdate {
            merged: merge.change,
            fractal: fractal.is_some(),
            stroke,
            levels,
        })
    }

    fn check(&self, bar: &Bar) -> Option<RejectReason> {
        if bar.symbol != self.symbol {
            return Some(RejectReason::SymbolMismatch);
        }
        if !bar.is_well_formed() {
            return Some(RejectReason::InvalidPrice);
        }
        let last = self.bars.last()?;
        if bar.datetime == last.datetime {
            Some(RejectReason::Duplicate)
        } else if bar.datetime < last.datetime {
            Some(RejectReason::OutOfOrder)
        } else {
            None
        }
    }

    fn notify_levels(&self, updates: &[LevelUpdate]) {
        for update in updates {
            if update.segment.changed() || update.pivot.changed() {
                self.observable.notify(
                    EventType::LevelChanged,
                    EventPayload {
                        level: Some(update.level),
                        change: Some(update.segment),
                        ..EventPayload::default()
                    },
                );
            }
            if update.signal.changed() {
                let datetime = self
                    .levels
                    .level(update.level)
                    .and_then(|x| x.signals().last())
                    .map(|x| x.datetime);
                self.observable.notify(
                    EventType::SignalEmitted,
                    EventPayload {
                        datetime,
                        level: Some(update.level),
                        change: Some(update.signal),
                        ..EventPayload::default()
                    },
                );
            }
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn merged_bars(&self) -> &[MergedBar] {
        self.merger.rows()
    }

    pub fn fractals(&self) -> &[Fractal] {
        self.fractals.rows()
    }

    pub fn strokes(&self) -> &[Point] {
        self.strokes.rows()
    }

    pub fn macd(&self) -> &[MacdPoint] {
        &self.macd_series
    }

    pub fn levels(&self) -> &[Level] {
        self.levels.levels()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.level(index)
    }

    pub fn segments(&self, level: usize) -> &[LevelPoint] {
        self.level(level).map(Level::points).unwrap_or_default()
    }

    pub fn pivots(&self, level: usize) -> &[Pivot] {
        self.level(level).map(Level::pivots).unwrap_or_default()
    }

    pub fn signals(&self, level: usize) -> &[Signal] {
        self.level(level).map(Level::signals).unwrap_or_default()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            symbol: self.symbol.clone(),
            bar_count: self.bars.len(),
            latest_merged: self.merger.last().cloned(),
            latest_fractal: self.fractals.last().cloned(),
            latest_stroke: self.strokes.last().cloned(),
            latest_macd: self.macd_series.last().copied(),
            levels: self
                .levels
                .levels()
                .iter()
                .map(|level| LevelAnalysis {
                    level: level.index(),
                    latest_segment: level.points().last().cloned(),
                    latest_pivot: level.pivots().last().cloned(),
                    latest_signal: level.signals().last().cloned(),
                })
                .collect(),
        }
    }
}

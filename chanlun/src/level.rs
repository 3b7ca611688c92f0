//! Level 0 reads the stroke list, level k+1 reads level k's points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bar::{Bar, volume_between};
use crate::config::LevelConfig;
use crate::constant::{Const, ListChange, Mark, StructureError};
use crate::indicator::macd::{MacdPoint, histogram_mass};
use crate::pivot::{Pivot, PivotBuilder};
use crate::point::{LevelPoint, Point, StructurePoint};
use crate::signal::{self, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub level: usize,
    pub segment: ListChange,
    pub pivot: ListChange,
    pub signal: ListChange,
}

#[derive(Debug, Clone)]
pub struct Level {
    index: usize,
    bootstrap_points: usize,
    points: Vec<LevelPoint>,
    pivots: PivotBuilder,
    signals: Vec<Signal>,
    /// First below index that may still change since the last pass.
    scan_from: usize,
}

impl Level {
    pub fn new(index: usize, bootstrap_points: usize) -> Self {
        Self {
            index,
            bootstrap_points,
            points: Vec::new(),
            pivots: PivotBuilder::new(index),
            signals: Vec::new(),
            scan_from: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> Option<usize> {
        self.index.checked_sub(1)
    }

    pub fn points(&self) -> &[LevelPoint] {
        &self.points
    }

    pub fn pivots(&self) -> &[Pivot] {
        self.pivots.rows()
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn update<P: StructurePoint>(
        &mut self,
        below: &[P],
        bars: &[Bar],
        macd: &[MacdPoint],
    ) -> Result<LevelUpdate, StructureError> {
        let segment = self.update_segments(below, &Tape { bars, macd });
        let mut update = LevelUpdate {
            level: self.index,
            segment,
            pivot: ListChange::Unchanged,
            signal: ListChange::Unchanged,
        };
        if !segment.changed() {
            return Ok(update);
        }

        if self.points.len() >= Const::MIN_PIVOT_POINTS {
            update.pivot = self.pivots.update(&self.points)?;
        }
        if let Some(pivot) = self.pivots.last() {
            if let Some(signal) = signal::classify(&self.points, pivot) {
                update.signal = signal::record(&mut self.signals, signal);
            }
        }
        Ok(update)
    }

    fn update_segments<P: StructurePoint>(&mut self, below: &[P], tape: &Tape<'_>) -> ListChange {
        let mut change = if self.points.is_empty() {
            if !self.bootstrap(below, tape) {
                return ListChange::Unchanged;
            }
            ListChange::Appended
        } else {
            self.refresh_tail(below, tape)
        };

        for index in self.scan_from..below.len() {
            change = change.merge(self.consider(below, index, tape));
        }
        self.scan_from = below.len().saturating_sub(1);
        change
    }

    fn bootstrap<P: StructurePoint>(&mut self, below: &[P], tape: &Tape<'_>) -> bool {
        let confirmed = count_confirmed(below);
        if confirmed < self.bootstrap_points {
            return false;
        }
        let window = confirmed - self.bootstrap_points..confirmed;
        let high = window
            .clone()
            .max_by(|a, b| below[*a].value().total_cmp(&below[*b].value()));
        let low = window.min_by(|a, b| below[*a].value().total_cmp(&below[*b].value()));
        let (Some(high), Some(low)) = (high, low) else {
            return false;
        };
        if below[high].mark() != Mark::Peak || below[low].mark() != Mark::Trough {
            return false;
        }

        let (first, second) = if high < low { (high, low) } else { (low, high) };
        let mut head = leg(below, first, None, tape);
        let (start, end) = neighbour_range(below, first);
        head.point.freeze(start, end);
        self.points.push(head);
        let next = leg(below, second, self.points.last(), tape);
        self.points.push(next);
        self.scan_from = second + 1;
        debug!(
            level = self.index,
            first = below[first].value(),
            second = below[second].value(),
            "level bootstrapped"
        );
        true
    }

    // the source of an open tail may have been replaced in place
    fn refresh_tail<P: StructurePoint>(&mut self, below: &[P], tape: &Tape<'_>) -> ListChange {
        let n = self.points.len();
        let Some(tail) = self.points.last() else {
            return ListChange::Unchanged;
        };
        if !tail.point.is_open() {
            return ListChange::Unchanged;
        }
        let anchor = tail.point.anchor();
        let Some(source) = below.get(anchor) else {
            return ListChange::Unchanged;
        };
        if source.mark() != tail.point.mark()
            || (source.datetime() == tail.point.datetime() && source.value() == tail.point.value())
        {
            return ListChange::Unchanged;
        }
        let previous = n.checked_sub(2).map(|i| &self.points[i]);
        let refreshed = leg(below, anchor, previous, tape);
        self.points[n - 1] = refreshed;
        ListChange::Replaced
    }

    fn consider<P: StructurePoint>(&mut self, below: &[P], index: usize, tape: &Tape<'_>) -> ListChange {
        let Some(tail) = self.points.last() else {
            return ListChange::Unchanged;
        };
        let tail_anchor = tail.point.anchor();
        if index <= tail_anchor {
            return ListChange::Unchanged;
        }
        let tail_mark = tail.point.mark();
        let tail_value = tail.point.value();
        let candidate = &below[index];

        if candidate.mark() == tail_mark {
            if !tail_mark.exceeds(candidate.value(), tail_value) {
                return ListChange::Unchanged;
            }
            let n = self.points.len();
            let previous = n.checked_sub(2).map(|i| &self.points[i]);
            let extended = leg(below, index, previous, tape);
            self.points[n - 1] = extended;
            return ListChange::Replaced;
        }

        let mark = candidate.mark();
        if !mark.exceeds(candidate.value(), tail_value) || !self.reverses(below, index) {
            return ListChange::Unchanged;
        }

        let best = most_extreme(below, tail_anchor + 1, index, mark);
        let (start, end) = neighbour_range(below, tail_anchor);
        if let Some(tail) = self.points.last_mut() {
            tail.point.freeze(start, end);
        }
        let next = leg(below, best, self.points.last(), tape);
        debug!(
            level = self.index,
            mark = ?mark,
            value = next.point.value(),
            span = next.span,
            count = self.points.len() + 1,
            "segment appended"
        );
        self.points.push(next);
        ListChange::Appended
    }

    /// Price break of the point before the tail, or a three-line break.
    fn reverses<P: StructurePoint>(&self, below: &[P], index: usize) -> bool {
        let n = self.points.len();
        let candidate = &below[index];
        let mark = candidate.mark();
        let Some(previous) = n.checked_sub(2).map(|i| &self.points[i]) else {
            return false;
        };
        if mark.exceeds(candidate.value(), previous.point.value()) {
            return true;
        }

        let Some(tail) = self.points.last() else {
            return false;
        };
        let Some(bi3_index) = index.checked_sub(2) else {
            return false;
        };
        let bi3 = &below[bi3_index];
        bi3_index > tail.point.anchor()
            && bi3.mark() == mark
            && bi3.datetime() > previous.point.datetime()
            && mark.exceeds(candidate.value(), bi3.value())
    }
}

struct Tape<'a> {
    bars: &'a [Bar],
    macd: &'a [MacdPoint],
}

fn leg<P: StructurePoint>(below: &[P], index: usize, previous: Option<&LevelPoint>, tape: &Tape<'_>) -> LevelPoint {
    let source = &below[index];
    let point = Point::open(source.datetime(), source.mark(), source.value(), index);
    let (span, mass, volume) = match previous {
        Some(previous) => {
            let sign = source.mark().direction().sign();
            let start = previous.point.datetime();
            (
                (index as i64 - previous.point.anchor() as i64) * sign,
                histogram_mass(tape.macd, start, source.datetime(), sign),
                volume_between(tape.bars, start, source.datetime()),
            )
        }
        None => (0, 0.0, 0.0),
    };
    LevelPoint {
        point,
        span,
        macd: mass,
        volume,
    }
}

// later points win ties
fn most_extreme<P: StructurePoint>(below: &[P], from: usize, to: usize, mark: Mark) -> usize {
    let mut best = to;
    for index in from..=to {
        let point = &below[index];
        if point.mark() == mark && !mark.exceeds(below[best].value(), point.value()) {
            best = index;
        }
    }
    best
}

fn neighbour_range<P: StructurePoint>(below: &[P], anchor: usize) -> (DateTime<Utc>, DateTime<Utc>) {
    let at = |i: usize| below.get(i).map(|x| x.datetime());
    let own = at(anchor).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let start = anchor.checked_sub(1).and_then(at).unwrap_or(own);
    let end = at(anchor + 1).unwrap_or(own);
    (start, end)
}

/// Only the tail of a point list may be open.
fn count_confirmed<P: StructurePoint>(points: &[P]) -> usize {
    match points.last() {
        Some(tail) if !tail.is_confirmed() => points.len() - 1,
        _ => points.len(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct LevelChain {
    levels: Vec<Level>,
    config: LevelConfig,
}

impl LevelChain {
    pub fn new(config: LevelConfig) -> Self {
        Self {
            levels: Vec::new(),
            config,
        }
    }

    pub fn update(&mut self, strokes: &[Point], bars: &[Bar], macd: &[MacdPoint]) -> Vec<LevelUpdate> {
        let mut updates = Vec::new();
        let mut index = 0;
        loop {
            if self.config.max_levels.is_some_and(|max| index >= max) {
                break;
            }
            if index == self.levels.len() {
                let ready = match index {
                    0 => count_confirmed(strokes),
                    _ => count_confirmed(self.levels[index - 1].points()),
                };
                if ready < self.config.bootstrap_points {
                    break;
                }
                debug!(level = index, "level created");
                self.levels
                    .push(Level::new(index, self.config.bootstrap_points));
            }

            let result = match index {
                0 => self.levels[0].update(strokes, bars, macd),
                _ => {
                    let (lower, upper) = self.levels.split_at_mut(index);
                    upper[0].update(lower[index - 1].points(), bars, macd)
                }
            };
            match result {
                Ok(update) => {
                    let appended = update.segment == ListChange::Appended;
                    updates.push(update);
                    if !appended {
                        break;
                    }
                }
                Err(err) => {
                    warn!(level = index, error = %err, "level update skipped");
                    break;
                }
            }
            index += 1;
        }
        updates
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

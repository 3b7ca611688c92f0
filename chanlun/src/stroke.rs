
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bar::{Fractal, MergedBar};
use crate::constant::{Const, ListChange};
use crate::point::Point;

impl From<&Fractal> for Point {
    fn from(fractal: &Fractal) -> Self {
        Point::Confirmed {
            datetime: fractal.datetime,
            mark: fractal.mark,
            value: fractal.value,
            range_start: fractal.range_start,
            range_end: fractal.range_end,
            anchor: fractal.merged_index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    rows: Vec<Point>,
    min_gap: usize,
}

impl Default for StrokeBuilder {
    fn default() -> Self {
        Self::new(Const::DEFAULT_STROKE_MIN_GAP)
    }
}

impl StrokeBuilder {
    pub fn new(min_gap: usize) -> Self {
        Self {
            rows: Vec::new(),
            min_gap,
        }
    }

    /// `new_fractal` says whether this bar created the last fractal.
    pub fn update(
        &mut self,
        merged: &[MergedBar],
        fractals: &[Fractal],
        new_fractal: bool,
    ) -> ListChange {
        let change = self.apply(merged, fractals, new_fractal);
        if change.changed() {
            if let Some(tail) = self.rows.last() {
                debug!(
                    ?change,
                    mark = ?tail.mark(),
                    value = tail.value(),
                    open = tail.is_open(),
                    count = self.rows.len(),
                    "stroke changed"
                );
            }
        }
        change
    }

    fn apply(&mut self, merged: &[MergedBar], fractals: &[Fractal], new_fractal: bool) -> ListChange {
        let candidate = if new_fractal { fractals.last() } else { None };

        let Some(tail) = self.rows.last() else {
            return match candidate {
                Some(fractal) => {
                    self.rows.push(Point::from(fractal));
                    ListChange::Appended
                }
                None => ListChange::Unchanged,
            };
        };
        let Some(newest) = merged.last() else {
            return ListChange::Unchanged;
        };
        let newest_index = merged.len() - 1;
        let tail_mark = tail.mark();
        let tail_value = tail.value();
        let newest_extreme = newest.extreme(tail_mark);

        // continuation of an open tail
        if tail.is_open() {
            if newest.direction() == tail_mark.direction()
                && tail_mark.exceeds(newest_extreme, tail_value)
            {
                self.replace_tail(Point::open(
                    newest.datetime,
                    tail_mark,
                    newest_extreme,
                    newest_index,
                ));
                return ListChange::Replaced;
            }
        } else if newest_index > tail.anchor() && tail_mark.exceeds(newest_extreme, tail_value) {
            // the confirmed tail was undershot: reopen it at the new extreme
            self.replace_tail(Point::open(
                newest.datetime,
                tail_mark,
                newest_extreme,
                newest_index,
            ));
            return ListChange::Replaced;
        }

        let Some(fractal) = candidate else {
            return ListChange::Unchanged;
        };

        if fractal.mark == tail_mark {
            let improves = if tail.is_open() {
                !tail_mark.exceeds(tail_value, fractal.value)
            } else {
                tail_mark.exceeds(fractal.value, tail_value)
            };
            if improves && fractal.merged_index >= tail.anchor() {
                self.replace_tail(Point::from(fractal));
                return ListChange::Replaced;
            }
            return ListChange::Unchanged;
        }

        if !self.confirms(fractal) {
            return ListChange::Unchanged;
        }

        let best = self.most_extreme_since_tail(fractals, fractal);
        self.freeze_tail(merged);
        self.rows.push(Point::from(best));
        ListChange::Appended
    }

    fn confirms(&self, fractal: &Fractal) -> bool {
        let Some(tail) = self.rows.last() else {
            return false;
        };
        if fractal.merged_index <= tail.anchor() {
            return false;
        }
        if !fractal.mark.exceeds(fractal.value, tail.value()) {
            return false;
        }
        if fractal.merged_index - tail.anchor() >= self.min_gap {
            return true;
        }
        self.rows.len() >= 2
            && fractal
                .mark
                .exceeds(fractal.value, self.rows[self.rows.len() - 2].value())
    }

    // later fractals win ties
    fn most_extreme_since_tail<'a>(&self, fractals: &'a [Fractal], candidate: &'a Fractal) -> &'a Fractal {
        let Some(tail) = self.rows.last() else {
            return candidate;
        };
        let boundary = tail.datetime();
        let mut best = candidate;
        for fractal in fractals.iter().rev() {
            if fractal.datetime <= boundary {
                break;
            }
            if fractal.mark == candidate.mark && fractal.mark.exceeds(fractal.value, best.value) {
                best = fractal;
            }
        }
        best
    }

    fn freeze_tail(&mut self, merged: &[MergedBar]) {
        if let Some(tail) = self.rows.last_mut() {
            let anchor = tail.anchor();
            let (start, end) = anchor_range(merged, anchor);
            tail.freeze(start, end);
        }
    }

    fn replace_tail(&mut self, point: Point) {
        if let Some(tail) = self.rows.last_mut() {
            *tail = point;
        }
    }

    pub fn rows(&self) -> &[Point] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Point> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn min_gap(&self) -> usize {
        self.min_gap
    }
}

pub(crate) fn anchor_range(merged: &[MergedBar], anchor: usize) -> (DateTime<Utc>, DateTime<Utc>) {
    let last = merged.len().saturating_sub(1);
    let at = |i: usize| merged.get(i.min(last)).map(|x| x.datetime);
    let fallback = at(anchor).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let start = at(anchor.saturating_sub(1)).unwrap_or(fallback);
    let end = at(anchor + 1).unwrap_or(fallback);
    (start, end)
}

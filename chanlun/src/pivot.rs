//! Consolidation zones built over the confirmed points of one level.
//!
//! `zg`/`zd` are the inner band, `gg`/`dd` stack outer extremes so that a
//! breakout can give back the member it borrows for the next pivot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constant::{Const, Direction, ListChange, Mark, StructureError};
use crate::point::StructurePoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMember {
    /// Index in the owning level's point list.
    pub index: usize,
    pub datetime: DateTime<Utc>,
    pub mark: Mark,
    pub value: f64,
}

impl PivotMember {
    fn of<P: StructurePoint>(index: usize, point: &P) -> Self {
        Self {
            index,
            datetime: point.datetime(),
            mark: point.mark(),
            value: point.value(),
        }
    }
}

/// How a pivot was left. A trough holding above `zg` is a third buy, a peak
/// held below `zd` a third sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakout {
    pub direction: Direction,
    pub member: PivotMember,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub zg: f64,
    pub zd: f64,
    pub gg: Vec<f64>,
    pub dd: Vec<f64>,
    pub weight: usize,
    pub streak: i64,
    pub real_streak: i64,
    pub members: Vec<PivotMember>,
    pub breakout: Option<Breakout>,
}

impl Pivot {
    fn seed(first: PivotMember, second: PivotMember, streak: i64, real_streak: i64) -> Self {
        let (peak, trough) = match first.mark {
            Mark::Peak => (first.value, second.value),
            Mark::Trough => (second.value, first.value),
        };
        Self {
            zg: peak,
            zd: trough,
            gg: vec![peak],
            dd: vec![trough],
            weight: 1,
            streak,
            real_streak,
            members: vec![first, second],
            breakout: None,
        }
    }

    pub fn gg_top(&self) -> f64 {
        self.gg.last().copied().unwrap_or(self.zg)
    }

    pub fn dd_bottom(&self) -> f64 {
        self.dd.last().copied().unwrap_or(self.zd)
    }

    pub fn is_open(&self) -> bool {
        self.breakout.is_none()
    }

    /// Direction of the move this pivot belongs to: the streak sign, or the
    /// leg that entered it when no streak is established yet.
    pub fn direction(&self) -> Direction {
        match Direction::from_sign(self.streak) {
            Direction::None => self
                .members
                .first()
                .map_or(Direction::None, |x| x.mark.direction()),
            direction => direction,
        }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.members.first().map(|x| x.datetime)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.members.last().map(|x| x.datetime)
    }

    fn breakout_direction(&self, member: &PivotMember) -> Option<Direction> {
        match member.mark {
            Mark::Peak if member.value < self.zd => Some(Direction::Down),
            Mark::Trough if member.value > self.zg => Some(Direction::Up),
            _ => None,
        }
    }

    fn absorb(&mut self, member: PivotMember) {
        let value = member.value;
        match member.mark {
            Mark::Peak => {
                if value > self.zd && value < self.zg {
                    self.zg = value;
                } else if value > self.gg_top() {
                    self.gg.push(value);
                }
            }
            Mark::Trough => {
                if value > self.zd && value < self.zg {
                    self.zd = value;
                } else if value < self.dd_bottom() {
                    self.dd.push(value);
                }
            }
        }
        self.members.push(member);
        self.weight += 1;
    }

    /// Gives back the last member for the next pivot. Returns it with whether
    /// exactly two legs were left; single-leg pivots do not count.
    fn close(&mut self, direction: Direction, breaker: PivotMember) -> Option<(PivotMember, bool)> {
        let last = self.members.pop()?;
        self.weight = self.weight.saturating_sub(1);
        let stack = match last.mark {
            Mark::Peak => &mut self.gg,
            Mark::Trough => &mut self.dd,
        };
        if stack.len() > 1 && stack.last().copied() == Some(last.value) {
            stack.pop();
        }
        self.breakout = Some(Breakout {
            direction,
            member: breaker,
        });
        Some((last, self.weight == 2))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PivotBuilder {
    level: usize,
    rows: Vec<Pivot>,
    cursor: usize,
}

impl PivotBuilder {
    pub fn new(level: usize) -> Self {
        Self {
            level,
            rows: Vec::new(),
            cursor: 0,
        }
    }

    /// Consumes the confirmed points of `points` not seen yet. Only the tail
    /// of `points` may be unconfirmed.
    pub fn update<P: StructurePoint>(&mut self, points: &[P]) -> Result<ListChange, StructureError> {
        if points.len() < Const::MIN_PIVOT_POINTS {
            return Err(StructureError::InsufficientPoints {
                level: self.level,
                required: Const::MIN_PIVOT_POINTS,
                actual: points.len(),
            });
        }
        let confirmed = match points.last() {
            Some(tail) if !tail.is_confirmed() => points.len() - 1,
            _ => points.len(),
        };

        let mut change = ListChange::Unchanged;
        if self.rows.is_empty() {
            let first = PivotMember::of(0, &points[0]);
            let second = PivotMember::of(1, &points[1]);
            if first.mark == second.mark {
                return Err(StructureError::Alternation {
                    level: self.level,
                    index: 1,
                });
            }
            self.rows.push(Pivot::seed(first, second, 0, 0));
            self.cursor = 2;
            change = ListChange::Appended;
        }

        while self.cursor < confirmed {
            let member = PivotMember::of(self.cursor, &points[self.cursor]);
            change = change.merge(self.step(member)?);
            self.cursor += 1;
        }
        Ok(change)
    }

    fn step(&mut self, member: PivotMember) -> Result<ListChange, StructureError> {
        let level = self.level;
        let Some(current) = self.rows.last_mut() else {
            return Err(StructureError::MissingPivot { level });
        };
        let alternates = current.members.last().map(|x| x.mark) != Some(member.mark);
        debug_assert!(alternates, "pivot members must alternate");
        if !alternates {
            return Err(StructureError::Alternation {
                level,
                index: member.index,
            });
        }

        let Some(direction) = current.breakout_direction(&member) else {
            current.absorb(member);
            return Ok(ListChange::Replaced);
        };

        let (streak, real_streak) = (current.streak, current.real_streak);
        let Some((last, counted)) = current.close(direction, member.clone()) else {
            return Err(StructureError::MissingPivot { level });
        };
        let sign = direction.sign();
        let streak = if streak.signum() == sign {
            streak + sign
        } else {
            sign
        };
        let real_streak = match (counted, real_streak.signum() == sign) {
            (true, true) => real_streak + sign,
            (true, false) => sign,
            (false, _) => real_streak,
        };
        let next = Pivot::seed(last, member, streak, real_streak);
        debug_assert!(next.zd < next.zg);
        debug!(
            level,
            ?direction,
            streak,
            real_streak,
            zg = next.zg,
            zd = next.zd,
            "pivot closed"
        );
        self.rows.push(next);
        Ok(ListChange::Appended)
    }

    pub fn rows(&self) -> &[Pivot] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Pivot> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

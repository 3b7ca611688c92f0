use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constant::{Direction, ListChange, Mark};
use crate::pivot::{Pivot, PivotMember};
use crate::point::LevelPoint;

/// Where a price sits relative to a pivot. Ordered from furthest below to
/// furthest above; the outer zones are the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    BelowOuter,
    BelowInner,
    Inside,
    AboveInner,
    AboveOuter,
}

impl Zone {
    pub fn classify(value: f64, pivot: &Pivot) -> Self {
        if value > pivot.gg_top() {
            Self::AboveOuter
        } else if value > pivot.zg {
            Self::AboveInner
        } else if value >= pivot.zd {
            Self::Inside
        } else if value >= pivot.dd_bottom() {
            Self::BelowInner
        } else {
            Self::BelowOuter
        }
    }

    pub fn code(self) -> i8 {
        match self {
            Self::BelowOuter => -2,
            Self::BelowInner => -1,
            Self::Inside => 0,
            Self::AboveInner => 1,
            Self::AboveOuter => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub datetime: DateTime<Utc>,
    pub value: f64,
    pub zone: Zone,
    pub zone_code: i8,
    pub pivot_streak: i64,
    pub pivot_weight: usize,
    pub divergence: bool,
    pub pattern: Option<LegPattern>,
}

/// Classifies the tail of `points` against `pivot`.
pub fn classify(points: &[LevelPoint], pivot: &Pivot) -> Option<Signal> {
    let tail = points.last()?;
    let zone = Zone::classify(tail.point.value(), pivot);
    Some(Signal {
        datetime: tail.point.datetime(),
        value: tail.point.value(),
        zone,
        zone_code: zone.code(),
        pivot_streak: pivot.streak,
        pivot_weight: pivot.weight,
        divergence: divergence(points, pivot),
        pattern: LegPattern::classify(points),
    })
}

/// Whether the tail leg is weaker than the comparable leg of `pivot`.
///
/// A tail moving with the pivot is compared against the leg that entered
/// it. A tail moving against it is compared against the leg that made the
/// pivot's extreme on the tail's side.
pub fn divergence(points: &[LevelPoint], pivot: &Pivot) -> bool {
    let Some(tail) = points.last() else {
        return false;
    };
    let mark = tail.point.mark();
    let direction = mark.direction();

    let reference = if direction == pivot.direction() {
        pivot.members.first()
    } else {
        pivot
            .members
            .iter()
            .filter(|x| x.mark == mark)
            .fold(None, |best: Option<&PivotMember>, x| match best {
                Some(b) if !mark.exceeds(x.value, b.value) => Some(b),
                _ => Some(x),
            })
    };
    let Some(reference) = reference.and_then(|x| points.get(x.index)) else {
        return false;
    };
    if reference.point.mark() != mark {
        return false;
    }

    let current = tail.momentum();
    let previous = reference.momentum();
    match direction {
        Direction::Up => current <= previous,
        Direction::Down => current >= previous,
        Direction::None => false,
    }
}

/// One move between two consecutive level points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    /// Mark of the point the move ends at.
    pub mark: Mark,
    pub high: f64,
    pub low: f64,
    pub price_power: f64,
    pub volume_power: f64,
}

impl Leg {
    pub fn between(from: &LevelPoint, to: &LevelPoint) -> Self {
        let (start, end) = (from.point.value(), to.point.value());
        Self {
            mark: to.point.mark(),
            high: start.max(end),
            low: start.min(end),
            price_power: (end - start).abs(),
            volume_power: to.volume,
        }
    }

    pub fn direction(&self) -> Direction {
        self.mark.direction()
    }

    fn reach(&self) -> f64 {
        match self.mark {
            Mark::Peak => self.high,
            Mark::Trough => self.low,
        }
    }

    fn beyond(&self, other: &Leg) -> bool {
        self.mark.exceeds(self.reach(), other.reach())
    }

    fn weaker_than(&self, other: &Leg) -> bool {
        self.price_power < other.price_power && self.volume_power < other.volume_power
    }
}

/// Exhaustion shapes over five legs where 2-3-4 overlap. Legs are counted
/// from the oldest, so the fifth is the newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jing {
    /// 5 beyond 3 beyond 1 with power fading from 1 to 3 to 5.
    Big,
    /// 3 makes the extreme, 5 only clears 1 and is weaker than it.
    SmallA,
    /// 5 beyond 3 beyond 1 with 1 stronger than 5 and 5 stronger than 3.
    SmallB,
}

/// Legs 1-3 overlap, leg 4 leaves the overlap and leg 5 fails to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThirdPoint {
    Buy,
    Sell,
}

/// How the newest leg compares with legs 1 and 3 of its own direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Extension {
    /// No new extreme.
    Failed,
    /// New extreme without beating both earlier legs on price and volume.
    Divergent,
    Clean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPattern {
    pub direction: Direction,
    pub jing: Option<Jing>,
    pub third: Option<ThirdPoint>,
    pub extension: Extension,
}

impl LegPattern {
    /// Reads the five legs ending at the tail of `points`. The newest leg may
    /// still be open.
    pub fn classify(points: &[LevelPoint]) -> Option<Self> {
        let window = &points[points.len().checked_sub(6)?..];
        let legs: [Leg; 5] = std::array::from_fn(|i| Leg::between(&window[i], &window[i + 1]));
        Some(Self {
            direction: legs[4].direction(),
            jing: jing(&legs),
            third: third_point(&legs),
            extension: extension(&legs),
        })
    }
}

fn jing(legs: &[Leg; 5]) -> Option<Jing> {
    let [l1, l2, l3, l4, l5] = legs;
    // weakest first, strongest in the middle: the move is not over yet
    if l1.weaker_than(l5) && l5.weaker_than(l3) {
        return None;
    }
    let zg = l2.high.min(l3.high).min(l4.high);
    let zd = l2.low.max(l3.low).max(l4.low);
    if zd >= zg || !(l5.beyond(l3) || l5.beyond(l1)) {
        return None;
    }

    let stepping = l5.beyond(l3) && l3.beyond(l1);
    if stepping && l5.weaker_than(l3) && l3.weaker_than(l1) {
        Some(Jing::Big)
    } else if l5.beyond(l1) && l3.beyond(l5) && l5.weaker_than(l1) {
        Some(Jing::SmallA)
    } else if stepping && l3.weaker_than(l5) && l5.weaker_than(l1) {
        Some(Jing::SmallB)
    } else {
        None
    }
}

fn third_point(legs: &[Leg; 5]) -> Option<ThirdPoint> {
    let [l1, l2, l3, l4, l5] = legs;
    let zg = l1.high.min(l2.high).min(l3.high);
    let zd = l1.low.max(l2.low).max(l3.low);
    if zd >= zg {
        return None;
    }
    if l5.low > zg && l4.high > l1.high.max(l3.high) {
        Some(ThirdPoint::Buy)
    } else if l5.high < zd && l4.low < l1.low.min(l3.low) {
        Some(ThirdPoint::Sell)
    } else {
        None
    }
}

fn extension(legs: &[Leg; 5]) -> Extension {
    let [l1, _, l3, _, l5] = legs;
    if l3.beyond(l5) || l1.beyond(l5) {
        Extension::Failed
    } else if l1.weaker_than(l5) && l3.weaker_than(l5) {
        Extension::Clean
    } else {
        Extension::Divergent
    }
}

/// Replaces the last signal when it shares the timestamp, else appends.
pub(crate) fn record(rows: &mut Vec<Signal>, signal: Signal) -> ListChange {
    match rows.last_mut() {
        Some(last) if last.datetime == signal.datetime => {
            if *last == signal {
                ListChange::Unchanged
            } else {
                *last = signal;
                ListChange::Replaced
            }
        }
        _ => {
            rows.push(signal);
            ListChange::Appended
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::constant::Mark;
    use crate::point::Point;

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(i)
    }

    fn lp(i: usize, mark: Mark, value: f64, span: i64, macd: f64) -> LevelPoint {
        LevelPoint {
            point: Point::open(t(i as i64), mark, value, i),
            span,
            macd,
            volume: 0.0,
        }
    }

    /// Alternating points from `(value, volume)` pairs, the first with `first`.
    fn path(first: Mark, steps: &[(f64, f64)]) -> Vec<LevelPoint> {
        let mut mark = first;
        steps
            .iter()
            .enumerate()
            .map(|(i, (value, volume))| {
                let mut point = lp(i, mark, *value, 0, 0.0);
                point.volume = *volume;
                mark = mark.opposite();
                point
            })
            .collect()
    }

    fn pattern(first: Mark, steps: &[(f64, f64)]) -> LegPattern {
        LegPattern::classify(&path(first, steps)).expect("six points give five legs")
    }

    fn member(i: usize, mark: Mark, value: f64) -> PivotMember {
        PivotMember {
            index: i,
            datetime: t(i as i64),
            mark,
            value,
        }
    }

    fn pivot(members: Vec<PivotMember>, streak: i64) -> Pivot {
        Pivot {
            zg: 110.0,
            zd: 100.0,
            gg: vec![115.0, 120.0],
            dd: vec![95.0, 90.0],
            weight: members.len() - 1,
            streak,
            real_streak: 0,
            members,
            breakout: None,
        }
    }

    #[test]
    fn test_zone_ordering() {
        let p = pivot(vec![member(0, Mark::Trough, 95.0), member(1, Mark::Peak, 120.0)], 0);
        let zones: Vec<Zone> = [130.0, 115.0, 105.0, 92.0, 80.0]
            .iter()
            .map(|v| Zone::classify(*v, &p))
            .collect();
        let codes: Vec<i8> = zones.iter().map(|z| z.code()).collect();
        assert_eq!(codes, vec![2, 1, 0, -1, -2]);
        assert!(zones.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(Zone::classify(110.0, &p), Zone::Inside);
        assert_eq!(Zone::classify(100.0, &p), Zone::Inside);
    }

    #[test]
    fn test_divergence_against_entering_leg() {
        // pivot entered by the up leg ending at point 1
        let points = vec![
            lp(0, Mark::Trough, 90.0, 0, 0.0),
            lp(1, Mark::Peak, 120.0, 4, 8.0),
            lp(2, Mark::Trough, 100.0, -2, -1.0),
            lp(3, Mark::Peak, 125.0, 4, 4.0),
        ];
        let p = pivot(vec![member(1, Mark::Peak, 120.0), member(2, Mark::Trough, 100.0)], 1);
        let signal = classify(&points, &p).unwrap();
        assert_eq!(signal.zone, Zone::AboveOuter);
        assert!(signal.divergence);

        let mut stronger = points.clone();
        stronger[3].macd = 12.0;
        assert!(!divergence(&stronger, &p));
    }

    #[test]
    fn test_divergence_against_extreme_leg() {
        let points = vec![
            lp(0, Mark::Peak, 120.0, 0, 0.0),
            lp(1, Mark::Trough, 90.0, -3, -6.0),
            lp(2, Mark::Peak, 110.0, 2, 2.0),
            lp(3, Mark::Trough, 85.0, -3, -9.0),
        ];
        // up pivot, tail moving down: compare with the lowest trough member
        let p = pivot(vec![member(1, Mark::Trough, 90.0), member(2, Mark::Peak, 110.0)], 1);
        assert!(!divergence(&points, &p));

        let mut weaker = points.clone();
        weaker[3].macd = -3.0;
        assert!(divergence(&weaker, &p));
    }

    #[test]
    fn test_record_replaces_same_datetime() {
        let p = pivot(vec![member(0, Mark::Trough, 95.0), member(1, Mark::Peak, 120.0)], 0);
        let mut rows = Vec::new();
        let points = vec![lp(0, Mark::Peak, 105.0, 0, 0.0)];
        let signal = classify(&points, &p).unwrap();
        assert_eq!(record(&mut rows, signal.clone()), ListChange::Appended);
        assert_eq!(record(&mut rows, signal.clone()), ListChange::Unchanged);

        let mut moved = signal;
        moved.value = 112.0;
        moved.zone = Zone::AboveInner;
        moved.zone_code = 1;
        assert_eq!(record(&mut rows, moved), ListChange::Replaced);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_big_jing_up() {
        let p = pattern(
            Mark::Trough,
            &[(100.0, 0.0), (130.0, 30.0), (110.0, 5.0), (135.0, 20.0), (115.0, 5.0), (138.0, 10.0)],
        );
        assert_eq!(p.direction, Direction::Up);
        assert_eq!(p.jing, Some(Jing::Big));
        assert_eq!(p.third, None);
        assert_eq!(p.extension, Extension::Divergent);
    }

    #[test]
    fn test_small_jing_variants() {
        // 3 is the high, 5 only clears 1
        let a = pattern(
            Mark::Trough,
            &[(100.0, 0.0), (130.0, 30.0), (110.0, 5.0), (140.0, 40.0), (118.0, 5.0), (135.0, 10.0)],
        );
        assert_eq!(a.jing, Some(Jing::SmallA));
        assert_eq!(a.extension, Extension::Failed);

        // 5 is the high, power 1 > 5 > 3
        let b = pattern(
            Mark::Trough,
            &[(100.0, 0.0), (130.0, 30.0), (110.0, 5.0), (135.0, 10.0), (115.0, 5.0), (141.0, 20.0)],
        );
        assert_eq!(b.jing, Some(Jing::SmallB));
        assert_eq!(b.extension, Extension::Divergent);
    }

    #[test]
    fn test_strongest_middle_leg_is_not_jing() {
        let p = pattern(
            Mark::Trough,
            &[(100.0, 0.0), (110.0, 10.0), (105.0, 5.0), (130.0, 30.0), (120.0, 5.0), (132.0, 20.0)],
        );
        assert_eq!(p.jing, None);
    }

    #[test]
    fn test_third_buy_and_sell() {
        let buy = pattern(
            Mark::Peak,
            &[(120.0, 0.0), (100.0, 1.0), (118.0, 1.0), (105.0, 1.0), (130.0, 1.0), (121.0, 1.0)],
        );
        assert_eq!(buy.direction, Direction::Down);
        assert_eq!(buy.third, Some(ThirdPoint::Buy));
        assert_eq!(buy.jing, None);
        assert_eq!(buy.extension, Extension::Failed);

        let sell = pattern(
            Mark::Trough,
            &[(100.0, 0.0), (120.0, 1.0), (102.0, 1.0), (115.0, 1.0), (90.0, 1.0), (99.0, 1.0)],
        );
        assert_eq!(sell.third, Some(ThirdPoint::Sell));
    }

    #[test]
    fn test_clean_new_low() {
        let p = pattern(
            Mark::Peak,
            &[(130.0, 0.0), (110.0, 10.0), (125.0, 5.0), (105.0, 10.0), (120.0, 5.0), (90.0, 40.0)],
        );
        assert_eq!(p.direction, Direction::Down);
        assert_eq!(p.extension, Extension::Clean);
        assert_eq!(p.jing, None);
    }

    #[test]
    fn test_pattern_needs_five_legs() {
        let points = path(Mark::Trough, &[(100.0, 0.0), (130.0, 1.0), (110.0, 1.0), (135.0, 1.0), (115.0, 1.0)]);
        assert_eq!(LegPattern::classify(&points), None);
        let p = pivot(vec![member(0, Mark::Trough, 95.0), member(1, Mark::Peak, 120.0)], 0);
        assert_eq!(classify(&points, &p).unwrap().pattern, None);
    }
}

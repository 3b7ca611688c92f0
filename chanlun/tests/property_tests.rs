//! Structural invariants over random walks.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use chanlun::{Bar, Engine, Mark, StructurePoint, StructureReport};

fn arb_walk() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((-2.0..2.0_f64, 0.2..3.0_f64, 0.0..1.0_f64), 10..300)
}

/// Long enough for the chain to grow past level 1.
fn arb_long_walk() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((-2.0..2.0_f64, 0.2..3.0_f64, 0.0..1.0_f64), 2000..4000)
}

fn walk_bars(steps: &[(f64, f64, f64)]) -> Vec<Bar> {
    let base_dt = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
    let mut price = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, (step, width, close_at))| {
            price = (price + step).max(5.0);
            let high = price + width / 2.0;
            let low = price - width / 2.0;
            Bar {
                symbol: "I2601".to_string(),
                datetime: base_dt + Duration::minutes(i as i64),
                open_price: price,
                high_price: high,
                low_price: low,
                close_price: low + (high - low) * close_at,
                volume: 1.0,
            }
        })
        .collect()
}

fn replay(bars: &[Bar]) -> Engine {
    let mut engine = Engine::new("I2601");
    for bar in bars.iter().cloned() {
        engine.on_bar(bar);
    }
    engine
}

/// Alternating marks, only the tail open, strictly increasing datetimes, and
/// every peak above its neighbouring troughs.
/// Every confirmed point must be a point of the list it was promoted from.
fn check_promoted<P: StructurePoint, Q: StructurePoint>(
    level: usize,
    points: &[P],
    below: &[Q],
) -> Result<(), TestCaseError> {
    for (i, point) in points.iter().enumerate().filter(|(_, x)| x.is_confirmed()) {
        prop_assert!(
            below
                .iter()
                .any(|x| x.datetime() == point.datetime() && x.value() == point.value()),
            "level {} point {} at {} has no source below",
            level,
            i,
            point.datetime()
        );
    }
    Ok(())
}

fn check_points<P: StructurePoint>(points: &[P]) -> Result<(), TestCaseError> {
    for (i, pair) in points.windows(2).enumerate() {
        prop_assert_ne!(pair[0].mark(), pair[1].mark(), "marks alternate at {}", i);
        prop_assert!(pair[0].datetime() < pair[1].datetime(), "datetime order at {}", i);
        prop_assert!(pair[0].is_confirmed(), "only the tail may be open, {} is not", i);
        let (peak, trough) = match pair[0].mark() {
            Mark::Peak => (&pair[0], &pair[1]),
            Mark::Trough => (&pair[1], &pair[0]),
        };
        prop_assert!(peak.value() > trough.value(), "peak above trough at {}", i);
    }
    Ok(())
}

proptest! {
    #[test]
    fn merged_bars_cover_input_without_inclusion(steps in arb_walk()) {
        let bars = walk_bars(&steps);
        let engine = replay(&bars);
        let merged = engine.merged_bars();

        prop_assert!(!merged.is_empty());
        prop_assert_eq!(merged[0].bar_start_index, 0);
        prop_assert_eq!(merged[merged.len() - 1].bar_end_index, bars.len() - 1);
        for pair in merged.windows(2) {
            prop_assert_eq!(pair[1].bar_start_index, pair[0].bar_end_index + 1);
            prop_assert!(pair[0].datetime < pair[1].datetime);
            prop_assert!(
                !pair[0].is_inclusive(pair[1].high_price, pair[1].low_price),
                "adjacent merged bars must not contain each other"
            );
        }
    }

    #[test]
    fn strokes_alternate_and_only_tail_is_open(steps in arb_walk()) {
        let engine = replay(&walk_bars(&steps));
        check_points(engine.strokes())?;
        for fractal in engine.fractals() {
            prop_assert!(fractal.range_start < fractal.datetime);
            prop_assert!(fractal.datetime < fractal.range_end);
        }
    }

    #[test]
    fn levels_keep_structure(steps in arb_walk()) {
        let engine = replay(&walk_bars(&steps));
        for level in engine.levels() {
            check_points(level.points())?;
            for pivot in level.pivots() {
                prop_assert!(pivot.zd < pivot.zg, "pivot band must be non-empty");
                prop_assert!(pivot.gg_top() >= pivot.zg);
                prop_assert!(pivot.dd_bottom() <= pivot.zd);
            }
            for signal in level.signals() {
                prop_assert!((-2..=2).contains(&signal.zone_code));
            }
        }
    }

    #[test]
    fn repeated_bars_do_not_change_structure(steps in arb_walk()) {
        let bars = walk_bars(&steps);
        let clean = replay(&bars);

        let mut noisy = Engine::new("I2601");
        for bar in bars {
            prop_assert!(noisy.on_bar(bar.clone()).is_accepted());
            prop_assert!(!noisy.on_bar(bar).is_accepted());
        }

        prop_assert_eq!(
            StructureReport::from_engine(&clean),
            StructureReport::from_engine(&noisy)
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn confirmed_level_points_come_from_below(steps in arb_long_walk()) {
        let engine = replay(&walk_bars(&steps));
        for level in engine.levels() {
            match level.source() {
                None => check_promoted(level.index(), level.points(), engine.strokes())?,
                Some(k) => check_promoted(level.index(), level.points(), engine.segments(k))?,
            }
            check_points(level.points())?;
        }
    }
}

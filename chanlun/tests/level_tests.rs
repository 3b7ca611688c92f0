use chrono::{DateTime, Duration, TimeZone, Utc};

use chanlun::{Bar, Engine, EngineConfig, LevelConfig, Mark, Zone};

#[test]
fn level_zero_bootstraps_after_four_strokes() {
    let mut engine = Engine::new("RB2410");
    // five legs give four confirmed strokes once the fifth turn prints
    let bars = zigzag_bars(&ZIGZAG, 5);
    for bar in bars.iter().take(21).cloned() {
        engine.on_bar(bar);
    }
    assert_eq!(engine.strokes().len(), 3);
    assert_eq!(engine.level_count(), 0);

    let outcome = engine.on_bar(bars[21].clone());
    let update = outcome.update().expect("bar should be accepted");
    assert_eq!(update.levels.len(), 1);
    assert_eq!(engine.level_count(), 1);

    let segments = engine.segments(0);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].point.value(), 99.5);
    assert!(!segments[0].point.is_open());
    assert_eq!(segments[1].point.value(), 120.5);
    assert!(segments[1].point.is_open());
}

#[test]
fn level_zero_extends_then_breaks() {
    let mut engine = Engine::new("RB2410");
    for bar in zigzag_bars(&ZIGZAG, 5) {
        engine.on_bar(bar);
    }

    let segments = engine.segments(0);
    let values = segments.iter().map(|x| x.point.value()).collect::<Vec<_>>();
    assert_eq!(values, vec![99.5, 124.5, 95.5]);
    let marks = segments.iter().map(|x| x.point.mark()).collect::<Vec<_>>();
    assert_eq!(marks, vec![Mark::Trough, Mark::Peak, Mark::Trough]);
    assert!(!segments[1].point.is_open(), "broken segment should be frozen");
    assert!(segments[2].point.is_open());
    assert_eq!(segments[1].span, 5);
    assert_eq!(segments[2].span, -1);
    assert_eq!(segments[2].point.anchor(), 6);

    // a pullback that fails to break the first point leaves the level alone
    assert_eq!(engine.level_count(), 1);
}

#[test]
fn pivot_and_signal_follow_third_segment() {
    let mut engine = Engine::new("RB2410");
    for bar in zigzag_bars(&ZIGZAG, 5) {
        engine.on_bar(bar);
    }

    let pivots = engine.pivots(0);
    assert_eq!(pivots.len(), 1);
    let pivot = &pivots[0];
    assert_eq!(pivot.zg, 124.5);
    assert_eq!(pivot.zd, 99.5);
    assert!(pivot.zd < pivot.zg);
    assert_eq!(pivot.weight, 1);
    assert!(pivot.is_open());

    let signals = engine.signals(0);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].value, 95.5);
    assert_eq!(signals[0].zone, Zone::BelowOuter);
    assert_eq!(signals[0].zone_code, -2);
    assert_eq!(signals[0].datetime, engine.segments(0)[2].point.datetime());
}

#[test]
fn larger_bootstrap_delays_level() {
    let config = EngineConfig {
        level: LevelConfig {
            bootstrap_points: 6,
            max_levels: None,
        },
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config("RB2410", config).expect("valid config");
    let bars = zigzag_bars(&ZIGZAG, 5);
    for bar in bars.iter().take(31).cloned() {
        engine.on_bar(bar);
    }
    assert_eq!(engine.level_count(), 0, "five strokes are not enough");

    for bar in bars.iter().skip(31).cloned() {
        engine.on_bar(bar);
    }
    assert_eq!(engine.level_count(), 1);
    assert!(engine.segments(0).len() >= 2);
}

#[test]
fn segments_carry_leg_volume() {
    let mut engine = Engine::new("RB2410");
    for bar in zigzag_bars(&ZIGZAG, 5) {
        engine.on_bar(bar);
    }
    // bars 6..=30 and 31..=35, volume 100 + i
    let volumes = engine.segments(0).iter().map(|x| x.volume).collect::<Vec<_>>();
    assert_eq!(volumes, vec![0.0, 2950.0, 665.0]);
    assert!(engine.signals(0)[0].pattern.is_none(), "three segments hold only two legs");
}

#[test]
fn nested_swings_grow_a_second_level() {
    let mut engine = Engine::new("RB2410");
    for bar in zigzag_bars(&NESTED, 5) {
        engine.on_bar(bar);
    }

    let strokes = engine.strokes();
    assert_eq!(strokes.len(), NESTED.len() - 2, "one stroke per inner turn");

    let level0 = engine.segments(0).iter().map(|x| x.point.value()).collect::<Vec<_>>();
    assert_eq!(level0, vec![117.5, 160.5, 119.5, 150.5, 89.5, 130.5, 69.5]);

    assert!(engine.level_count() >= 2, "level 1 should exist");
    let level1 = engine.segments(1);
    let values = level1.iter().map(|x| x.point.value()).collect::<Vec<_>>();
    assert_eq!(values, vec![117.5, 160.5, 69.5]);
    let anchors = level1.iter().map(|x| x.point.anchor()).collect::<Vec<_>>();
    assert_eq!(anchors, vec![0, 1, 6]);
    assert!(!level1[1].point.is_open());
    assert!(level1[2].point.is_open());
    assert_eq!(level1[2].span, -5);
    for point in level1 {
        assert_eq!(point.point.datetime(), engine.segments(0)[point.point.anchor()].point.datetime());
    }

    let pivot = engine.pivots(1).last().expect("level 1 pivot");
    assert_eq!((pivot.zd, pivot.zg), (117.5, 160.5));
    assert_eq!(engine.signals(1).last().map(|x| x.zone), Some(Zone::BelowOuter));
}

#[test]
fn missing_level_reads_as_empty() {
    let engine = Engine::new("RB2410");
    assert!(engine.level(3).is_none());
    assert!(engine.segments(3).is_empty());
    assert!(engine.pivots(3).is_empty());
    assert!(engine.signals(3).is_empty());
}

const ZIGZAG: [f64; 9] = [120.0, 100.0, 120.0, 104.0, 116.0, 108.0, 124.0, 96.0, 110.0];

/// Three small legs inside each leg of 100, 160, 120, 150, 90, 130, 70, 110.
const NESTED: [f64; 22] = [
    100.0, 136.0, 118.0, 160.0, 136.0, 148.0, 120.0, 138.0, 129.0, 150.0, 114.0, 132.0, 90.0,
    114.0, 102.0, 130.0, 94.0, 112.0, 70.0, 94.0, 82.0, 110.0,
];

fn base_dt() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
}

/// Straight legs of `leg` bars between consecutive extremes, one unit wide.
fn zigzag_bars(extremes: &[f64], leg: usize) -> Vec<Bar> {
    let mut prices = Vec::new();
    for pair in extremes.windows(2) {
        for j in 0..leg {
            prices.push(pair[0] + (pair[1] - pair[0]) * j as f64 / leg as f64);
        }
    }
    if let Some(last) = extremes.last() {
        prices.push(*last);
    }

    prices
        .iter()
        .enumerate()
        .map(|(i, price)| Bar {
            symbol: "RB2410".to_string(),
            datetime: base_dt() + Duration::minutes(i as i64 * 5),
            open_price: *price,
            high_price: price + 0.5,
            low_price: price - 0.5,
            close_price: *price,
            volume: 100.0 + i as f64,
        })
        .collect()
}

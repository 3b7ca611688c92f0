//! Tabular and JSON views over an engine's derived lists.

use std::fs::{File, create_dir_all};
use std::path::Path;

use chrono::{DateTime, Utc};
use polars::df;
use polars::prelude::{DataFrame, ParquetWriter};
use serde::{Deserialize, Serialize};

use crate::bar::{Bar, Fractal, MergedBar};
use crate::constant::{DataError, FractalPower, Mark};
use crate::engine::Engine;
use crate::indicator::MacdPoint;
use crate::pivot::Pivot;
use crate::point::{LevelPoint, Point};
use crate::signal::{Extension, Jing, Signal, ThirdPoint};

fn millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn mark_label(mark: Mark) -> &'static str {
    match mark {
        Mark::Peak => "peak",
        Mark::Trough => "trough",
    }
}

fn jing_label(jing: Jing) -> &'static str {
    match jing {
        Jing::Big => "big",
        Jing::SmallA => "small_a",
        Jing::SmallB => "small_b",
    }
}

fn third_label(third: ThirdPoint) -> &'static str {
    match third {
        ThirdPoint::Buy => "buy",
        ThirdPoint::Sell => "sell",
    }
}

fn extension_label(extension: Extension) -> &'static str {
    match extension {
        Extension::Failed => "failed",
        Extension::Divergent => "divergent",
        Extension::Clean => "clean",
    }
}

fn point_range(point: &Point) -> (Option<i64>, Option<i64>) {
    match point {
        Point::Confirmed {
            range_start,
            range_end,
            ..
        } => (Some(millis(*range_start)), Some(millis(*range_end))),
        Point::Open { .. } => (None, None),
    }
}

pub fn bar_frame(rows: &[Bar]) -> Result<DataFrame, DataError> {
    Ok(df!(
        "datetime" => rows.iter().map(|x| millis(x.datetime)).collect::<Vec<_>>(),
        "open_price" => rows.iter().map(|x| x.open_price).collect::<Vec<_>>(),
        "high_price" => rows.iter().map(|x| x.high_price).collect::<Vec<_>>(),
        "low_price" => rows.iter().map(|x| x.low_price).collect::<Vec<_>>(),
        "close_price" => rows.iter().map(|x| x.close_price).collect::<Vec<_>>(),
        "volume" => rows.iter().map(|x| x.volume).collect::<Vec<_>>()
    )?)
}

pub fn merged_bar_frame(rows: &[MergedBar]) -> Result<DataFrame, DataError> {
    Ok(df!(
        "datetime" => rows.iter().map(|x| millis(x.datetime)).collect::<Vec<_>>(),
        "high_price" => rows.iter().map(|x| x.high_price).collect::<Vec<_>>(),
        "low_price" => rows.iter().map(|x| x.low_price).collect::<Vec<_>>(),
        "close_price" => rows.iter().map(|x| x.close_price).collect::<Vec<_>>(),
        "run" => rows.iter().map(|x| x.run).collect::<Vec<_>>(),
        "bar_start_index" => rows.iter().map(|x| x.bar_start_index as i64).collect::<Vec<_>>(),
        "bar_end_index" => rows.iter().map(|x| x.bar_end_index as i64).collect::<Vec<_>>()
    )?)
}

pub fn fractal_frame(rows: &[Fractal]) -> Result<DataFrame, DataError> {
    Ok(df!(
        "datetime" => rows.iter().map(|x| millis(x.datetime)).collect::<Vec<_>>(),
        "mark" => rows.iter().map(|x| mark_label(x.mark)).collect::<Vec<_>>(),
        "value" => rows.iter().map(|x| x.value).collect::<Vec<_>>(),
        "range_start" => rows.iter().map(|x| millis(x.range_start)).collect::<Vec<_>>(),
        "range_end" => rows.iter().map(|x| millis(x.range_end)).collect::<Vec<_>>(),
        "merged_index" => rows.iter().map(|x| x.merged_index as i64).collect::<Vec<_>>(),
        "strong" => rows.iter().map(|x| x.power == FractalPower::Strong).collect::<Vec<_>>()
    )?)
}

pub fn stroke_frame(rows: &[Point]) -> Result<DataFrame, DataError> {
    let ranges: Vec<_> = rows.iter().map(point_range).collect();
    Ok(df!(
        "datetime" => rows.iter().map(|x| millis(x.datetime())).collect::<Vec<_>>(),
        "mark" => rows.iter().map(|x| mark_label(x.mark())).collect::<Vec<_>>(),
        "value" => rows.iter().map(Point::value).collect::<Vec<_>>(),
        "confirmed" => rows.iter().map(|x| !x.is_open()).collect::<Vec<_>>(),
        "anchor" => rows.iter().map(|x| x.anchor() as i64).collect::<Vec<_>>(),
        "range_start" => ranges.iter().map(|x| x.0).collect::<Vec<_>>(),
        "range_end" => ranges.iter().map(|x| x.1).collect::<Vec<_>>()
    )?)
}

pub fn segment_frame(rows: &[LevelPoint]) -> Result<DataFrame, DataError> {
    let mut frame = stroke_frame(&rows.iter().map(|x| x.point.clone()).collect::<Vec<_>>())?;
    let extra = df!(
        "span" => rows.iter().map(|x| x.span).collect::<Vec<_>>(),
        "macd" => rows.iter().map(|x| x.macd).collect::<Vec<_>>(),
        "volume" => rows.iter().map(|x| x.volume).collect::<Vec<_>>()
    )?;
    frame = frame.hstack(extra.get_columns())?;
    Ok(frame)
}

pub fn pivot_frame(rows: &[Pivot]) -> Result<DataFrame, DataError> {
    Ok(df!(
        "start" => rows.iter().map(|x| x.start().map(millis)).collect::<Vec<_>>(),
        "end" => rows.iter().map(|x| x.end().map(millis)).collect::<Vec<_>>(),
        "zg" => rows.iter().map(|x| x.zg).collect::<Vec<_>>(),
        "zd" => rows.iter().map(|x| x.zd).collect::<Vec<_>>(),
        "gg" => rows.iter().map(Pivot::gg_top).collect::<Vec<_>>(),
        "dd" => rows.iter().map(Pivot::dd_bottom).collect::<Vec<_>>(),
        "weight" => rows.iter().map(|x| x.weight as i64).collect::<Vec<_>>(),
        "streak" => rows.iter().map(|x| x.streak).collect::<Vec<_>>(),
        "real_streak" => rows.iter().map(|x| x.real_streak).collect::<Vec<_>>(),
        "breakout" => rows
            .iter()
            .map(|x| x.breakout.as_ref().map(|b| b.direction.sign()))
            .collect::<Vec<_>>()
    )?)
}

pub fn signal_frame(rows: &[Signal]) -> Result<DataFrame, DataError> {
    Ok(df!(
        "datetime" => rows.iter().map(|x| millis(x.datetime)).collect::<Vec<_>>(),
        "value" => rows.iter().map(|x| x.value).collect::<Vec<_>>(),
        "zone_code" => rows.iter().map(|x| i32::from(x.zone_code)).collect::<Vec<_>>(),
        "pivot_streak" => rows.iter().map(|x| x.pivot_streak).collect::<Vec<_>>(),
        "pivot_weight" => rows.iter().map(|x| x.pivot_weight as i64).collect::<Vec<_>>(),
        "divergence" => rows.iter().map(|x| x.divergence).collect::<Vec<_>>(),
        "jing" => rows
            .iter()
            .map(|x| x.pattern.and_then(|p| p.jing).map(jing_label))
            .collect::<Vec<_>>(),
        "third" => rows
            .iter()
            .map(|x| x.pattern.and_then(|p| p.third).map(third_label))
            .collect::<Vec<_>>(),
        "extension" => rows
            .iter()
            .map(|x| x.pattern.map(|p| extension_label(p.extension)))
            .collect::<Vec<_>>()
    )?)
}

pub fn macd_frame(rows: &[MacdPoint]) -> Result<DataFrame, DataError> {
    Ok(df!(
        "datetime" => rows.iter().map(|x| millis(x.datetime)).collect::<Vec<_>>(),
        "dif" => rows.iter().map(|x| x.dif).collect::<Vec<_>>(),
        "dea" => rows.iter().map(|x| x.dea).collect::<Vec<_>>(),
        "histogram" => rows.iter().map(|x| x.histogram).collect::<Vec<_>>()
    )?)
}

fn write_frame(output_dir: &Path, name: &str, mut frame: DataFrame) -> Result<(), DataError> {
    let mut file = File::create(output_dir.join(format!("{name}.parquet")))?;
    ParquetWriter::new(&mut file).finish(&mut frame)?;
    Ok(())
}

/// Writes one parquet file per derived list, plus three per level.
pub fn write_parquet_snapshot(engine: &Engine, output_dir: impl AsRef<Path>) -> Result<(), DataError> {
    let output_dir = output_dir.as_ref();
    create_dir_all(output_dir)?;

    write_frame(output_dir, "bars", bar_frame(engine.bars())?)?;
    write_frame(output_dir, "merged_bars", merged_bar_frame(engine.merged_bars())?)?;
    write_frame(output_dir, "fractals", fractal_frame(engine.fractals())?)?;
    write_frame(output_dir, "strokes", stroke_frame(engine.strokes())?)?;
    write_frame(output_dir, "macd", macd_frame(engine.macd())?)?;

    for level in engine.levels() {
        let k = level.index();
        write_frame(output_dir, &format!("level{k}_segments"), segment_frame(level.points())?)?;
        write_frame(output_dir, &format!("level{k}_pivots"), pivot_frame(level.pivots())?)?;
        write_frame(output_dir, &format!("level{k}_signals"), signal_frame(level.signals())?)?;
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub level: usize,
    pub segments: Vec<LevelPoint>,
    pub pivots: Vec<Pivot>,
    pub signals: Vec<Signal>,
}

/// Full structure dump of one engine, for JSON reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub symbol: String,
    pub bar_count: usize,
    pub merged_bars: Vec<MergedBar>,
    pub fractals: Vec<Fractal>,
    pub strokes: Vec<Point>,
    pub levels: Vec<LevelReport>,
}

impl StructureReport {
    pub fn from_engine(engine: &Engine) -> Self {
        Self {
            symbol: engine.symbol().to_string(),
            bar_count: engine.bars().len(),
            merged_bars: engine.merged_bars().to_vec(),
            fractals: engine.fractals().to_vec(),
            strokes: engine.strokes().to_vec(),
            levels: engine
                .levels()
                .iter()
                .map(|level| LevelReport {
                    level: level.index(),
                    segments: level.points().to_vec(),
                    pivots: level.pivots().to_vec(),
                    signals: level.signals().to_vec(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

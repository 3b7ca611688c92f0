use tracing::debug;

use crate::bar::{Fractal, MergedBar};
use crate::constant::{Const, FractalPower, Mark};
use crate::merger::MergeOutcome;

/// Append-only list of turning points over the merged bars.
#[derive(Debug, Default, Clone)]
pub struct FractalDetector {
    rows: Vec<Fractal>,
}

impl FractalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests the three newest merged bars, but only when the merger just
    /// appended a tail that flipped direction. Returns the new fractal.
    pub fn on_merge(&mut self, merged: &[MergedBar], outcome: MergeOutcome) -> Option<&Fractal> {
        if !outcome.flipped || merged.len() < Const::MIN_FRACTAL_BARS {
            return None;
        }
        let fractal = detect(merged)?;
        debug!(
            mark = ?fractal.mark,
            value = fractal.value,
            datetime = %fractal.datetime,
            "fractal created"
        );
        self.rows.push(fractal);
        self.rows.last()
    }

    pub fn rows(&self) -> &[Fractal] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Fractal> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds the fractal formed by the last three merged bars, if any.
pub fn detect(merged: &[MergedBar]) -> Option<Fractal> {
    let n = merged.len();
    if n < Const::MIN_FRACTAL_BARS {
        return None;
    }
    let (left, middle, right) = (&merged[n - 3], &merged[n - 2], &merged[n - 1]);
    let mark = Fractal::verify(left, middle, right)?;
    Some(Fractal {
        datetime: middle.datetime,
        mark,
        value: middle.extreme(mark),
        range_start: left.datetime,
        range_end: right.datetime,
        merged_index: n - 2,
        power: power_of(mark, left, right),
    })
}

/// A peak is strong when the confirming bar closes below the midpoint of the
/// bar before the peak; a trough when it closes above it.
fn power_of(mark: Mark, left: &MergedBar, right: &MergedBar) -> FractalPower {
    let strong = match mark {
        Mark::Peak => right.close_price < left.midpoint(),
        Mark::Trough => right.close_price > left.midpoint(),
    };
    if strong {
        FractalPower::Strong
    } else {
        FractalPower::Weak
    }
}

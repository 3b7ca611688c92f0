//! Inclusion merging of raw bars.
//!
//! The tail merged bar is widened in place while raw bars stay contained in
//! it; once a bar breaks containment a new tail is appended and the previous
//! one is frozen. Each merged bar carries a signed run counter.

use crate::bar::{Bar, MergedBar};
use crate::constant::ListChange;

/// What a single raw bar did to the merged list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub change: ListChange,
    /// A new tail was appended whose direction opposes the previous run.
    pub flipped: bool,
}

#[derive(Debug, Default, Clone)]
pub struct BarMerger {
    rows: Vec<MergedBar>,
}

impl BarMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one accepted raw bar into the merged list. `bar_index` is the
    /// bar's position in the raw history.
    pub fn on_bar(&mut self, bar: &Bar, bar_index: usize) -> MergeOutcome {
        let Some(tail) = self.rows.last_mut() else {
            self.rows.push(MergedBar {
                datetime: bar.datetime,
                high_price: bar.high_price,
                low_price: bar.low_price,
                close_price: bar.close_price,
                run: 0,
                bar_start_index: bar_index,
                bar_end_index: bar_index,
            });
            return MergeOutcome {
                change: ListChange::Appended,
                flipped: false,
            };
        };

        if tail.is_inclusive(bar.high_price, bar.low_price) {
            absorb(tail, bar, bar_index);
            return MergeOutcome {
                change: ListChange::Replaced,
                flipped: false,
            };
        }

        let up = bar.high_price > tail.high_price;
        let previous_run = tail.run;
        let run = match (up, previous_run.signum()) {
            (true, 1) => previous_run + 1,
            (false, -1) => previous_run - 1,
            (true, _) => 1,
            (false, _) => -1,
        };
        let flipped = previous_run != 0 && previous_run.signum() != run.signum();

        self.rows.push(MergedBar {
            datetime: bar.datetime,
            high_price: bar.high_price,
            low_price: bar.low_price,
            close_price: bar.close_price,
            run,
            bar_start_index: bar_index,
            bar_end_index: bar_index,
        });
        MergeOutcome {
            change: ListChange::Appended,
            flipped,
        }
    }

    pub fn rows(&self) -> &[MergedBar] {
        &self.rows
    }

    pub fn last(&self) -> Option<&MergedBar> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Widens `tail` with a contained bar along the tail's run direction. A tail
/// with no direction yet is treated as a down run.
fn absorb(tail: &mut MergedBar, bar: &Bar, bar_index: usize) {
    if tail.run > 0 {
        if bar.high_price >= tail.high_price {
            tail.datetime = bar.datetime;
        }
        tail.high_price = tail.high_price.max(bar.high_price);
        tail.low_price = tail.low_price.max(bar.low_price);
    } else {
        if bar.low_price <= tail.low_price {
            tail.datetime = bar.datetime;
        }
        tail.high_price = tail.high_price.min(bar.high_price);
        tail.low_price = tail.low_price.min(bar.low_price);
    }
    tail.close_price = bar.close_price;
    tail.bar_end_index = bar_index;
    tail.run += tail.run.signum();
}

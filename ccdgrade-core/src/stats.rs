//! Running statistics over graded events.
//!
//! The accumulator holds everything a calibration file reports: per-grade
//! counters and pulse-height histograms, sum and position bounds, and the
//! rejection counters.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use crate::event::{Grade, HISTOGRAM_BINS, MAXADU};
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Padding, in bins, added around trimmed histogram ranges.
pub const EXTADU: i32 = 8;

/// Histogram bins need more than this many counts to widen the
/// display range.
const DISPLAY_MIN_COUNT: u32 = 2;

/// Per-grade counters, histograms and bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsAccumulator {
    counts: [u64; Grade::COUNT],
    histogram: Vec<u32>,
    total: u64,
    below_threshold: u64,
    out_of_bounds: u64,
    center_min: i32,
    min_adu: i32,
    max_adu: i32,
    min_display: i32,
    max_display: i32,
    x_min: i32,
    x_max: i32,
    y_min: i32,
    y_max: i32,
    x_sum: i64,
    y_sum: i64,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: [0; Grade::COUNT],
            histogram: vec![0; Grade::COUNT * HISTOGRAM_BINS],
            total: 0,
            below_threshold: 0,
            out_of_bounds: 0,
            center_min: MAXADU,
            min_adu: MAXADU,
            max_adu: 0,
            min_display: MAXADU,
            max_display: 0,
            x_min: i32::MAX,
            x_max: 0,
            y_min: i32::MAX,
            y_max: 0,
            x_sum: 0,
            y_sum: 0,
        }
    }

    /// Tracks the smallest central pulse height seen, accepted or not.
    #[inline]
    pub fn observe_center(&mut self, center: f32) {
        if center < self.center_min as f32 {
            self.center_min = center as i32;
        }
    }

    /// Counts an event rejected by the event threshold.
    #[inline]
    pub fn reject_below_threshold(&mut self) {
        self.below_threshold += 1;
    }

    /// Counts an event whose sum fell outside `[0, MAXADU)`.
    #[inline]
    pub fn reject_out_of_bounds(&mut self) {
        self.out_of_bounds += 1;
    }

    /// Records an accepted event.
    ///
    /// The caller guarantees `0 <= sum < MAXADU`.
    pub fn record(&mut self, x: i32, y: i32, grade: Grade, sum: i32) {
        debug_assert!((0..MAXADU).contains(&sum), "sum {sum} out of range");

        self.max_adu = self.max_adu.max(sum);
        self.min_adu = self.min_adu.min(sum);
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
        self.x_sum += i64::from(x);
        self.y_sum += i64::from(y);
        self.total += 1;
        self.counts[grade.index()] += 1;

        let bin = &mut self.histogram[grade.index() * HISTOGRAM_BINS + sum as usize];
        *bin += 1;
        if *bin > DISPLAY_MIN_COUNT {
            self.max_display = self.max_display.max(sum);
            self.min_display = self.min_display.min(sum);
        }
    }

    /// Folds another accumulator into this one.
    ///
    /// The display bounds are recomputed from the merged histograms, so the
    /// result matches processing both event streams in one accumulator.
    pub fn merge(&mut self, other: &StatsAccumulator) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
        for (mine, theirs) in self.histogram.iter_mut().zip(other.histogram.iter()) {
            *mine += theirs;
        }
        self.total += other.total;
        self.below_threshold += other.below_threshold;
        self.out_of_bounds += other.out_of_bounds;
        self.center_min = self.center_min.min(other.center_min);
        self.min_adu = self.min_adu.min(other.min_adu);
        self.max_adu = self.max_adu.max(other.max_adu);
        self.x_min = self.x_min.min(other.x_min);
        self.x_max = self.x_max.max(other.x_max);
        self.y_min = self.y_min.min(other.y_min);
        self.y_max = self.y_max.max(other.y_max);
        self.x_sum += other.x_sum;
        self.y_sum += other.y_sum;

        self.min_display = MAXADU;
        self.max_display = 0;
        for bin in 0..HISTOGRAM_BINS {
            let crowded = (0..Grade::COUNT)
                .any(|g| self.histogram[g * HISTOGRAM_BINS + bin] > DISPLAY_MIN_COUNT);
            if crowded {
                let adu = bin as i32;
                self.min_display = self.min_display.min(adu);
                self.max_display = self.max_display.max(adu);
            }
        }
    }

    /// Accepted events of one grade.
    #[must_use]
    pub fn count(&self, grade: Grade) -> u64 {
        self.counts[grade.index()]
    }

    /// Accepted events per grade, in grade order.
    #[must_use]
    pub fn counts(&self) -> &[u64; Grade::COUNT] {
        &self.counts
    }

    /// Pulse-height histogram of one grade, indexed by ADU.
    #[must_use]
    pub fn histogram(&self, grade: Grade) -> &[u32] {
        let start = grade.index() * HISTOGRAM_BINS;
        &self.histogram[start..start + HISTOGRAM_BINS]
    }

    /// Counts of all eight grades for one ADU bin.
    #[must_use]
    pub fn histogram_row(&self, adu: usize) -> [u32; Grade::COUNT] {
        let mut row = [0; Grade::COUNT];
        for (g, slot) in row.iter_mut().enumerate() {
            *slot = self.histogram[g * HISTOGRAM_BINS + adu];
        }
        row
    }

    /// Total accepted events.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Events rejected by the event threshold.
    #[must_use]
    pub fn below_threshold(&self) -> u64 {
        self.below_threshold
    }

    /// Events rejected because the sum was out of bounds.
    #[must_use]
    pub fn out_of_bounds(&self) -> u64 {
        self.out_of_bounds
    }

    /// Smallest central pulse height seen (`MAXADU` before any event).
    #[must_use]
    pub fn center_min(&self) -> i32 {
        self.center_min
    }

    /// Smallest accepted sum (`MAXADU` before any acceptance).
    #[must_use]
    pub fn min_adu(&self) -> i32 {
        self.min_adu
    }

    /// Largest accepted sum.
    #[must_use]
    pub fn max_adu(&self) -> i32 {
        self.max_adu
    }

    /// Smallest sum whose bin holds three or more events of one grade.
    #[must_use]
    pub fn min_display(&self) -> i32 {
        self.min_display
    }

    /// Largest sum whose bin holds three or more events of one grade.
    #[must_use]
    pub fn max_display(&self) -> i32 {
        self.max_display
    }

    /// `(min, max)` of accepted x coordinates.
    #[must_use]
    pub fn x_bounds(&self) -> (i32, i32) {
        (self.x_min, self.x_max)
    }

    /// `(min, max)` of accepted y coordinates.
    #[must_use]
    pub fn y_bounds(&self) -> (i32, i32) {
        (self.y_min, self.y_max)
    }

    /// Running sums of accepted x and y coordinates.
    #[must_use]
    pub fn position_sums(&self) -> (i64, i64) {
        (self.x_sum, self.y_sum)
    }

    /// Integer mean x of accepted events (0 when empty).
    #[must_use]
    pub fn x_average(&self) -> i64 {
        self.x_sum / self.total.max(1) as i64
    }

    /// Integer mean y of accepted events (0 when empty).
    #[must_use]
    pub fn y_average(&self) -> i64 {
        self.y_sum / self.total.max(1) as i64
    }

    /// Area spanned by accepted positions (0 when empty).
    #[must_use]
    pub fn total_pixels(&self) -> i64 {
        if self.total == 0 {
            return 0;
        }
        (i64::from(self.x_max) - i64::from(self.x_min))
            * (i64::from(self.y_max) - i64::from(self.y_min))
    }

    /// ADU range covering every accepted sum, padded by [`EXTADU`].
    ///
    /// Empty when no event was accepted.
    #[must_use]
    pub fn histogram_range(&self) -> Range<usize> {
        padded_range(self.min_adu, self.max_adu)
    }

    /// ADU range covering statistically meaningful bins, padded by
    /// [`EXTADU`]. Used to trim plot axes.
    #[must_use]
    pub fn display_range(&self) -> Range<usize> {
        padded_range(self.min_display, self.max_display)
    }

    /// Snapshot of the scalar fields.
    #[must_use]
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            counts: self.counts,
            total: self.total,
            below_threshold: self.below_threshold,
            out_of_bounds: self.out_of_bounds,
            center_min: self.center_min,
            min_adu: self.min_adu,
            max_adu: self.max_adu,
            min_display: self.min_display,
            max_display: self.max_display,
            x_min: self.x_min,
            x_max: self.x_max,
            x_average: self.x_average(),
            y_min: self.y_min,
            y_max: self.y_max,
            y_average: self.y_average(),
        }
    }
}

fn padded_range(min: i32, max: i32) -> Range<usize> {
    let low = if min < EXTADU { 0 } else { min - EXTADU };
    let high = if max >= MAXADU - EXTADU {
        MAXADU
    } else {
        max + 1 + EXTADU
    };
    if high <= low {
        return 0..0;
    }
    low as usize..high as usize
}

/// Scalar statistics of a run, for reports and JSON export.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatsSummary {
    /// Accepted events per grade.
    pub counts: [u64; Grade::COUNT],
    /// Total accepted events.
    pub total: u64,
    /// Events below the event threshold.
    pub below_threshold: u64,
    /// Events with out-of-bounds sums.
    pub out_of_bounds: u64,
    /// Smallest central pulse height.
    pub center_min: i32,
    /// Smallest accepted sum.
    pub min_adu: i32,
    /// Largest accepted sum.
    pub max_adu: i32,
    /// Lower display bound.
    pub min_display: i32,
    /// Upper display bound.
    pub max_display: i32,
    /// Smallest x.
    pub x_min: i32,
    /// Largest x.
    pub x_max: i32,
    /// Mean x.
    pub x_average: i64,
    /// Smallest y.
    pub y_min: i32,
    /// Largest y.
    pub y_max: i32,
    /// Mean y.
    pub y_average: i64,
}

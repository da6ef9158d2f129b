//! Event classification.
//!
//! An event passes through the following states:
//!
//! 1. center below the event threshold: rejected, grade stays unknown
//! 2. reset-clock correction, split mask, grade lookup, corner correction
//! 3. grade filter (if configured)
//! 4. sum outside `[0, MAXADU)`: rejected as out of bounds
//! 5. accepted, statistics recorded
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::event::{Event, Grade, CENTER, MAXADU, NEIGHBORHOOD};
use crate::filter::GradeFilter;
use crate::reset::ResetCorrection;
use crate::stats::StatsAccumulator;
use crate::table::GradeTable;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Split-mask bit of each neighborhood position. The center has none.
const MASK_BITS: [u8; NEIGHBORHOOD] = [0x01, 0x02, 0x04, 0x08, 0x00, 0x10, 0x20, 0x40, 0x80];

/// Positions summed whenever they pass the split threshold: the center
/// and its four edge neighbors. Corners only enter through the table.
const EDGE_SUMMED: [bool; NEIGHBORHOOD] = [false, true, false, true, true, true, false, true, false];

/// Selection of pixels that make up the diagnostic `p9` sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum P9Policy {
    /// All nine pixels.
    #[default]
    All,
    /// Center plus the four edge neighbors (1, 3, 5, 7).
    Cross,
    /// Center column (1, 4, 7).
    Column,
    /// Center row (3, 4, 5).
    Row,
    /// No partial sum; reports list the raw pixels instead.
    List,
}

impl P9Policy {
    /// Returns true if position `j` contributes to `p9`.
    #[inline]
    #[must_use]
    pub fn includes(self, j: usize) -> bool {
        match self {
            P9Policy::All => true,
            P9Policy::Cross => matches!(j, 1 | 3 | 4 | 5 | 7),
            P9Policy::Column => matches!(j, 1 | 4 | 7),
            P9Policy::Row => matches!(j, 3..=5),
            P9Policy::List => false,
        }
    }
}

impl FromStr for P9Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "p9" => Ok(P9Policy::All),
            "p1357" => Ok(P9Policy::Cross),
            "p17" => Ok(P9Policy::Column),
            "p35" => Ok(P9Policy::Row),
            "plist" => Ok(P9Policy::List),
            other => Err(Error::InvalidP9Policy(other.to_string())),
        }
    }
}

impl fmt::Display for P9Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            P9Policy::All => "p9",
            P9Policy::Cross => "p1357",
            P9Policy::Column => "p17",
            P9Policy::Row => "p35",
            P9Policy::List => "plist",
        };
        f.write_str(s)
    }
}

/// Configuration for the event classifier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassifierConfig {
    /// Minimum central pulse height of a real event.
    pub event_threshold: i32,
    /// Minimum pulse height of a touched neighbor.
    pub split_threshold: i32,
    /// Reset-clock correction applied before grading.
    pub reset: ResetCorrection,
    /// Pixels summed into `p9`.
    pub p9_policy: P9Policy,
    /// Grade filter configuration (bit `i` accepts grade `i`, bit 7
    /// accepts OTHER masks). `None` disables filtering.
    pub grade_filter: Option<u8>,
    /// Record statistics for events rejected by the grade filter.
    pub record_filtered: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            event_threshold: 0,
            split_threshold: 0,
            reset: ResetCorrection::none(),
            p9_policy: P9Policy::All,
            grade_filter: None,
            record_filtered: false,
        }
    }
}

impl ClassifierConfig {
    /// Creates a configuration with the given thresholds.
    #[must_use]
    pub fn new(event_threshold: i32, split_threshold: i32) -> Self {
        Self {
            event_threshold,
            split_threshold,
            ..Self::default()
        }
    }

    /// Set the reset-clock correction.
    #[must_use]
    pub fn with_reset(mut self, reset: ResetCorrection) -> Self {
        self.reset = reset;
        self
    }

    /// Set the partial-sum policy.
    #[must_use]
    pub fn with_p9_policy(mut self, policy: P9Policy) -> Self {
        self.p9_policy = policy;
        self
    }

    /// Set the grade filter configuration.
    #[must_use]
    pub fn with_grade_filter(mut self, filter: u8) -> Self {
        self.grade_filter = Some(filter);
        self
    }

    /// Set whether filtered events still update statistics.
    #[must_use]
    pub fn with_record_filtered(mut self, record: bool) -> Self {
        self.record_filtered = record;
        self
    }
}

/// Terminal state of a classified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Outcome {
    /// Center pixel below the event threshold.
    BelowThreshold,
    /// Corrected sum outside `[0, MAXADU)`.
    OutOfBounds,
    /// Split mask rejected by the grade filter.
    FilteredOut,
    /// Accepted and recorded.
    Accepted,
}

/// Result of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Terminal state.
    pub outcome: Outcome,
    /// Split mask (0 when rejected before grading).
    pub mask: u8,
    /// Grade, `None` when rejected before grading.
    pub grade: Option<Grade>,
    /// Graded pulse-height sum.
    pub sum: i32,
    /// Diagnostic partial sum.
    pub p9: i32,
}

impl Classification {
    fn below_threshold() -> Self {
        Self {
            outcome: Outcome::BelowThreshold,
            mask: 0,
            grade: None,
            sum: 0,
            p9: 0,
        }
    }

    /// Returns true if the event was accepted.
    #[inline]
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }

    /// Grade report code (-1 when unknown).
    #[inline]
    #[must_use]
    pub fn grade_code(&self) -> i32 {
        Grade::code(self.grade)
    }
}

/// Split-threshold view of a neighborhood.
struct SplitPixels {
    mask: u8,
    /// Truncated pulse heights, zeroed below the split threshold.
    pixels: [i32; NEIGHBORHOOD],
    /// Sum of the center and the touched edge neighbors.
    edge_sum: i32,
    p9: i32,
}

/// Grades events against the shared [`GradeTable`].
#[derive(Debug, Clone)]
pub struct EventClassifier {
    config: ClassifierConfig,
    table: &'static GradeTable,
    filter: Option<GradeFilter>,
}

impl EventClassifier {
    /// Creates a classifier.
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        let filter = config.grade_filter.map(GradeFilter::new);
        Self {
            config,
            table: GradeTable::global(),
            filter,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Grade table used for lookups.
    #[must_use]
    pub fn table(&self) -> &GradeTable {
        self.table
    }

    /// Grade filter, if configured.
    #[must_use]
    pub fn filter(&self) -> Option<&GradeFilter> {
        self.filter.as_ref()
    }

    /// Classifies one event and updates `stats`.
    ///
    /// The event's pulse heights are reset-corrected in place and its
    /// `grade`, `sum` and `p9` fields are filled in.
    pub fn classify(&self, event: &mut Event, stats: &mut StatsAccumulator) -> Classification {
        let center = event.center();
        stats.observe_center(center);
        if center < self.config.event_threshold as f32 {
            stats.reject_below_threshold();
            event.grade = None;
            return Classification::below_threshold();
        }

        self.config.reset.apply(&mut event.data);

        let split = self.split(&event.data);
        let entry = self.table.lookup(split.mask);
        let sum = entry
            .extra_pixels()
            .fold(split.edge_sum, |acc, idx| acc.saturating_add(split.pixels[idx]));
        let grade = entry.grade();

        event.grade = Some(grade);
        event.sum = sum;
        event.p9 = split.p9;

        let mut result = Classification {
            outcome: Outcome::Accepted,
            mask: split.mask,
            grade: Some(grade),
            sum,
            p9: split.p9,
        };

        let passes = self.filter.as_ref().map_or(true, |f| f.accepts(split.mask));
        if !passes && !self.config.record_filtered {
            result.outcome = Outcome::FilteredOut;
            return result;
        }

        if !(0..MAXADU).contains(&sum) {
            stats.reject_out_of_bounds();
            result.outcome = Outcome::OutOfBounds;
            return result;
        }

        stats.record(event.x, event.y, grade, sum);
        if !passes {
            result.outcome = Outcome::FilteredOut;
        }
        result
    }

    fn split(&self, data: &[f32; NEIGHBORHOOD]) -> SplitPixels {
        let threshold = self.config.split_threshold;
        let policy = self.config.p9_policy;

        let mut out = SplitPixels {
            mask: 0,
            pixels: [0; NEIGHBORHOOD],
            edge_sum: 0,
            p9: 0,
        };

        for (j, &value) in data.iter().enumerate() {
            let ph = value as i32;
            if policy.includes(j) {
                out.p9 = out.p9.saturating_add(ph);
            }
            if j != CENTER && ph < threshold {
                continue;
            }
            out.pixels[j] = ph;
            out.mask |= MASK_BITS[j];
            if EDGE_SUMMED[j] {
                out.edge_sum = out.edge_sum.saturating_add(ph);
            }
        }
        out
    }
}

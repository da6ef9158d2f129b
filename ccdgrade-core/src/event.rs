//! Event and grade types for CCD detection events.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of pulse-height samples in an event (3x3 neighborhood).
pub const NEIGHBORHOOD: usize = 9;

/// Index of the central pixel in the row-major neighborhood.
pub const CENTER: usize = 4;

/// Exclusive upper bound on a graded pulse-height sum (ADU).
pub const MAXADU: i32 = 4096;

/// Number of histogram bins per grade.
pub const HISTOGRAM_BINS: usize = MAXADU as usize;

/// Morphological grade of an event.
///
/// Grades are mutually exclusive and are derived from which of the eight
/// neighbors of the central pixel exceed the split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Grade {
    /// Pure single pixel.
    Single = 0,
    /// Single pixel plus detached corner(s).
    SinglePlusCorner = 1,
    /// Vertical split (plus detached corners).
    VerticalSplit = 2,
    /// Left split (plus detached corners).
    LeftSplit = 3,
    /// Right split (plus detached corners).
    RightSplit = 4,
    /// Single-sided split plus a touched corner.
    SingleSidedPlusCorner = 5,
    /// L or square (plus a detached corner).
    EllOrSquarePlusCorner = 6,
    /// Everything else.
    Other = 7,
}

impl Grade {
    /// Number of grades.
    pub const COUNT: usize = 8;

    /// All grades in index order.
    pub const ALL: [Grade; Grade::COUNT] = [
        Grade::Single,
        Grade::SinglePlusCorner,
        Grade::VerticalSplit,
        Grade::LeftSplit,
        Grade::RightSplit,
        Grade::SingleSidedPlusCorner,
        Grade::EllOrSquarePlusCorner,
        Grade::Other,
    ];

    /// Returns the grade for a numeric index.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGrade`] if `index` is 8 or larger.
    pub fn from_index(index: u8) -> Result<Self> {
        Grade::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(Error::InvalidGrade(index))
    }

    /// Returns the numeric index (0..8), also the histogram row.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short column label used in calibration files.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Grade::Single => "S",
            Grade::SinglePlusCorner => "S+",
            Grade::VerticalSplit => "Pv",
            Grade::LeftSplit => "Pl",
            Grade::RightSplit => "Pr",
            Grade::SingleSidedPlusCorner => "P+",
            Grade::EllOrSquarePlusCorner => "L+Q",
            Grade::Other => "O",
        }
    }

    /// Human readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Grade::Single => "pure single",
            Grade::SinglePlusCorner => "single + corner(s)",
            Grade::VerticalSplit => "vertical split (+detouched corner(s))",
            Grade::LeftSplit => "left split (+detouched corner(s))",
            Grade::RightSplit => "right split (+detouched corner(s))",
            Grade::SingleSidedPlusCorner => "single-sided split + a touched corner",
            Grade::EllOrSquarePlusCorner => "L or square (+a detouched corner)",
            Grade::Other => "all others",
        }
    }

    /// Numeric code for reports: the grade index, or -1 when unknown.
    #[inline]
    #[must_use]
    pub fn code(grade: Option<Grade>) -> i32 {
        grade.map_or(-1, |g| i32::from(g as u8))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A single detected charge deposition.
///
/// Holds the 3x3 pulse-height neighborhood (row-major, index 4 is the
/// center) plus position and frame metadata. The classifier fills in
/// `grade`, `sum` and `p9`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Readout mode byte carried through from the record.
    pub mode: u8,
    /// Frame number.
    pub frame: i32,
    /// Chip number.
    pub chip: i32,
    /// X coordinate of the central pixel.
    pub x: i32,
    /// Y coordinate of the central pixel.
    pub y: i32,
    /// Pulse heights, row-major 3x3.
    pub data: [f32; NEIGHBORHOOD],
    /// Grade, `None` until classified.
    pub grade: Option<Grade>,
    /// Graded pulse-height sum.
    pub sum: i32,
    /// Diagnostic partial sum.
    pub p9: i32,
}

impl Event {
    /// Creates an unclassified event at `(x, y)`.
    #[must_use]
    pub fn new(x: i32, y: i32, data: [f32; NEIGHBORHOOD]) -> Self {
        Self {
            mode: 0,
            frame: -1,
            chip: -1,
            x,
            y,
            data,
            grade: None,
            sum: 0,
            p9: 0,
        }
    }

    /// Sets the frame and chip identifiers.
    #[must_use]
    pub fn with_frame(mut self, frame: i32, chip: i32) -> Self {
        self.frame = frame;
        self.chip = chip;
        self
    }

    /// Sets the mode byte.
    #[must_use]
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the central pulse height.
    #[inline]
    #[must_use]
    pub fn center(&self) -> f32 {
        self.data[CENTER]
    }

    /// Returns the report code of the grade (-1 when unknown).
    #[inline]
    #[must_use]
    pub fn grade_code(&self) -> i32 {
        Grade::code(self.grade)
    }
}

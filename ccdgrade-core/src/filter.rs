//! Grade selection for filtered event lists.

use crate::event::{Grade, MAXADU};
use crate::table::{GradeTable, NMAP};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bit of the configuration that passes genuine OTHER-grade masks.
pub const PASS_OTHER: u8 = 0x80;

/// Pass/fail gate on the split mask of a classified event.
///
/// Built from an 8-bit configuration: bit `i` (0..=6) accepts every mask
/// of grade `i`, bit 7 accepts masks that belong to none of grades 0-6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeFilter {
    config: u8,
    accept: MaskSet,
    not_other: MaskSet,
}

impl GradeFilter {
    /// Creates a filter from its bit configuration.
    #[must_use]
    pub fn new(config: u8) -> Self {
        let mut accept = MaskSet::default();
        let mut not_other = MaskSet::default();

        for grade in &Grade::ALL[..Grade::COUNT - 1] {
            let patterns = GradeTable::patterns(*grade);
            if config & (1 << grade.index()) != 0 {
                accept.extend(patterns);
            }
            not_other.extend(patterns);
        }

        log::debug!(
            "grade filter {config:#04x}: {} accepted masks, pass other = {}",
            accept.len(),
            config & PASS_OTHER != 0
        );

        Self {
            config,
            accept,
            not_other,
        }
    }

    /// Filter that passes every grade.
    #[must_use]
    pub fn all() -> Self {
        Self::new(0xff)
    }

    /// Creates a filter from a list of grade numbers.
    ///
    /// Grade 7 sets the pass-OTHER bit.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGrade`] for grades outside 0..=7.
    pub fn from_grades(grades: &[u8]) -> Result<Self> {
        let mut config = 0u8;
        for &grade in grades {
            if grade >= 8 {
                return Err(Error::InvalidGrade(grade));
            }
            config |= 1 << grade;
        }
        Ok(Self::new(config))
    }

    /// Bit configuration this filter was built from.
    #[must_use]
    pub fn config(&self) -> u8 {
        self.config
    }

    /// Returns true if `mask` passes the filter.
    #[inline]
    #[must_use]
    pub fn accepts(&self, mask: u8) -> bool {
        if self.accept.contains(mask) {
            return true;
        }
        self.config & PASS_OTHER != 0 && !self.not_other.contains(mask)
    }
}

/// Fixed 256-bit membership set over split masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct MaskSet([u64; NMAP / 64]);

impl MaskSet {
    fn insert(&mut self, mask: u8) {
        self.0[usize::from(mask >> 6)] |= 1u64 << (mask & 0x3f);
    }

    fn extend(&mut self, masks: &[u8]) {
        for &mask in masks {
            self.insert(mask);
        }
    }

    #[inline]
    fn contains(&self, mask: u8) -> bool {
        self.0[usize::from(mask >> 6)] & (1u64 << (mask & 0x3f)) != 0
    }

    fn len(&self) -> u32 {
        self.0.iter().map(|word| word.count_ones()).sum()
    }
}

/// Half-open `[low, high)` window on the graded sum for reporting.
///
/// Statistics are recorded regardless; the window only decides whether an
/// accepted event is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulseHeightWindow {
    /// Inclusive lower bound.
    pub low: i32,
    /// Exclusive upper bound.
    pub high: i32,
}

impl Default for PulseHeightWindow {
    fn default() -> Self {
        Self {
            low: 0,
            high: MAXADU - 1,
        }
    }
}

impl PulseHeightWindow {
    /// Creates a window.
    #[must_use]
    pub fn new(low: i32, high: i32) -> Self {
        Self { low, high }
    }

    /// Returns true if `sum` lies inside the window.
    #[inline]
    #[must_use]
    pub fn contains(&self, sum: i32) -> bool {
        sum >= self.low && sum < self.high
    }
}

//! Reset-clock charge correction.
//!
//! During serial-register reset a fraction of the signal leaks backward
//! along the clocking direction. The correction subtracts `factor` times
//! the preceding pixel from each affected pixel. Styles cascade: style 6
//! also applies the style 3 and style 1 stages, style 3 also applies
//! style 1. Each statement reads whatever the array holds at that point,
//! so stage order matters.
#![allow(clippy::cast_possible_truncation)]

use crate::event::NEIGHBORHOOD;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which reset-correction stages are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResetStyle {
    /// No correction.
    #[default]
    None,
    /// Center-to-right stage only.
    One,
    /// Adds the top and bottom row stages.
    Three,
    /// Adds the left column stages.
    Six,
}

impl FromStr for ResetStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "0" => Ok(ResetStyle::None),
            "1" => Ok(ResetStyle::One),
            "3" => Ok(ResetStyle::Three),
            "6" => Ok(ResetStyle::Six),
            other => Err(Error::InvalidResetStyle(other.to_string())),
        }
    }
}

impl fmt::Display for ResetStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResetStyle::None => "none",
            ResetStyle::One => "1",
            ResetStyle::Three => "3",
            ResetStyle::Six => "6",
        };
        f.write_str(s)
    }
}

/// Reset-clock correction settings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResetCorrection {
    /// Stages to apply.
    pub style: ResetStyle,
    /// Leakage fraction.
    pub factor: f64,
}

impl ResetCorrection {
    /// Creates a correction with the given style and factor.
    #[must_use]
    pub fn new(style: ResetStyle, factor: f64) -> Self {
        Self { style, factor }
    }

    /// Correction that leaves pulse heights untouched.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if applying this correction can change any value.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.style != ResetStyle::None && self.factor != 0.0
    }

    /// Applies the correction in place.
    pub fn apply(&self, data: &mut [f32; NEIGHBORHOOD]) {
        if self.style >= ResetStyle::Six {
            self.leak(data, 7, 6);
            self.leak(data, 4, 3);
            self.leak(data, 1, 0);
        }
        if self.style >= ResetStyle::Three {
            self.leak(data, 8, 7);
            self.leak(data, 2, 1);
        }
        if self.style >= ResetStyle::One {
            self.leak(data, 5, 4);
        }
    }

    #[inline]
    fn leak(&self, data: &mut [f32; NEIGHBORHOOD], target: usize, source: usize) {
        let corrected = f64::from(data[target]) - f64::from(data[source]) * self.factor;
        data[target] = corrected as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RAW: [f32; 9] = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0];

    fn corrected(style: ResetStyle) -> [f32; 9] {
        let mut data = RAW;
        ResetCorrection::new(style, 0.5).apply(&mut data);
        data
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(corrected(ResetStyle::None), RAW);
    }

    #[test]
    fn test_style_one() {
        let data = corrected(ResetStyle::One);
        assert_relative_eq!(data[5], 35.0);
        assert_eq!(data[..5], RAW[..5]);
        assert_eq!(data[6..], RAW[6..]);
    }

    #[test]
    fn test_style_three_cascades_into_one() {
        let data = corrected(ResetStyle::Three);
        assert_relative_eq!(data[8], 50.0);
        assert_relative_eq!(data[2], 20.0);
        assert_relative_eq!(data[5], 35.0);
        assert_relative_eq!(data[1], 20.0);
        assert_relative_eq!(data[7], 80.0);
    }

    #[test]
    fn test_style_six_uses_sequential_values() {
        let data = corrected(ResetStyle::Six);
        let expected = [10.0, 15.0, 22.5, 40.0, 30.0, 45.0, 70.0, 45.0, 67.5];
        for (got, want) in data.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want);
        }
        // A parallel evaluation would have produced 90 - 80 * 0.5 here.
        assert!((data[8] - 50.0).abs() > 1.0);
    }

    #[test]
    fn test_parse_style() {
        assert_eq!("6".parse::<ResetStyle>().unwrap(), ResetStyle::Six);
        assert_eq!("none".parse::<ResetStyle>().unwrap(), ResetStyle::None);
        assert!("2".parse::<ResetStyle>().is_err());
    }
}

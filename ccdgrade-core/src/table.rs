//! Grade lookup table.
//!
//! Every event is reduced to an 8-bit split mask, one bit per neighbor of
//! the central pixel:
//!
//! ```text
//!   0x20 0x40 0x80        6 7 8
//!   0x08  --  0x10        3 4 5
//!   0x01 0x02 0x04        0 1 2
//! ```
//!
//! The table maps all 256 masks onto a [`Grade`] and the list of corner
//! pixels whose charge must be added to the summed pulse height.

use crate::event::{Grade, CENTER};
use std::fmt::Write;
use std::sync::OnceLock;

/// Number of distinct split masks.
pub const NMAP: usize = 256;

/// Selects the edge-adjacent neighbors (positions 1, 3, 5, 7).
const EDGE_MASK: u8 = 0x5a;

/// Terminator for corner lists. The center is always summed already.
const END: u8 = CENTER as u8;

const NO_EXTRA: [u8; 4] = [END; 4];

/// Edge patterns of L and square events, paired with `CORNER_EXTRA`.
const EDGE_PATTERNS: [u8; 10] = [0x00, 0x0a, 0x12, 0x48, 0x50, 0x1a, 0x4a, 0x58, 0x52, 0x5a];

/// Corner pixels enclosed by the matching edge pattern.
const CORNER_EXTRA: [[u8; 4]; 10] = [
    NO_EXTRA,
    [0, END, END, END],
    [2, END, END, END],
    [6, END, END, END],
    [8, END, END, END],
    [0, 2, END, END],
    [0, 6, END, END],
    [6, 8, END, END],
    [8, 2, END, END],
    [0, 2, 6, 8],
];

const SINGLE: &[u8] = &[0x00];

const SINGLE_PLUS_CORNER: &[u8] = &[
    0x01, 0x04, 0x20, 0x80, 0x05, 0x21, 0x81, 0x24, 0x84, 0xa0, 0x25, 0x85, 0xa4, 0xa1, 0xa5,
];

const VERTICAL_SPLIT: &[u8] = &[0x02, 0x40, 0x22, 0x82, 0x41, 0x44, 0x45, 0xa2];

const LEFT_SPLIT: &[u8] = &[0x08, 0x0c, 0x88, 0x8c];

const RIGHT_SPLIT: &[u8] = &[0x10, 0x30, 0x11, 0x31];

const SINGLE_SIDED_PLUS_CORNER: &[u8] = &[
    0x03, 0x06, 0x09, 0x28, 0x60, 0xc0, 0x90, 0x14, //
    0x83, 0x26, 0x89, 0x2c, 0x64, 0xc1, 0x91, 0x34, //
    0x23, 0x86, 0x0d, 0xa8, 0x61, 0xc4, 0xb0, 0x15, //
    0xa3, 0xa6, 0x8d, 0xac, 0x65, 0xc5, 0xb1, 0x35,
];

// First row: L shapes. Second row: squares.
const ELL_OR_SQUARE: &[u8] = &[
    0x12, 0x32, 0x50, 0x51, 0x48, 0x4c, 0x0a, 0x8a, //
    0x16, 0xd0, 0x68, 0x0b, 0x36, 0xd1, 0x6c, 0x8b,
];

/// One slot of the grade table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeEntry {
    grade: Grade,
    extra: [u8; 4],
}

impl GradeEntry {
    fn new(grade: Grade, extra: [u8; 4]) -> Self {
        Self { grade, extra }
    }

    /// Grade assigned to this mask.
    #[inline]
    #[must_use]
    pub fn grade(&self) -> Grade {
        self.grade
    }

    /// Index of the grade counter incremented on acceptance.
    #[inline]
    #[must_use]
    pub fn counter_index(&self) -> usize {
        self.grade.index()
    }

    /// Histogram row receiving accepted sums.
    #[inline]
    #[must_use]
    pub fn histogram_row(&self) -> usize {
        self.grade.index()
    }

    /// Raw corner list, padded with the center index.
    #[inline]
    #[must_use]
    pub fn extra(&self) -> [u8; 4] {
        self.extra
    }

    /// Corner pixel indices to add to the sum.
    #[inline]
    pub fn extra_pixels(&self) -> impl Iterator<Item = usize> + '_ {
        self.extra
            .iter()
            .take_while(|&&idx| idx != END)
            .map(|&idx| usize::from(idx))
    }

    /// Returns true if this entry adds corner charge to the sum.
    #[inline]
    #[must_use]
    pub fn has_corner_correction(&self) -> bool {
        self.extra[0] != END
    }
}

/// Immutable mapping from split mask to grade and corner correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeTable {
    entries: [GradeEntry; NMAP],
}

impl Default for GradeTable {
    fn default() -> Self {
        Self::build()
    }
}

impl GradeTable {
    /// Builds the table from the literal pattern sets.
    ///
    /// Deterministic: repeated calls produce identical tables.
    #[must_use]
    pub fn build() -> Self {
        let mut slots: [Option<GradeEntry>; NMAP] = [None; NMAP];

        for grade in &Grade::ALL[..Grade::COUNT - 1] {
            for &mask in Self::patterns(*grade) {
                let extra = if *grade == Grade::EllOrSquarePlusCorner {
                    corner_extra(mask)
                } else {
                    NO_EXTRA
                };
                let slot = &mut slots[usize::from(mask)];
                debug_assert!(slot.is_none(), "mask {mask:#04x} assigned twice");
                *slot = Some(GradeEntry::new(*grade, extra));
            }
        }

        // Corners are deliberately ignored for grade 7 events.
        let entries = slots.map(|slot| slot.unwrap_or(GradeEntry::new(Grade::Other, NO_EXTRA)));

        log::debug!(
            "built grade table: {} explicit masks, {} other",
            entries.iter().filter(|e| e.grade != Grade::Other).count(),
            entries.iter().filter(|e| e.grade == Grade::Other).count()
        );

        Self { entries }
    }

    /// Shared table, built on first use.
    #[must_use]
    pub fn global() -> &'static GradeTable {
        static TABLE: OnceLock<GradeTable> = OnceLock::new();
        TABLE.get_or_init(GradeTable::build)
    }

    /// Literal split masks for a grade. Empty for [`Grade::Other`], which
    /// is the complement of all other sets.
    #[must_use]
    pub fn patterns(grade: Grade) -> &'static [u8] {
        match grade {
            Grade::Single => SINGLE,
            Grade::SinglePlusCorner => SINGLE_PLUS_CORNER,
            Grade::VerticalSplit => VERTICAL_SPLIT,
            Grade::LeftSplit => LEFT_SPLIT,
            Grade::RightSplit => RIGHT_SPLIT,
            Grade::SingleSidedPlusCorner => SINGLE_SIDED_PLUS_CORNER,
            Grade::EllOrSquarePlusCorner => ELL_OR_SQUARE,
            Grade::Other => &[],
        }
    }

    /// Looks up the entry for a split mask.
    #[inline]
    #[must_use]
    pub fn lookup(&self, mask: u8) -> &GradeEntry {
        &self.entries[usize::from(mask)]
    }

    /// Grade of a split mask.
    #[inline]
    #[must_use]
    pub fn grade(&self, mask: u8) -> Grade {
        self.lookup(mask).grade
    }

    /// All entries in mask order.
    #[must_use]
    pub fn entries(&self) -> &[GradeEntry; NMAP] {
        &self.entries
    }

    /// Dumps the grade of every mask as comma separated digits,
    /// 16 per line (the CLASSIFY table format).
    #[must_use]
    pub fn to_classify_format(&self) -> String {
        let mut out = String::with_capacity(NMAP * 2 + NMAP / 16);
        for (i, entry) in self.entries.iter().enumerate() {
            let _ = write!(out, "{},", entry.grade.index());
            if i % 16 == 15 {
                out.push('\n');
            }
        }
        out
    }
}

fn corner_extra(mask: u8) -> [u8; 4] {
    let edges = mask & EDGE_MASK;
    EDGE_PATTERNS
        .iter()
        .position(|&pattern| pattern == edges)
        .map_or(NO_EXTRA, |j| CORNER_EXTRA[j])
}

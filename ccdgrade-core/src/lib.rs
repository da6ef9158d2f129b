//! ccdgrade-core: Event grading and calibration statistics for X-ray CCDs.
//!
//! This crate provides the grade lookup table, the reset-clock correction,
//! the event classifier, the grade filter and the running statistics that
//! back pulse-height calibration files.
//!

pub mod classify;
pub mod error;
pub mod event;
pub mod filter;
pub mod processing;
pub mod reset;
pub mod stats;
pub mod table;

pub use classify::{Classification, ClassifierConfig, EventClassifier, Outcome, P9Policy};
pub use error::{Error, Result};
pub use event::{Event, Grade, CENTER, HISTOGRAM_BINS, MAXADU, NEIGHBORHOOD};
pub use filter::{GradeFilter, PulseHeightWindow};
pub use processing::{process_batch, process_parallel, BatchOutput};
pub use reset::{ResetCorrection, ResetStyle};
pub use stats::{StatsAccumulator, StatsSummary};
pub use table::{GradeEntry, GradeTable};

//! ccdgrade-io: event record files and calibration output for ccdgrade.
//!
//! Event lists are flat files of fixed 56-byte records. They are read
//! either through a memory map or block by block from any stream, and
//! graded results are written as text event lists, binary records, or a
//! QDP calibration histogram.
//!

mod calibration;
mod error;
pub mod reader;
pub mod record;
mod writer;

pub use calibration::{CalibrationFileWriter, CalibrationHeader};
pub use error::{Error, Result};
pub use reader::{EventFileReader, EventStreamReader, MappedFileReader, DEFAULT_BLOCK_EVENTS};
pub use record::{decode_record, encode_record, RECORD_SIZE};
pub use writer::{EventListWriter, EventRecordWriter, ReportMode};

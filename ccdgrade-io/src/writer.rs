//! Writers for graded events.

use crate::record::encode_record;
use crate::Result;
use ccdgrade_core::{Event, P9Policy};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Line layout of a text event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// `x y grade sum center p9`
    #[default]
    Summary,
    /// `x y grade sum p:` followed by the nine corrected pulse heights.
    PixelList,
}

impl ReportMode {
    /// Layout implied by a partial-sum policy; `plist` selects pixel lists.
    #[must_use]
    pub fn for_policy(policy: P9Policy) -> Self {
        if policy == P9Policy::List {
            Self::PixelList
        } else {
            Self::Summary
        }
    }
}

/// Text writer for accepted events, one line each.
pub struct EventListWriter<W: Write> {
    writer: BufWriter<W>,
    mode: ReportMode,
    written: u64,
}

impl EventListWriter<File> {
    /// Creates a writer on a new file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, mode: ReportMode) -> Result<Self> {
        Ok(Self::new(File::create(path)?, mode))
    }
}

impl<W: Write> EventListWriter<W> {
    /// Wraps any writer, such as standard output.
    pub fn new(inner: W, mode: ReportMode) -> Self {
        Self {
            writer: BufWriter::new(inner),
            mode,
            written: 0,
        }
    }

    /// Writes one classified event.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        match self.mode {
            ReportMode::Summary => writeln!(
                self.writer,
                "{} {} {} {} {} {}",
                event.x,
                event.y,
                event.grade_code(),
                event.sum,
                format_general(event.center()),
                event.p9
            )?,
            ReportMode::PixelList => {
                write!(
                    self.writer,
                    "{} {} {} {} p:",
                    event.x,
                    event.y,
                    event.grade_code(),
                    event.sum
                )?;
                for value in &event.data {
                    write!(self.writer, " {value:.6}")?;
                }
                writeln!(self.writer)?;
            }
        }
        self.written += 1;
        Ok(())
    }

    /// Lines written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Binary writer producing the same record layout the readers accept.
pub struct EventRecordWriter<W: Write> {
    writer: BufWriter<W>,
    written: u64,
}

impl EventRecordWriter<File> {
    /// Creates a writer on a new file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> EventRecordWriter<W> {
    /// Wraps any writer.
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            written: 0,
        }
    }

    /// Writes one record.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        self.writer.write_all(&encode_record(event))?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Formats like C's `%g`: six significant digits, trailing zeros removed,
/// exponent form outside `1e-4..1e6`.
fn format_general(value: f32) -> String {
    let value = f64::from(value);
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded = format!("{value:.5e}");
    let exponent: i32 = rounded
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);

    if (-4..6).contains(&exponent) {
        let decimals = usize::try_from(5 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let (mantissa, _) = rounded.split_once('e').unwrap_or((&rounded, ""));
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

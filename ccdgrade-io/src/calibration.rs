//! QDP basic calibration files.
//!
//! A calibration file is a commented header describing the run, a block of
//! QDP plot commands, and one histogram row per ADU value with a column
//! per grade. Lines starting with `!` are comments to QDP.

use crate::Result;
use ccdgrade_core::{Grade, StatsAccumulator};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const EVLIST_KEY: &str = "evlist  = ";

/// Run description printed in the calibration header.
#[derive(Debug, Clone, Default)]
pub struct CalibrationHeader {
    /// Event threshold used for grading.
    pub event_threshold: i32,
    /// Split threshold used for grading.
    pub split_threshold: i32,
    /// Experiment parameter file echoed into the header.
    pub source_file: Option<PathBuf>,
    /// Records read from the input, when known.
    pub events_input: Option<u64>,
    /// Directory reported as the working directory.
    pub working_dir: Option<PathBuf>,
}

impl CalibrationHeader {
    /// Creates a header for the given thresholds.
    #[must_use]
    pub fn new(event_threshold: i32, split_threshold: i32) -> Self {
        Self {
            event_threshold,
            split_threshold,
            ..Self::default()
        }
    }

    /// Sets the experiment parameter file.
    #[must_use]
    pub fn with_source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    /// Sets the number of records read.
    #[must_use]
    pub fn with_events_input(mut self, count: u64) -> Self {
        self.events_input = Some(count);
        self
    }

    /// Sets the reported working directory.
    #[must_use]
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    fn source_name(&self) -> String {
        self.source_file
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |p| p.display().to_string())
    }
}

/// Writer for QDP calibration files.
pub struct CalibrationFileWriter<W: Write> {
    writer: BufWriter<W>,
}

impl CalibrationFileWriter<File> {
    /// Creates a writer on a new file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> CalibrationFileWriter<W> {
    /// Wraps any writer.
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    /// Writes the header, plot commands and histogram, then flushes.
    ///
    /// An unreadable source file is not an error; its contents are simply
    /// left out.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write(&mut self, header: &CalibrationHeader, stats: &StatsAccumulator) -> Result<()> {
        let evlist = self.write_header(header, stats)?;
        self.write_histogram(header, stats, evlist.as_deref())?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_header(
        &mut self,
        header: &CalibrationHeader,
        stats: &StatsAccumulator,
    ) -> Result<Option<String>> {
        let working_dir = header
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .map_or_else(|| "unknown".to_string(), |p| p.display().to_string());
        let events_input = header
            .events_input
            .map_or_else(|| "unknown".to_string(), |n| n.to_string());
        let (x_min, x_max) = stats.x_bounds();
        let (y_min, y_max) = stats.y_bounds();

        let w = &mut self.writer;
        writeln!(w, "!")?;
        writeln!(w, "!  QDP Basic Calibration File")?;
        writeln!(w, "!")?;
        writeln!(w, "!  Working_dir  = {working_dir}")?;
        writeln!(w, "!  Source_file  = {}", header.source_name())?;
        writeln!(w, "!  Event_thresh = {}", header.event_threshold)?;
        writeln!(w, "!  Split_thresh = {}", header.split_threshold)?;
        writeln!(w, "!  Total_events = {}", stats.total())?;
        writeln!(w, "!  Total_pixels = {}", stats.total_pixels())?;
        writeln!(w, "!")?;
        writeln!(w, "!  Events_below = {}", stats.below_threshold())?;
        writeln!(w, "!  Events_above = {}", stats.out_of_bounds())?;
        writeln!(w, "!  Events_input = {events_input}")?;
        writeln!(w, "!  PH4_minimum  = {}", stats.center_min())?;
        writeln!(w, "!  PHS_minimum  = {}", stats.min_adu())?;
        writeln!(w, "!  PHS_Maximum  = {}", stats.max_adu())?;
        writeln!(w, "!  X_Minimum    = {x_min}")?;
        writeln!(w, "!  X_Average    = {}", stats.x_average())?;
        writeln!(w, "!  X_Maximum    = {x_max}")?;
        writeln!(w, "!  Y_Minimum    = {y_min}")?;
        writeln!(w, "!  Y_Average    = {}", stats.y_average())?;
        writeln!(w, "!  Y_Maximum    = {y_max}")?;
        writeln!(w, "!")?;
        writeln!(w, "!  Exclusive grades -- corrected L+Q.")?;
        writeln!(w, "!")?;

        let Some(path) = &header.source_file else {
            return Ok(None);
        };
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("source file {} not echoed: {e}", path.display());
                return Ok(None);
            }
        };

        writeln!(w, "!")?;
        writeln!(w, "!  Experimental parameters")?;
        writeln!(w, "!")?;
        let mut evlist = None;
        for line in contents.lines().filter(|line| !line.starts_with('#')) {
            writeln!(w, "!  {line}")?;
            if let Some(name) = line.strip_prefix(EVLIST_KEY) {
                evlist = Some(name.replace('\t', " "));
            }
        }
        Ok(evlist)
    }

    fn write_histogram(
        &mut self,
        header: &CalibrationHeader,
        stats: &StatsAccumulator,
        evlist: Option<&str>,
    ) -> Result<()> {
        let display = stats.display_range();
        let w = &mut self.writer;

        writeln!(w, "!")?;
        writeln!(w, "!  QDP Header follows")?;
        writeln!(w, "!")?;
        writeln!(
            w,
            "lab top Event = {} Split = {} Source = {}",
            header.event_threshold,
            header.split_threshold,
            header.source_name()
        )?;
        if let Some(name) = evlist {
            writeln!(w, "lab file {name}")?;
        }
        writeln!(w, "lab g1 Pulse Height (ADU)")?;
        writeln!(w, "lab rot")?;
        for (i, grade) in Grade::ALL.iter().enumerate() {
            writeln!(w, "lab g{} N({})", i + 2, grade.label())?;
        }
        writeln!(w, "csize 0.75")?;
        writeln!(w, "res x {} {}", display.start, display.end)?;
        for i in 0..Grade::COUNT {
            writeln!(w, "res y{} 1", i + 2)?;
        }
        writeln!(w, "error y sq 2 3 4 5 6 7 8 9")?;
        writeln!(w, "log y on")?;
        writeln!(w, "plot vert")?;
        writeln!(w, "!")?;
        writeln!(w, "!  Histogram data follows")?;
        writeln!(w, "!")?;

        let mut labels = String::from("!  PHA");
        let mut totals = String::from("!  TOT");
        for grade in Grade::ALL {
            let _ = write!(labels, "\t{}", grade.label());
            let _ = write!(totals, "\t{}", stats.count(grade));
        }
        writeln!(w, "{labels}")?;
        writeln!(w, "{totals}")?;
        writeln!(w, "!")?;

        let mut row = String::new();
        for adu in stats.histogram_range() {
            row.clear();
            let _ = write!(row, "{adu}");
            for count in stats.histogram_row(adu) {
                let _ = write!(row, "\t{count}");
            }
            writeln!(w, "{row}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn stats() -> StatsAccumulator {
        let mut stats = StatsAccumulator::new();
        stats.observe_center(35.0);
        stats.reject_below_threshold();
        for _ in 0..3 {
            stats.record(10, 20, Grade::Single, 100);
        }
        stats.record(30, 40, Grade::VerticalSplit, 120);
        stats
    }

    fn render(header: &CalibrationHeader, stats: &StatsAccumulator) -> String {
        let mut out = Vec::new();
        CalibrationFileWriter::new(&mut out)
            .write(header, stats)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_fields() {
        let header = CalibrationHeader::new(40, 20)
            .with_events_input(5)
            .with_working_dir("/data/run1");
        let text = render(&header, &stats());

        assert!(text.starts_with("!\n!  QDP Basic Calibration File\n!\n"));
        assert!(text.contains("!  Working_dir  = /data/run1\n"));
        assert!(text.contains("!  Source_file  = unknown\n"));
        assert!(text.contains("!  Event_thresh = 40\n!  Split_thresh = 20\n"));
        assert!(text.contains("!  Total_events = 4\n"));
        assert!(text.contains("!  Total_pixels = 400\n"));
        assert!(text.contains("!  Events_below = 1\n!  Events_above = 0\n"));
        assert!(text.contains("!  Events_input = 5\n"));
        assert!(text.contains("!  PH4_minimum  = 35\n"));
        assert!(text.contains("!  PHS_minimum  = 100\n!  PHS_Maximum  = 120\n"));
        assert!(text.contains("!  X_Minimum    = 10\n!  X_Average    = 15\n!  X_Maximum    = 30\n"));
        assert!(text.contains("!  Exclusive grades -- corrected L+Q.\n"));
        assert!(!text.contains("Experimental parameters"));
    }

    #[test]
    fn test_unknown_input_count() {
        let text = render(&CalibrationHeader::new(40, 20), &stats());
        assert!(text.contains("!  Events_input = unknown\n"));
    }

    #[test]
    fn test_plot_commands_and_histogram() {
        let text = render(&CalibrationHeader::new(40, 20), &stats());

        // Only the 3-count bin at 100 widens the display range.
        assert!(text.contains("res x 92 109\n"));
        assert!(text.contains("lab g2 N(S)\n"));
        assert!(text.contains("lab g8 N(L+Q)\n"));
        assert!(text.contains("lab g9 N(O)\n"));
        assert!(text.contains("!  PHA\tS\tS+\tPv\tPl\tPr\tP+\tL+Q\tO\n"));
        assert!(text.contains("!  TOT\t3\t0\t1\t0\t0\t0\t0\t0\n"));

        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('!')).collect();
        let data: Vec<&str> = rows
            .iter()
            .copied()
            .filter(|l| l.starts_with(char::is_numeric))
            .collect();
        assert_eq!(data.len(), 129 - 92);
        assert_eq!(data.first(), Some(&"92\t0\t0\t0\t0\t0\t0\t0\t0"));
        assert!(data.contains(&"100\t3\t0\t0\t0\t0\t0\t0\t0"));
        assert!(data.contains(&"120\t0\t0\t1\t0\t0\t0\t0\t0"));
        assert_eq!(data.last(), Some(&"128\t0\t0\t0\t0\t0\t0\t0\t0"));
    }

    #[test]
    fn test_source_file_echo() {
        let mut source = NamedTempFile::new().unwrap();
        writeln!(source, "# comment line").unwrap();
        writeln!(source, "target  = Fe55").unwrap();
        writeln!(source, "evlist  = run\t42.ev").unwrap();
        source.flush().unwrap();

        let header = CalibrationHeader::new(40, 20).with_source_file(source.path());
        let text = render(&header, &stats());

        assert!(text.contains("!  Experimental parameters\n"));
        assert!(text.contains("!  target  = Fe55\n"));
        assert!(!text.contains("comment line"));
        assert!(text.contains("lab file run 42.ev\n"));
        assert!(text.contains(&format!(
            "Source = {}\n",
            source.path().display()
        )));
    }

    #[test]
    fn test_missing_source_file_is_skipped() {
        let header = CalibrationHeader::new(40, 20).with_source_file("/nonexistent/params.txt");
        let text = render(&header, &stats());
        assert!(text.contains("!  Source_file  = /nonexistent/params.txt\n"));
        assert!(!text.contains("Experimental parameters"));
        assert!(!text.contains("lab file"));
    }

    #[test]
    fn test_empty_run() {
        let text = render(&CalibrationHeader::new(40, 20), &StatsAccumulator::new());
        assert!(text.contains("!  Total_events = 0\n"));
        assert!(text.contains("res x 0 0\n"));
        assert!(!text.lines().any(|l| l.starts_with(char::is_numeric)));
    }
}

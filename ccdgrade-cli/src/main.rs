//! ccdgrade: X-ray CCD event grading from the command line.
//!
//! Reads binary event lists from a file or standard input, grades every
//! event, and writes text event lists, filtered binary lists, or QDP
//! calibration histograms.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use ccdgrade_core::{
    process_batch, process_parallel, ClassifierConfig, Classification, Event, EventClassifier,
    Grade, GradeFilter, GradeTable, Outcome, P9Policy, PulseHeightWindow, ResetCorrection,
    ResetStyle, StatsAccumulator,
};
use ccdgrade_io::{
    CalibrationFileWriter, CalibrationHeader, EventFileReader, EventListWriter,
    EventRecordWriter, EventStreamReader, ReportMode,
};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    CcdgradeIo(#[from] ccdgrade_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] ccdgrade_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// X-ray CCD event grading and calibration histograms.
#[derive(Parser)]
#[command(name = "ccdgrade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Thresholds and reset correction shared by the grading commands.
#[derive(Args, Debug)]
struct GradingArgs {
    /// Event threshold (ADU) applied to the central pixel
    event: i32,

    /// Split threshold (ADU) applied to the neighbors
    split: i32,

    /// Reset-clock correction factor
    #[arg(long)]
    reset: Option<f64>,

    /// Reset correction style: 1, 3 or 6
    #[arg(long, value_parser = parse_style)]
    style: Option<ResetStyle>,

    /// Input event list (standard input if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (standard output if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl GradingArgs {
    fn reset(&self) -> ResetCorrection {
        match (self.reset, self.style) {
            (None, _) => ResetCorrection::none(),
            (Some(factor), style) => {
                ResetCorrection::new(style.unwrap_or(ResetStyle::One), factor)
            }
        }
    }

    fn output(&self) -> Result<Box<dyn Write>> {
        Ok(match &self.output {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout().lock()),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Grade events and write an event list with optional calibration output
    Classify {
        #[command(flatten)]
        grading: GradingArgs,

        /// Partial sum reported per event: p9, p1357, p17, p35 or plist
        #[arg(long, default_value = "p9", value_parser = parse_policy)]
        p9: P9Policy,

        /// Write a QDP calibration file
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Experiment parameter file echoed into the calibration header
        #[arg(long)]
        source: Option<PathBuf>,

        /// Write run statistics as JSON
        #[arg(long)]
        stats_json: Option<PathBuf>,

        /// Worker threads (defaults to all cores)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Pass only events of the selected grades, as binary records
    Filter {
        #[command(flatten)]
        grading: GradingArgs,

        /// Grades to pass (7 passes OTHER)
        #[arg(short, long, num_args = 1.., required = true)]
        grades: Vec<u8>,

        /// Half-open pulse-height window on the graded sum
        #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
        ph_range: Option<Vec<i32>>,

        /// Count rejected grades in the statistics
        #[arg(long)]
        record_filtered: bool,
    },

    /// Print the grade lookup table in CLASSIFY format
    Table,

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },
}

fn parse_style(s: &str) -> std::result::Result<ResetStyle, String> {
    s.parse().map_err(|e: ccdgrade_core::Error| e.to_string())
}

fn parse_policy(s: &str) -> std::result::Result<P9Policy, String> {
    s.parse().map_err(|e: ccdgrade_core::Error| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli.command) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Classify {
            grading,
            p9,
            calibration,
            source,
            stats_json,
            threads,
        } => {
            if let Some(n) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build_global()?;
            }

            let config = ClassifierConfig::new(grading.event, grading.split)
                .with_reset(grading.reset())
                .with_p9_policy(p9);
            log::debug!("classifier config: {config:?}");
            let classifier = EventClassifier::new(config);

            let start = Instant::now();
            let mut writer = EventListWriter::new(grading.output()?, ReportMode::for_policy(p9));
            let mut stats = StatsAccumulator::new();

            let read = for_each_block(grading.input.as_deref(), |events| {
                let output = process_parallel(&classifier, events);
                for (event, result) in events.iter().zip(&output.results) {
                    if result.accepted() {
                        writer.write_event(event)?;
                    }
                }
                stats.merge(&output.stats);
                Ok(())
            })?;
            writer.flush()?;

            log_summary(&stats, read, start);

            if let Some(path) = calibration {
                let mut header = CalibrationHeader::new(grading.event, grading.split)
                    .with_events_input(read);
                if let Some(source) = &source {
                    header = header.with_source_file(source);
                }
                CalibrationFileWriter::create(&path)?.write(&header, &stats)?;
                log::info!("calibration written to {}", path.display());
            }

            if let Some(path) = stats_json {
                let file = File::create(&path)?;
                serde_json::to_writer_pretty(file, &stats.summary())?;
                log::info!("statistics written to {}", path.display());
            }
        }

        Commands::Filter {
            grading,
            grades,
            ph_range,
            record_filtered,
        } => {
            let filter = GradeFilter::from_grades(&grades)?;
            let window = match ph_range.as_deref() {
                Some(&[low, high]) => PulseHeightWindow::new(low, high),
                _ => PulseHeightWindow::default(),
            };

            let config = ClassifierConfig::new(grading.event, grading.split)
                .with_reset(grading.reset())
                .with_grade_filter(filter.config())
                .with_record_filtered(record_filtered);
            log::debug!("classifier config: {config:?}, window {window:?}");
            let classifier = EventClassifier::new(config);

            let start = Instant::now();
            let mut writer = EventRecordWriter::new(grading.output()?);
            let mut stats = StatsAccumulator::new();
            let mut filtered = 0u64;

            let read = for_each_block(grading.input.as_deref(), |events| {
                let results = process_batch(&classifier, events, &mut stats);
                for (event, result) in events.iter().zip(&results) {
                    if passes(result, &window) {
                        writer.write_event(event)?;
                    } else if result.outcome == Outcome::FilteredOut {
                        filtered += 1;
                    }
                }
                Ok(())
            })?;
            writer.flush()?;

            log_summary(&stats, read, start);
            log::info!(
                "{} events written, {} rejected by grade",
                writer.written(),
                filtered
            );
        }

        Commands::Table => {
            let table = GradeTable::global();
            print!("{}", table.to_classify_format());
            println!();
            println!("grade  name  description");
            for grade in Grade::ALL {
                println!(
                    "{:<6} {:<5} {} ({} masks)",
                    grade.index(),
                    grade.label(),
                    grade.description(),
                    table.entries().iter().filter(|e| e.grade() == grade).count()
                );
            }
        }

        Commands::Info { input } => {
            let reader = EventFileReader::open(&input)?;
            let file_size = reader.file_size();

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Events: {}", reader.record_count());

            let events = reader.read_all();
            if let Some(ranges) = Ranges::of(&events) {
                println!("Frame range: {} - {}", ranges.frame.0, ranges.frame.1);
                println!("X range: {} - {}", ranges.x.0, ranges.x.1);
                println!("Y range: {} - {}", ranges.y.0, ranges.y.1);
                println!("Center PH range: {} - {}", ranges.center.0, ranges.center.1);
            }
        }
    }

    Ok(())
}

/// Feeds the input to `f` block by block and returns the number of
/// records read.
fn for_each_block<F>(input: Option<&Path>, mut f: F) -> Result<u64>
where
    F: FnMut(&mut [Event]) -> Result<()>,
{
    let mut read = 0u64;
    match input {
        Some(path) => {
            let reader = EventFileReader::open(path)?;
            log::info!(
                "reading {} ({} events)",
                path.display(),
                reader.record_count()
            );
            let mut events = reader.read_all();
            read = events.len() as u64;
            f(&mut events)?;
        }
        None => {
            for block in EventStreamReader::new(io::stdin().lock()) {
                let mut events = block?;
                read += events.len() as u64;
                f(&mut events)?;
            }
        }
    }
    Ok(read)
}

fn passes(result: &Classification, window: &PulseHeightWindow) -> bool {
    result.accepted() && window.contains(result.sum)
}

fn log_summary(stats: &StatsAccumulator, read: u64, start: Instant) {
    log::info!(
        "{} events read, {} accepted, {} below threshold, {} out of bounds ({:.2}s)",
        read,
        stats.total(),
        stats.below_threshold(),
        stats.out_of_bounds(),
        start.elapsed().as_secs_f64()
    );
    for grade in Grade::ALL {
        log::debug!("  {:<3} {}", grade.label(), stats.count(grade));
    }
}

/// Min/max of the record fields shown by `info`.
struct Ranges {
    frame: (i32, i32),
    x: (i32, i32),
    y: (i32, i32),
    center: (f32, f32),
}

impl Ranges {
    fn of(events: &[Event]) -> Option<Self> {
        let first = events.first()?;
        let mut ranges = Self {
            frame: (first.frame, first.frame),
            x: (first.x, first.x),
            y: (first.y, first.y),
            center: (first.center(), first.center()),
        };
        for event in events {
            widen(&mut ranges.frame, event.frame);
            widen(&mut ranges.x, event.x);
            widen(&mut ranges.y, event.y);
            ranges.center.0 = ranges.center.0.min(event.center());
            ranges.center.1 = ranges.center.1.max(event.center());
        }
        Some(ranges)
    }
}

fn widen(range: &mut (i32, i32), value: i32) {
    range.0 = range.0.min(value);
    range.1 = range.1.max(value);
}

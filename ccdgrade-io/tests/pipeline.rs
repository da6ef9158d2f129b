use approx::abs_diff_eq;
use ccdgrade_core::{
    process_parallel, ClassifierConfig, Event, EventClassifier, Grade, Outcome, StatsAccumulator,
};
use ccdgrade_io::{
    encode_record, CalibrationFileWriter, CalibrationHeader, Error, EventFileReader,
    EventListWriter, EventRecordWriter, EventStreamReader, ReportMode, RECORD_SIZE,
};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn neighborhood(center: f32, right: f32, below: f32) -> [f32; 9] {
    [-1.0, -1.0, -1.0, -1.0, center, right, -1.0, below, -1.0]
}

fn events() -> Vec<Event> {
    let mut events = Vec::new();
    for i in 0..300 {
        // singles, horizontal right splits, vertical splits, sub-threshold
        events.push(Event::new(i, 1, neighborhood(500.0, 0.0, 0.0)));
        events.push(Event::new(i, 2, neighborhood(400.0, 150.0, 0.0)));
        events.push(Event::new(i, 3, neighborhood(300.0, 0.0, 90.0)));
        events.push(Event::new(i, 4, neighborhood(10.0, 0.0, 0.0)));
    }
    events
}

fn write_event_file(events: &[Event]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for event in events {
        file.write_all(&encode_record(event)).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_file_to_calibration() {
    let input = write_event_file(&events());
    let reader = EventFileReader::open(input.path()).unwrap();
    assert_eq!(reader.record_count(), 1200);

    let classifier = EventClassifier::new(ClassifierConfig::new(40, 20));
    let mut all = reader.read_all();
    let output = process_parallel(&classifier, &mut all);

    assert_eq!(output.stats.total(), 900);
    assert_eq!(output.stats.below_threshold(), 300);
    assert_eq!(output.stats.count(Grade::Single), 300);
    assert_eq!(output.stats.count(Grade::RightSplit), 300);
    assert_eq!(output.stats.count(Grade::VerticalSplit), 300);

    let calibration = NamedTempFile::new().unwrap();
    CalibrationFileWriter::create(calibration.path())
        .unwrap()
        .write(
            &CalibrationHeader::new(40, 20).with_events_input(1200),
            &output.stats,
        )
        .unwrap();

    let text = std::fs::read_to_string(calibration.path()).unwrap();
    assert!(text.contains("!  Total_events = 900\n"));
    assert!(text.contains("!  Events_input = 1200\n"));
    assert!(text.contains("!  TOT\t300\t0\t300\t0\t300\t0\t0\t0\n"));
    assert!(text.contains("\n390\t0\t0\t300\t0\t0\t0\t0\t0\n"));
    assert!(text.contains("\n500\t300\t0\t0\t0\t0\t0\t0\t0\n"));
    assert!(text.contains("\n550\t0\t0\t0\t0\t300\t0\t0\t0\n"));
    assert!(text.contains("res x 382 559\n"));
}

#[test]
fn test_stream_filter_to_records() {
    let bytes: Vec<u8> = events().iter().flat_map(encode_record).collect();
    let classifier = EventClassifier::new(ClassifierConfig::new(40, 20).with_grade_filter(0x01));
    let mut stats = StatsAccumulator::new();

    let output = NamedTempFile::new().unwrap();
    let mut writer = EventRecordWriter::create(output.path()).unwrap();
    for block in EventStreamReader::new(Cursor::new(bytes)) {
        for mut event in block.unwrap() {
            if classifier.classify(&mut event, &mut stats).outcome == Outcome::Accepted {
                writer.write_event(&event).unwrap();
            }
        }
    }
    writer.flush().unwrap();
    drop(writer);

    let kept = EventFileReader::open(output.path()).unwrap().read_all();
    assert_eq!(kept.len(), 300);
    assert!(kept
        .iter()
        .all(|e| e.y == 1 && abs_diff_eq!(e.data[4], 500.0)));
}

#[test]
fn test_event_list_lines() {
    let mut events = events();
    let classifier = EventClassifier::new(ClassifierConfig::new(40, 20));
    let mut stats = StatsAccumulator::new();

    let mut out = Vec::new();
    {
        let mut writer = EventListWriter::new(&mut out, ReportMode::Summary);
        for event in events.iter_mut().take(4) {
            if classifier.classify(event, &mut stats).accepted() {
                writer.write_event(event).unwrap();
            }
        }
        writer.flush().unwrap();
    }

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec!["0 1 0 500 500 494", "0 2 4 550 400 544", "0 3 2 390 300 384"]
    );
}

#[test]
fn test_truncated_file_rejected() {
    let mut file = write_event_file(&events()[..2]);
    file.write_all(&[0u8; RECORD_SIZE / 2]).unwrap();
    file.flush().unwrap();

    assert!(matches!(
        EventFileReader::open(file.path()),
        Err(Error::InvalidFormat(_))
    ));
}

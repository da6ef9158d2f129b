#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
use ccdgrade_core::{
    process_batch, process_parallel, ClassifierConfig, Event, EventClassifier, Grade, GradeTable,
    Outcome, P9Policy, ResetCorrection, ResetStyle, StatsAccumulator, HISTOGRAM_BINS,
};

// Deterministic neighborhoods: mostly noise with a bright center, with
// enough charge spread to hit every grade.
fn generate_events(n: usize) -> Vec<Event> {
    let mut state: u32 = 0x2545_f491;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };

    (0..n)
        .map(|i| {
            let mut data = [0.0f32; 9];
            for (j, value) in data.iter_mut().enumerate() {
                *value = if j == 4 {
                    (next() % 1800) as f32
                } else if next() % 3 == 0 {
                    (next() % 400) as f32
                } else {
                    (next() % 15) as f32
                };
            }
            Event::new((i % 512) as i32, (i / 512) as i32, data).with_frame(i as i32 / 100, 0)
        })
        .collect()
}

fn calibration_config() -> ClassifierConfig {
    ClassifierConfig::new(40, 20)
        .with_reset(ResetCorrection::new(ResetStyle::Three, 0.01))
        .with_p9_policy(P9Policy::Cross)
}

#[test]
fn test_every_mask_has_one_grade() {
    let table = GradeTable::build();
    let mut per_grade = [0usize; Grade::COUNT];
    for mask in 0..=255u8 {
        per_grade[table.grade(mask).index()] += 1;
    }
    assert_eq!(per_grade, [1, 15, 8, 4, 4, 32, 16, 176]);
}

#[test]
fn test_histograms_conserve_counts() {
    let classifier = EventClassifier::new(calibration_config());
    let mut events = generate_events(20_000);
    let mut stats = StatsAccumulator::new();
    let results = process_batch(&classifier, &mut events, &mut stats);

    for grade in Grade::ALL {
        let binned: u64 = stats.histogram(grade).iter().map(|&n| u64::from(n)).sum();
        assert_eq!(binned, stats.count(grade), "grade {grade}");
    }
    assert_eq!(stats.counts().iter().sum::<u64>(), stats.total());

    let accepted = results.iter().filter(|r| r.accepted()).count() as u64;
    let below = results
        .iter()
        .filter(|r| r.outcome == Outcome::BelowThreshold)
        .count() as u64;
    assert_eq!(accepted, stats.total());
    assert_eq!(below, stats.below_threshold());
    assert_eq!(accepted + below + stats.out_of_bounds(), 20_000);

    // The generator is spread wide enough to populate every grade.
    assert!(Grade::ALL.iter().all(|&g| stats.count(g) > 0));
}

#[test]
fn test_parallel_matches_sequential() {
    let classifier = EventClassifier::new(calibration_config());
    let generated = generate_events(50_000);

    let mut sequential_events = generated.clone();
    let mut sequential = StatsAccumulator::new();
    let sequential_results = process_batch(&classifier, &mut sequential_events, &mut sequential);

    let mut parallel_events = generated;
    let output = process_parallel(&classifier, &mut parallel_events);

    assert_eq!(output.results, sequential_results);
    assert_eq!(output.stats, sequential);
    assert_eq!(parallel_events, sequential_events);
}

#[test]
fn test_grade_filter_partitions_accepted_events() {
    let events = generate_events(10_000);

    let mut unfiltered_events = events.clone();
    let mut unfiltered = StatsAccumulator::new();
    let classifier = EventClassifier::new(ClassifierConfig::new(40, 20));
    process_batch(&classifier, &mut unfiltered_events, &mut unfiltered);

    // Grades 0-3 plus OTHER.
    let filtered_classifier =
        EventClassifier::new(ClassifierConfig::new(40, 20).with_grade_filter(0x8f));
    let mut filtered_events = events;
    let mut filtered = StatsAccumulator::new();
    let results = process_batch(&filtered_classifier, &mut filtered_events, &mut filtered);

    for grade in Grade::ALL {
        let expected = match grade.index() {
            0..=3 | 7 => unfiltered.count(grade),
            _ => 0,
        };
        assert_eq!(filtered.count(grade), expected, "grade {grade}");
    }
    assert!(results
        .iter()
        .filter(|r| r.outcome == Outcome::FilteredOut)
        .all(|r| matches!(
            r.grade,
            Some(
                Grade::RightSplit | Grade::SingleSidedPlusCorner | Grade::EllOrSquarePlusCorner
            )
        )));
}

#[test]
fn test_record_filtered_keeps_full_statistics() {
    let events = generate_events(10_000);

    let mut plain_events = events.clone();
    let mut plain = StatsAccumulator::new();
    process_batch(
        &EventClassifier::new(ClassifierConfig::new(40, 20)),
        &mut plain_events,
        &mut plain,
    );

    let config = ClassifierConfig::new(40, 20)
        .with_grade_filter(0x01)
        .with_record_filtered(true);
    let mut recorded_events = events;
    let mut recorded = StatsAccumulator::new();
    process_batch(
        &EventClassifier::new(config),
        &mut recorded_events,
        &mut recorded,
    );

    assert_eq!(recorded, plain);
}

#[test]
fn test_display_range_inside_histogram_range() {
    let classifier = EventClassifier::new(calibration_config());
    let mut events = generate_events(20_000);
    let mut stats = StatsAccumulator::new();
    process_batch(&classifier, &mut events, &mut stats);

    let full = stats.histogram_range();
    let display = stats.display_range();
    assert!(!display.is_empty());
    assert!(full.start <= display.start && display.end <= full.end);
    assert!(full.end <= HISTOGRAM_BINS);
}

//! Batch helpers that drive the classifier over many events.

use crate::classify::{Classification, EventClassifier};
use crate::event::Event;
use crate::stats::StatsAccumulator;
use rayon::prelude::*;

/// Events per rayon work item in [`process_parallel`].
const PARALLEL_CHUNK: usize = 4096;

/// Classifications of a batch together with the statistics they produced.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// One classification per input event, in input order.
    pub results: Vec<Classification>,
    /// Statistics of this batch alone.
    pub stats: StatsAccumulator,
}

/// Classifies events in order, accumulating into `stats`.
pub fn process_batch(
    classifier: &EventClassifier,
    events: &mut [Event],
    stats: &mut StatsAccumulator,
) -> Vec<Classification> {
    events
        .iter_mut()
        .map(|event| classifier.classify(event, stats))
        .collect()
}

/// Classifies events on the rayon pool.
///
/// Each worker owns its accumulator; the accumulators are merged at the
/// end, which yields the same statistics as [`process_batch`].
pub fn process_parallel(classifier: &EventClassifier, events: &mut [Event]) -> BatchOutput {
    let shards: Vec<(Vec<Classification>, StatsAccumulator)> = events
        .par_chunks_mut(PARALLEL_CHUNK)
        .map(|chunk| {
            let mut stats = StatsAccumulator::new();
            let results = process_batch(classifier, chunk, &mut stats);
            (results, stats)
        })
        .collect();

    let mut results = Vec::with_capacity(events.len());
    let mut stats = StatsAccumulator::new();
    for (shard_results, shard_stats) in shards {
        results.extend(shard_results);
        stats.merge(&shard_stats);
    }

    log::debug!(
        "parallel batch: {} events, {} accepted",
        results.len(),
        stats.total()
    );

    BatchOutput { results, stats }
}

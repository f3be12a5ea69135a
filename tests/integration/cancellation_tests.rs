use dupesieve::duplicates::{
    Criterion, CriterionWeights, DetectError, DetectionParams, DetectorConfig, DuplicateDetector,
    FilenameMode,
};
use dupesieve::progress::{Phase, ProgressCallback, ProgressUpdate};
use dupesieve::scanner::{FileRecord, MemoryContentSource};
use dupesieve::signal::CancellationToken;
use std::sync::Arc;
use std::time::SystemTime;

fn batch(count: usize) -> (Vec<FileRecord>, MemoryContentSource) {
    let mut source = MemoryContentSource::new();
    let files = (0..count)
        .map(|i| {
            let path = format!("/data/file_{i:03}.txt");
            let content = format!("content number {}", i % 5);
            source.insert(&path, content.clone());
            FileRecord::new(path, content.len() as u64, SystemTime::UNIX_EPOCH)
        })
        .collect();
    (files, source)
}

/// Cancels the token once `phase` reports progress.
struct CancelDuring {
    phase: Phase,
    token: CancellationToken,
}

impl ProgressCallback for CancelDuring {
    fn on_phase_start(&self, _phase: Phase, _total: usize) {}

    fn on_progress(&self, update: &ProgressUpdate<'_>) {
        if update.phase == self.phase {
            self.token.cancel();
        }
    }

    fn on_phase_end(&self, _phase: Phase) {}
}

fn cancelling_detector(phase: Phase) -> (DuplicateDetector, CancellationToken) {
    let token = CancellationToken::new();
    let callback = Arc::new(CancelDuring {
        phase,
        token: token.clone(),
    });
    let detector = DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(1)
            .with_signature_threads(1)
            .with_progress_interval(1)
            .with_progress_callback(callback)
            .with_cancellation(token.clone()),
    )
    .unwrap();
    (detector, token)
}

#[test]
fn test_cancel_during_hashing() {
    let (files, source) = batch(40);
    let (detector, token) = cancelling_detector(Phase::Hashing);

    let result = detector.detect(&files, &source, &DetectionParams::exact());
    assert_eq!(result.unwrap_err(), DetectError::Cancelled);
    assert!(token.is_cancelled());
}

#[test]
fn test_cancel_during_filename_grouping() {
    let (files, source) = batch(40);
    let (detector, _token) = cancelling_detector(Phase::FilenameGrouping);

    let result = detector.detect(
        &files,
        &source,
        &DetectionParams::filename(FilenameMode::Fuzzy, 0.5),
    );
    assert!(result.unwrap_err().is_cancelled());
}

#[test]
fn test_cancel_during_similarity_grouping() {
    let (files, source) = batch(40);
    let (detector, _token) = cancelling_detector(Phase::SimilarityGrouping);

    let result = detector.detect(&files, &source, &DetectionParams::similarity(0.5));
    assert!(result.unwrap_err().is_cancelled());
}

#[test]
fn test_cancel_during_merge() {
    let (files, source) = batch(40);
    let (detector, _token) = cancelling_detector(Phase::Merging);
    let params = DetectionParams::multi_criteria(
        Criterion::ALL,
        CriterionWeights::default(),
        vec![Criterion::Exact, Criterion::Similarity, Criterion::Filename],
    );

    let result = detector.detect(&files, &source, &params);
    assert!(result.unwrap_err().is_cancelled());
}

#[test]
fn test_run_after_reset_succeeds() {
    let (files, source) = batch(10);
    let token = CancellationToken::new();
    let detector = DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(1)
            .with_signature_threads(1)
            .with_cancellation(token.clone()),
    )
    .unwrap();

    token.cancel();
    assert!(detector
        .detect(&files, &source, &DetectionParams::exact())
        .unwrap_err()
        .is_cancelled());

    token.reset();
    let report = detector
        .detect(&files, &source, &DetectionParams::exact())
        .unwrap();
    assert_eq!(report.groups.len(), 5);
}

#[test]
fn test_pre_cancelled_run_on_worker_thread() {
    let (files, source) = batch(2000);
    let token = CancellationToken::new();
    let detector = DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(1)
            .with_signature_threads(1)
            .with_cancellation(token.clone()),
    )
    .unwrap();

    token.cancel();
    let handle = std::thread::spawn(move || {
        detector.detect(&files, &source, &DetectionParams::similarity(0.9))
    });
    let result = handle.join().unwrap();
    assert!(matches!(result, Err(DetectError::Cancelled)));
}

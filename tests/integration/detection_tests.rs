use dupesieve::duplicates::{
    Criterion, CriterionWeights, DetectionMode, DetectionParams, DetectorConfig,
    DuplicateDetector, FilenameMode, GroupKind,
};
use dupesieve::progress::{Phase, ProgressCallback, ProgressUpdate};
use dupesieve::scanner::{
    FileRecord, FsContentSource, MemoryContentSource, ShingleConfig, Walker, WalkerConfig,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::tempdir;

fn detector() -> DuplicateDetector {
    DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(2)
            .with_signature_threads(2),
    )
    .unwrap()
}

fn walk(root: &Path) -> Vec<FileRecord> {
    let (files, errors) = Walker::new(root, WalkerConfig::default()).collect().unwrap();
    assert!(errors.is_empty());
    files
}

fn document(lines: usize) -> Vec<String> {
    (0..lines)
        .map(|i| format!("paragraph {i}: the measured value was {}\n", (i * 7919) % 1009))
        .collect()
}

fn unrelated(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("{:x}-{:x};", i * i * 31 + 7, i * 977))
        .collect()
}

#[test]
fn test_exact_mode_over_directory() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), "identical bytes").unwrap();
    fs::write(dir.path().join("sub/b.txt"), "identical bytes").unwrap();
    fs::write(dir.path().join("c.txt"), "different bytes").unwrap();

    let files = walk(dir.path());
    let report = detector()
        .detect(&files, &FsContentSource, &DetectionParams::exact())
        .unwrap();

    assert_eq!(report.total_files, 3);
    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.kind(), GroupKind::Exact);
    assert_eq!(group.len(), 2);
    assert!(group.contains(&dir.path().join("a.txt")));
    assert!(group.contains(&dir.path().join("sub/b.txt")));
    assert_eq!(report.summary.wasted_space, 15);
}

#[test]
fn test_exact_groups_share_digest() {
    let dir = tempdir().unwrap();
    for (name, content) in [("1", "x"), ("2", "y"), ("3", "x"), ("4", "y"), ("5", "z")] {
        fs::write(dir.path().join(name), content).unwrap();
    }

    let files = walk(dir.path());
    let report = detector()
        .detect(&files, &FsContentSource, &DetectionParams::exact())
        .unwrap();

    assert_eq!(report.groups.len(), 2);
    let mut digests: Vec<String> = report
        .groups
        .iter()
        .map(|g| g.digest().unwrap().to_hex())
        .collect();
    digests.dedup();
    assert_eq!(digests.len(), 2);
    assert_eq!(report.summary.grouped_files, 4);
}

#[test]
fn test_empty_files_are_exact_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("empty1"), "").unwrap();
    fs::write(dir.path().join("empty2"), "").unwrap();

    let files = walk(dir.path());
    let exact = detector()
        .detect(&files, &FsContentSource, &DetectionParams::exact())
        .unwrap();
    assert_eq!(exact.groups.len(), 1);

    let similar = detector()
        .detect(&files, &FsContentSource, &DetectionParams::similarity(0.1))
        .unwrap();
    assert!(similar.groups.is_empty());
}

#[test]
fn test_similarity_mode_finds_near_duplicates() {
    let dir = tempdir().unwrap();
    let original = document(200);
    let mut edited = original.clone();
    edited[100] = "this line was rewritten by hand\n".to_string();

    fs::write(dir.path().join("original.txt"), original.concat()).unwrap();
    fs::write(dir.path().join("edited.txt"), edited.concat()).unwrap();
    fs::write(dir.path().join("other.txt"), unrelated(200)).unwrap();

    let files = walk(dir.path());
    let report = detector()
        .detect(&files, &FsContentSource, &DetectionParams::similarity(0.8))
        .unwrap();

    assert_eq!(report.scan_mode, DetectionMode::Similarity);
    assert_eq!(report.thresholds_used.similarity, Some(0.8));
    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.kind(), GroupKind::Similarity);
    assert!(group.contains(&dir.path().join("original.txt")));
    assert!(group.contains(&dir.path().join("edited.txt")));
    let avg = group.avg_similarity().unwrap();
    assert!(avg >= 0.8, "avg similarity {avg}");
}

#[test]
fn test_similarity_threshold_one_is_exact_content() {
    let dir = tempdir().unwrap();
    let text = document(50).concat();
    fs::write(dir.path().join("a"), &text).unwrap();
    fs::write(dir.path().join("b"), &text).unwrap();

    let files = walk(dir.path());
    let report = detector()
        .detect(&files, &FsContentSource, &DetectionParams::similarity(1.0))
        .unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].avg_similarity(), Some(1.0));
}

#[test]
fn test_filename_mode_ignores_content() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("backup")).unwrap();
    fs::write(dir.path().join("holiday.jpg"), "one").unwrap();
    fs::write(dir.path().join("holiday (1).jpg"), "two").unwrap();
    fs::write(dir.path().join("backup/Holiday.jpg"), "three").unwrap();
    fs::write(dir.path().join("receipt.pdf"), "one").unwrap();

    let files = walk(dir.path());
    let report = detector()
        .detect(
            &files,
            &FsContentSource,
            &DetectionParams::filename(FilenameMode::Smart, 0.85),
        )
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 3);
    assert!(!report.groups[0].contains(&dir.path().join("receipt.pdf")));
}

#[test]
fn test_multi_criteria_folds_filename_into_exact() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("backup")).unwrap();
    fs::write(dir.path().join("photo.jpg"), "pixels").unwrap();
    fs::write(dir.path().join("backup/photo.jpg"), "pixels").unwrap();
    fs::write(dir.path().join("photo (1).jpg"), "other pixels").unwrap();
    fs::write(dir.path().join("notes.txt"), "text").unwrap();

    let files = walk(dir.path());
    let params = DetectionParams::multi_criteria(
        [Criterion::Exact, Criterion::Filename],
        CriterionWeights::default(),
        vec![Criterion::Exact, Criterion::Filename],
    );
    let report = detector()
        .detect(&files, &FsContentSource, &params)
        .unwrap();

    assert_eq!(report.scan_mode, DetectionMode::MultiCriteria);
    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.kind(), GroupKind::MultiCriteria);
    assert_eq!(group.len(), 2);
    assert!(!group.contains(&dir.path().join("photo (1).jpg")));

    let merge = group.merge_detail().unwrap();
    assert_eq!(merge.primary_criterion, Criterion::Exact);
    assert!(merge.criteria_used.contains(&Criterion::Filename));
    assert_eq!(merge.details.len(), 2);
    assert!(merge.confidence > 0.5 && merge.confidence < 1.0);
}

#[test]
fn test_multi_criteria_groups_are_disjoint() {
    let dir = tempdir().unwrap();
    let text = document(80);
    for i in 0..4 {
        fs::write(dir.path().join(format!("copy_{i}.txt")), text.concat()).unwrap();
    }
    fs::write(dir.path().join("copy_9.txt"), unrelated(80)).unwrap();
    fs::write(dir.path().join("report.txt"), text.concat()).unwrap();
    fs::write(dir.path().join("report (2).txt"), unrelated(40)).unwrap();

    let files = walk(dir.path());
    let params = DetectionParams::multi_criteria(
        Criterion::ALL,
        CriterionWeights::default(),
        vec![Criterion::Exact, Criterion::Similarity, Criterion::Filename],
    );
    let report = detector()
        .detect(&files, &FsContentSource, &params)
        .unwrap();

    let mut seen = std::collections::HashSet::new();
    for group in &report.groups {
        assert!(group.len() >= 2);
        for path in group.paths() {
            assert!(seen.insert(path), "file in two groups");
        }
    }
    let confidences: Vec<f64> = report
        .groups
        .iter()
        .map(|g| g.confidence().unwrap())
        .collect();
    assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_unreadable_file_gives_partial_report() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "same").unwrap();
    fs::write(dir.path().join("b"), "same").unwrap();
    fs::write(dir.path().join("vanishing"), "same").unwrap();

    let files = walk(dir.path());
    fs::remove_file(dir.path().join("vanishing")).unwrap();

    let report = detector()
        .detect(&files, &FsContentSource, &DetectionParams::exact())
        .unwrap();

    assert!(report.is_partial());
    assert_eq!(report.unreadable.len(), 1);
    assert_eq!(report.unreadable[0].path(), dir.path().join("vanishing"));
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
}

#[test]
fn test_detector_is_reusable() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "same").unwrap();
    fs::write(dir.path().join("b"), "same").unwrap();
    let files = walk(dir.path());

    let detector = detector();
    let first = detector
        .detect(&files, &FsContentSource, &DetectionParams::exact())
        .unwrap();
    let second = detector
        .detect(&files, &FsContentSource, &DetectionParams::exact())
        .unwrap();
    assert_eq!(first.groups, second.groups);
}

#[test]
fn test_multi_criteria_runs_are_repeatable() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("copy")).unwrap();
    fs::create_dir(dir.path().join("archive")).unwrap();

    let report = document(200).concat();
    let mut revised = document(200);
    revised[199] = "paragraph 199: revised at the last minute\n".to_string();
    let notes = unrelated(300);

    fs::write(dir.path().join("report.txt"), &report).unwrap();
    fs::write(dir.path().join("copy/report.txt"), &report).unwrap();
    fs::write(dir.path().join("report (1).txt"), revised.concat()).unwrap();
    fs::write(dir.path().join("notes.md"), &notes).unwrap();
    fs::write(dir.path().join("archive/notes.md"), &notes).unwrap();
    fs::write(dir.path().join("notes_old.md"), unrelated(40)).unwrap();
    let files = walk(dir.path());

    let params = DetectionParams::multi_criteria(
        Criterion::ALL,
        CriterionWeights::default(),
        vec![Criterion::Exact, Criterion::Similarity, Criterion::Filename],
    )
    .with_similarity_threshold(0.7)
    .with_filename(FilenameMode::Smart, 0.85);

    let detector = detector();
    let first = detector.detect(&files, &FsContentSource, &params).unwrap();
    let second = detector.detect(&files, &FsContentSource, &params).unwrap();

    assert!(first.groups.len() >= 2);
    assert_eq!(first.groups, second.groups);
    for (a, b) in first.groups.iter().zip(&second.groups) {
        assert_eq!(a.paths(), b.paths());
        assert_eq!(a.merge_detail(), b.merge_detail());
    }

    // the report copies share bytes, so exact leads and filename corroborates
    let report_group = first
        .groups
        .iter()
        .find(|g| g.contains(&dir.path().join("copy/report.txt")))
        .unwrap();
    let detail = report_group.merge_detail().unwrap();
    assert_eq!(detail.primary_criterion, Criterion::Exact);
    assert!(detail.criteria_used.contains(&Criterion::Filename));
}

// xorshift so both files are reproducible
fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

#[test]
fn test_similarity_threshold_against_known_overlap() {
    let shared = noise(1, 1330);
    let mut left = shared.clone();
    left.extend(noise(2, 2670));
    let mut right = shared;
    right.extend(noise(3, 2670));

    // 4-byte shingles: 1327 shared, 3997 per file => Jaccard 1327 / 6667
    let jaccard = 1327.0 / 6667.0;

    let mut source = MemoryContentSource::new();
    source.insert("/left.bin", left);
    source.insert("/right.bin", right);
    let files = vec![
        FileRecord::new("/left.bin", 4000, SystemTime::UNIX_EPOCH),
        FileRecord::new("/right.bin", 4000, SystemTime::UNIX_EPOCH),
    ];

    let detector = DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(1)
            .with_signature_threads(1)
            .with_shingle_config(ShingleConfig::new(4, 512)),
    )
    .unwrap();

    let strict = detector
        .detect(&files, &source, &DetectionParams::similarity(0.3))
        .unwrap();
    assert!(strict.groups.is_empty());

    let loose = detector
        .detect(&files, &source, &DetectionParams::similarity(0.1))
        .unwrap();
    assert_eq!(loose.groups.len(), 1);
    assert_eq!(loose.groups[0].len(), 2);
    let avg = loose.groups[0].avg_similarity().unwrap();
    assert!((avg - jaccard).abs() < 0.06, "estimate {avg} vs {jaccard}");
}

#[derive(Default)]
struct Recorder {
    starts: Mutex<Vec<Phase>>,
    fractions: Mutex<Vec<f64>>,
}

impl ProgressCallback for Recorder {
    fn on_phase_start(&self, phase: Phase, _total: usize) {
        self.starts.lock().unwrap().push(phase);
    }

    fn on_progress(&self, update: &ProgressUpdate<'_>) {
        self.fractions.lock().unwrap().push(update.fraction);
    }

    fn on_phase_end(&self, _phase: Phase) {}
}

#[test]
fn test_progress_is_monotonic_across_phases() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        fs::write(dir.path().join(format!("f{i}.txt")), format!("content {}", i % 3)).unwrap();
    }
    let files = walk(dir.path());

    let recorder = Arc::new(Recorder::default());
    let detector = DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(1)
            .with_signature_threads(1)
            .with_progress_interval(1)
            .with_progress_callback(recorder.clone()),
    )
    .unwrap();
    let params = DetectionParams::multi_criteria(
        Criterion::ALL,
        CriterionWeights::default(),
        vec![Criterion::Exact, Criterion::Similarity, Criterion::Filename],
    );
    detector.detect(&files, &FsContentSource, &params).unwrap();

    let starts = recorder.starts.lock().unwrap().clone();
    assert_eq!(starts.first(), Some(&Phase::Artifacts));
    assert_eq!(starts.last(), Some(&Phase::Merging));

    let fractions = recorder.fractions.lock().unwrap().clone();
    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
}

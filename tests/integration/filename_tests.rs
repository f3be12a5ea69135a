use dupesieve::duplicates::{
    CriterionDetail, DetectionParams, DetectorConfig, DuplicateDetector, FilenameMode,
};
use dupesieve::scanner::{profile, DecorationKind, FileRecord, MemoryContentSource};
use std::path::Path;
use std::time::SystemTime;

const NAMES: &[&str] = &[
    "/a/Readme.md",
    "/b/readme.md",
    "/c/README (1).md",
    "/d/readme.txt",
    "/e/documnt.txt",
    "/f/document.txt",
];

fn records(paths: &[&str]) -> Vec<FileRecord> {
    paths
        .iter()
        .map(|p| FileRecord::new(*p, 10, SystemTime::UNIX_EPOCH))
        .collect()
}

fn run(mode: FilenameMode, threshold: f64) -> dupesieve::duplicates::DetectionReport {
    let detector = DuplicateDetector::new(DetectorConfig::default().with_hash_threads(1)).unwrap();
    // no content registered: filename grouping must not read bytes
    let source = MemoryContentSource::new();
    detector
        .detect(
            &records(NAMES),
            &source,
            &DetectionParams::filename(mode, threshold),
        )
        .unwrap()
}

fn group_sizes(report: &dupesieve::duplicates::DetectionReport) -> Vec<usize> {
    report.groups.iter().map(|g| g.len()).collect()
}

#[test]
fn test_exact_mode_is_case_sensitive() {
    let report = run(FilenameMode::Exact, 0.85);
    assert!(report.groups.is_empty());
    assert!(report.unreadable.is_empty());
}

#[test]
fn test_exact_base_mode_ignores_case_and_extension() {
    let report = run(FilenameMode::ExactBase, 0.85);
    assert_eq!(group_sizes(&report), vec![3]);

    let group = &report.groups[0];
    assert!(group.contains(Path::new("/a/Readme.md")));
    assert!(group.contains(Path::new("/d/readme.txt")));
    assert!(!group.contains(Path::new("/c/README (1).md")));

    let avg = group.avg_similarity().unwrap();
    assert!(avg > 0.95 && avg < 1.0, "avg {avg}");
}

#[test]
fn test_exact_base_threshold_drops_other_extensions() {
    let report = run(FilenameMode::ExactBase, 0.99);
    assert_eq!(group_sizes(&report), vec![2]);
    assert!(!report.groups[0].contains(Path::new("/d/readme.txt")));
}

#[test]
fn test_smart_mode_strips_counters() {
    let report = run(FilenameMode::Smart, 0.85);
    assert_eq!(group_sizes(&report), vec![4]);
    assert!(report.groups[0].contains(Path::new("/c/README (1).md")));
    assert!(report.unreadable.is_empty());
}

#[test]
fn test_fuzzy_mode_tolerates_typos() {
    let report = run(FilenameMode::Fuzzy, 0.85);
    assert_eq!(group_sizes(&report), vec![4, 2]);

    let typo = &report.groups[1];
    assert!(typo.contains(Path::new("/e/documnt.txt")));
    assert!(typo.contains(Path::new("/f/document.txt")));
    let avg = typo.avg_similarity().unwrap();
    assert!((avg - 0.975).abs() < 1e-9, "avg {avg}");
}

#[test]
fn test_group_detail_carries_seed_profile() {
    let report = run(FilenameMode::Smart, 0.85);
    match report.groups[0].criterion_detail().unwrap() {
        CriterionDetail::Filename {
            normalized_base_name,
            extension,
            ..
        } => {
            assert_eq!(normalized_base_name, "readme");
            assert_eq!(extension, "md");
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[test]
fn test_files_within_group_sorted_by_name() {
    let report = run(FilenameMode::Smart, 0.85);
    let names: Vec<&str> = report.groups[0]
        .files
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}

#[test]
fn test_decorated_copies_share_normalized_base() {
    let cases: &[(&str, &str, DecorationKind)] = &[
        ("Copy of report.docx", "report", DecorationKind::CopyMarker),
        ("plan_v2.xlsx", "plan", DecorationKind::Version),
        ("scan 2024-01-15.pdf", "scan", DecorationKind::Timestamp),
        ("song [remastered].mp3", "song", DecorationKind::BracketedTag),
        ("notes dup.md", "notes", DecorationKind::DuplicateMarker),
    ];

    for &(name, base, kind) in cases {
        let p = profile(name);
        assert_eq!(p.normalized_base_name, base, "{name}");
        assert!(p.detected_patterns.contains(&kind), "{name}: {kind:?}");
    }
}

#[test]
fn test_decorated_names_group_in_smart_mode() {
    let paths = [
        "/docs/report.docx",
        "/docs/Copy of report.docx",
        "/docs/report - Copy (2).docx",
        "/docs/summary.docx",
    ];
    let detector = DuplicateDetector::with_defaults().unwrap();
    let report = detector
        .detect(
            &records(&paths),
            &MemoryContentSource::new(),
            &DetectionParams::filename(FilenameMode::Smart, 0.85),
        )
        .unwrap();

    assert_eq!(group_sizes(&report), vec![3]);
    assert!(!report.groups[0].contains(Path::new("/docs/summary.docx")));
}

use dupesieve::duplicates::{
    Criterion, CriterionWeights, DetectionParams, DetectorConfig, DuplicateDetector, GroupKind,
};
use dupesieve::scanner::{FileRecord, MemoryContentSource};
use std::collections::BTreeSet;
use std::time::SystemTime;

fn batch(contents: &[(&str, &str)]) -> (Vec<FileRecord>, MemoryContentSource) {
    let mut source = MemoryContentSource::new();
    let files = contents
        .iter()
        .map(|&(path, text)| {
            source.insert(path, text);
            FileRecord::new(path, text.len() as u64, SystemTime::UNIX_EPOCH)
        })
        .collect();
    (files, source)
}

fn detector() -> DuplicateDetector {
    DuplicateDetector::new(
        DetectorConfig::default()
            .with_hash_threads(1)
            .with_signature_threads(1),
    )
    .unwrap()
}

fn exact_and_filename(order: Vec<Criterion>, weights: CriterionWeights) -> DetectionParams {
    DetectionParams::multi_criteria([Criterion::Exact, Criterion::Filename], weights, order)
}

#[test]
fn test_priority_order_sets_primary_criterion() {
    let (files, source) = batch(&[("/x/a.txt", "same"), ("/y/a.txt", "same")]);

    let exact_first = exact_and_filename(
        vec![Criterion::Exact, Criterion::Filename],
        CriterionWeights::default(),
    );
    let report = detector().detect(&files, &source, &exact_first).unwrap();
    assert_eq!(report.groups.len(), 1);
    let detail = report.groups[0].merge_detail().unwrap();
    assert_eq!(detail.primary_criterion, Criterion::Exact);
    assert_eq!(detail.details[0].criterion(), Criterion::Exact);

    let filename_first = exact_and_filename(
        vec![Criterion::Filename, Criterion::Exact],
        CriterionWeights::default(),
    );
    let report = detector().detect(&files, &source, &filename_first).unwrap();
    let detail = report.groups[0].merge_detail().unwrap();
    assert_eq!(detail.primary_criterion, Criterion::Filename);
    assert_eq!(detail.details[0].criterion(), Criterion::Filename);
    assert_eq!(
        detail.criteria_used,
        BTreeSet::from([Criterion::Exact, Criterion::Filename])
    );
}

#[test]
fn test_confidence_is_order_independent_for_two_criteria() {
    let (files, source) = batch(&[("/x/a.txt", "same"), ("/y/a.txt", "same")]);

    for order in [
        vec![Criterion::Exact, Criterion::Filename],
        vec![Criterion::Filename, Criterion::Exact],
    ] {
        let params = exact_and_filename(order, CriterionWeights::default());
        let report = detector().detect(&files, &source, &params).unwrap();
        // exact 1.0 (boost clamped), filename 0.6 * 1.0, averaged
        let confidence = report.groups[0].confidence().unwrap();
        assert!((confidence - 0.8).abs() < 1e-9, "confidence {confidence}");
    }
}

#[test]
fn test_weights_are_relative_to_max_weight() {
    let (files, source) = batch(&[("/x/a.txt", "same"), ("/y/a.txt", "same")]);
    let weights = CriterionWeights::default().with(Criterion::Filename, 2.0);
    let params = exact_and_filename(vec![Criterion::Exact, Criterion::Filename], weights);

    let report = detector().detect(&files, &source, &params).unwrap();
    // exact 0.5 * 1.1 = 0.55, filename 1.0, averaged
    let confidence = report.groups[0].confidence().unwrap();
    assert!((confidence - 0.775).abs() < 1e-9, "confidence {confidence}");
}

#[test]
fn test_single_criterion_multi_mode() {
    let (files, source) = batch(&[("/a", "same"), ("/b", "same"), ("/c", "other")]);
    let params = DetectionParams::multi_criteria(
        [Criterion::Exact],
        CriterionWeights::default(),
        vec![Criterion::Exact],
    );

    let report = detector().detect(&files, &source, &params).unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].kind(), GroupKind::MultiCriteria);
    assert_eq!(report.groups[0].confidence(), Some(1.0));
    assert_eq!(report.thresholds_used.filename, None);
}

#[test]
fn test_disabled_criteria_in_order_are_skipped() {
    let (files, source) = batch(&[("/x/a.txt", "one"), ("/y/a.txt", "two")]);
    // filename is ranked but not enabled, so the same-name pair is not grouped
    let params = DetectionParams::multi_criteria(
        [Criterion::Exact],
        CriterionWeights::default(),
        vec![Criterion::Filename, Criterion::Exact],
    );

    let report = detector().detect(&files, &source, &params).unwrap();
    assert!(report.groups.is_empty());
}

#[test]
fn test_groups_sorted_by_confidence_then_path() {
    let (files, source) = batch(&[
        ("/n/song.mp3", "first take"),
        ("/m/song.mp3", "second take"),
        ("/p/clip.mov", "frames"),
        ("/q/clip-renamed.mov", "frames"),
    ]);
    let params = exact_and_filename(
        vec![Criterion::Exact, Criterion::Filename],
        CriterionWeights::default(),
    );

    let report = detector().detect(&files, &source, &params).unwrap();
    assert_eq!(report.groups.len(), 2);
    // exact group (1.0) before the filename-only group (0.6)
    assert_eq!(
        report.groups[0].merge_detail().unwrap().primary_criterion,
        Criterion::Exact
    );
    assert!(report.groups[0].contains(std::path::Path::new("/p/clip.mov")));
    assert!((report.groups[1].confidence().unwrap() - 0.6).abs() < 1e-9);
}

use dupesieve::config::{Config, ConfigError};
use dupesieve::duplicates::{Criterion, DetectionMode, FilenameMode};
use figment::providers::Serialized;
use serde::Serialize;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
similarity_threshold = 0.9
filename_mode = "fuzzy"
filename_threshold = 0.7
criteria = ["exact", "filename"]
priority_order = ["filename", "exact"]
ignore_patterns = ["*.tmp", "target/"]
min_size = 1024

[weights]
filename = 0.7
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert!((config.similarity_threshold - 0.9).abs() < f64::EPSILON);
    assert_eq!(config.filename_mode, FilenameMode::Fuzzy);
    assert_eq!(config.criteria, vec![Criterion::Exact, Criterion::Filename]);
    assert_eq!(
        config.priority_order,
        vec![Criterion::Filename, Criterion::Exact]
    );
    assert!((config.weights.filename - 0.7).abs() < f64::EPSILON);
    // unspecified weights keep their defaults
    assert!((config.weights.exact - 1.0).abs() < f64::EPSILON);
    assert_eq!(config.ignore_patterns.len(), 2);
    assert_eq!(config.min_size, Some(1024));
    assert_eq!(config.max_size, None);

    let params = config.detection_params(DetectionMode::MultiCriteria);
    assert!(params.validate().is_ok());
    assert_eq!(params.filename_mode, FilenameMode::Fuzzy);
    assert!((params.filename_threshold - 0.7).abs() < f64::EPSILON);
}

#[test]
fn test_hierarchy_file_env_overrides() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "signature_threads = 2\n\n[weights]\nsimilarity = 0.4\n",
    )
    .unwrap();

    // 1. Config file overrides defaults
    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.signature_threads, 2);
    assert!((config.weights.similarity - 0.4).abs() < f64::EPSILON);

    // 2. Environment overrides the file; double underscore for nesting
    std::env::set_var("DUPESIEVE_SIGNATURE_THREADS", "6");
    std::env::set_var("DUPESIEVE_WEIGHTS__SIMILARITY", "0.3");
    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.signature_threads, 6);
    assert!((config.weights.similarity - 0.3).abs() < f64::EPSILON);

    // 3. Command-line overrides win over the environment
    #[derive(Serialize)]
    struct Overrides {
        signature_threads: usize,
    }
    let config =
        Config::load_with_overrides(Some(&config_path), &Overrides { signature_threads: 8 })
            .unwrap();
    assert_eq!(config.signature_threads, 8);
    assert!((config.weights.similarity - 0.3).abs() < f64::EPSILON);

    std::env::remove_var("DUPESIEVE_SIGNATURE_THREADS");
    std::env::remove_var("DUPESIEVE_WEIGHTS__SIMILARITY");
}

#[test]
fn test_unknown_key_suggests_closest() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "filename_treshold = 0.9\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    match &err {
        ConfigError::UnknownKey { key, suggestion } => {
            assert_eq!(key, "filename_treshold");
            assert_eq!(suggestion.as_deref(), Some("filename_threshold"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("filename_threshold"));
}

#[test]
fn test_unknown_key_without_suggestion() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "theme = \"dark\"\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnknownKey { suggestion: None, .. }
    ));
}

#[test]
fn test_invalid_value_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "filename_threshold = 1.5\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            key: "filename_threshold",
            ..
        }
    ));
}

#[test]
fn test_wrong_type_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "filename_mode = \"sloppy\"\n").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(err, ConfigError::Extract(_)));
}

#[test]
fn test_missing_explicit_file() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let err = Config::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(ref p) if p == &missing));
}

#[test]
fn test_config_serializes_back_to_figment() {
    let mut config = Config::default();
    config.filename_mode = FilenameMode::ExactBase;
    config.priority_order = vec![Criterion::Similarity, Criterion::Exact, Criterion::Filename];

    let figment = figment::Figment::from(Serialized::defaults(&config));
    let round_tripped = Config::from_figment(&figment).unwrap();
    assert_eq!(round_tripped, config);
}

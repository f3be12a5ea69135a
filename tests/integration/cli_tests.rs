use anyhow::Context;
use clap::Parser;
use dupesieve::cli::{Cli, Commands, OutputFormat};
use dupesieve::config::{Config, ConfigError};
use dupesieve::duplicates::{Criterion, DetectError, DetectionMode, FilenameMode};
use dupesieve::error::{ExitCode, StructuredError};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn scan_args(cli: Cli) -> dupesieve::cli::ScanArgs {
    let Commands::Scan(args) = cli.command;
    args
}

#[test]
fn test_flags_override_config_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
similarity_threshold = 0.7
filename_mode = "exact-base"
skip_hidden = false
ignore_patterns = ["*.bak"]
"#,
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "dupesieve",
        "--config",
        config_path.to_str().unwrap(),
        "scan",
        "/data",
        "--similarity-threshold",
        "0.95",
        "--skip-hidden",
        "--min-size",
        "1KiB",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some(config_path.as_path()));
    let args = scan_args(cli);

    let config = Config::load_with_overrides(Some(&config_path), &args.overrides()).unwrap();
    assert!((config.similarity_threshold - 0.95).abs() < f64::EPSILON);
    // not given on the command line, so the file value stays
    assert_eq!(config.filename_mode, FilenameMode::ExactBase);
    assert!(config.skip_hidden);
    assert_eq!(config.min_size, Some(1024));
    assert_eq!(config.ignore_patterns, vec!["*.bak".to_string()]);
}

#[test]
fn test_weight_flags_merge_with_file_weights() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[weights]\nexact = 3.0\n").unwrap();

    let cli = Cli::try_parse_from([
        "dupesieve",
        "scan",
        "/data",
        "--mode",
        "multi-criteria",
        "--weight",
        "filename=2.5",
    ])
    .unwrap();
    let args = scan_args(cli);
    assert_eq!(args.mode, DetectionMode::MultiCriteria);

    let config = Config::load_with_overrides(Some(&config_path), &args.overrides()).unwrap();
    assert!((config.weights.exact - 3.0).abs() < f64::EPSILON);
    assert!((config.weights.filename - 2.5).abs() < f64::EPSILON);

    let params = config.detection_params(args.mode);
    assert!(params.validate().is_ok());
}

#[test]
fn test_invalid_flag_value_rejected_by_config() {
    let cli = Cli::try_parse_from([
        "dupesieve",
        "scan",
        "/data",
        "--filename-threshold",
        "0",
    ])
    .unwrap();
    let args = scan_args(cli);

    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "").unwrap();

    let err = Config::load_with_overrides(Some(&config_path), &args.overrides()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            key: "filename_threshold",
            ..
        }
    ));
    let err = anyhow::Error::new(err).context("Failed to load configuration");
    assert_eq!(ExitCode::for_error(&err), ExitCode::InvalidParameters);
}

#[test]
fn test_scan_defaults() {
    let cli = Cli::try_parse_from(["dupesieve", "scan", "."]).unwrap();
    assert!(!cli.json_errors);
    assert!(cli.config.is_none());
    let args = scan_args(cli);
    assert_eq!(args.path, PathBuf::from("."));
    assert_eq!(args.output, OutputFormat::Text);
    assert!(args.weights.is_empty());
    assert!(args.ignore_patterns.is_empty());
    assert!(!args.no_progress);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "dupesieve",
        "scan",
        "/data",
        "-vv",
        "--json-errors",
        "--ignore",
        "*.tmp",
        "--ignore",
        "node_modules/",
    ])
    .unwrap();
    assert_eq!(cli.verbose, 2);
    assert!(cli.json_errors);
    let args = scan_args(cli);
    assert_eq!(args.ignore_patterns, vec!["*.tmp", "node_modules/"]);
}

#[test]
fn test_rejects_unknown_criterion() {
    let result = Cli::try_parse_from([
        "dupesieve",
        "scan",
        "/data",
        "--criteria",
        "exact,perceptual",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_criterion_aliases() {
    let cli = Cli::try_parse_from([
        "dupesieve",
        "scan",
        "/data",
        "--priority",
        "name,content,similar",
    ])
    .unwrap();
    let args = scan_args(cli);
    assert_eq!(
        args.priority,
        Some(vec![
            Criterion::Filename,
            Criterion::Exact,
            Criterion::Similarity
        ])
    );
}

#[test]
fn test_exit_code_for_cancellation() {
    let err = anyhow::Error::new(DetectError::Cancelled);
    let code = ExitCode::for_error(&err);
    assert_eq!(code, ExitCode::Interrupted);
    assert_eq!(code.as_i32(), 130);

    let structured = StructuredError::new(&err, code);
    assert!(structured.interrupted);
    assert_eq!(structured.code, "DS130");
}

#[test]
fn test_exit_code_for_unrelated_error() {
    let result: Result<(), std::io::Error> = Err(std::io::Error::new(
        std::io::ErrorKind::Other,
        "disk on fire",
    ));
    let err = result.context("Failed to write report").unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);

    let json = serde_json::to_value(StructuredError::new(&err, ExitCode::GeneralError)).unwrap();
    assert_eq!(json["exit_code"], 1);
    assert_eq!(json["message"], "Failed to write report: disk on fire");
}

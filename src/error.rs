//! Exit codes and machine-readable error reports for the command-line front-end.

use serde::Serialize;

use crate::duplicates::DetectError;

/// Process exit codes.
///
/// - 0: groups were found
/// - 1: unexpected failure
/// - 2: the run completed and found no groups
/// - 3: the run completed but some files could not be read
/// - 4: detection parameters or configuration were rejected
/// - 130: cancelled by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Groups were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// No groups were found.
    NoDuplicates = 2,
    /// Groups were computed, but some files were unreadable.
    PartialSuccess = 3,
    /// Parameters or configuration were rejected before any file was read.
    InvalidParameters = 4,
    /// The run was cancelled.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::NoDuplicates => "DS002",
            Self::PartialSuccess => "DS003",
            Self::InvalidParameters => "DS004",
            Self::Interrupted => "DS130",
        }
    }

    /// Exit code for an error that ended the run.
    ///
    /// Looks through the `anyhow` chain for a [`DetectError`] or a
    /// [`ConfigError`](crate::config::ConfigError).
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(detect) = cause.downcast_ref::<DetectError>() {
                return match detect {
                    DetectError::Cancelled => Self::Interrupted,
                    DetectError::InvalidParameters(_) => Self::InvalidParameters,
                    DetectError::Internal(_) => Self::GeneralError,
                };
            }
            if cause.downcast_ref::<crate::config::ConfigError>().is_some() {
                return Self::InvalidParameters;
            }
        }
        Self::GeneralError
    }
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code prefix, e.g. "DS004"
    pub code: String,
    /// Numeric exit code
    pub exit_code: i32,
    /// Human-readable message including the cause chain
    pub message: String,
    /// Whether the run was cancelled
    pub interrupted: bool,
}

impl StructuredError {
    /// Build a report from an error and the exit code it maps to.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

//! Cooperative cancellation and Ctrl+C handling.
//!
//! The engine never stops work forcibly. Callers hand a [`CancellationToken`]
//! to the detector; worker loops poll it between chunks and between rows of
//! pairwise comparisons, and the run ends with
//! [`DetectError::Cancelled`](crate::duplicates::DetectError::Cancelled).
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupesieve::signal::install_handler;
//! use dupesieve::duplicates::DetectorConfig;
//!
//! let token = install_handler().expect("Failed to install signal handler");
//! let config = DetectorConfig::default().with_cancellation(token.clone());
//! ```
//!
//! # Exit Codes
//!
//! When Ctrl+C is received the token is cancelled, "Interrupted. Cleaning up..."
//! is printed to stderr, and the binary exits with code 130 (128 + SIGINT).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (Ctrl+C) interruption.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cooperative cancellation flag.
///
/// Clones share the same flag. Once cancelled, a token stays cancelled until
/// [`reset`](Self::reset) is called.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancellationToken> = OnceLock::new();

/// Install a Ctrl+C handler that cancels the returned token.
///
/// The handler is process-wide, so repeated calls (tests calling `run_app`
/// several times) get the already-registered token back, reset to the
/// not-cancelled state.
///
/// # Errors
///
/// Returns [`SignalError`] if the handler cannot be registered and no
/// handler was registered earlier by this function.
pub fn install_handler() -> Result<CancellationToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancellationToken::new();
    let hooked = token.clone();

    match ctrlc::set_handler(move || {
        hooked.cancel();

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();

        log::info!("Cancellation signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            // Registered elsewhere in this process; hand out an unhooked token
            // that still supports manual cancellation.
            log::debug!("Ctrl+C handler already registered, using unhooked token");
            let fallback = GLOBAL_TOKEN.get_or_init(CancellationToken::new);
            fallback.reset();
            Ok(fallback.clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}

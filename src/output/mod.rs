//! Output formatters for detection reports.
//!
//! - [`json`] for automation and scripting
//! - [`text`] for terminals

pub mod json;
pub mod text;

pub use json::{JsonGroup, JsonOutput, JsonOutputError, JsonSummary};
pub use text::TextOutput;

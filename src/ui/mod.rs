//! User interface module - console output.
//!
//! Everything is written to caller-supplied sinks so the CLI can be driven
//! with in-memory buffers in tests:
//! - `formatter` - Help text, results and error display

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{display_error, display_help, display_output, help_text};

//! Command-line handling: argument interpretation and the inspect workflow

pub mod orchestration;

pub use orchestration::{execute, inspect_module, parse_invocation, InspectArgs, Invocation};

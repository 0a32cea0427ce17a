pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fields;
pub mod module;
pub mod ui;

pub use error::{AsmInfoError, Result};

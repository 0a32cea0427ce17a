//! Module inspection abstraction layer
//!
//! This module provides a trait-based abstraction over reading the
//! descriptive metadata of a compiled module, so the CLI can run against a
//! real assembly on disk or an in-memory mock in tests.
//!
//! # Overview
//!
//! - [clr::ClrModule]: reads a managed PE image and its ECMA-335 metadata
//! - [mock::MockModule]: a mock implementation for testing
//!
//! ```rust
//! # use asm_info::module::{MetadataKey, MockModule, ModuleInspector};
//! let module = MockModule::new("Contoso.Core").with(MetadataKey::FileVersion, "1.4.0.0");
//! assert_eq!(module.lookup(MetadataKey::Name), Some("Contoso.Core"));
//! assert_eq!(module.lookup(MetadataKey::Description), None);
//! ```

pub mod clr;
pub(crate) mod metadata;
pub mod mock;
pub(crate) mod pe;

pub use clr::ClrModule;
pub use mock::MockModule;

use std::path::Path;

use crate::error::Result;

/// The named metadata fields a module exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Simple name of the assembly
    Name,
    /// `AssemblyInformationalVersionAttribute`
    InformationalVersion,
    /// `AssemblyFileVersionAttribute`
    FileVersion,
    /// `AssemblyConfigurationAttribute`
    Configuration,
    /// `AssemblyDescriptionAttribute`
    Description,
}

/// Read-only access to a loaded module's metadata
///
/// Implementations return `None` for fields the module does not carry.
pub trait ModuleInspector {
    fn lookup(&self, key: MetadataKey) -> Option<&str>;
}

/// Load the module at `path` with the default inspector.
pub fn open(path: &Path) -> Result<Box<dyn ModuleInspector>> {
    Ok(Box::new(ClrModule::open(path)?))
}

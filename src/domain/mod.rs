//! Domain logic - semantic versions, independent of how modules are read

pub mod prerelease;
pub mod version;

pub use prerelease::{BuildMetadata, Identifier, PreRelease};
pub use version::{ParseError, SemanticVersion};

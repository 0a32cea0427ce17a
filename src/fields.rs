//! Field selection and rendering.
//!
//! Flags are matched case-insensitively against a fixed table; each field
//! knows its label and how to pull its value out of a [`ModuleInfo`].

use crate::domain::SemanticVersion;
use crate::module::{MetadataKey, ModuleInspector};

/// A displayable piece of module information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    FullVersion,
    Version,
    Major,
    Minor,
    Patch,
    Release,
    Build,
    FileVersion,
    Configuration,
    Description,
}

/// Upper-cased flag to field
const FLAGS: &[(&str, Field)] = &[
    ("-N", Field::Name),
    ("--NAME", Field::Name),
    ("--FULLVERSION", Field::FullVersion),
    ("-V", Field::Version),
    ("--VERSION", Field::Version),
    ("--MAJOR", Field::Major),
    ("--MINOR", Field::Minor),
    ("--PATCH", Field::Patch),
    ("--RELEASE", Field::Release),
    ("--BUILD", Field::Build),
    ("-FV", Field::FileVersion),
    ("--FILEVERSION", Field::FileVersion),
    ("-C", Field::Configuration),
    ("--CONFIGURATION", Field::Configuration),
    ("-D", Field::Description),
    ("--DESCRIPTION", Field::Description),
];

/// Fields shown when no field flag is given
pub const DEFAULT_FIELDS: [Field; 11] = [
    Field::Name,
    Field::FullVersion,
    Field::Version,
    Field::Major,
    Field::Minor,
    Field::Patch,
    Field::Release,
    Field::Build,
    Field::FileVersion,
    Field::Configuration,
    Field::Description,
];

impl Field {
    /// Look up a command-line flag, ignoring case.
    ///
    /// # Example
    /// ```
    /// use asm_info::fields::Field;
    ///
    /// assert_eq!(Field::from_flag("--fullVersion"), Some(Field::FullVersion));
    /// assert_eq!(Field::from_flag("-FV"), Some(Field::FileVersion));
    /// assert_eq!(Field::from_flag("--bogus"), None);
    /// ```
    pub fn from_flag(flag: &str) -> Option<Field> {
        let key = flag.to_uppercase();
        FLAGS
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, field)| *field)
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::FullVersion => "FullVersion",
            Field::Version => "Version",
            Field::Major => "Major",
            Field::Minor => "Minor",
            Field::Patch => "Patch",
            Field::Release => "Release",
            Field::Build => "Build",
            Field::FileVersion => "FileVersion",
            Field::Configuration => "Configuration",
            Field::Description => "Description",
        }
    }
}

/// Map requested keys to fields, keeping order and duplicates and
/// dropping keys that are not field flags.
pub fn select_fields<S: AsRef<str>>(keys: &[S]) -> Vec<Field> {
    keys.iter()
        .filter_map(|key| Field::from_flag(key.as_ref()))
        .collect()
}

/// Resolved values for one module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleInfo {
    pub name: Option<String>,
    /// `None` when the informational version is missing or not SemVer
    pub version: Option<SemanticVersion>,
    pub file_version: Option<String>,
    pub configuration: Option<String>,
    pub description: Option<String>,
}

impl ModuleInfo {
    pub fn from_inspector(module: &dyn ModuleInspector) -> Self {
        let owned = |key| module.lookup(key).map(str::to_string);

        ModuleInfo {
            name: owned(MetadataKey::Name),
            version: SemanticVersion::try_parse(module.lookup(MetadataKey::InformationalVersion)),
            file_version: owned(MetadataKey::FileVersion),
            configuration: owned(MetadataKey::Configuration),
            description: owned(MetadataKey::Description),
        }
    }

    /// Value of `field`, or `None` when the module does not provide it
    pub fn value(&self, field: Field) -> Option<String> {
        let version = self.version.as_ref();
        match field {
            Field::Name => self.name.clone(),
            Field::FullVersion => version.map(|v| v.to_full_string()),
            Field::Version => version.map(|v| v.to_short_string()),
            Field::Major => version.map(|v| v.major().to_string()),
            Field::Minor => version.map(|v| v.minor().to_string()),
            Field::Patch => version.map(|v| v.patch().to_string()),
            Field::Release => version.map(|v| v.release()),
            Field::Build => version.and_then(|v| v.build()).map(|b| b.to_string()),
            Field::FileVersion => self.file_version.clone(),
            Field::Configuration => self.configuration.clone(),
            Field::Description => self.description.clone(),
        }
    }
}

/// How rendered fields are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// "Label: value", one per line
    #[default]
    Labeled,
    /// Values only, each followed by a tab
    Simple,
}

/// Render `fields` of `info`, with trailing whitespace removed.
pub fn render(fields: &[Field], info: &ModuleInfo, mode: OutputMode) -> String {
    let mut out = String::new();

    for field in fields {
        let value = info.value(*field).unwrap_or_default();
        match mode {
            OutputMode::Simple => {
                out.push_str(&value);
                out.push('\t');
            }
            OutputMode::Labeled => {
                out.push_str(field.label());
                out.push_str(": ");
                out.push_str(&value);
                out.push('\n');
            }
        }
    }

    out.truncate(out.trim_end().len());
    out
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{AsmInfoError, Result};

use super::metadata::{
    read_compressed, CodedIndex, Metadata, ASSEMBLY, CUSTOM_ATTRIBUTE, MEMBER_REF, TYPE_DEF,
    TYPE_REF,
};
use super::pe;
use super::{MetadataKey, ModuleInspector};

const REFLECTION_NAMESPACE: &str = "System.Reflection";

// Tag values of the coded indexes involved in resolving an attribute
const PARENT_ASSEMBLY_TAG: u32 = 14;
const CTOR_METHOD_DEF_TAG: u32 = 2;
const CTOR_MEMBER_REF_TAG: u32 = 3;
const CLASS_TYPE_DEF_TAG: u32 = 0;
const CLASS_TYPE_REF_TAG: u32 = 1;

const ATTRIBUTE_PROLOG: [u8; 2] = [0x01, 0x00];
const NULL_STRING: u8 = 0xFF;

/// Map an attribute type to the metadata key it provides
fn attribute_key(namespace: &str, name: &str) -> Option<MetadataKey> {
    if namespace != REFLECTION_NAMESPACE {
        return None;
    }
    match name {
        "AssemblyInformationalVersionAttribute" => Some(MetadataKey::InformationalVersion),
        "AssemblyFileVersionAttribute" => Some(MetadataKey::FileVersion),
        "AssemblyConfigurationAttribute" => Some(MetadataKey::Configuration),
        "AssemblyDescriptionAttribute" => Some(MetadataKey::Description),
        _ => None,
    }
}

/// A managed (.NET) module read from its ECMA-335 metadata
///
/// Everything asm-info needs is extracted at load time; the file contents
/// are not kept. An attribute applied with a null argument is kept as
/// `None` so it still shadows later duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct ClrModule {
    name: String,
    attributes: HashMap<MetadataKey, Option<String>>,
}

impl ClrModule {
    /// Read and parse the module at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parse a module image held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let metadata = Metadata::parse(pe::cli_metadata(data)?)?;

        if metadata.tables.row_count(ASSEMBLY) == 0 {
            return Err(AsmInfoError::bad_image(
                "module has no assembly manifest",
            ));
        }
        // Assembly: HashAlgId, Major, Minor, Build, Revision, Flags, PublicKey, Name, Culture
        let assembly = metadata.tables.row(ASSEMBLY, 1)?;
        let name = metadata.string(assembly.get(7))?.to_string();

        let attributes = assembly_attributes(&metadata)?;

        Ok(ClrModule { name, attributes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ModuleInspector for ClrModule {
    fn lookup(&self, key: MetadataKey) -> Option<&str> {
        match key {
            MetadataKey::Name => Some(&self.name),
            other => self.attributes.get(&other)?.as_deref(),
        }
    }
}

/// Collect the string-valued reflection attributes applied to the assembly.
///
/// When an attribute is applied more than once, the first row wins, even if
/// its argument is null.
fn assembly_attributes(
    metadata: &Metadata<'_>,
) -> Result<HashMap<MetadataKey, Option<String>>> {
    let mut attributes = HashMap::new();

    for index in 1..=metadata.tables.row_count(CUSTOM_ATTRIBUTE) {
        // CustomAttribute: Parent, Type, Value
        let row = metadata.tables.row(CUSTOM_ATTRIBUTE, index)?;
        let (parent_tag, parent_row) = CodedIndex::HasCustomAttribute.decode(row.get(0));
        if parent_tag != PARENT_ASSEMBLY_TAG || parent_row != 1 {
            continue;
        }

        let Some((namespace, name)) = constructor_type(metadata, row.get(1))? else {
            continue;
        };
        let Some(key) = attribute_key(namespace, name) else {
            continue;
        };
        if attributes.contains_key(&key) {
            continue;
        }

        let value = string_argument(metadata.blob(row.get(2))?)?;
        attributes.insert(key, value);
    }

    Ok(attributes)
}

/// Resolve an attribute constructor to the (namespace, name) of its type.
fn constructor_type<'a>(
    metadata: &Metadata<'a>,
    constructor: u32,
) -> Result<Option<(&'a str, &'a str)>> {
    let (tag, row) = CodedIndex::CustomAttributeType.decode(constructor);
    match tag {
        CTOR_MEMBER_REF_TAG => {
            // MemberRef: Class, Name, Signature
            let member = metadata.tables.row(MEMBER_REF, row)?;
            let (class_tag, class_row) = CodedIndex::MemberRefParent.decode(member.get(0));
            match class_tag {
                CLASS_TYPE_REF_TAG => type_name(metadata, TYPE_REF, class_row).map(Some),
                CLASS_TYPE_DEF_TAG => type_name(metadata, TYPE_DEF, class_row).map(Some),
                _ => Ok(None),
            }
        }
        CTOR_METHOD_DEF_TAG => match owning_type(metadata, row)? {
            Some(type_row) => type_name(metadata, TYPE_DEF, type_row).map(Some),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

/// TypeRef and TypeDef both keep TypeName and TypeNamespace in columns 1 and 2.
fn type_name<'a>(metadata: &Metadata<'a>, table: usize, row: u32) -> Result<(&'a str, &'a str)> {
    let entry = metadata.tables.row(table, row)?;
    Ok((metadata.string(entry.get(2))?, metadata.string(entry.get(1))?))
}

/// Find the TypeDef whose method list contains `method`.
fn owning_type(metadata: &Metadata<'_>, method: u32) -> Result<Option<u32>> {
    let mut owner = None;
    for index in 1..=metadata.tables.row_count(TYPE_DEF) {
        // TypeDef column 5 is the first row of its MethodList run
        let method_list = metadata.tables.row(TYPE_DEF, index)?.get(5);
        if method_list > method {
            break;
        }
        owner = Some(index);
    }
    Ok(owner)
}

/// Decode the single `string` constructor argument of an attribute blob.
///
/// Returns `None` when the argument is a null string.
fn string_argument(blob: &[u8]) -> Result<Option<String>> {
    if blob.get(..2) != Some(&ATTRIBUTE_PROLOG[..]) {
        return Err(AsmInfoError::metadata("custom attribute blob has no prolog"));
    }
    let value = &blob[2..];
    if value.first() == Some(&NULL_STRING) {
        return Ok(None);
    }

    let (length, consumed) = read_compressed(value)
        .ok_or_else(|| AsmInfoError::metadata("custom attribute string has a bad length"))?;
    let bytes = value
        .get(consumed..consumed + length as usize)
        .ok_or_else(|| AsmInfoError::metadata("custom attribute string is truncated"))?;
    let text = std::str::from_utf8(bytes)
        .map_err(|_| AsmInfoError::metadata("custom attribute string is not valid UTF-8"))?;

    Ok(Some(text.to_string()))
}

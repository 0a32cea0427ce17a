//! ECMA-335 metadata: root, streams, heaps and the compressed table stream
//!
//! Row sizes depend on heap widths and on the row counts of the tables an
//! index can point into, so the schema of every table up to
//! `GenericParamConstraint` is known even though only a handful are read.

use crate::error::{AsmInfoError, Result};

use super::pe::{read_u16, read_u32, read_u64};

const METADATA_SIGNATURE: u32 = 0x424A_5342;

pub(crate) const TABLE_COUNT: usize = 0x2D;

pub(crate) const MODULE: usize = 0x00;
pub(crate) const TYPE_REF: usize = 0x01;
pub(crate) const TYPE_DEF: usize = 0x02;
pub(crate) const FIELD: usize = 0x04;
pub(crate) const METHOD_DEF: usize = 0x06;
pub(crate) const PARAM: usize = 0x08;
pub(crate) const INTERFACE_IMPL: usize = 0x09;
pub(crate) const MEMBER_REF: usize = 0x0A;
pub(crate) const CUSTOM_ATTRIBUTE: usize = 0x0C;
pub(crate) const DECL_SECURITY: usize = 0x0E;
pub(crate) const STAND_ALONE_SIG: usize = 0x11;
pub(crate) const EVENT: usize = 0x14;
pub(crate) const PROPERTY: usize = 0x17;
pub(crate) const MODULE_REF: usize = 0x1A;
pub(crate) const TYPE_SPEC: usize = 0x1B;
pub(crate) const ASSEMBLY: usize = 0x20;
pub(crate) const ASSEMBLY_REF: usize = 0x23;
pub(crate) const FILE: usize = 0x26;
pub(crate) const EXPORTED_TYPE: usize = 0x27;
pub(crate) const MANIFEST_RESOURCE: usize = 0x28;
pub(crate) const GENERIC_PARAM: usize = 0x2A;
pub(crate) const METHOD_SPEC: usize = 0x2B;
pub(crate) const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;

// HeapSizes flags
const WIDE_STRINGS: u8 = 0x01;
const WIDE_GUIDS: u8 = 0x02;
const WIDE_BLOBS: u8 = 0x04;
// Set in uncompressed (#-) streams: one extra u32 follows the row counts
const EXTRA_DATA: u8 = 0x40;

/// Coded index kinds (ECMA-335 II.24.2.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndex {
    pub fn tag_bits(self) -> u32 {
        match self {
            CodedIndex::HasCustomAttribute => 5,
            CodedIndex::MemberRefParent | CodedIndex::CustomAttributeType => 3,
            CodedIndex::TypeDefOrRef
            | CodedIndex::HasConstant
            | CodedIndex::HasDeclSecurity
            | CodedIndex::Implementation
            | CodedIndex::ResolutionScope => 2,
            CodedIndex::HasFieldMarshal
            | CodedIndex::HasSemantics
            | CodedIndex::MethodDefOrRef
            | CodedIndex::MemberForwarded
            | CodedIndex::TypeOrMethodDef => 1,
        }
    }

    /// Tables an index of this kind can reference, in tag order.
    ///
    /// `CustomAttributeType` only uses tags 2 (MethodDef) and 3 (MemberRef);
    /// the list here is what determines its width.
    fn tables(self) -> &'static [usize] {
        match self {
            CodedIndex::TypeDefOrRef => &[TYPE_DEF, TYPE_REF, TYPE_SPEC],
            CodedIndex::HasConstant => &[FIELD, PARAM, PROPERTY],
            CodedIndex::HasCustomAttribute => &[
                METHOD_DEF,
                FIELD,
                TYPE_REF,
                TYPE_DEF,
                PARAM,
                INTERFACE_IMPL,
                MEMBER_REF,
                MODULE,
                DECL_SECURITY,
                PROPERTY,
                EVENT,
                STAND_ALONE_SIG,
                MODULE_REF,
                TYPE_SPEC,
                ASSEMBLY,
                ASSEMBLY_REF,
                FILE,
                EXPORTED_TYPE,
                MANIFEST_RESOURCE,
                GENERIC_PARAM,
                GENERIC_PARAM_CONSTRAINT,
                METHOD_SPEC,
            ],
            CodedIndex::HasFieldMarshal => &[FIELD, PARAM],
            CodedIndex::HasDeclSecurity => &[TYPE_DEF, METHOD_DEF, ASSEMBLY],
            CodedIndex::MemberRefParent => &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC],
            CodedIndex::HasSemantics => &[EVENT, PROPERTY],
            CodedIndex::MethodDefOrRef => &[METHOD_DEF, MEMBER_REF],
            CodedIndex::MemberForwarded => &[FIELD, METHOD_DEF],
            CodedIndex::Implementation => &[FILE, ASSEMBLY_REF, EXPORTED_TYPE],
            CodedIndex::CustomAttributeType => &[METHOD_DEF, MEMBER_REF],
            CodedIndex::ResolutionScope => &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF],
            CodedIndex::TypeOrMethodDef => &[TYPE_DEF, METHOD_DEF],
        }
    }

    /// Split a coded value into (tag, 1-based row).
    pub fn decode(self, value: u32) -> (u32, u32) {
        let bits = self.tag_bits();
        (value & ((1 << bits) - 1), value >> bits)
    }
}

#[derive(Debug, Clone, Copy)]
enum Col {
    Fixed(usize),
    Str,
    Guid,
    Blob,
    Index(usize),
    Coded(CodedIndex),
}

const U16: Col = Col::Fixed(2);
const U32: Col = Col::Fixed(4);
const STR: Col = Col::Str;
const GUID: Col = Col::Guid;
const BLOB: Col = Col::Blob;

const TYPE_DEF_OR_REF: Col = Col::Coded(CodedIndex::TypeDefOrRef);
const HAS_CONSTANT: Col = Col::Coded(CodedIndex::HasConstant);
const HAS_CUSTOM_ATTRIBUTE: Col = Col::Coded(CodedIndex::HasCustomAttribute);
const HAS_FIELD_MARSHAL: Col = Col::Coded(CodedIndex::HasFieldMarshal);
const HAS_DECL_SECURITY: Col = Col::Coded(CodedIndex::HasDeclSecurity);
const MEMBER_REF_PARENT: Col = Col::Coded(CodedIndex::MemberRefParent);
const HAS_SEMANTICS: Col = Col::Coded(CodedIndex::HasSemantics);
const METHOD_DEF_OR_REF: Col = Col::Coded(CodedIndex::MethodDefOrRef);
const MEMBER_FORWARDED: Col = Col::Coded(CodedIndex::MemberForwarded);
const IMPLEMENTATION: Col = Col::Coded(CodedIndex::Implementation);
const CUSTOM_ATTRIBUTE_TYPE: Col = Col::Coded(CodedIndex::CustomAttributeType);
const RESOLUTION_SCOPE: Col = Col::Coded(CodedIndex::ResolutionScope);
const TYPE_OR_METHOD_DEF: Col = Col::Coded(CodedIndex::TypeOrMethodDef);

/// Column layout of tables 0x00..=0x2C (ECMA-335 II.22)
static SCHEMA: [&[Col]; TABLE_COUNT] = [
    /* 0x00 Module */ &[U16, STR, GUID, GUID, GUID],
    /* 0x01 TypeRef */ &[RESOLUTION_SCOPE, STR, STR],
    /* 0x02 TypeDef */
    &[U32, STR, STR, TYPE_DEF_OR_REF, Col::Index(FIELD), Col::Index(METHOD_DEF)],
    /* 0x03 FieldPtr */ &[Col::Index(FIELD)],
    /* 0x04 Field */ &[U16, STR, BLOB],
    /* 0x05 MethodPtr */ &[Col::Index(METHOD_DEF)],
    /* 0x06 MethodDef */ &[U32, U16, U16, STR, BLOB, Col::Index(PARAM)],
    /* 0x07 ParamPtr */ &[Col::Index(PARAM)],
    /* 0x08 Param */ &[U16, U16, STR],
    /* 0x09 InterfaceImpl */ &[Col::Index(TYPE_DEF), TYPE_DEF_OR_REF],
    /* 0x0A MemberRef */ &[MEMBER_REF_PARENT, STR, BLOB],
    /* 0x0B Constant */ &[U16, HAS_CONSTANT, BLOB],
    /* 0x0C CustomAttribute */ &[HAS_CUSTOM_ATTRIBUTE, CUSTOM_ATTRIBUTE_TYPE, BLOB],
    /* 0x0D FieldMarshal */ &[HAS_FIELD_MARSHAL, BLOB],
    /* 0x0E DeclSecurity */ &[U16, HAS_DECL_SECURITY, BLOB],
    /* 0x0F ClassLayout */ &[U16, U32, Col::Index(TYPE_DEF)],
    /* 0x10 FieldLayout */ &[U32, Col::Index(FIELD)],
    /* 0x11 StandAloneSig */ &[BLOB],
    /* 0x12 EventMap */ &[Col::Index(TYPE_DEF), Col::Index(EVENT)],
    /* 0x13 EventPtr */ &[Col::Index(EVENT)],
    /* 0x14 Event */ &[U16, STR, TYPE_DEF_OR_REF],
    /* 0x15 PropertyMap */ &[Col::Index(TYPE_DEF), Col::Index(PROPERTY)],
    /* 0x16 PropertyPtr */ &[Col::Index(PROPERTY)],
    /* 0x17 Property */ &[U16, STR, BLOB],
    /* 0x18 MethodSemantics */ &[U16, Col::Index(METHOD_DEF), HAS_SEMANTICS],
    /* 0x19 MethodImpl */ &[Col::Index(TYPE_DEF), METHOD_DEF_OR_REF, METHOD_DEF_OR_REF],
    /* 0x1A ModuleRef */ &[STR],
    /* 0x1B TypeSpec */ &[BLOB],
    /* 0x1C ImplMap */ &[U16, MEMBER_FORWARDED, STR, Col::Index(MODULE_REF)],
    /* 0x1D FieldRVA */ &[U32, Col::Index(FIELD)],
    /* 0x1E EncLog */ &[U32, U32],
    /* 0x1F EncMap */ &[U32],
    /* 0x20 Assembly */ &[U32, U16, U16, U16, U16, U32, BLOB, STR, STR],
    /* 0x21 AssemblyProcessor */ &[U32],
    /* 0x22 AssemblyOS */ &[U32, U32, U32],
    /* 0x23 AssemblyRef */ &[U16, U16, U16, U16, U32, BLOB, STR, STR, BLOB],
    /* 0x24 AssemblyRefProcessor */ &[U32, Col::Index(ASSEMBLY_REF)],
    /* 0x25 AssemblyRefOS */ &[U32, U32, U32, Col::Index(ASSEMBLY_REF)],
    /* 0x26 File */ &[U32, STR, BLOB],
    /* 0x27 ExportedType */ &[U32, U32, STR, STR, IMPLEMENTATION],
    /* 0x28 ManifestResource */ &[U32, U32, STR, IMPLEMENTATION],
    /* 0x29 NestedClass */ &[Col::Index(TYPE_DEF), Col::Index(TYPE_DEF)],
    /* 0x2A GenericParam */ &[U16, U16, TYPE_OR_METHOD_DEF, STR],
    /* 0x2B MethodSpec */ &[METHOD_DEF_OR_REF, BLOB],
    /* 0x2C GenericParamConstraint */ &[Col::Index(GENERIC_PARAM), TYPE_DEF_OR_REF],
];

/// Decode an ECMA-335 compressed unsigned integer (II.23.2).
///
/// Returns the value and the number of bytes it occupied.
pub(crate) fn read_compressed(data: &[u8]) -> Option<(u32, usize)> {
    let first = *data.first()?;
    if first & 0x80 == 0 {
        Some((first as u32, 1))
    } else if first & 0xC0 == 0x80 {
        let second = *data.get(1)?;
        Some(((((first & 0x3F) as u32) << 8) | second as u32, 2))
    } else if first & 0xE0 == 0xC0 {
        let rest = data.get(1..4)?;
        let value = ((first & 0x1F) as u32) << 24
            | (rest[0] as u32) << 16
            | (rest[1] as u32) << 8
            | rest[2] as u32;
        Some((value, 4))
    } else {
        None
    }
}

/// One table row; each column widened to u32
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row(Vec<u32>);

impl Row {
    pub fn get(&self, column: usize) -> u32 {
        self.0.get(column).copied().unwrap_or(0)
    }
}

/// The `#~` stream: row counts and the packed tables that follow them
#[derive(Debug)]
pub(crate) struct TableStream<'a> {
    data: &'a [u8],
    rows: [u32; TABLE_COUNT],
    offsets: [usize; TABLE_COUNT],
    row_sizes: [usize; TABLE_COUNT],
    string_width: usize,
    guid_width: usize,
    blob_width: usize,
}

impl<'a> TableStream<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let heap_sizes = *data
            .get(6)
            .ok_or_else(|| AsmInfoError::metadata("table stream header is truncated"))?;
        let valid = read_u64(data, 8)?;

        let mut rows = [0u32; TABLE_COUNT];
        let mut position = 24;
        for table in 0..64 {
            if valid & (1u64 << table) == 0 {
                continue;
            }
            if table >= TABLE_COUNT {
                return Err(AsmInfoError::metadata(format!(
                    "unsupported metadata table 0x{:02X}",
                    table
                )));
            }
            rows[table] = read_u32(data, position)?;
            position += 4;
        }
        if heap_sizes & EXTRA_DATA != 0 {
            position += 4;
        }

        let width = |flag: u8| if heap_sizes & flag != 0 { 4 } else { 2 };
        let mut stream = TableStream {
            data,
            rows,
            offsets: [0; TABLE_COUNT],
            row_sizes: [0; TABLE_COUNT],
            string_width: width(WIDE_STRINGS),
            guid_width: width(WIDE_GUIDS),
            blob_width: width(WIDE_BLOBS),
        };

        for table in 0..TABLE_COUNT {
            let row_size: usize = SCHEMA[table].iter().map(|c| stream.column_width(*c)).sum();
            stream.row_sizes[table] = row_size;
            stream.offsets[table] = position;
            position += row_size * stream.rows[table] as usize;
        }

        if position > data.len() {
            return Err(AsmInfoError::metadata(format!(
                "tables need {} bytes but the stream holds {}",
                position,
                data.len()
            )));
        }

        Ok(stream)
    }

    fn column_width(&self, column: Col) -> usize {
        match column {
            Col::Fixed(width) => width,
            Col::Str => self.string_width,
            Col::Guid => self.guid_width,
            Col::Blob => self.blob_width,
            Col::Index(table) => {
                if self.rows[table] < 1 << 16 {
                    2
                } else {
                    4
                }
            }
            Col::Coded(kind) => {
                let largest = kind
                    .tables()
                    .iter()
                    .map(|t| self.rows[*t])
                    .max()
                    .unwrap_or(0);
                if largest < 1 << (16 - kind.tag_bits()) {
                    2
                } else {
                    4
                }
            }
        }
    }

    pub fn row_count(&self, table: usize) -> u32 {
        self.rows[table]
    }

    /// Read a 1-based row of `table`.
    pub fn row(&self, table: usize, index: u32) -> Result<Row> {
        if index == 0 || index > self.rows[table] {
            return Err(AsmInfoError::metadata(format!(
                "row {} out of range for table 0x{:02X} ({} rows)",
                index, table, self.rows[table]
            )));
        }

        let mut offset = self.offsets[table] + (index as usize - 1) * self.row_sizes[table];
        let mut values = Vec::with_capacity(SCHEMA[table].len());
        for column in SCHEMA[table] {
            let value = match self.column_width(*column) {
                2 => read_u16(self.data, offset)? as u32,
                _ => read_u32(self.data, offset)?,
            };
            values.push(value);
            offset += self.column_width(*column);
        }
        Ok(Row(values))
    }
}

/// Metadata root with the streams asm-info reads
#[derive(Debug)]
pub(crate) struct Metadata<'a> {
    pub tables: TableStream<'a>,
    strings: &'a [u8],
    blobs: &'a [u8],
}

impl<'a> Metadata<'a> {
    pub fn parse(root: &'a [u8]) -> Result<Self> {
        if read_u32(root, 0)? != METADATA_SIGNATURE {
            return Err(AsmInfoError::metadata("missing 'BSJB' metadata signature"));
        }

        let version_length = read_u32(root, 12)? as usize;
        let mut position = 16 + version_length;
        let stream_count = read_u16(root, position + 2)?;
        position += 4;

        let mut tables = None;
        let mut strings: &[u8] = &[];
        let mut blobs: &[u8] = &[];

        for _ in 0..stream_count {
            let offset = read_u32(root, position)? as usize;
            let size = read_u32(root, position + 4)? as usize;
            position += 8;

            let name_area = root
                .get(position..)
                .ok_or_else(|| AsmInfoError::metadata("stream header is truncated"))?;
            let name_length = name_area
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| AsmInfoError::metadata("unterminated stream name"))?;
            let name = &name_area[..name_length];
            // name plus terminator, padded to a 4-byte boundary
            position += (name_length + 4) & !3;

            let stream = root.get(offset..offset + size).ok_or_else(|| {
                AsmInfoError::metadata(format!(
                    "stream '{}' lies outside the metadata",
                    String::from_utf8_lossy(name)
                ))
            })?;

            match name {
                b"#~" | b"#-" => tables = Some(stream),
                b"#Strings" => strings = stream,
                b"#Blob" => blobs = stream,
                _ => {}
            }
        }

        let tables = tables.ok_or_else(|| AsmInfoError::metadata("no table stream"))?;

        Ok(Metadata {
            tables: TableStream::parse(tables)?,
            strings,
            blobs,
        })
    }

    /// Null-terminated UTF-8 string from the `#Strings` heap
    pub fn string(&self, index: u32) -> Result<&'a str> {
        if index == 0 {
            return Ok("");
        }
        let start = self
            .strings
            .get(index as usize..)
            .ok_or_else(|| AsmInfoError::metadata(format!("string index {} out of range", index)))?;
        let end = start.iter().position(|b| *b == 0).unwrap_or(start.len());
        std::str::from_utf8(&start[..end])
            .map_err(|_| AsmInfoError::metadata(format!("string {} is not valid UTF-8", index)))
    }

    /// Length-prefixed entry from the `#Blob` heap
    pub fn blob(&self, index: u32) -> Result<&'a [u8]> {
        let entry = self
            .blobs
            .get(index as usize..)
            .ok_or_else(|| AsmInfoError::metadata(format!("blob index {} out of range", index)))?;
        let (length, consumed) = read_compressed(entry)
            .ok_or_else(|| AsmInfoError::metadata(format!("bad blob length at {}", index)))?;
        entry
            .get(consumed..consumed + length as usize)
            .ok_or_else(|| AsmInfoError::metadata(format!("blob {} is truncated", index)))
    }
}

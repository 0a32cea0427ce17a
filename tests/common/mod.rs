// tests/common/mod.rs
//
// Builds small managed PE images in memory: one .text section holding a CLI
// header and ECMA-335 metadata with Module, TypeRef, TypeDef, MethodDef,
// MemberRef, CustomAttribute and Assembly tables.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

const REFLECTION: &str = "System.Reflection";

const TEXT_RVA: u32 = 0x2000;
const TEXT_FILE_OFFSET: usize = 0x200;
const FILE_ALIGNMENT: usize = 0x200;
const CLI_HEADER_SIZE: usize = 72;

// Coded index tags
const HAS_CUSTOM_ATTRIBUTE_MODULE: u32 = 7;
const HAS_CUSTOM_ATTRIBUTE_ASSEMBLY: u32 = 14;
const MEMBER_REF_PARENT_TYPE_REF: u32 = 1;
const CUSTOM_ATTRIBUTE_TYPE_METHOD_DEF: u32 = 2;
const CUSTOM_ATTRIBUTE_TYPE_MEMBER_REF: u32 = 3;

/// Rows a table in the HasCustomAttribute set needs before that coded
/// index (5 tag bits) grows to four bytes
pub const WIDE_HAS_CUSTOM_ATTRIBUTE_ROWS: usize = 1 << 11;

#[derive(Debug, Clone)]
struct Attribute {
    namespace: String,
    type_name: String,
    value: Option<String>,
    on_module: bool,
    /// Constructor is a MethodDef of a TypeDef in this module
    defined_locally: bool,
}

/// Description of a synthetic assembly
#[derive(Debug, Clone)]
pub struct AssemblyImage {
    name: String,
    attributes: Vec<Attribute>,
    pe32_plus: bool,
    with_assembly_table: bool,
    with_cli_header: bool,
    wide_heaps: bool,
    filler_type_refs: usize,
}

impl AssemblyImage {
    pub fn new(name: &str) -> Self {
        AssemblyImage {
            name: name.to_string(),
            attributes: Vec::new(),
            pe32_plus: false,
            with_assembly_table: true,
            with_cli_header: true,
            wide_heaps: false,
            filler_type_refs: 0,
        }
    }

    /// Apply a `System.Reflection.<type_name>(string)` attribute to the assembly
    pub fn attribute(self, type_name: &str, value: &str) -> Self {
        self.custom_attribute(REFLECTION, type_name, Some(value))
    }

    pub fn informational_version(self, value: &str) -> Self {
        self.attribute("AssemblyInformationalVersionAttribute", value)
    }

    pub fn file_version(self, value: &str) -> Self {
        self.attribute("AssemblyFileVersionAttribute", value)
    }

    pub fn configuration(self, value: &str) -> Self {
        self.attribute("AssemblyConfigurationAttribute", value)
    }

    pub fn description(self, value: &str) -> Self {
        self.attribute("AssemblyDescriptionAttribute", value)
    }

    pub fn custom_attribute(mut self, namespace: &str, type_name: &str, value: Option<&str>) -> Self {
        self.attributes.push(Attribute {
            namespace: namespace.to_string(),
            type_name: type_name.to_string(),
            value: value.map(str::to_string),
            on_module: false,
            defined_locally: false,
        });
        self
    }

    /// Apply an attribute whose type is defined in this module, so its
    /// constructor is a MethodDef rather than a MemberRef
    pub fn local_attribute(mut self, namespace: &str, type_name: &str, value: &str) -> Self {
        self.attributes.push(Attribute {
            namespace: namespace.to_string(),
            type_name: type_name.to_string(),
            value: Some(value.to_string()),
            on_module: false,
            defined_locally: true,
        });
        self
    }

    /// Apply an attribute to the module instead of the assembly
    pub fn module_attribute(mut self, type_name: &str, value: &str) -> Self {
        self.attributes.push(Attribute {
            namespace: REFLECTION.to_string(),
            type_name: type_name.to_string(),
            value: Some(value.to_string()),
            on_module: true,
            defined_locally: false,
        });
        self
    }

    pub fn pe32_plus(mut self) -> Self {
        self.pe32_plus = true;
        self
    }

    /// Use 4-byte #Strings, #GUID and #Blob indexes, as large assemblies do
    pub fn wide_heaps(mut self) -> Self {
        self.wide_heaps = true;
        self
    }

    /// Append unreferenced TypeRef rows to grow the coded indexes that can
    /// point at TypeRef
    pub fn filler_type_refs(mut self, count: usize) -> Self {
        self.filler_type_refs = count;
        self
    }

    /// Drop the Assembly table, as in a netmodule
    pub fn without_assembly_table(mut self) -> Self {
        self.with_assembly_table = false;
        self
    }

    /// Zero the CLI header directory, as in a native DLL
    pub fn without_cli_header(mut self) -> Self {
        self.with_cli_header = false;
        self
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, self.build()).unwrap();
        path
    }

    pub fn build(&self) -> Vec<u8> {
        let metadata = self.build_metadata();

        let mut text = Vec::new();
        let metadata_rva = TEXT_RVA + CLI_HEADER_SIZE as u32;
        // CLI header
        put_u32(&mut text, CLI_HEADER_SIZE as u32);
        put_u16(&mut text, 2);
        put_u16(&mut text, 5);
        put_u32(&mut text, metadata_rva);
        put_u32(&mut text, metadata.len() as u32);
        put_u32(&mut text, 1); // ILONLY
        text.resize(CLI_HEADER_SIZE, 0);
        text.extend_from_slice(&metadata);

        let text_virtual_size = text.len();
        text.resize(align(text.len(), FILE_ALIGNMENT), 0);

        let mut image = vec![0u8; TEXT_FILE_OFFSET];
        image[..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());

        let mut headers = Vec::new();
        headers.extend_from_slice(b"PE\0\0");

        // COFF header
        let optional_size: u16 = if self.pe32_plus { 240 } else { 224 };
        put_u16(&mut headers, if self.pe32_plus { 0x8664 } else { 0x14C });
        put_u16(&mut headers, 1);
        put_u32(&mut headers, 0);
        put_u32(&mut headers, 0);
        put_u32(&mut headers, 0);
        put_u16(&mut headers, optional_size);
        put_u16(&mut headers, 0x2022);

        // Optional header, only magic and data directories are filled in
        let mut optional = vec![0u8; optional_size as usize];
        let (magic, count_offset, directories_offset) = if self.pe32_plus {
            (0x20Bu16, 108, 112)
        } else {
            (0x10Bu16, 92, 96)
        };
        optional[0..2].copy_from_slice(&magic.to_le_bytes());
        optional[count_offset..count_offset + 4].copy_from_slice(&16u32.to_le_bytes());
        if self.with_cli_header {
            let entry = directories_offset + 14 * 8;
            optional[entry..entry + 4].copy_from_slice(&TEXT_RVA.to_le_bytes());
            optional[entry + 4..entry + 8]
                .copy_from_slice(&(CLI_HEADER_SIZE as u32).to_le_bytes());
        }
        headers.extend_from_slice(&optional);

        // Section table
        headers.extend_from_slice(b".text\0\0\0");
        put_u32(&mut headers, text_virtual_size as u32);
        put_u32(&mut headers, TEXT_RVA);
        put_u32(&mut headers, text.len() as u32);
        put_u32(&mut headers, TEXT_FILE_OFFSET as u32);
        headers.extend_from_slice(&[0u8; 16]);

        image[0x80..0x80 + headers.len()].copy_from_slice(&headers);
        image.extend_from_slice(&text);
        image
    }

    fn build_metadata(&self) -> Vec<u8> {
        let mut strings = Heap::new();
        let mut blobs = Heap::new();

        let module_name = strings.add_string(&format!("{}.dll", self.name));
        let assembly_name = strings.add_string(&self.name);
        let ctor_name = strings.add_string(".ctor");
        // instance void (string)
        let ctor_signature = blobs.add_blob(&[0x20, 0x01, 0x01, 0x0E]);

        let mut type_refs = Vec::new();
        let mut type_defs = Vec::new();
        let mut method_defs = Vec::new();
        let mut member_refs = Vec::new();
        let mut custom_attributes = Vec::new();

        if self.attributes.iter().any(|a| a.defined_locally) {
            let module_type = strings.add_string("<Module>");
            // Flags, Name, Namespace, Extends, FieldList, MethodList
            type_defs.push(vec![
                Cell::U32(0),
                Cell::Str(module_type),
                Cell::Str(0),
                Cell::U16(0),
                Cell::U16(1),
                Cell::U16(1),
            ]);
        }

        for attribute in &self.attributes {
            let type_name = strings.add_string(&attribute.type_name);
            let namespace = strings.add_string(&attribute.namespace);

            let constructor = if attribute.defined_locally {
                let method_row = method_defs.len() as u32 + 1;
                type_defs.push(vec![
                    Cell::U32(0x0010_0001),
                    Cell::Str(type_name),
                    Cell::Str(namespace),
                    Cell::U16(0),
                    Cell::U16(1),
                    Cell::U16(method_row),
                ]);
                // RVA, ImplFlags, Flags, Name, Signature, ParamList
                method_defs.push(vec![
                    Cell::U32(0),
                    Cell::U16(0),
                    Cell::U16(0x1886),
                    Cell::Str(ctor_name),
                    Cell::Blob(ctor_signature),
                    Cell::U16(1),
                ]);
                (method_row << 3) | CUSTOM_ATTRIBUTE_TYPE_METHOD_DEF
            } else {
                // ResolutionScope, Name, Namespace
                type_refs.push(vec![Cell::U16(0), Cell::Str(type_name), Cell::Str(namespace)]);
                let type_ref_row = type_refs.len() as u32;
                // Class, Name, Signature
                member_refs.push(vec![
                    Cell::U16((type_ref_row << 3) | MEMBER_REF_PARENT_TYPE_REF),
                    Cell::Str(ctor_name),
                    Cell::Blob(ctor_signature),
                ]);
                let member_ref_row = member_refs.len() as u32;
                (member_ref_row << 3) | CUSTOM_ATTRIBUTE_TYPE_MEMBER_REF
            };

            let parent_tag = if attribute.on_module {
                HAS_CUSTOM_ATTRIBUTE_MODULE
            } else {
                HAS_CUSTOM_ATTRIBUTE_ASSEMBLY
            };
            let value = blobs.add_blob(&attribute_blob(attribute.value.as_deref()));
            // Parent, Type, Value
            custom_attributes.push(vec![
                Cell::Parent((1 << 5) | parent_tag),
                Cell::U16(constructor),
                Cell::Blob(value),
            ]);
        }

        if self.filler_type_refs > 0 {
            let filler_name = strings.add_string("Filler");
            for _ in 0..self.filler_type_refs {
                type_refs.push(vec![Cell::U16(0), Cell::Str(filler_name), Cell::Str(0)]);
            }
        }

        let layout = Layout {
            wide_heaps: self.wide_heaps,
            wide_parent: type_refs.len() >= WIDE_HAS_CUSTOM_ATTRIBUTE_ROWS,
        };

        // Generation, Name, Mvid, EncId, EncBaseId
        let module = vec![vec![
            Cell::U16(0),
            Cell::Str(module_name),
            Cell::Guid(0),
            Cell::Guid(0),
            Cell::Guid(0),
        ]];

        // HashAlgId, Major, Minor, Build, Revision, Flags, PublicKey, Name, Culture
        let assembly = vec![vec![
            Cell::U32(0x8004),
            Cell::U16(1),
            Cell::U16(0),
            Cell::U16(0),
            Cell::U16(0),
            Cell::U32(0),
            Cell::Blob(0),
            Cell::Str(assembly_name),
            Cell::Str(0),
        ]];

        // Ordered by table id
        let mut tables: Vec<(u32, &[Vec<Cell>])> = vec![
            (0x00, module.as_slice()),
            (0x01, type_refs.as_slice()),
            (0x02, type_defs.as_slice()),
            (0x06, method_defs.as_slice()),
            (0x0A, member_refs.as_slice()),
            (0x0C, custom_attributes.as_slice()),
        ];
        if self.with_assembly_table {
            tables.push((0x20, assembly.as_slice()));
        }
        tables.retain(|(_, rows)| !rows.is_empty());

        let mut table_stream = Vec::new();
        put_u32(&mut table_stream, 0);
        let heap_sizes = if self.wide_heaps { 0x07 } else { 0x00 };
        table_stream.extend_from_slice(&[2, 0, heap_sizes, 1]);
        let valid = tables.iter().fold(0u64, |mask, (id, _)| mask | (1u64 << id));
        table_stream.extend_from_slice(&valid.to_le_bytes());
        table_stream.extend_from_slice(&0u64.to_le_bytes());
        for (_, rows) in &tables {
            put_u32(&mut table_stream, rows.len() as u32);
        }
        for (_, rows) in &tables {
            table_stream.extend_from_slice(&layout.pack(rows));
        }

        metadata_root(&[
            ("#~", table_stream),
            ("#Strings", strings.data),
            ("#Blob", blobs.data),
        ])
    }
}

/// One column value of a table row
#[derive(Debug, Clone, Copy)]
enum Cell {
    U16(u32),
    U32(u32),
    Str(u32),
    Guid(u32),
    Blob(u32),
    /// HasCustomAttribute coded index
    Parent(u32),
}

/// Column widths in effect for one image
struct Layout {
    wide_heaps: bool,
    wide_parent: bool,
}

impl Layout {
    fn pack(&self, rows: &[Vec<Cell>]) -> Vec<u8> {
        let mut out = Vec::new();
        for row in rows {
            for cell in row {
                match *cell {
                    Cell::U16(value) => put_u16(&mut out, value as u16),
                    Cell::U32(value) => put_u32(&mut out, value),
                    Cell::Str(value) | Cell::Guid(value) | Cell::Blob(value) => {
                        put_index(&mut out, value, self.wide_heaps)
                    }
                    Cell::Parent(value) => put_index(&mut out, value, self.wide_parent),
                }
            }
        }
        out
    }
}

fn put_index(out: &mut Vec<u8>, value: u32, wide: bool) {
    if wide {
        put_u32(out, value);
    } else {
        put_u16(out, value as u16);
    }
}

/// Prolog, one SerString argument, no named arguments
fn attribute_blob(value: Option<&str>) -> Vec<u8> {
    let mut blob = vec![0x01, 0x00];
    match value {
        Some(text) => {
            blob.extend_from_slice(&compressed(text.len()));
            blob.extend_from_slice(text.as_bytes());
        }
        None => blob.push(0xFF),
    }
    blob.extend_from_slice(&[0x00, 0x00]);
    blob
}

fn metadata_root(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let version = b"v4.0.30319\0\0";

    let header_size = 16
        + version.len()
        + 4
        + streams
            .iter()
            .map(|(name, _)| 8 + align(name.len() + 1, 4))
            .sum::<usize>();

    let mut root = Vec::new();
    put_u32(&mut root, 0x424A_5342);
    put_u16(&mut root, 1);
    put_u16(&mut root, 1);
    put_u32(&mut root, 0);
    put_u32(&mut root, version.len() as u32);
    root.extend_from_slice(version);
    put_u16(&mut root, 0);
    put_u16(&mut root, streams.len() as u16);

    let mut offset = header_size;
    for (name, data) in streams {
        let size = align(data.len(), 4);
        put_u32(&mut root, offset as u32);
        put_u32(&mut root, size as u32);
        let mut padded = name.as_bytes().to_vec();
        padded.resize(align(name.len() + 1, 4), 0);
        root.extend_from_slice(&padded);
        offset += size;
    }
    assert_eq!(root.len(), header_size);

    for (_, data) in streams {
        let mut padded = data.clone();
        padded.resize(align(data.len(), 4), 0);
        root.extend_from_slice(&padded);
    }
    root
}

struct Heap {
    data: Vec<u8>,
}

impl Heap {
    fn new() -> Self {
        Heap { data: vec![0] }
    }

    fn add_string(&mut self, s: &str) -> u32 {
        let index = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        index
    }

    fn add_blob(&mut self, bytes: &[u8]) -> u32 {
        let index = self.data.len() as u32;
        self.data.extend_from_slice(&compressed(bytes.len()));
        self.data.extend_from_slice(bytes);
        index
    }
}

fn compressed(length: usize) -> Vec<u8> {
    if length < 0x80 {
        vec![length as u8]
    } else {
        assert!(length < 0x4000, "fixture strings stay short");
        vec![0x80 | (length >> 8) as u8, (length & 0xFF) as u8]
    }
}

fn align(value: usize, to: usize) -> usize {
    (value + to - 1) / to * to
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

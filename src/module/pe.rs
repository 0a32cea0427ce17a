//! PE container access through the `object` crate
//!
//! `object` validates the DOS and NT headers, exposes the data directories
//! and maps RVAs through the section table. This module only goes as far as
//! the CLI (COR20) header and hands back the ECMA-335 metadata root.

use object::endian::{LittleEndian as LE, U16Bytes, U32Bytes, U64Bytes};
use object::pe::{
    ImageCor20Header, ImageNtHeaders32, ImageNtHeaders64, IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR,
};
use object::read::pe::{ImageNtHeaders, PeFile};
use object::{FileKind, ReadRef};

use crate::error::{AsmInfoError, Result};

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.read_at::<U16Bytes<LE>>(offset as u64)
        .map(|value| value.get(LE))
        .map_err(|()| truncated(offset))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.read_at::<U32Bytes<LE>>(offset as u64)
        .map(|value| value.get(LE))
        .map_err(|()| truncated(offset))
}

pub(crate) fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    data.read_at::<U64Bytes<LE>>(offset as u64)
        .map(|value| value.get(LE))
        .map_err(|()| truncated(offset))
}

fn truncated(offset: usize) -> AsmInfoError {
    AsmInfoError::metadata(format!("unexpected end of data at offset 0x{:X}", offset))
}

fn bad_image(err: object::read::Error) -> AsmInfoError {
    AsmInfoError::bad_image(err.to_string())
}

/// Locate the ECMA-335 metadata root of a PE32 or PE32+ image.
pub(crate) fn cli_metadata(data: &[u8]) -> Result<&[u8]> {
    match FileKind::parse(data).map_err(bad_image)? {
        FileKind::Pe32 => metadata_root::<ImageNtHeaders32>(data),
        FileKind::Pe64 => metadata_root::<ImageNtHeaders64>(data),
        kind => Err(AsmInfoError::bad_image(format!(
            "expected a PE image, found {:?}",
            kind
        ))),
    }
}

fn metadata_root<'data, Pe: ImageNtHeaders>(data: &'data [u8]) -> Result<&'data [u8]> {
    let file = PeFile::<Pe>::parse(data).map_err(bad_image)?;
    let sections = file.section_table();

    let directory = file
        .data_directory(IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR)
        .filter(|d| d.virtual_address.get(LE) != 0)
        .ok_or_else(|| AsmInfoError::bad_image("no CLI header, not a managed module"))?;
    let header = directory.data(data, &sections).map_err(bad_image)?;
    let (cor20, _) = object::pod::from_bytes::<ImageCor20Header>(header)
        .map_err(|()| AsmInfoError::bad_image("CLI header is truncated"))?;

    let metadata = &cor20.meta_data;
    if metadata.virtual_address.get(LE) == 0 || metadata.size.get(LE) == 0 {
        return Err(AsmInfoError::bad_image("CLI header has no metadata directory"));
    }
    metadata.data(data, &sections).map_err(bad_image)
}

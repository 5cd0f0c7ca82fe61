//! PE image loading and header validation.
//!
//! An image is read fully into memory with [`read_image`] and validated with
//! [`Image::parse`]. The parsed [`Image`] borrows the file data and every
//! header it exposes is a view into that buffer.

use std::path::Path;

use object::{LittleEndian as LE, ReadRef, pe, pod::Pod};

use crate::{
    coff::ImageFileMachine,
    error::{ExportError, ImageError},
    sections::SectionTable,
};

/// The legacy executable signature at the start of the file.
const DOS_SIGNATURE: &[u8; 2] = b"MZ";

/// The signature at the start of the NT headers.
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";

/// Size of the signature preceding the file header.
const PE_SIGNATURE_SIZE: u64 = PE_SIGNATURE.len() as u64;

/// Reads the file at `path` into memory.
pub fn read_image(path: impl AsRef<Path>) -> Result<Vec<u8>, ImageError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Address and size of an entry in the optional header data directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    /// Returns `true` if `rva` is inside of `[virtual_address, virtual_address + size)`.
    pub fn contains(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size);
        (start..end).contains(&u64::from(rva))
    }
}

impl From<&pe::ImageDataDirectory> for DataDirectory {
    fn from(value: &pe::ImageDataDirectory) -> Self {
        Self {
            virtual_address: value.virtual_address.get(LE),
            size: value.size.get(LE),
        }
    }
}

/// A validated PE image.
#[derive(Debug, Clone, Copy)]
pub struct Image<'data> {
    data: &'data [u8],
    file_header: &'data pe::ImageFileHeader,
    sections: SectionTable<'data>,
    export_directory: DataDirectory,
}

impl<'data> Image<'data> {
    /// Validates the DOS and PE signatures and reads the headers needed for
    /// locating the export table.
    pub fn parse(data: &'data [u8]) -> Result<Image<'data>, ImageError> {
        if data.get(..DOS_SIGNATURE.len()) != Some(DOS_SIGNATURE.as_slice()) {
            return Err(ImageError::MissingDosSignature);
        }

        let dos_header: &pe::ImageDosHeader = data
            .read_at(0)
            .map_err(|_| ImageError::Truncated("DOS header"))?;

        let nt_headers_offset = u64::from(dos_header.e_lfanew.get(LE));
        let signature = data
            .read_bytes_at(nt_headers_offset, PE_SIGNATURE_SIZE)
            .map_err(|_| ImageError::MissingPeSignature)?;
        if signature != PE_SIGNATURE {
            return Err(ImageError::MissingPeSignature);
        }

        let file_header_offset = nt_headers_offset + PE_SIGNATURE_SIZE;
        let file_header: &pe::ImageFileHeader = data
            .read_at(file_header_offset)
            .map_err(|_| ImageError::Truncated("file header"))?;

        let optional_header_offset =
            file_header_offset + std::mem::size_of::<pe::ImageFileHeader>() as u64;

        // The data directory array follows the fixed part of the optional
        // header. Which layout applies is decided by the machine field, not
        // the optional header magic. Unrecognized machines use the 64-bit
        // layout.
        let fixed_optional_header_size = if ImageFileMachine::try_from(file_header.machine.get(LE))
            .is_ok_and(|machine| machine.uses_pe32_header())
        {
            std::mem::size_of::<pe::ImageOptionalHeader32>()
        } else {
            std::mem::size_of::<pe::ImageOptionalHeader64>()
        };

        let export_directory: &pe::ImageDataDirectory = data
            .read_at(
                optional_header_offset
                    + fixed_optional_header_size as u64
                    + (pe::IMAGE_DIRECTORY_ENTRY_EXPORT * std::mem::size_of::<pe::ImageDataDirectory>())
                        as u64,
            )
            .map_err(|_| ImageError::Truncated("optional header"))?;

        let sections = SectionTable::parse(
            data,
            optional_header_offset + u64::from(file_header.size_of_optional_header.get(LE)),
            file_header.number_of_sections.get(LE),
        )?;

        Ok(Self {
            data,
            file_header,
            sections,
            export_directory: export_directory.into(),
        })
    }

    /// The full file data.
    #[inline]
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// The raw `IMAGE_FILE_HEADER::Machine` value.
    #[inline]
    pub fn machine(&self) -> u16 {
        self.file_header.machine.get(LE)
    }

    #[inline]
    pub fn file_header(&self) -> &'data pe::ImageFileHeader {
        self.file_header
    }

    #[inline]
    pub fn sections(&self) -> &SectionTable<'data> {
        &self.sections
    }

    /// Data directory entry 0 of the optional header.
    #[inline]
    pub fn export_directory(&self) -> DataDirectory {
        self.export_directory
    }

    /// Translates `rva` to a file offset.
    ///
    /// `what` describes the item being read for error messages.
    fn file_offset(&self, rva: u32, what: &'static str) -> Result<u64, ExportError> {
        self.sections
            .resolve(rva)
            .ok_or(ExportError::UnresolvedRva { rva, what })
    }

    /// Reads a `T` at `rva`.
    pub fn read_at_rva<T: Pod>(&self, rva: u32, what: &'static str) -> Result<&'data T, ExportError> {
        let offset = self.file_offset(rva, what)?;
        self.data
            .read_at(offset)
            .map_err(|_| ExportError::OutOfBounds { rva, what })
    }

    /// Reads `count` items of `T` starting at `rva`.
    ///
    /// An empty slice is returned for a `count` of 0 without resolving the
    /// RVA. Empty tables usually have an RVA of 0.
    pub fn read_slice_at_rva<T: Pod>(
        &self,
        rva: u32,
        count: usize,
        what: &'static str,
    ) -> Result<&'data [T], ExportError> {
        if count == 0 {
            return Ok(&[]);
        }

        let offset = self.file_offset(rva, what)?;
        self.data
            .read_slice_at(offset, count)
            .map_err(|_| ExportError::OutOfBounds { rva, what })
    }

    /// Reads the nul-terminated string at `rva`.
    ///
    /// The returned bytes do not include the nul terminator.
    pub fn read_string_at_rva(&self, rva: u32, what: &'static str) -> Result<&'data [u8], ExportError> {
        let offset = self.file_offset(rva, what)?;
        self.data
            .read_bytes_at_until(offset..self.data.len() as u64, 0)
            .map_err(|_| ExportError::OutOfBounds { rva, what })
    }
}

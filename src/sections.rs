//! Section table handling and RVA translation.

use std::borrow::Cow;

use object::{LittleEndian as LE, ReadRef, pe};

use crate::{coff::SectionFlags, error::ImageError};

/// The section headers of an image.
///
/// This is a borrowed view over the `IMAGE_SECTION_HEADER` records that
/// immediately follow the optional header.
#[derive(Debug, Default, Clone, Copy)]
pub struct SectionTable<'data> {
    headers: &'data [pe::ImageSectionHeader],
}

impl<'data> SectionTable<'data> {
    /// Reads `count` section headers starting at file offset `offset`.
    pub fn parse(data: &'data [u8], offset: u64, count: u16) -> Result<Self, ImageError> {
        let headers = data
            .read_slice_at(offset, count.into())
            .map_err(|_| ImageError::Truncated("section table"))?;
        Ok(Self { headers })
    }

    pub fn new(headers: &'data [pe::ImageSectionHeader]) -> Self {
        Self { headers }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterates over the sections in file order.
    pub fn iter(&self) -> impl Iterator<Item = Section<'data>> + 'data {
        let headers = self.headers;
        headers.iter().map(Section::new)
    }

    /// Returns the first section whose range contains `rva`.
    ///
    /// The range test includes the upper bound
    /// (`VirtualAddress <= rva <= VirtualAddress + SizeOfRawData`). An RVA
    /// sitting exactly at the boundary of two adjacent sections is claimed by
    /// the earlier one.
    pub fn find_section(&self, rva: u32) -> Option<Section<'data>> {
        self.iter().find(|section| section.contains_rva_inclusive(rva))
    }

    /// Translates `rva` into a file offset.
    ///
    /// Returns `None` if no section contains the RVA or if the containing
    /// section has no raw data in the file (`PointerToRawData == 0`).
    pub fn resolve(&self, rva: u32) -> Option<u64> {
        let section = self.find_section(rva)?;
        section.file_offset(rva)
    }
}

/// A single section header.
#[derive(Debug, Clone, Copy)]
pub struct Section<'data> {
    header: &'data pe::ImageSectionHeader,
}

impl<'data> Section<'data> {
    pub fn new(header: &'data pe::ImageSectionHeader) -> Self {
        Self { header }
    }

    /// Returns the raw 8 byte section name up to the first nul byte.
    pub fn raw_name(&self) -> &'data [u8] {
        let name = &self.header.name;
        let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
        &name[..len]
    }

    /// Returns the section name for display.
    pub fn name(&self) -> Cow<'data, str> {
        String::from_utf8_lossy(self.raw_name())
    }

    #[inline]
    pub fn virtual_address(&self) -> u32 {
        self.header.virtual_address.get(LE)
    }

    #[inline]
    pub fn size_of_raw_data(&self) -> u32 {
        self.header.size_of_raw_data.get(LE)
    }

    #[inline]
    pub fn pointer_to_raw_data(&self) -> u32 {
        self.header.pointer_to_raw_data.get(LE)
    }

    #[inline]
    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_retain(self.header.characteristics.get(LE))
    }

    /// Returns `true` if the section is marked as containing code.
    #[inline]
    pub fn is_code(&self) -> bool {
        self.flags().contains_code()
    }

    /// `VirtualAddress <= rva <= VirtualAddress + SizeOfRawData`
    pub fn contains_rva_inclusive(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address());
        let end = start + u64::from(self.size_of_raw_data());
        (start..=end).contains(&u64::from(rva))
    }

    /// `VirtualAddress <= rva < VirtualAddress + SizeOfRawData`
    pub fn contains_rva(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address());
        let end = start + u64::from(self.size_of_raw_data());
        (start..end).contains(&u64::from(rva))
    }

    /// File offset of `rva` relative to this section.
    ///
    /// This does not check that `rva` is inside of the section.
    pub fn file_offset(&self, rva: u32) -> Option<u64> {
        let pointer_to_raw_data = self.pointer_to_raw_data();
        if pointer_to_raw_data == 0 {
            return None;
        }

        let delta = u64::from(rva).checked_sub(u64::from(self.virtual_address()))?;
        Some(delta + u64::from(pointer_to_raw_data))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use object::{LittleEndian as LE, U16, U32, pe};

    use super::SectionTable;

    pub fn section_header(
        name: &[u8],
        virtual_address: u32,
        size_of_raw_data: u32,
        pointer_to_raw_data: u32,
        characteristics: u32,
    ) -> pe::ImageSectionHeader {
        let mut raw_name = [0u8; 8];
        raw_name[..name.len()].copy_from_slice(name);

        pe::ImageSectionHeader {
            name: raw_name,
            virtual_size: U32::new(LE, size_of_raw_data),
            virtual_address: U32::new(LE, virtual_address),
            size_of_raw_data: U32::new(LE, size_of_raw_data),
            pointer_to_raw_data: U32::new(LE, pointer_to_raw_data),
            pointer_to_relocations: U32::new(LE, 0),
            pointer_to_linenumbers: U32::new(LE, 0),
            number_of_relocations: U16::new(LE, 0),
            number_of_linenumbers: U16::new(LE, 0),
            characteristics: U32::new(LE, characteristics),
        }
    }

    fn test_sections() -> [pe::ImageSectionHeader; 3] {
        [
            section_header(b".text", 0x1000, 0x200, 0x400, pe::IMAGE_SCN_CNT_CODE),
            section_header(
                b".data",
                0x1200,
                0x100,
                0x600,
                pe::IMAGE_SCN_CNT_INITIALIZED_DATA,
            ),
            section_header(
                b".bss",
                0x2000,
                0x80,
                0,
                pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA,
            ),
        ]
    }

    #[test]
    fn resolve_inside_section() {
        let headers = test_sections();
        let table = SectionTable::new(&headers);

        for rva in [0x1000, 0x1004, 0x11ff] {
            assert_eq!(table.resolve(rva), Some(u64::from(rva - 0x1000 + 0x400)));
        }

        assert_eq!(table.resolve(0x1280), Some(0x680));
    }

    #[test]
    fn resolve_without_raw_data() {
        let headers = test_sections();
        let table = SectionTable::new(&headers);

        let bss = table.find_section(0x2010).expect("should find .bss");
        assert_eq!(bss.name(), ".bss");
        assert_eq!(table.resolve(0x2010), None);
    }

    #[test]
    fn resolve_outside_sections() {
        let headers = test_sections();
        let table = SectionTable::new(&headers);

        assert!(table.find_section(0x10).is_none());
        assert_eq!(table.resolve(0x10), None);
        assert_eq!(table.resolve(0x5000), None);
    }

    #[test]
    fn inclusive_upper_bound() {
        let headers = test_sections();
        let table = SectionTable::new(&headers);

        // 0x1200 is one past the end of .text and the start of .data. The
        // inclusive range test makes .text claim it first.
        let section = table.find_section(0x1200).expect("should find a section");
        assert_eq!(section.name(), ".text");
        assert!(section.is_code());
        assert_eq!(table.resolve(0x1200), Some(0x600));

        let section = table.find_section(0x1300).expect("should find .data");
        assert_eq!(section.name(), ".data");
        assert!(!section.contains_rva(0x1300));
    }

    #[test]
    fn full_length_name() {
        let headers = [section_header(b".textbss", 0x1000, 0x10, 0x200, 0)];
        let table = SectionTable::new(&headers);
        let section = table.iter().next().unwrap();
        assert_eq!(section.raw_name(), b".textbss");
    }

    #[test]
    fn truncated_table() {
        let data = [0u8; 60];
        assert!(SectionTable::parse(&data, 0, 1).is_ok());
        assert!(SectionTable::parse(&data, 0, 2).is_err());
        assert!(SectionTable::parse(&data, 30, 1).is_err());
    }
}

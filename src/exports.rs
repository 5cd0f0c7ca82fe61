//! Export directory decoding.
//!
//! The export directory is made up of three parallel arrays.
//! - The export address table (function table) indexed by the 0-based
//!   ordinal index. Entries are RVAs of the exported item or, when the RVA
//!   points back inside of the export directory data, RVAs of a forwarder
//!   string in the form `OtherModule.SymbolName`.
//! - The name pointer table with `NumberOfNames` RVAs of export names.
//! - The ordinal table with `NumberOfNames` 16-bit indicies into the function
//!   table. Entry `i` is the function for name `i`.
//!
//! Exports are produced in two passes. The first pass walks the name pointer
//! table in declared order. The second pass walks the function table looking
//! for forwarder entries that were never referenced by a name and recovers
//! a name for them from the forwarder string.
//!
//! See: https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-edata-section-image-only

use std::borrow::Cow;

use object::{LittleEndian as LE, U16, U32, pe};

use crate::{
    annotate::SymbolAnnotator,
    bit_set::FixedDenseBitSet,
    error::ExportError,
    image::{DataDirectory, Image},
    sections::Section,
};

/// A region of the image to decode as an export directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportRegion {
    /// RVA of the `IMAGE_EXPORT_DIRECTORY`.
    pub rva: u32,

    /// Size of the export data used for detecting forwarders.
    pub size: u32,
}

impl ExportRegion {
    /// Returns `true` if `rva` points inside of this region.
    #[inline]
    pub fn contains(&self, rva: u32) -> bool {
        DataDirectory {
            virtual_address: self.rva,
            size: self.size,
        }
        .contains(rva)
    }
}

/// Scans the section table for export regions.
///
/// A section produces a region if either its name starts with `.edata` or
/// the export directory RVA from the optional header falls inside of its
/// raw data range. The `.edata` check uses the section's own address with
/// the size from the data directory.
///
/// Both conditions are checked for every section so an image can produce
/// the same export directory more than once when they match different
/// sections.
pub fn find_export_regions(image: &Image<'_>) -> Vec<ExportRegion> {
    let directory = image.export_directory();

    image
        .sections()
        .iter()
        .filter_map(|section| {
            if section.raw_name().starts_with(b".edata") {
                Some(ExportRegion {
                    rva: section.virtual_address(),
                    size: directory.size,
                })
            } else if section.contains_rva(directory.virtual_address) {
                Some(ExportRegion {
                    rva: directory.virtual_address,
                    size: directory.size,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Code or data classification of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    /// The export address lands in a section flagged with
    /// `IMAGE_SCN_CNT_CODE`.
    Code,

    /// The export address lands in a section without the code flag or is not
    /// inside of any section.
    Data,
}

impl ExportKind {
    pub fn classify(section: Option<&Section<'_>>) -> ExportKind {
        match section {
            Some(section) if section.is_code() => ExportKind::Code,
            _ => ExportKind::Data,
        }
    }
}

/// How the name of an export was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameSource {
    /// The name is from the name pointer table.
    Declared,

    /// The export only exists by ordinal and the name was taken from the
    /// symbol part of its forwarder string.
    GuessedFromForwarder,
}

/// A decoded export.
#[derive(Debug, Clone)]
pub struct ExportedSymbol<'data> {
    /// Undecorated name of the export.
    pub name: Cow<'data, str>,

    /// Ordinal index plus the ordinal base.
    pub ordinal: u32,

    /// Raw function table value.
    pub rva: u32,

    /// Code or data classification.
    pub kind: ExportKind,

    /// The section containing `rva` if one exists.
    pub section: Option<Section<'data>>,

    /// Forwarder string if the export is forwarded to another module.
    pub forwarder: Option<Cow<'data, str>>,

    /// Size of the stack arguments from header declarations.
    pub stack_size: Option<u32>,

    pub name_source: NameSource,
}

impl ExportedSymbol<'_> {
    /// Returns the name with the `@size` stack-argument decoration applied
    /// if the size is known.
    pub fn decorated_name(&self) -> Cow<'_, str> {
        match self.stack_size {
            Some(size) => Cow::Owned(format!("{}@{size}", self.name)),
            None => Cow::Borrowed(&self.name),
        }
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.kind == ExportKind::Data
    }

    #[inline]
    pub fn is_forwarder(&self) -> bool {
        self.forwarder.is_some()
    }
}

/// A decoded export directory.
#[derive(Debug, Clone)]
pub struct ExportTable<'data> {
    /// The region this table was decoded from.
    pub region: ExportRegion,

    /// Section containing the export directory.
    pub section: Option<Section<'data>>,

    /// The module name from the directory `Name` field.
    pub module_name: Cow<'data, str>,

    /// Ordinal base.
    pub base: u32,

    /// RVA of the function table.
    pub address_of_functions: u32,

    /// RVA of the name pointer table.
    pub address_of_names: u32,

    /// RVA of the ordinal table.
    pub address_of_name_ordinals: u32,

    /// Exports in emission order. Named exports in name pointer table order
    /// followed by exports recovered from unnamed forwarders.
    pub symbols: Vec<ExportedSymbol<'data>>,
}

impl ExportTable<'_> {
    /// Number of exports with a declared name.
    pub fn named_count(&self) -> usize {
        self.symbols
            .iter()
            .filter(|symbol| symbol.name_source == NameSource::Declared)
            .count()
    }
}

/// Decodes export directories from an image.
///
/// This holds the state shared by every export region of a run.
pub struct ExportReader<'a, 'data, A: SymbolAnnotator> {
    image: &'a Image<'data>,
    annotator: A,
}

impl<'a, 'data, A: SymbolAnnotator> ExportReader<'a, 'data, A> {
    pub fn new(image: &'a Image<'data>, annotator: A) -> Self {
        Self { image, annotator }
    }

    /// Decodes the export directory at `region`.
    pub fn read(&self, region: ExportRegion) -> Result<ExportTable<'data>, ExportError> {
        let image = self.image;
        let sections = image.sections();

        let directory: &'data pe::ImageExportDirectory =
            image.read_at_rva(region.rva, "export directory")?;

        let module_name = String::from_utf8_lossy(
            image.read_string_at_rva(directory.name.get(LE), "export module name")?,
        );

        let base = directory.base.get(LE);
        let number_of_functions = directory.number_of_functions.get(LE) as usize;
        let number_of_names = directory.number_of_names.get(LE) as usize;

        let address_of_functions = directory.address_of_functions.get(LE);
        let address_of_names = directory.address_of_names.get(LE);
        let address_of_name_ordinals = directory.address_of_name_ordinals.get(LE);

        let function_table: &'data [U32<LE>] = image.read_slice_at_rva(
            address_of_functions,
            number_of_functions,
            "export address table",
        )?;

        let name_table: &'data [U32<LE>] =
            image.read_slice_at_rva(address_of_names, number_of_names, "export name table")?;

        let ordinal_table: &'data [U16<LE>] = image.read_slice_at_rva(
            address_of_name_ordinals,
            number_of_names,
            "export ordinal table",
        )?;

        log::debug!(
            "export directory at {:#010x}: {number_of_functions} functions, {number_of_names} names",
            region.rva
        );

        let mut symbols = Vec::with_capacity(number_of_names);
        let mut named = FixedDenseBitSet::new_empty(number_of_functions);

        for (name_index, (name_rva, ordinal_index)) in
            name_table.iter().zip(ordinal_table.iter()).enumerate()
        {
            let ordinal_index = ordinal_index.get(LE);
            let rva = function_table
                .get(usize::from(ordinal_index))
                .ok_or(ExportError::OrdinalIndex {
                    index: ordinal_index,
                    name_index,
                    count: number_of_functions,
                })?
                .get(LE);

            named.insert(ordinal_index.into());

            let name = String::from_utf8_lossy(
                image.read_string_at_rva(name_rva.get(LE), "export name")?,
            );

            let forwarder = if region.contains(rva) {
                match image.read_string_at_rva(rva, "forwarder string") {
                    Ok(forwarder) => Some(String::from_utf8_lossy(forwarder)),
                    Err(e) => {
                        log::warn!("export '{name}': {e}");
                        None
                    }
                }
            } else {
                None
            };

            symbols.push(self.make_symbol(
                name,
                base.wrapping_add(ordinal_index.into()),
                rva,
                forwarder,
                NameSource::Declared,
            ));
        }

        for (function_index, rva) in function_table.iter().enumerate() {
            let rva = rva.get(LE);
            if !region.contains(rva) || named.contains(function_index) {
                continue;
            }

            let forwarder = String::from_utf8_lossy(
                image.read_string_at_rva(rva, "forwarder string")?,
            );
            let name = guess_forwarder_name(&forwarder);

            log::debug!(
                "recovered unnamed forwarder at ordinal index {function_index} as '{name}'"
            );

            symbols.push(self.make_symbol(
                name,
                base.wrapping_add(function_index as u32),
                rva,
                Some(forwarder),
                NameSource::GuessedFromForwarder,
            ));
        }

        Ok(ExportTable {
            region,
            section: sections.find_section(region.rva),
            module_name,
            base,
            address_of_functions,
            address_of_names,
            address_of_name_ordinals,
            symbols,
        })
    }

    fn make_symbol(
        &self,
        name: Cow<'data, str>,
        ordinal: u32,
        rva: u32,
        forwarder: Option<Cow<'data, str>>,
        name_source: NameSource,
    ) -> ExportedSymbol<'data> {
        let section = self.image.sections().find_section(rva);
        let stack_size = self.annotator.stack_size(&name);

        ExportedSymbol {
            kind: ExportKind::classify(section.as_ref()),
            name,
            ordinal,
            rva,
            section,
            forwarder,
            stack_size,
            name_source,
        }
    }
}

/// Returns the symbol part of a `Module.Symbol` forwarder string.
///
/// The text after the first `.` is used. A forwarder without a `.` is
/// returned as is.
fn guess_forwarder_name<'data>(forwarder: &Cow<'data, str>) -> Cow<'data, str> {
    fn symbol_part(forwarder: &str) -> &str {
        forwarder
            .split_once('.')
            .map_or(forwarder, |(_, name)| name)
    }

    match forwarder {
        Cow::Borrowed(s) => {
            let s: &'data str = *s;
            Cow::Borrowed(symbol_part(s))
        }
        Cow::Owned(s) => Cow::Owned(symbol_part(s).to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use object::pe;

    use super::{ExportKind, ExportRegion, guess_forwarder_name};
    use crate::sections::{Section, tests::section_header};

    #[test]
    fn forwarder_name() {
        let forwarder = Cow::Borrowed("NTDLL.RtlAllocateHeap");
        assert_eq!(guess_forwarder_name(&forwarder), "RtlAllocateHeap");

        let forwarder: Cow<'_, str> = Cow::Owned("KERNELBASE.Sleep".to_owned());
        assert_eq!(guess_forwarder_name(&forwarder), "Sleep");
    }

    #[test]
    fn forwarder_name_first_separator() {
        let forwarder = Cow::Borrowed("api-ms-win-core-synch-l1-2-0.dll.Sleep");
        assert_eq!(guess_forwarder_name(&forwarder), "dll.Sleep");
    }

    #[test]
    fn forwarder_without_separator() {
        let forwarder = Cow::Borrowed("#12");
        assert_eq!(guess_forwarder_name(&forwarder), "#12");
    }

    #[test]
    fn classification() {
        let text = section_header(b".text", 0x1000, 0x100, 0x400, pe::IMAGE_SCN_CNT_CODE);
        let rdata = section_header(
            b".rdata",
            0x2000,
            0x100,
            0x500,
            pe::IMAGE_SCN_CNT_INITIALIZED_DATA,
        );

        assert_eq!(
            ExportKind::classify(Some(&Section::new(&text))),
            ExportKind::Code
        );
        assert_eq!(
            ExportKind::classify(Some(&Section::new(&rdata))),
            ExportKind::Data
        );
        assert_eq!(ExportKind::classify(None), ExportKind::Data);
    }

    #[test]
    fn region_bounds() {
        let region = ExportRegion {
            rva: 0x3000,
            size: 0x100,
        };

        assert!(region.contains(0x3000));
        assert!(region.contains(0x30ff));
        assert!(!region.contains(0x3100));
        assert!(!region.contains(0x2fff));
    }
}

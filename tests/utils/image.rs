//! In-memory construction of PE images for tests.

use object::pe;

const DOS_HEADER_SIZE: usize = 0x40;
const FILE_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;
const EXPORT_DIRECTORY_SIZE: usize = 40;
const DATA_DIRECTORY_COUNT: usize = 16;
const FILE_ALIGNMENT: usize = 0x200;

/// Appends a nul-terminated string returning its offset.
fn push_string(data: &mut Vec<u8>, s: &str) -> usize {
    let offset = data.len();
    data.extend_from_slice(s.as_bytes());
    data.push(0);
    offset
}

fn put_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone)]
pub struct TestSection {
    name: [u8; 8],
    virtual_address: u32,
    size: u32,
    characteristics: u32,
    data: Option<Vec<u8>>,
}

#[allow(unused)]
impl TestSection {
    fn new(name: &str, virtual_address: u32, characteristics: u32, data: Option<Vec<u8>>, size: u32) -> Self {
        let mut raw_name = [0u8; 8];
        raw_name[..name.len()].copy_from_slice(name.as_bytes());
        Self {
            name: raw_name,
            virtual_address,
            size,
            characteristics,
            data,
        }
    }

    /// Section containing code.
    pub fn code(name: &str, virtual_address: u32, size: u32) -> Self {
        Self::new(
            name,
            virtual_address,
            pe::IMAGE_SCN_CNT_CODE | pe::IMAGE_SCN_MEM_EXECUTE | pe::IMAGE_SCN_MEM_READ,
            Some(vec![0xcc; size as usize]),
            size,
        )
    }

    /// Initialized data section with the specified contents.
    pub fn data(name: &str, virtual_address: u32, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let size = data.len() as u32;
        Self::new(
            name,
            virtual_address,
            pe::IMAGE_SCN_CNT_INITIALIZED_DATA | pe::IMAGE_SCN_MEM_READ,
            Some(data),
            size,
        )
    }

    /// Section without any data in the file.
    pub fn uninitialized(name: &str, virtual_address: u32, size: u32) -> Self {
        Self::new(
            name,
            virtual_address,
            pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA | pe::IMAGE_SCN_MEM_READ | pe::IMAGE_SCN_MEM_WRITE,
            None,
            size,
        )
    }

    pub fn with_characteristics(mut self, characteristics: u32) -> Self {
        self.characteristics = characteristics;
        self
    }
}

/// Builds a PE image with a set of sections.
#[derive(Debug, Clone)]
pub struct PeBuilder {
    machine: u16,
    sections: Vec<TestSection>,
    export_directory: (u32, u32),
}

#[allow(unused)]
impl PeBuilder {
    pub fn new(machine: u16) -> Self {
        Self {
            machine,
            sections: Vec::new(),
            export_directory: (0, 0),
        }
    }

    pub fn i386() -> Self {
        Self::new(pe::IMAGE_FILE_MACHINE_I386)
    }

    pub fn amd64() -> Self {
        Self::new(pe::IMAGE_FILE_MACHINE_AMD64)
    }

    pub fn section(mut self, section: TestSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Sets data directory entry 0.
    pub fn export_directory(mut self, virtual_address: u32, size: u32) -> Self {
        self.export_directory = (virtual_address, size);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let pe32 = self.machine == pe::IMAGE_FILE_MACHINE_I386;
        let (fixed_size, magic) = if pe32 {
            (
                std::mem::size_of::<pe::ImageOptionalHeader32>(),
                pe::IMAGE_NT_OPTIONAL_HDR32_MAGIC,
            )
        } else {
            (
                std::mem::size_of::<pe::ImageOptionalHeader64>(),
                pe::IMAGE_NT_OPTIONAL_HDR64_MAGIC,
            )
        };
        let optional_header_size = fixed_size + DATA_DIRECTORY_COUNT * 8;

        let file_header = DOS_HEADER_SIZE + 4;
        let optional_header = file_header + FILE_HEADER_SIZE;
        let section_table = optional_header + optional_header_size;
        let headers_end = section_table + self.sections.len() * SECTION_HEADER_SIZE;

        let mut raw_offset = headers_end.next_multiple_of(FILE_ALIGNMENT);
        let mut raw_offsets = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            match &section.data {
                Some(data) => {
                    raw_offsets.push(raw_offset);
                    raw_offset = (raw_offset + data.len()).next_multiple_of(FILE_ALIGNMENT);
                }
                None => raw_offsets.push(0),
            }
        }

        let mut image = vec![0u8; raw_offset];
        image[..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3c, DOS_HEADER_SIZE as u32);
        image[DOS_HEADER_SIZE..DOS_HEADER_SIZE + 4].copy_from_slice(b"PE\0\0");

        put_u16(&mut image, file_header, self.machine);
        put_u16(&mut image, file_header + 2, self.sections.len() as u16);
        put_u16(&mut image, file_header + 16, optional_header_size as u16);
        put_u16(
            &mut image,
            file_header + 18,
            pe::IMAGE_FILE_EXECUTABLE_IMAGE | pe::IMAGE_FILE_DLL,
        );

        put_u16(&mut image, optional_header, magic);
        put_u32(&mut image, optional_header + fixed_size, self.export_directory.0);
        put_u32(&mut image, optional_header + fixed_size + 4, self.export_directory.1);

        for (idx, (section, raw)) in self.sections.iter().zip(raw_offsets).enumerate() {
            let header = section_table + idx * SECTION_HEADER_SIZE;
            image[header..header + 8].copy_from_slice(&section.name);
            put_u32(&mut image, header + 8, section.size);
            put_u32(&mut image, header + 12, section.virtual_address);
            put_u32(&mut image, header + 16, section.size);
            put_u32(&mut image, header + 20, raw as u32);
            put_u32(&mut image, header + 36, section.characteristics);

            if let Some(data) = &section.data {
                image[raw..raw + data.len()].copy_from_slice(data);
            }
        }

        image
    }
}

#[derive(Debug, Clone)]
enum ExportFunction {
    Address(u32),
    Forwarder(String),
}

/// Builds export directory data for placing in a section.
#[derive(Debug, Clone)]
pub struct ExportBuilder {
    module_name: String,
    base: u32,
    functions: Vec<ExportFunction>,
    names: Vec<(String, u16)>,
}

#[allow(unused)]
impl ExportBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            base: 1,
            functions: Vec::new(),
            names: Vec::new(),
        }
    }

    pub fn base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    /// Adds a function table entry pointing at `rva`.
    pub fn function(mut self, rva: u32) -> Self {
        self.functions.push(ExportFunction::Address(rva));
        self
    }

    /// Adds a function table entry for a forwarder string.
    pub fn forwarder(mut self, forwarder: impl Into<String>) -> Self {
        self.functions.push(ExportFunction::Forwarder(forwarder.into()));
        self
    }

    /// Adds a name for the function table entry at `index`.
    pub fn name(mut self, name: impl Into<String>, index: u16) -> Self {
        self.names.push((name.into(), index));
        self
    }

    /// Lays out the export directory for placement at `virtual_address`.
    pub fn build(&self, virtual_address: u32) -> Vec<u8> {
        let functions = EXPORT_DIRECTORY_SIZE;
        let names = functions + self.functions.len() * 4;
        let ordinals = names + self.names.len() * 4;
        let strings = (ordinals + self.names.len() * 2).next_multiple_of(4);

        let mut data = vec![0u8; strings];
        let rva = |offset: usize| virtual_address + offset as u32;

        let module_name = push_string(&mut data, &self.module_name);

        put_u32(&mut data, 12, rva(module_name));
        put_u32(&mut data, 16, self.base);
        put_u32(&mut data, 20, self.functions.len() as u32);
        put_u32(&mut data, 24, self.names.len() as u32);
        put_u32(&mut data, 28, rva(functions));
        put_u32(&mut data, 32, if self.names.is_empty() { 0 } else { rva(names) });
        put_u32(&mut data, 36, if self.names.is_empty() { 0 } else { rva(ordinals) });

        for (idx, function) in self.functions.iter().enumerate() {
            let value = match function {
                ExportFunction::Address(address) => *address,
                ExportFunction::Forwarder(forwarder) => rva(push_string(&mut data, forwarder)),
            };
            put_u32(&mut data, functions + idx * 4, value);
        }

        for (idx, (name, index)) in self.names.iter().enumerate() {
            let name = rva(push_string(&mut data, name));
            put_u32(&mut data, names + idx * 4, name);
            put_u16(&mut data, ordinals + idx * 2, *index);
        }

        data
    }
}

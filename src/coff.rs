//! Low-level PE/COFF handling module.
//!
//! This acts as a supplement to the [object](https://github.com/gimli-rs/object)
//! crate. The raw header records come from [`object::pe`] and the items here
//! are strongly typed views over a few of their numeric fields.

use bitflags::bitflags;
use object::pe;

#[derive(Debug)]
pub struct TryFromImageFileMachineError(u16);

impl std::fmt::Display for TryFromImageFileMachineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown 'IMAGE_FILE_MACHINE_*' value '{:#06x}'", self.0)
    }
}

impl std::error::Error for TryFromImageFileMachineError {}

/// PE `IMAGE_FILE_MACHINE_*` constants for the machines that show up in
/// images with export tables.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ImageFileMachine {
    #[default]
    Unknown = pe::IMAGE_FILE_MACHINE_UNKNOWN,
    Amd64 = pe::IMAGE_FILE_MACHINE_AMD64,
    Arm = pe::IMAGE_FILE_MACHINE_ARM,
    Arm64 = pe::IMAGE_FILE_MACHINE_ARM64,
    Arm64Ec = pe::IMAGE_FILE_MACHINE_ARM64EC,
    Arm64X = pe::IMAGE_FILE_MACHINE_ARM64X,
    ArmNt = pe::IMAGE_FILE_MACHINE_ARMNT,
    I386 = pe::IMAGE_FILE_MACHINE_I386,
    Ia64 = pe::IMAGE_FILE_MACHINE_IA64,
    Thumb = pe::IMAGE_FILE_MACHINE_THUMB,
}

impl ImageFileMachine {
    /// Returns `true` if images for this machine use the 32-bit optional
    /// header layout.
    ///
    /// Only i386 is treated as 32-bit. Every other machine is read with the
    /// 64-bit layout.
    pub const fn uses_pe32_header(&self) -> bool {
        matches!(self, Self::I386)
    }

    const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => stringify!(IMAGE_FILE_MACHINE_UNKNOWN),
            Self::Amd64 => stringify!(IMAGE_FILE_MACHINE_AMD64),
            Self::Arm => stringify!(IMAGE_FILE_MACHINE_ARM),
            Self::Arm64 => stringify!(IMAGE_FILE_MACHINE_ARM64),
            Self::Arm64Ec => stringify!(IMAGE_FILE_MACHINE_ARM64EC),
            Self::Arm64X => stringify!(IMAGE_FILE_MACHINE_ARM64X),
            Self::ArmNt => stringify!(IMAGE_FILE_MACHINE_ARMNT),
            Self::I386 => stringify!(IMAGE_FILE_MACHINE_I386),
            Self::Ia64 => stringify!(IMAGE_FILE_MACHINE_IA64),
            Self::Thumb => stringify!(IMAGE_FILE_MACHINE_THUMB),
        }
    }
}

impl std::fmt::Display for ImageFileMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u16> for ImageFileMachine {
    type Error = TryFromImageFileMachineError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            pe::IMAGE_FILE_MACHINE_UNKNOWN => Self::Unknown,
            pe::IMAGE_FILE_MACHINE_AMD64 => Self::Amd64,
            pe::IMAGE_FILE_MACHINE_ARM => Self::Arm,
            pe::IMAGE_FILE_MACHINE_ARM64 => Self::Arm64,
            pe::IMAGE_FILE_MACHINE_ARM64EC => Self::Arm64Ec,
            pe::IMAGE_FILE_MACHINE_ARM64X => Self::Arm64X,
            pe::IMAGE_FILE_MACHINE_ARMNT => Self::ArmNt,
            pe::IMAGE_FILE_MACHINE_I386 => Self::I386,
            pe::IMAGE_FILE_MACHINE_IA64 => Self::Ia64,
            pe::IMAGE_FILE_MACHINE_THUMB => Self::Thumb,
            o => return Err(TryFromImageFileMachineError(o)),
        })
    }
}

/// Characteristics from COFF section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SectionFlags(u32);

bitflags! {
    impl SectionFlags: u32 {
        const CntCode = pe::IMAGE_SCN_CNT_CODE;
        const CntInitializedData = pe::IMAGE_SCN_CNT_INITIALIZED_DATA;
        const CntUninitializedData = pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA;
        const MemDiscardable = pe::IMAGE_SCN_MEM_DISCARDABLE;
        const MemShared = pe::IMAGE_SCN_MEM_SHARED;
        const MemExecute = pe::IMAGE_SCN_MEM_EXECUTE;
        const MemRead = pe::IMAGE_SCN_MEM_READ;
        const MemWrite = pe::IMAGE_SCN_MEM_WRITE;

        // Allow externally set flags
        const _ = !0;
    }
}

impl SectionFlags {
    /// Returns `true` if the section is marked as containing code.
    ///
    /// Only `IMAGE_SCN_CNT_CODE` is considered. Sections that are executable
    /// but not flagged as code are treated as data.
    #[inline]
    pub fn contains_code(&self) -> bool {
        self.contains(SectionFlags::CntCode)
    }
}

#[cfg(test)]
mod tests {
    use object::pe;

    use super::{ImageFileMachine, SectionFlags};

    #[test]
    fn machine_layout() {
        assert!(ImageFileMachine::I386.uses_pe32_header());
        assert!(!ImageFileMachine::Amd64.uses_pe32_header());
        assert!(!ImageFileMachine::Arm64.uses_pe32_header());
    }

    #[test]
    fn machine_conversion() {
        assert_eq!(
            ImageFileMachine::try_from(pe::IMAGE_FILE_MACHINE_AMD64).unwrap(),
            ImageFileMachine::Amd64
        );
        assert!(ImageFileMachine::try_from(0x1234).is_err());
        assert_eq!(
            ImageFileMachine::I386.to_string(),
            "IMAGE_FILE_MACHINE_I386"
        );
    }

    #[test]
    fn code_flag() {
        let text = SectionFlags::from_bits_retain(
            pe::IMAGE_SCN_CNT_CODE | pe::IMAGE_SCN_MEM_EXECUTE | pe::IMAGE_SCN_MEM_READ,
        );
        assert!(text.contains_code());

        let data = SectionFlags::from_bits_retain(
            pe::IMAGE_SCN_CNT_INITIALIZED_DATA | pe::IMAGE_SCN_MEM_EXECUTE,
        );
        assert!(!data.contains_code());
    }
}

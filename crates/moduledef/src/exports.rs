//! see: https://learn.microsoft.com/en-us/cpp/build/reference/exports?view=msvc-170

/// The keyword `EXPORTS` which begins the list of export definitions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportsKeyword;

impl std::fmt::Display for ExportsKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EXPORTS")
    }
}

/// A definition entry for an `EXPORTS` statement.
///
/// Only the `entryname [@ordinal] [DATA]` form is supported. Entry name
/// aliases are never produced when describing the exports of an existing
/// image.
///
/// See: https://learn.microsoft.com/en-us/cpp/build/reference/exports?view=msvc-170
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportsDefinition<'a> {
    entryname: &'a str,
    ordinal: Option<DefinitionOrdinal>,
    attribute: Option<DefinitionAttribute>,
}

impl<'a> ExportsDefinition<'a> {
    /// Creates a new definition for `entryname` with no ordinal or attribute.
    pub fn new(entryname: &'a str) -> ExportsDefinition<'a> {
        Self {
            entryname,
            ..Default::default()
        }
    }

    /// Sets the ordinal for the definition.
    pub fn with_ordinal(mut self, ordinal: impl Into<Option<DefinitionOrdinal>>) -> Self {
        self.ordinal = ordinal.into();
        self
    }

    /// Sets the attribute for the definition.
    pub fn with_attribute(mut self, attribute: impl Into<Option<DefinitionAttribute>>) -> Self {
        self.attribute = attribute.into();
        self
    }
}

impl std::fmt::Display for ExportsDefinition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entryname)?;

        if let Some(ordinal) = self.ordinal {
            write!(f, "\t{ordinal}")?;
        }

        if let Some(attribute) = self.attribute {
            write!(f, " {attribute}")?;
        }

        Ok(())
    }
}

/// Ordinal value for an export.
///
/// Ordinals are 16 bits wide in the import library but the export directory
/// base can push the computed value past that so the full value is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefinitionOrdinal(u32);

impl DefinitionOrdinal {
    pub fn new(value: u32) -> DefinitionOrdinal {
        Self(value)
    }
}

impl std::fmt::Display for DefinitionOrdinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Export definition attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionAttribute {
    /// Export is a data export
    Data,
}

impl std::fmt::Display for DefinitionAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Data => "DATA",
        })
    }
}

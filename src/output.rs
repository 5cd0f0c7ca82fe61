//! Module-definition listing output.

use std::io::Write;

use moduledef::{
    Comment, DefinitionAttribute, DefinitionOrdinal, ExportsDefinition, ExportsKeyword,
    LibraryStatement,
};

use crate::{
    exports::{ExportTable, ExportedSymbol, NameSource},
    sections::SectionTable,
};

/// Options controlling what gets written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    /// Emit diagnostic comments.
    pub verbose: bool,

    /// Emit `@ordinal` for each export.
    pub ordinals: bool,
}

/// Writes export tables as a `.def` listing.
///
/// The `LIBRARY`/`EXPORTS` preamble is written for the first export table
/// only. Any following tables get a `; LIBRARY` comment.
pub struct DefWriter<W: Write> {
    out: W,
    options: OutputOptions,
    preamble_written: bool,
}

impl<W: Write> DefWriter<W> {
    pub fn new(out: W, options: OutputOptions) -> DefWriter<W> {
        Self {
            out,
            options,
            preamble_written: false,
        }
    }

    #[inline]
    pub fn options(&self) -> OutputOptions {
        self.options
    }

    /// Writes the preprocessor command line as a comment in verbose mode.
    pub fn write_command_comment(&mut self, command: &str) -> std::io::Result<()> {
        if self.options.verbose {
            writeln!(self.out, "{}", Comment(command))?;
        }

        Ok(())
    }

    /// Writes the address and file offset of every section in verbose mode.
    pub fn write_section_summary(&mut self, sections: &SectionTable<'_>) -> std::io::Result<()> {
        if !self.options.verbose {
            return Ok(());
        }

        for section in sections.iter() {
            writeln!(
                self.out,
                "{}",
                Comment(format_args!(
                    "{:<8}: RVA: {:08x}, File offset: {:08x}",
                    section.name(),
                    section.virtual_address(),
                    section.pointer_to_raw_data()
                ))
            )?;
        }

        Ok(())
    }

    pub fn write_export_table(&mut self, table: &ExportTable<'_>) -> std::io::Result<()> {
        if self.options.verbose {
            let section_name = table
                .section
                .as_ref()
                .map(|section| section.name())
                .unwrap_or_default();

            writeln!(
                self.out,
                "{}",
                Comment(format_args!("Reading exports from section: {section_name}"))
            )?;
            writeln!(
                self.out,
                "{}",
                Comment(format_args!("Export table: {}", table.module_name))
            )?;
            writeln!(
                self.out,
                "{}",
                Comment(format_args!("Ordinal base: {}", table.base))
            )?;
            writeln!(
                self.out,
                "{}",
                Comment(format_args!(
                    "Ordinal table RVA: {:08x}",
                    table.address_of_name_ordinals
                ))
            )?;
            writeln!(
                self.out,
                "{}",
                Comment(format_args!("Name table RVA: {:08x}", table.address_of_names))
            )?;
            writeln!(
                self.out,
                "{}",
                Comment(format_args!(
                    "Export address table RVA: {:08x}",
                    table.address_of_functions
                ))
            )?;
        }

        let library = LibraryStatement::new(&table.module_name);
        if self.preamble_written {
            writeln!(self.out, "{}", Comment(library))?;
        } else {
            writeln!(self.out, "{library}")?;
            writeln!(self.out, "{ExportsKeyword}")?;
            self.preamble_written = true;
        }

        for symbol in &table.symbols {
            self.write_symbol(symbol)?;
        }

        Ok(())
    }

    fn write_symbol(&mut self, symbol: &ExportedSymbol<'_>) -> std::io::Result<()> {
        let name = symbol.decorated_name();
        let definition = ExportsDefinition::new(&name)
            .with_ordinal(
                self.options
                    .ordinals
                    .then(|| DefinitionOrdinal::new(symbol.ordinal)),
            )
            .with_attribute(symbol.is_data().then_some(DefinitionAttribute::Data));

        write!(self.out, "{definition}")?;

        if self.options.verbose {
            match &symbol.section {
                Some(section) => write!(self.out, " {}", Comment(section.name()))?,
                None => write!(self.out, " {}", Comment("no section"))?,
            }

            write!(
                self.out,
                " {}",
                Comment(format_args!("RVA {:08x}", symbol.rva))
            )?;
        }

        match (&symbol.forwarder, symbol.name_source) {
            (Some(forwarder), NameSource::Declared) if self.options.verbose => write!(
                self.out,
                " {}",
                Comment(format_args!("Forwarder ({forwarder})"))
            )?,
            (Some(forwarder), NameSource::GuessedFromForwarder) => write!(
                self.out,
                " {}",
                Comment(format_args!(
                    "WARNING: Symbol name guessed from forwarder ({forwarder})"
                ))
            )?,
            _ => (),
        }

        writeln!(self.out)
    }

    /// Returns `true` if the `LIBRARY`/`EXPORTS` preamble has been written.
    #[inline]
    pub fn preamble_written(&self) -> bool {
        self.preamble_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

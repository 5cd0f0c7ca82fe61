//! Generates module-definition (`.def`) listings from the export table of PE
//! images.
//!
//! The export directory of an image is located through the section table,
//! decoded into [`exports::ExportTable`]s and written out with
//! [`output::DefWriter`]. Exported function names can be decorated with the
//! size of their stack arguments by analyzing C headers
//! ([`headers`], [`declarations`]).

pub mod annotate;
pub mod coff;
pub mod declarations;
pub mod error;
pub mod exports;
pub mod headers;
pub mod image;
pub mod output;
pub mod sections;

mod bit_set;

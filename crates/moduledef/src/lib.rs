//! Writer for Windows [Module-Definition (.Def) Files](https://learn.microsoft.com/en-us/cpp/build/reference/module-definition-dot-def-files)
//!
//! These files contain plaintext export information of a DLL.
//!
//! An example module definition file looks like this.
//! ```text
//! LIBRARY mylibrary
//! EXPORTS
//!    MyLibraryCreate
//!    MyLibraryHelloWorld@8
//!    MyLibraryGlobalData                    DATA
//!    MyLibraryOrdinalThree                  @3
//! ```
//!
//! Module definition files are used with tools such as `dlltool, lib.exe,
//! llvm-dlltool` to create an import library for a DLL when the DLL source
//! code or original import library is not available.
//!
//! This crate only covers the statements needed for describing the exports
//! of an existing DLL. Each statement type implements [`std::fmt::Display`]
//! and renders exactly one line without the trailing newline.
//!
//! Rules that apply when writing
//!
//! - A NAME or LIBRARY statement, if used, must precede all other statements.
//! - The EXPORTS keyword must appear once before the first specification.
//! - Comments in the .def file are designated by a semicolon (;). Trailing
//!   comments after a definition are accepted by `dlltool` and `llvm-dlltool`.

mod comment;
mod exports;
mod library;

pub use comment::Comment;
pub use exports::{DefinitionAttribute, DefinitionOrdinal, ExportsDefinition, ExportsKeyword};
pub use library::LibraryStatement;

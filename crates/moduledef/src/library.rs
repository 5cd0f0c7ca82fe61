//! see: https://learn.microsoft.com/en-us/cpp/build/reference/library?view=msvc-170

/// A `LIBRARY` statement in a module definition file.
///
/// See: https://learn.microsoft.com/en-us/cpp/build/reference/library?view=msvc-170
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryStatement<'a> {
    library: &'a str,
}

impl<'a> LibraryStatement<'a> {
    pub fn new(library: &'a str) -> LibraryStatement<'a> {
        Self { library }
    }
}

impl std::fmt::Display for LibraryStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LIBRARY ")?;

        // Long file names containing spaces or semicolons must be quoted
        if self.library.contains([' ', '\t', ';']) {
            write!(f, "\"{}\"", self.library)
        } else {
            f.write_str(self.library)
        }
    }
}

//! Stack-argument size lookup used for decorating exported names.

use std::collections::HashMap;

/// Maps an exported function name to the number of bytes of stack-passed
/// arguments it takes.
///
/// Names with a known size are written as `name@size`.
pub trait SymbolAnnotator {
    fn stack_size(&self, name: &str) -> Option<u32>;
}

/// Annotator that never knows about any symbol.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnnotations;

impl SymbolAnnotator for NoAnnotations {
    #[inline]
    fn stack_size(&self, _name: &str) -> Option<u32> {
        None
    }
}

/// Table of stack-argument sizes built from function declarations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StackSizeTable {
    sizes: HashMap<String, u32>,
}

impl StackSizeTable {
    pub fn new() -> StackSizeTable {
        Default::default()
    }

    /// Adds an entry for `name`.
    ///
    /// The first size added for a name is kept. Returns `false` if the name
    /// was already present.
    pub fn insert(&mut self, name: impl Into<String>, size: u32) -> bool {
        let mut inserted = false;
        self.sizes.entry(name.into()).or_insert_with(|| {
            inserted = true;
            size
        });
        inserted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl SymbolAnnotator for StackSizeTable {
    fn stack_size(&self, name: &str) -> Option<u32> {
        self.sizes.get(name).copied()
    }
}

impl<T: SymbolAnnotator + ?Sized> SymbolAnnotator for &T {
    #[inline]
    fn stack_size(&self, name: &str) -> Option<u32> {
        (**self).stack_size(name)
    }
}

/// A `;` comment.
///
/// When rendered on its own this produces a full comment line. Multiple
/// comments can also be appended after a definition to produce the
/// ` ; first ; second` trailing comment form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Comment<T>(pub T);

impl<T: std::fmt::Display> std::fmt::Display for Comment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "; {}", self.0)
    }
}

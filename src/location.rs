use std::fmt;
use std::rc::Rc;

/// A span in a source file, attached to every token and AST node.
///
/// `start`/`end` are token indices, not byte offsets, which is enough for
/// diagnostics and for the structural-equality tests the parser needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub path: Rc<str>,
    pub line: u32,
    pub column: u32,
    pub start: u32,
    pub end: u32,
}

impl SourceLocation {
    pub fn new(path: Rc<str>, line: u32, column: u32, start: u32, end: u32) -> Self {
        Self {
            path,
            line,
            column,
            start,
            end,
        }
    }

    /// A zero-width location at the start of `path`, used for empty files.
    pub fn start_of(path: Rc<str>) -> Self {
        Self::new(path, 1, 1, 0, 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

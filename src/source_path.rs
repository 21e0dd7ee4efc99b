use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OrganicError, OrganicResult};

/// File existence, canonicalization, text reads, and include-deduplication
/// identity. The canonical form is what the parser's included-paths set
/// compares on, so a file reached via two different relative routes is
/// recognized as the same include.
pub fn canonicalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn exists(path: &Path) -> bool {
    path.is_file()
}

pub fn read_to_string(path: &Path) -> OrganicResult<String> {
    fs::read_to_string(path).map_err(|e| OrganicError::file(path, e.to_string()))
}

/// Resolves an include literal relative to the directory of the file that
/// contains the `include(...)` call, trimming surrounding whitespace the
/// way a bare string literal inside source text may carry.
pub fn resolve_include(literal: &str, including_file: &Path) -> PathBuf {
    let trimmed = trim_path_literal(literal);
    let base = including_file.parent().unwrap_or_else(|| Path::new("."));
    base.join(trimmed)
}

pub fn trim_path_literal(literal: &str) -> &str {
    literal.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(trim_path_literal("  foo.organic  "), "foo.organic");
    }

    #[test]
    fn resolves_relative_to_including_file() {
        let resolved = resolve_include("sibling.organic", Path::new("/a/b/main.organic"));
        assert_eq!(resolved, PathBuf::from("/a/b/sibling.organic"));
    }
}

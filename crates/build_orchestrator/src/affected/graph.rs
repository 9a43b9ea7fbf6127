//! One-hop dependency lookup.
//!
//! There is no persisted graph: every query re-reads the file and re-resolves
//! its imports, so edges always reflect what is on disk right now.

use super::parser::{parse_imports, ParseError};
use super::resolver::ImportResolver;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Computes the direct imports of files in a repository.
pub struct DependencyGraph {
    root: PathBuf,
    resolver: ImportResolver,
}

impl DependencyGraph {
    pub fn new(root: PathBuf, resolver: ImportResolver) -> Self {
        Self { root, resolver }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the repository-relative paths `file` statically imports.
    ///
    /// Imports that would resolve outside the repository are dropped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if `file` cannot be read or parsed.
    pub fn imports_of(&self, file: &str) -> Result<BTreeSet<String>, ParseError> {
        let imports = parse_imports(&self.root.join(file))?;

        let mut resolved = BTreeSet::new();
        for import in imports {
            match self.resolver.resolve(file, &import.specifier) {
                Ok(path) if !path.is_empty() => {
                    resolved.insert(path);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(file, specifier = %import.specifier, "skipping import: {e}");
                }
            }
        }
        Ok(resolved)
    }
}

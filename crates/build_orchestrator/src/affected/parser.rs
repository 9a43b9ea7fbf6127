//! TypeScript/JavaScript import parser using tree-sitter.
//!
//! Extracts static import statements only. `require()` calls and dynamic
//! `import()` expressions are not edges of the dependency graph.

use std::path::Path;
use thiserror::Error;
use tree_sitter::{Parser, Query, QueryCursor, StreamingIterator};

/// Maximum number of imports to extract per file.
const MAX_IMPORTS_PER_FILE: usize = 500;
/// Maximum path length for logging.
const MAX_PATH_LOG_LENGTH: usize = 256;

const IMPORT_QUERY: &str = r"
    (import_statement source: (string) @source)
    (export_statement source: (string) @source)
";

/// A file that could not be scanned for imports.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot load grammar for {0}")]
    Language(String),
    #[error("syntax errors in {0}")]
    Syntax(String),
}

/// A parsed import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// The import specifier (e.g., "./foo", "#core/dom", "preact").
    pub specifier: String,
}

/// Parse imports from a TypeScript/JavaScript file.
///
/// # Errors
///
/// Returns [`ParseError`] if the file cannot be read or contains syntax
/// errors. Callers skip the file and continue.
pub fn parse_imports(path: &Path) -> Result<Vec<ImportStatement>, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: truncate_path(path),
        source,
    })?;
    parse_imports_from_str(&content, path)
}

/// Parse imports from source text. `path` selects the grammar.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] when tree-sitter reports an error node.
pub fn parse_imports_from_str(
    content: &str,
    path: &Path,
) -> Result<Vec<ImportStatement>, ParseError> {
    let language = get_language_for_path(path);
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|_| ParseError::Language(truncate_path(path)))?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| ParseError::Syntax(truncate_path(path)))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ParseError::Syntax(truncate_path(path)));
    }

    let mut imports = extract_imports(content, &root, &language);

    if imports.len() > MAX_IMPORTS_PER_FILE {
        tracing::warn!(
            file = %truncate_path(path),
            count = imports.len(),
            "too many imports, truncating to {MAX_IMPORTS_PER_FILE}"
        );
        imports.truncate(MAX_IMPORTS_PER_FILE);
    }

    Ok(imports)
}

fn get_language_for_path(path: &Path) -> tree_sitter::Language {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        // Plain .js sources in this codebase may contain JSX.
        "tsx" | "jsx" | "js" | "mjs" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

fn extract_imports(
    content: &str,
    root: &tree_sitter::Node,
    language: &tree_sitter::Language,
) -> Vec<ImportStatement> {
    let mut imports = Vec::new();

    let Ok(query) = Query::new(language, IMPORT_QUERY) else {
        return imports;
    };
    let Some(source_idx) = query.capture_index_for_name("source") else {
        return imports;
    };

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, *root, content.as_bytes());

    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index == source_idx {
                if let Some(import) = extract_import_from_node(content, &capture.node) {
                    imports.push(import);
                }
            }
        }
    }

    imports
}

fn extract_import_from_node(
    content: &str,
    source_node: &tree_sitter::Node,
) -> Option<ImportStatement> {
    let specifier = get_string_content(content, source_node)?;
    if specifier.is_empty() {
        return None;
    }

    Some(ImportStatement { specifier })
}

fn get_string_content(content: &str, node: &tree_sitter::Node) -> Option<String> {
    let text = node.utf8_text(content.as_bytes()).ok()?;
    let trimmed = text.trim_matches(|c| c == '"' || c == '\'' || c == '`');
    Some(trimmed.to_string())
}

pub(crate) fn truncate_path(path: &Path) -> String {
    let s = path.display().to_string();
    if s.len() > MAX_PATH_LOG_LENGTH {
        let mut start = s.len() - MAX_PATH_LOG_LENGTH + 3;
        while !s.is_char_boundary(start) {
            start += 1;
        }
        format!("...{}", &s[start..])
    } else {
        s
    }
}

//! Path normalization utilities for cross-platform consistency.
//!
//! Import specifiers and git output are compared as repository-relative
//! strings with forward slashes, so every path that enters the selector goes
//! through these helpers first.

use std::path::{Component, Path};
use thiserror::Error;

/// Errors that can occur during path normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path '{0}' climbs above the repository root")]
    PathTraversal(String),
    #[error("path '{0}' is not valid UTF-8")]
    NonUtf8(String),
}

/// Normalizes a path to use forward slashes only.
///
/// - Converts backslashes to forward slashes
/// - Collapses consecutive slashes
pub fn normalize_slashes(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut last_was_slash = false;

    for c in path.chars() {
        let is_slash = c == '/' || c == '\\';
        if is_slash {
            if !last_was_slash {
                result.push('/');
            }
            last_was_slash = true;
        } else {
            result.push(c);
            last_was_slash = false;
        }
    }
    result
}

/// Lexically joins `specifier` onto the repository-relative directory `dir`,
/// resolving `.` and `..` without touching the file system.
///
/// Absolute specifiers are treated as repository-rooted. Fails if the
/// result would escape the repository root.
pub fn join_relative(dir: &str, specifier: &str) -> Result<String, PathError> {
    let specifier = normalize_slashes(specifier);
    let mut segments: Vec<&str> = Vec::new();

    let base = if specifier.starts_with('/') {
        String::new()
    } else {
        normalize_slashes(dir)
    };

    for part in base.split('/').chain(specifier.split('/')) {
        match part {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::PathTraversal(specifier));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

/// Returns the repository-relative directory of a repository-relative file.
pub fn parent_dir(file: &str) -> &str {
    match file.rfind('/') {
        Some(idx) => &file[..idx],
        None => "",
    }
}

/// Converts an absolute (or root-prefixed) path into a repository-relative
/// string with forward slashes.
pub fn to_repo_relative(path: &Path, root: &Path) -> Result<String, PathError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUtf8(relative.display().to_string()))?;
                parts.push(part);
            }
            Component::ParentDir => {
                return Err(PathError::PathTraversal(relative.display().to_string()));
            }
            _ => {}
        }
    }
    Ok(parts.join("/"))
}

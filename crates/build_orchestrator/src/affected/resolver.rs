//! Import specifier resolution against a path-alias table.
//!
//! Aliases come from the `compilerOptions.paths` section of a tsconfig file.
//! Resolution is purely lexical: specifiers are rewritten to
//! repository-relative paths without probing extensions or index files, so
//! `./foo` stays `dir/foo`. The selector compares these paths by substring.

use crate::normalize::path::{join_relative, parent_dir, PathError};
use serde::Deserialize;
use serde_json::Map;
use std::path::Path;
use thiserror::Error;

/// Errors loading the alias table. These are fatal at startup.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("cannot read alias config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid alias config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("alias config has no compilerOptions.paths table")]
    MissingPaths,
    #[error("alias '{0}' has no target path")]
    EmptyTarget(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    compiler_options: Option<CompilerOptions>,
}

#[derive(Deserialize)]
struct CompilerOptions {
    paths: Option<Map<String, serde_json::Value>>,
}

/// One prefix rewrite rule. Wildcards are dropped from both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRule {
    pub alias_prefix: String,
    pub target_prefix: String,
}

/// Ordered alias rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    rules: Vec<AliasRule>,
}

impl AliasTable {
    pub fn new(rules: Vec<AliasRule>) -> Self {
        Self { rules }
    }

    /// Builds a table from `(alias, target)` pairs in declaration order.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let rules = pairs
            .into_iter()
            .map(|(alias, target)| AliasRule {
                alias_prefix: alias.replace('*', ""),
                target_prefix: target.replace('*', ""),
            })
            .collect();
        Self { rules }
    }

    /// Loads the `compilerOptions.paths` table of a tsconfig file.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError`] if the file is unreadable, malformed, or has
    /// no paths table.
    pub fn load(tsconfig: &Path) -> Result<Self, AliasError> {
        let content = std::fs::read_to_string(tsconfig).map_err(|source| AliasError::Read {
            path: tsconfig.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses tsconfig JSON text.
    ///
    /// # Errors
    ///
    /// See [`AliasTable::load`].
    pub fn parse(content: &str) -> Result<Self, AliasError> {
        let config: TsConfig = serde_json::from_str(content)?;
        let paths = config
            .compiler_options
            .and_then(|o| o.paths)
            .ok_or(AliasError::MissingPaths)?;

        let mut rules = Vec::with_capacity(paths.len());
        for (alias, targets) in paths {
            let target = targets
                .as_array()
                .and_then(|t| t.first())
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| AliasError::EmptyTarget(alias.clone()))?;
            rules.push(AliasRule {
                alias_prefix: alias.replace('*', ""),
                target_prefix: target.replace('*', ""),
            });
        }
        Ok(Self { rules })
    }

    /// Returns the rule with the longest alias prefix matching `specifier`.
    /// Equal-length prefixes resolve to the one declared first.
    pub fn best_match(&self, specifier: &str) -> Option<&AliasRule> {
        let mut best: Option<&AliasRule> = None;
        for rule in &self.rules {
            if !specifier.starts_with(&rule.alias_prefix) {
                continue;
            }
            match best {
                Some(b) if b.alias_prefix.len() >= rule.alias_prefix.len() => {}
                _ => best = Some(rule),
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolves import specifiers of repository-relative files.
#[derive(Debug, Clone, Default)]
pub struct ImportResolver {
    aliases: AliasTable,
}

impl ImportResolver {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    /// Resolve `specifier`, imported by the repository-relative `from` file,
    /// to a repository-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::PathTraversal`] when the result would leave the
    /// repository.
    pub fn resolve(&self, from: &str, specifier: &str) -> Result<String, PathError> {
        if !is_relative(specifier) {
            if let Some(rule) = self.aliases.best_match(specifier) {
                let rewritten = format!(
                    "{}{}",
                    rule.target_prefix,
                    &specifier[rule.alias_prefix.len()..]
                );
                return join_relative("", &rewritten);
            }
        }
        join_relative(parent_dir(from), specifier)
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier.starts_with("./") || specifier.starts_with("../")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TSCONFIG: &str = r##"{
        "compilerOptions": {
            "paths": {
                "#core/*": ["./src/core/*"],
                "#core/dom/*": ["./src/core/dom-next/*"],
                "#testing/*": ["./testing/*"],
                "#te*": ["./elsewhere/*"]
            }
        }
    }"##;

    fn resolver() -> ImportResolver {
        ImportResolver::new(AliasTable::parse(TSCONFIG).unwrap())
    }

    #[test]
    fn parses_rules_in_declaration_order() {
        let table = AliasTable::parse(TSCONFIG).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.rules[0].alias_prefix, "#core/");
        assert_eq!(table.rules[0].target_prefix, "./src/core/");
    }

    #[test]
    fn alias_rewrites_to_repo_relative() {
        assert_eq!(
            resolver().resolve("src/components/a/0.1/a.js", "#core/types").unwrap(),
            "src/core/types"
        );
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(
            resolver().resolve("src/x.js", "#core/dom/query").unwrap(),
            "src/core/dom-next/query"
        );
    }

    #[test]
    fn equal_length_prefixes_use_declaration_order() {
        let table = AliasTable::from_pairs([("#a*", "./first/*"), ("#a*", "./second/*")]);
        let r = ImportResolver::new(table);
        assert_eq!(r.resolve("src/x.js", "#ab").unwrap(), "first/b");
    }

    #[test]
    fn unaliased_falls_back_to_relative() {
        assert_eq!(
            resolver().resolve("test/unit/foo-test.js", "../../src/components/foo/0.1/foo.js").unwrap(),
            "src/components/foo/0.1/foo.js"
        );
    }

    #[test]
    fn bare_specifier_resolves_against_importer_dir() {
        assert_eq!(resolver().resolve("src/a/b.js", "preact").unwrap(), "src/a/preact");
    }

    #[test]
    fn resolution_is_deterministic() {
        let r = resolver();
        let first = r.resolve("src/x.js", "#testing/helpers").unwrap();
        for _ in 0..10 {
            assert_eq!(r.resolve("src/x.js", "#testing/helpers").unwrap(), first);
        }
    }

    #[test]
    fn missing_paths_is_error() {
        let result = AliasTable::parse(r#"{"compilerOptions": {}}"#);
        assert!(matches!(result, Err(AliasError::MissingPaths)));
    }

    #[test]
    fn empty_target_is_error() {
        let result = AliasTable::parse(r##"{"compilerOptions": {"paths": {"#x/*": []}}}"##);
        assert!(matches!(result, Err(AliasError::EmptyTarget(_))));
    }
}

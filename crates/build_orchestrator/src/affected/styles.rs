//! Style file to generated-script mapping.
//!
//! Component stylesheets are compiled to `build/<name>-<version>.css.js`
//! modules that the component's scripts import. A changed stylesheet is
//! therefore a change to every sibling script importing that module.

use super::graph::DependencyGraph;
use crate::bundles::registry::{BundleKind, BundleRegistry};
use crate::normalize::path::parent_dir;
use std::collections::HashMap;

/// Maps a stylesheet to the repository-relative path of its generated module.
#[derive(Debug, Clone, Default)]
pub struct StyleMap {
    generated: HashMap<String, String>,
}

impl StyleMap {
    /// Builds the map from every component bundle that declares CSS.
    pub fn from_registry(registry: &BundleRegistry) -> Self {
        let mut generated = HashMap::new();
        for bundle in registry.bundles() {
            if let BundleKind::Component { version, has_css: true } = &bundle.kind {
                let css = format!("{}/{}.css", component_dir(&bundle.name, version), bundle.name);
                generated.insert(css, format!("build/{}-{}.css.js", bundle.name, version));
            }
        }
        Self { generated }
    }

    pub fn insert(&mut self, css_file: impl Into<String>, generated: impl Into<String>) {
        self.generated.insert(css_file.into(), generated.into());
    }

    pub fn generated_for(&self, css_file: &str) -> Option<&str> {
        self.generated.get(css_file).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.generated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generated.is_empty()
    }

    /// Returns the sibling scripts of `css_file` that import its generated
    /// module. Unknown stylesheets map to nothing.
    pub fn scripts_importing(&self, css_file: &str, graph: &DependencyGraph) -> Vec<String> {
        let Some(generated) = self.generated_for(css_file) else {
            return Vec::new();
        };

        let dir = parent_dir(css_file);
        let Ok(entries) = std::fs::read_dir(graph.root().join(dir)) else {
            return Vec::new();
        };

        let mut siblings: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.ends_with(".js") || name.ends_with(".ts"))
            .map(|name| if dir.is_empty() { name } else { format!("{dir}/{name}") })
            .collect();
        siblings.sort();

        siblings
            .into_iter()
            .filter(|script| match graph.imports_of(script) {
                Ok(imports) => imports.iter().any(|i| references_generated(i, generated)),
                Err(e) => {
                    tracing::warn!(file = %script, "skipping unparseable sibling: {e}");
                    false
                }
            })
            .collect()
    }
}

/// The repository directory of a component version.
pub fn component_dir(name: &str, version: &str) -> String {
    format!("src/components/{name}/{version}")
}

/// Imports usually omit the trailing `.js` of the generated module. Matches
/// end on a path segment boundary.
fn references_generated(import: &str, generated: &str) -> bool {
    let stem = generated.strip_suffix(".js");
    [Some(generated), stem].into_iter().flatten().any(|target| {
        import == target
            || import
                .strip_suffix(target)
                .is_some_and(|prefix| prefix.ends_with('/'))
    })
}

//! Pattern sets compiled into the binary.

use crate::error::{IndexerError, Result};
use crate::registry::PatternSet;

const BUILTIN_SETS: &[(&str, &str)] = &[
    (
        "sveltekit-components",
        include_str!("../patterns/sveltekit-components.json"),
    ),
    (
        "sveltekit-modules",
        include_str!("../patterns/sveltekit-modules.json"),
    ),
    ("typescript", include_str!("../patterns/typescript.json")),
    ("knowledge", include_str!("../patterns/knowledge.json")),
];

/// Names of the built-in sets, in registration order
pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_SETS.iter().map(|(name, _)| *name).collect()
}

/// Parse every built-in set, in registration order
pub fn builtin_pattern_sets() -> Result<Vec<PatternSet>> {
    BUILTIN_SETS
        .iter()
        .map(|(name, raw)| {
            serde_json::from_str::<PatternSet>(raw).map_err(|e| {
                IndexerError::Config(format!("built-in pattern set {name}: {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParserKind, PatternRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn registry() -> PatternRegistry {
        let mut registry = PatternRegistry::new();
        for set in builtin_pattern_sets().unwrap() {
            registry.register_set(set).unwrap();
        }
        registry
    }

    #[test]
    fn builtin_sets_parse_and_keep_their_names() {
        let sets = builtin_pattern_sets().unwrap();
        let names: Vec<_> = sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, builtin_names());
        assert_eq!(sets[0].parser, ParserKind::Component);
        assert_eq!(sets[3].parser, ParserKind::Knowledge);
    }

    #[test]
    fn sveltekit_files_get_specific_routes() {
        let registry = registry();
        let cases = [
            ("src/routes/blog/+page.svelte", "sveltekit-page"),
            ("src/routes/+layout.svelte", "sveltekit-layout"),
            ("src/routes/blog/+page.server.ts", "sveltekit-server-load"),
            ("src/routes/blog/+page.ts", "sveltekit-load"),
            ("src/routes/api/posts/+server.js", "sveltekit-endpoint"),
            ("src/hooks.server.ts", "sveltekit-hooks"),
            ("src/params/slug.ts", "sveltekit-param-matcher"),
            ("src/lib/stores/cart.ts", "svelte-store"),
            ("src/lib/server/db.ts", "sveltekit-server-module"),
            ("src/lib/utils/format.ts", "sveltekit-lib"),
            ("src/lib/components/Button.svelte", "svelte-component"),
            ("scripts/build.ts", "typescript-module"),
            ("vite.config.js", "javascript-module"),
            ("README.md", "readme"),
            ("docs/setup.md", "documentation"),
            ("notes/ideas.md", "knowledge"),
        ];
        for (path, expected) in cases {
            let route = registry
                .route(path)
                .unwrap_or_else(|| panic!("{path} not routed"));
            assert_eq!(route.pattern.type_label, expected, "{path}");
        }
    }

    #[test]
    fn declaration_files_and_changelogs_are_ignored() {
        let registry = registry();
        assert!(registry.route("src/app.d.ts").is_none());
        assert!(registry.route("CHANGELOG.md").is_none());
        assert!(registry.route("node_modules/pkg/index.js").is_none());
    }

    #[test]
    fn page_route_metadata_is_rendered() {
        let registry = registry();
        let path = "src/routes/(app)/blog/[slug]/+page.svelte";
        let origin = registry.route(path).unwrap().origin(path);
        assert_eq!(origin.metadata["route"], Value::from("/blog/[slug]"));
        assert_eq!(origin.metadata["role"], Value::from("page"));
        assert_eq!(origin.framework, "sveltekit");
    }
}

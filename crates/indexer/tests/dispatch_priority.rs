use pretty_assertions::assert_eq;
use review_indexer::{
    builtin_pattern_sets, parser_for, Dispatcher, ParserKind, PatternConfig, PatternRegistry,
    PatternSet,
};
use serde_json::{json, Map, Value};

fn pattern(glob: &str, type_label: &str, priority: i32) -> PatternConfig {
    PatternConfig {
        glob: glob.to_string(),
        label: type_label.to_string(),
        type_label: type_label.to_string(),
        description: String::new(),
        priority,
        metadata: Map::new(),
        exclude: Vec::new(),
    }
}

fn set(name: &str, parser: ParserKind, patterns: Vec<PatternConfig>) -> PatternSet {
    PatternSet {
        name: name.to_string(),
        framework: name.to_string(),
        parser,
        exclude: Vec::new(),
        patterns,
    }
}

#[test]
fn file_matched_by_two_sets_is_claimed_once() {
    let mut registry = PatternRegistry::new();
    registry
        .register_set(set(
            "sveltekit",
            ParserKind::Module,
            vec![pattern("src/routes/**/+page.ts", "load", 50)],
        ))
        .unwrap();
    registry
        .register_set(set(
            "typescript",
            ParserKind::Module,
            vec![pattern("**/*.ts", "module", 1000)],
        ))
        .unwrap();

    let mut dispatcher = Dispatcher::new(&registry);
    let paths = [
        "src/routes/+page.ts",
        "src/routes/+page.ts",
        "src/lib/a.ts",
        "src/routes/+page.ts",
    ];
    let claimed: Vec<(String, String)> = paths
        .iter()
        .filter_map(|path| {
            dispatcher
                .dispatch(path)
                .map(|route| (path.to_string(), route.set_name))
        })
        .collect();

    assert_eq!(
        claimed,
        vec![
            ("src/routes/+page.ts".to_string(), "sveltekit".to_string()),
            ("src/lib/a.ts".to_string(), "typescript".to_string()),
        ]
    );
}

#[test]
fn registration_order_beats_priority_across_sets() {
    let mut registry = PatternRegistry::new();
    registry
        .register_set(set(
            "low",
            ParserKind::Knowledge,
            vec![pattern("**/*.md", "note", -10)],
        ))
        .unwrap();
    registry
        .register_set(set(
            "high",
            ParserKind::Knowledge,
            vec![pattern("README.md", "readme", 100)],
        ))
        .unwrap();

    let route = registry.route("README.md").unwrap();
    assert_eq!(route.set_name, "low");
    assert_eq!(route.parser.kind(), ParserKind::Knowledge);
}

#[test]
fn entries_list_patterns_in_dispatch_order() {
    let mut registry = PatternRegistry::new();
    registry
        .register(
            set(
                "modules",
                ParserKind::Module,
                vec![
                    pattern("**/*.ts", "module", 0),
                    pattern("src/hooks*.ts", "hooks", 80),
                    pattern("src/lib/**/*.ts", "lib", 40),
                ],
            ),
            parser_for(ParserKind::Module),
            &[],
        )
        .unwrap();

    let order: Vec<_> = registry
        .entries()
        .iter()
        .map(|entry| entry.pattern.label.clone())
        .collect();
    assert_eq!(order, vec!["hooks", "lib", "module"]);
}

#[test]
fn builtin_sets_route_a_sveltekit_tree() {
    let mut registry = PatternRegistry::new();
    for set in builtin_pattern_sets().unwrap() {
        registry.register_set(set).unwrap();
    }
    let mut dispatcher = Dispatcher::new(&registry);

    let page = "src/routes/(shop)/products/[id]/+page.svelte";
    let route = dispatcher.dispatch(page).unwrap();
    assert_eq!(route.set_name, "sveltekit-components");
    assert_eq!(route.parser.kind(), ParserKind::Component);

    let origin = route.origin(page);
    assert_eq!(origin.semantic_type, "sveltekit-page");
    assert_eq!(origin.metadata["route"], Value::from("/products/[id]"));
    assert_eq!(origin.metadata["label"], Value::from("page"));

    let endpoint = "src/routes/api/cart/+server.ts";
    let origin = dispatcher.dispatch(endpoint).unwrap().origin(endpoint);
    assert_eq!(
        Value::Object(origin.metadata),
        json!({
            "route": "/api/cart",
            "runtime": "server",
            "label": "endpoint",
            "patternSet": "sveltekit-modules",
            "description": "HTTP request handlers",
        })
    );

    assert!(dispatcher.dispatch("src/app.d.ts").is_none());
    assert_eq!(dispatcher.claimed_count(), 2);
}

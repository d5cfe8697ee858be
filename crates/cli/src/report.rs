use review_indexer::{PatternRegistry, Route, RunStats};
use serde_json::{json, Value};

pub fn render_patterns(registry: &PatternRegistry) -> String {
    let entries = registry.entries();
    if entries.is_empty() {
        return "No pattern sets registered".to_string();
    }

    let mut out = String::new();
    out.push_str("set\tframework\tparser\tpriority\ttype\tglob\n");
    for entry in entries {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            entry.set_name,
            entry.framework,
            entry.parser.as_str(),
            entry.pattern.priority,
            entry.pattern.type_label,
            entry.pattern.glob
        ));
    }
    out.pop();
    out
}

pub fn render_route(path: &str, route: Option<&Route>) -> Value {
    let Some(route) = route else {
        return json!({ "path": path, "claimed": false });
    };
    let origin = route.origin(path);
    json!({
        "path": path,
        "claimed": true,
        "set": route.set_name,
        "framework": route.framework,
        "parser": route.parser.kind().as_str(),
        "glob": route.pattern.glob,
        "type": origin.semantic_type,
        "metadata": origin.metadata,
    })
}

pub fn render_summary(stats: &RunStats) -> String {
    let mut out = stats.to_string();
    if !stats.by_granularity.is_empty() {
        let parts: Vec<String> = stats
            .by_granularity
            .iter()
            .map(|(granularity, count)| format!("{granularity}={count}"))
            .collect();
        out.push_str(&format!("\nGranularity: {}", parts.join(" ")));
    }
    if !stats.warnings_by_kind.is_empty() {
        let parts: Vec<String> = stats
            .warnings_by_kind
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect();
        out.push_str(&format!("\nWarnings: {}", parts.join(" ")));
    }
    out
}

//! Regex pass over component scripts.
//!
//! Results are best-effort hints stored under `metadata.heuristics`. They are
//! not derived from the syntax tree and carry no guarantees.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

static REACTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\$:\s*(.+?)\s*$").expect("valid reactive regex"));

static STORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w$.])\$([A-Za-z_][\w]*)").expect("valid store regex")
});

static PROP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*export\s+let\s+([A-Za-z_$][\w$]*)").expect("valid prop regex")
});

static RUNE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(state|derived|effect|props|bindable|inspect|host)\b")
        .expect("valid rune regex")
});

static DISPATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"dispatch\(\s*['"]([\w:-]+)['"]"#).expect("valid dispatch regex")
});

/// Rune names are `$`-prefixed too; keep them out of the store list
const RUNES: &[&str] = &[
    "state", "derived", "effect", "props", "bindable", "inspect", "host",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHeuristics {
    pub best_effort: bool,
    pub reactive_statements: Vec<String>,
    pub store_refs: BTreeSet<String>,
    pub props: Vec<String>,
    pub runes: BTreeSet<String>,
    pub dispatched_events: BTreeSet<String>,
}

impl ComponentHeuristics {
    pub fn is_empty(&self) -> bool {
        self.reactive_statements.is_empty()
            && self.store_refs.is_empty()
            && self.props.is_empty()
            && self.runes.is_empty()
            && self.dispatched_events.is_empty()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn analyze_script(script: &str) -> ComponentHeuristics {
    let mut found = ComponentHeuristics {
        best_effort: true,
        ..Default::default()
    };

    found.reactive_statements = REACTIVE_RE
        .captures_iter(script)
        .map(|caps| caps[1].to_string())
        .collect();

    found.props = PROP_RE
        .captures_iter(script)
        .map(|caps| caps[1].to_string())
        .collect();

    found.runes = RUNE_RE
        .captures_iter(script)
        .map(|caps| format!("${}", &caps[1]))
        .collect();

    // `$app/...` module paths are not store reads
    let body = script
        .lines()
        .filter(|line| !line.trim_start().starts_with("import "))
        .collect::<Vec<_>>()
        .join("\n");
    found.store_refs = STORE_RE
        .captures_iter(&body)
        .map(|caps| caps[1].to_string())
        .filter(|name| !RUNES.contains(&name.as_str()))
        .collect();

    found.dispatched_events = DISPATCH_RE
        .captures_iter(script)
        .map(|caps| caps[1].to_string())
        .collect();

    found
}

use crate::error::{IndexerError, Result};
use crate::parsers::{parser_for, FileParser};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use review_code_chunker::ChunkOrigin;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Which chunking stage a pattern set feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// TypeScript/JavaScript modules
    Module,
    /// Svelte components
    Component,
    /// Markdown documents
    Knowledge,
}

impl ParserKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Component => "component",
            Self::Knowledge => "knowledge",
        }
    }
}

/// One glob rule and the semantics it assigns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub glob: String,
    /// Semantic label, e.g. `page` or `server-load`
    pub label: String,
    /// Type label stored as `type` on every chunk of a claimed file
    #[serde(rename = "type")]
    pub type_label: String,
    #[serde(default)]
    pub description: String,
    /// Higher wins within a set
    #[serde(default)]
    pub priority: i32,
    /// Rendered with `{path}`, `{name}`, `{route}` and `{framework}`
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A framework's rules, registered as a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSet {
    pub name: String,
    pub framework: String,
    pub parser: ParserKind,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub patterns: Vec<PatternConfig>,
}

struct CompiledPattern {
    config: PatternConfig,
    matcher: GlobMatcher,
    exclude: GlobSet,
}

struct RegisteredSet {
    name: String,
    framework: String,
    parser: Arc<dyn FileParser>,
    exclude: GlobSet,
    /// Sorted by descending priority, registration order among equals
    patterns: Vec<CompiledPattern>,
}

/// Ordered, priority-ranked glob-to-semantics mapping
#[derive(Default)]
pub struct PatternRegistry {
    sets: Vec<RegisteredSet>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a framework's rules. Every glob is compiled here, so a bad
    /// pattern fails registration rather than a run.
    pub fn register(
        &mut self,
        set: PatternSet,
        parser: Arc<dyn FileParser>,
        exclude: &[String],
    ) -> Result<()> {
        let set_excludes: Vec<String> = set.exclude.iter().chain(exclude).cloned().collect();
        let exclude = compile_set(&set_excludes)?;

        let mut patterns = Vec::with_capacity(set.patterns.len());
        for config in set.patterns {
            let matcher = compile_glob(&config.glob)?.compile_matcher();
            let exclude = compile_set(&config.exclude)?;
            patterns.push(CompiledPattern {
                config,
                matcher,
                exclude,
            });
        }
        patterns.sort_by(|a, b| b.config.priority.cmp(&a.config.priority));

        log::debug!(
            "Registered pattern set {} ({} patterns, {} parser)",
            set.name,
            patterns.len(),
            parser.kind().as_str()
        );
        self.sets.push(RegisteredSet {
            name: set.name,
            framework: set.framework,
            parser,
            exclude,
            patterns,
        });
        Ok(())
    }

    /// Register with the stock parser for the set's parser kind
    pub fn register_set(&mut self, set: PatternSet) -> Result<()> {
        let parser = parser_for(set.parser);
        self.register(set, parser, &[])
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// First matching, non-excluded pattern for a root-relative path.
    /// Pure lookup; claiming is the [`Dispatcher`]'s job.
    pub fn route(&self, rel_path: &str) -> Option<Route> {
        for set in &self.sets {
            if set.exclude.is_match(rel_path) {
                continue;
            }
            let hit = set
                .patterns
                .iter()
                .find(|p| p.matcher.is_match(rel_path) && !p.exclude.is_match(rel_path));
            if let Some(pattern) = hit {
                return Some(Route {
                    set_name: set.name.clone(),
                    framework: set.framework.clone(),
                    parser: Arc::clone(&set.parser),
                    pattern: pattern.config.clone(),
                });
            }
        }
        None
    }

    /// Every pattern in dispatch order
    pub fn entries(&self) -> Vec<RegistryEntry<'_>> {
        self.sets
            .iter()
            .flat_map(|set| {
                set.patterns.iter().map(move |pattern| RegistryEntry {
                    set_name: &set.name,
                    framework: &set.framework,
                    parser: set.parser.kind(),
                    pattern: &pattern.config,
                })
            })
            .collect()
    }
}

/// Row of [`PatternRegistry::entries`]
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry<'r> {
    pub set_name: &'r str,
    pub framework: &'r str,
    pub parser: ParserKind,
    pub pattern: &'r PatternConfig,
}

/// Outcome of dispatching one file
#[derive(Clone)]
pub struct Route {
    pub set_name: String,
    pub framework: String,
    pub parser: Arc<dyn FileParser>,
    pub pattern: PatternConfig,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("set_name", &self.set_name)
            .field("framework", &self.framework)
            .field("parser", &self.parser.kind())
            .field("pattern", &self.pattern.glob)
            .finish()
    }
}

impl Route {
    /// Per-file chunk origin: type label, framework and rendered metadata
    pub fn origin(&self, rel_path: &str) -> ChunkOrigin {
        let mut metadata = render_metadata(&self.pattern.metadata, rel_path, &self.framework);
        metadata.insert("label".into(), Value::from(self.pattern.label.clone()));
        metadata.insert("patternSet".into(), Value::from(self.set_name.clone()));
        if !self.pattern.description.is_empty() {
            metadata.insert(
                "description".into(),
                Value::from(self.pattern.description.clone()),
            );
        }

        ChunkOrigin {
            file_path: rel_path.to_string(),
            semantic_type: self.pattern.type_label.clone(),
            framework: self.framework.clone(),
            metadata,
        }
    }
}

/// Per-run routing state: a path is claimed by the first dispatch that matches it
pub struct Dispatcher<'r> {
    registry: &'r PatternRegistry,
    claimed: HashSet<String>,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self {
            registry,
            claimed: HashSet::new(),
        }
    }

    /// Route a root-relative path; a path already claimed gets nothing
    pub fn dispatch(&mut self, rel_path: &str) -> Option<Route> {
        if self.claimed.contains(rel_path) {
            log::trace!("{rel_path} already claimed");
            return None;
        }
        let route = self.registry.route(rel_path)?;
        self.claimed.insert(rel_path.to_string());
        Some(route)
    }

    pub fn is_claimed(&self, rel_path: &str) -> bool {
        self.claimed.contains(rel_path)
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}

fn compile_glob(glob: &str) -> Result<Glob> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map_err(|source| IndexerError::InvalidPattern {
            glob: glob.to_string(),
            source,
        })
}

fn compile_set(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(compile_glob(glob)?);
    }
    builder.build().map_err(|source| IndexerError::InvalidPattern {
        glob: globs.join(", "),
        source,
    })
}

/// Replace placeholders in every string of a metadata template
pub fn render_metadata(
    template: &Map<String, Value>,
    rel_path: &str,
    framework: &str,
) -> Map<String, Value> {
    let name = Path::new(rel_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let route = sveltekit_route(rel_path).unwrap_or_default();
    let vars = [
        ("{path}", rel_path),
        ("{name}", name),
        ("{route}", route.as_str()),
        ("{framework}", framework),
    ];

    template
        .iter()
        .map(|(key, value)| (key.clone(), render_value(value, &vars)))
        .collect()
}

fn render_value(value: &Value, vars: &[(&str, &str)]) -> Value {
    match value {
        Value::String(text) => {
            let mut rendered = text.clone();
            for (placeholder, replacement) in vars {
                if rendered.contains(placeholder) {
                    rendered = rendered.replace(placeholder, replacement);
                }
            }
            Value::String(rendered)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// URL route of a file under `src/routes/`, layout groups removed
pub fn sveltekit_route(rel_path: &str) -> Option<String> {
    let idx = rel_path.find("src/routes/")?;
    if idx > 0 && !rel_path[..idx].ends_with('/') {
        return None;
    }
    let rest = &rel_path[idx + "src/routes/".len()..];
    let dir = rest.rsplit_once('/').map_or("", |(dir, _)| dir);

    let segments: Vec<&str> = dir
        .split('/')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| !(segment.starts_with('(') && segment.ends_with(')')))
        .collect();
    Some(format!("/{}", segments.join("/")))
}

use crate::ast_analyzer::AstAnalyzer;
use crate::batcher::construct_drafts;
use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::heuristics::analyze_script;
use crate::language::Dialect;
use crate::lines::LineIndex;
use crate::template::{parse_template, ElementNode, Span, TemplateNode, TemplateSplitter};
use crate::types::{estimate_tokens, ChunkDraft, ChunkWarning, FileChunks, Granularity, WarningKind};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;

/// `<script>` block of a component
#[derive(Debug, Clone)]
struct ScriptBlock {
    span: Span,
    inner: Option<Span>,
    /// `module` for `context="module"` / `<script module>`, else `instance`
    context: &'static str,
    lang: Option<String>,
}

impl ScriptBlock {
    fn from_element(el: &ElementNode) -> Self {
        let module = el.attribute_text("context") == Some("module") || el.attribute("module").is_some();
        let lang = el.attribute_text("lang").map(str::to_string).or_else(|| {
            el.attribute_text("type")
                .filter(|ty| ty.contains("typescript"))
                .map(|_| "ts".to_string())
        });
        Self {
            span: el.span,
            inner: el.inner_text_span(),
            context: if module { "module" } else { "instance" },
            lang,
        }
    }

    fn summary(&self) -> Value {
        json!({ "context": self.context, "lang": self.lang })
    }
}

/// Stages a component file into component, script, style and template chunks
pub struct ComponentChunker<'c> {
    config: &'c ChunkerConfig,
}

impl<'c> ComponentChunker<'c> {
    pub const fn new(config: &'c ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk one component.
    ///
    /// Markup that cannot be read degrades to a whole-file chunk with a
    /// warning; only grammar setup failures are returned as errors.
    pub fn chunk(&self, file_path: &str, content: &str) -> Result<FileChunks> {
        let lines = LineIndex::new(content);

        let nodes = match parse_template(content) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::warn!("{file_path}: unreadable component markup, keeping whole file: {e}");
                let draft = ChunkDraft::new(
                    Granularity::File,
                    1,
                    lines.line_count().max(1),
                    content,
                )
                .with_meta("componentName", component_name(file_path))
                .with_meta("parseError", e.to_string());
                return Ok(FileChunks::new(
                    vec![draft],
                    vec![ChunkWarning::new(file_path, WarningKind::Unparseable, e.to_string())],
                ));
            }
        };

        let scripts: Vec<ScriptBlock> = nodes
            .iter()
            .filter_map(|node| node.as_element_named("script"))
            .map(ScriptBlock::from_element)
            .collect();
        let has_style = nodes.iter().any(|node| node.as_element_named("style").is_some());

        let mut child_components = BTreeSet::new();
        for node in &nodes {
            if let TemplateNode::Component(el) = node {
                child_components.insert(el.name.clone());
            }
            child_components.extend(node.component_names());
        }

        let heuristics = if self.config.heuristics {
            let script_text: String = scripts
                .iter()
                .filter_map(|script| script.inner)
                .map(|span| span.slice(content))
                .collect::<Vec<_>>()
                .join("\n");
            let found = analyze_script(&script_text);
            (!found.is_empty()).then(|| found.to_value())
        } else {
            None
        };

        if estimate_tokens(content) <= self.config.component_max_tokens {
            let mut draft = ChunkDraft::new(
                Granularity::Component,
                1,
                lines.line_count().max(1),
                content,
            )
            .with_meta("componentName", component_name(file_path))
            .with_meta("childComponents", child_components.into_iter().collect::<Vec<_>>())
            .with_meta(
                "scripts",
                scripts.iter().map(ScriptBlock::summary).collect::<Vec<_>>(),
            )
            .with_meta("hasStyle", has_style);
            if let Some(heuristics) = heuristics {
                draft = draft.with_meta("heuristics", heuristics);
            }
            return Ok(FileChunks::new(vec![draft], Vec::new()));
        }

        log::debug!(
            "{file_path}: component over {} tokens, staging scripts, style and template",
            self.config.component_max_tokens
        );

        let mut drafts = Vec::new();
        let mut warnings = Vec::new();
        let splitter = TemplateSplitter::new(
            content,
            &lines,
            self.config.template_max_tokens,
            self.config.min_text_tokens,
            file_path,
        );
        let mut run: Vec<TemplateNode> = Vec::new();

        for node in nodes {
            if let Some(script) = node.as_element_named("script") {
                self.flush_run(&splitter, content, &mut run, &mut drafts, &mut warnings);
                let script = ScriptBlock::from_element(script);
                drafts.extend(self.script_drafts(file_path, content, &lines, &script, &mut warnings)?);
            } else if let Some(style) = node.as_element_named("style") {
                self.flush_run(&splitter, content, &mut run, &mut drafts, &mut warnings);
                drafts.push(self.style_draft(file_path, content, &lines, style, &mut warnings));
            } else {
                run.push(node);
            }
        }
        self.flush_run(&splitter, content, &mut run, &mut drafts, &mut warnings);

        if let (Some(heuristics), Some(first)) = (heuristics, drafts.first_mut()) {
            first.metadata.insert("heuristics".into(), heuristics);
        }

        Ok(FileChunks::new(drafts, warnings))
    }

    /// Split a run of consecutive template nodes, minus blank text at either end
    fn flush_run(
        &self,
        splitter: &TemplateSplitter,
        content: &str,
        run: &mut Vec<TemplateNode>,
        drafts: &mut Vec<ChunkDraft>,
        warnings: &mut Vec<ChunkWarning>,
    ) {
        let mut nodes = std::mem::take(run);
        let is_blank = |node: &TemplateNode| {
            matches!(node, TemplateNode::Text(span) if span.slice(content).trim().is_empty())
        };
        while nodes.last().is_some_and(is_blank) {
            nodes.pop();
        }
        let leading = nodes.iter().take_while(|n| is_blank(n)).count();
        nodes.drain(..leading);

        let root = match nodes.len() {
            0 => return,
            1 => nodes.pop(),
            _ => {
                let start = nodes.first().map_or(0, |n| n.span().start);
                let end = nodes.last().map_or(start, |n| n.span().end);
                Some(TemplateNode::Fragment {
                    span: Span::new(start, end),
                    children: nodes,
                })
            }
        };
        if let Some(root) = root {
            drafts.extend(splitter.split(&root, warnings));
        }
    }

    fn script_drafts(
        &self,
        file_path: &str,
        content: &str,
        lines: &LineIndex,
        script: &ScriptBlock,
        warnings: &mut Vec<ChunkWarning>,
    ) -> Result<Vec<ChunkDraft>> {
        let Some(inner) = script.inner.filter(|span| !span.slice(content).trim().is_empty()) else {
            return Ok(Vec::new());
        };

        let dialect = Dialect::from_script_lang(script.lang.as_deref());
        let mut analyzer = AstAnalyzer::new(self.config, dialect)?;
        let line_offset = lines.line_of(inner.start) - 1;

        let constructs = match analyzer.extract_with_offset(inner.slice(content), line_offset) {
            Ok(constructs) => constructs,
            Err(e) => {
                log::warn!("{file_path}: {} script not parsed, keeping it whole: {e}", script.context);
                warnings.push(ChunkWarning::new(
                    file_path,
                    WarningKind::Fallback,
                    format!("{} script: {e}", script.context),
                ));
                Vec::new()
            }
        };

        if constructs.is_empty() {
            return Ok(vec![self.whole_block(
                file_path,
                content,
                lines,
                script.span,
                Granularity::Script,
                warnings,
            )
            .with_meta("scriptContext", script.context)
            .with_meta("lang", script.lang.clone())]);
        }

        let drafts = construct_drafts(constructs, self.config.construct_max_tokens, file_path, warnings)
            .into_iter()
            .map(|draft| {
                draft
                    .with_meta("scriptContext", script.context)
                    .with_meta("lang", script.lang.clone())
                    .with_meta("dialect", dialect.as_str())
            })
            .collect();
        Ok(drafts)
    }

    fn style_draft(
        &self,
        file_path: &str,
        content: &str,
        lines: &LineIndex,
        style: &ElementNode,
        warnings: &mut Vec<ChunkWarning>,
    ) -> ChunkDraft {
        self.whole_block(file_path, content, lines, style.span, Granularity::Style, warnings)
            .with_meta("lang", style.attribute_text("lang").map(str::to_string))
    }

    /// Script or style kept as one chunk, measured against the component budget
    fn whole_block(
        &self,
        file_path: &str,
        content: &str,
        lines: &LineIndex,
        span: Span,
        granularity: Granularity,
        warnings: &mut Vec<ChunkWarning>,
    ) -> ChunkDraft {
        let text = span.slice(content);
        let draft = ChunkDraft::new(
            granularity,
            lines.line_of(span.start),
            lines.last_line_of(span.start, span.end),
            text,
        );

        let tokens = draft.estimated_tokens();
        if tokens <= self.config.component_max_tokens {
            return draft;
        }
        log::warn!(
            "{file_path}:{}-{}: {} block of {tokens} tokens kept whole",
            draft.start_line,
            draft.end_line,
            granularity.as_str()
        );
        warnings.push(ChunkWarning::new(
            file_path,
            WarningKind::OversizedChunk,
            format!(
                "{} block at lines {}-{} exceeds {} tokens",
                granularity.as_str(),
                draft.start_line,
                draft.end_line,
                self.config.component_max_tokens
            ),
        ));
        draft.oversized(true)
    }
}

/// File stem, e.g. `Button` for `src/lib/Button.svelte`
pub fn component_name(file_path: &str) -> String {
    Path::new(file_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("anonymous")
        .to_string()
}

use super::{NodeCategory, TemplateNode};
use crate::lines::LineIndex;
use crate::types::{estimate_tokens, ChunkDraft, ChunkWarning, Granularity, WarningKind};
use serde_json::Value;

/// Recursively partitions template nodes into chunks within a token budget.
///
/// A node that fits is emitted whole. Otherwise its children are split and
/// used instead of it, unless that yields at most one chunk: the node is then
/// irreducible and emitted anyway, flagged `oversized`.
pub struct TemplateSplitter<'a> {
    src: &'a str,
    lines: &'a LineIndex,
    budget: usize,
    min_text_tokens: usize,
    file_path: &'a str,
}

impl<'a> TemplateSplitter<'a> {
    /// `src` and `lines` describe the whole component file the node spans point into
    pub const fn new(
        src: &'a str,
        lines: &'a LineIndex,
        budget: usize,
        min_text_tokens: usize,
        file_path: &'a str,
    ) -> Self {
        Self {
            src,
            lines,
            budget,
            min_text_tokens,
            file_path,
        }
    }

    pub fn split(&self, node: &TemplateNode, warnings: &mut Vec<ChunkWarning>) -> Vec<ChunkDraft> {
        let content = node.span().slice(self.src);
        let tokens = estimate_tokens(content);

        if node.category() == NodeCategory::Text
            && estimate_tokens(content.trim()) < self.min_text_tokens
        {
            return Vec::new();
        }

        if tokens <= self.budget {
            return vec![self.candidate(node)];
        }

        if !node.has_children() {
            return vec![self.irreducible(node, tokens, warnings)];
        }

        let mut child_warnings = Vec::new();
        let parts: Vec<ChunkDraft> = node
            .children()
            .flat_map(|child| self.split(child, &mut child_warnings))
            .collect();

        if parts.len() > 1 {
            warnings.extend(child_warnings);
            return parts;
        }

        vec![self.irreducible(node, tokens, warnings)]
    }

    fn irreducible(
        &self,
        node: &TemplateNode,
        tokens: usize,
        warnings: &mut Vec<ChunkWarning>,
    ) -> ChunkDraft {
        let draft = self.candidate(node).oversized(true);
        log::warn!(
            "{}:{}-{}: {} of {tokens} tokens cannot be split below {} tokens",
            self.file_path,
            draft.start_line,
            draft.end_line,
            node.kind_name(),
            self.budget
        );
        warnings.push(ChunkWarning::new(
            self.file_path,
            WarningKind::OversizedChunk,
            format!(
                "{} at lines {}-{} is {tokens} tokens, over the {} token template budget",
                node.kind_name(),
                draft.start_line,
                draft.end_line,
                self.budget
            ),
        ));
        draft
    }

    fn candidate(&self, node: &TemplateNode) -> ChunkDraft {
        let span = node.span();
        let content = span.slice(self.src);
        let start_line = self.lines.line_of(span.start);
        let end_line = self.lines.last_line_of(span.start, span.end);

        let mut draft = ChunkDraft::new(Granularity::Template, start_line, end_line, content)
            .with_meta("nodeType", node.kind_name())
            .with_meta("category", node.category().as_str())
            .with_meta("estimatedTokens", estimate_tokens(content));

        match node {
            TemplateNode::Element(el) => {
                draft = draft
                    .with_meta("tagName", el.name.clone())
                    .with_meta("attributes", el.attributes_json());
            }
            TemplateNode::Component(el) => {
                draft = draft
                    .with_meta("componentName", el.name.clone())
                    .with_meta("attributes", el.attributes_json());
            }
            TemplateNode::If(block) => {
                draft = draft
                    .with_meta("expression", block.expression.clone())
                    .with_meta("hasElse", block.alternate.is_some());
                if block.else_if {
                    draft = draft.with_meta("elseIf", true);
                }
            }
            TemplateNode::Each(block) => {
                draft = draft
                    .with_meta("expression", block.expression.clone())
                    .with_meta("context", optional(&block.context))
                    .with_meta("index", optional(&block.index))
                    .with_meta("key", optional(&block.key))
                    .with_meta("hasElse", block.fallback.is_some());
            }
            TemplateNode::Await(block) => {
                draft = draft
                    .with_meta("expression", block.expression.clone())
                    .with_meta("value", optional(&block.value))
                    .with_meta("error", optional(&block.error));
            }
            TemplateNode::Key(block) => {
                draft = draft.with_meta("expression", block.expression.clone());
            }
            TemplateNode::Expression { expression, .. } => {
                draft = draft.with_meta("expression", expression.clone());
            }
            TemplateNode::Other(other) => {
                draft = draft.with_meta("head", other.head.clone());
            }
            TemplateNode::Fragment { .. } | TemplateNode::Text(_) | TemplateNode::Comment(_) => {}
        }

        let components: Vec<String> = node.component_names().into_iter().collect();
        draft
            .with_meta("hasSlot", node.has_slot())
            .with_meta("hasBinding", node.has_binding())
            .with_meta("childComponents", components)
    }
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::from)
}

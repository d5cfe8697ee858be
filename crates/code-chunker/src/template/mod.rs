//! Svelte component markup: node model, reader and recursive splitter.

mod parser;
mod splitter;

pub use parser::parse_template;
pub use splitter::TemplateSplitter;

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Byte range into the component source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.start..self.end).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Bare attribute such as `disabled`
    Flag,
    Text(String),
    /// `{...}` value, directive expression or spread
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn is_binding(&self) -> bool {
        self.name.starts_with("bind:")
    }

    fn to_json(&self) -> Value {
        match &self.value {
            AttributeValue::Flag => Value::Bool(true),
            AttributeValue::Text(text) => Value::from(text.clone()),
            AttributeValue::Expression(expr) => Value::from(format!("{{{expr}}}")),
        }
    }
}

/// Element or component tag with its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub span: Span,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<TemplateNode>,
    pub self_closing: bool,
}

impl ElementNode {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Text value of an attribute, `None` for flags and expressions
    pub fn attribute_text(&self, name: &str) -> Option<&str> {
        match &self.attribute(name)?.value {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Span of the raw text inside `<script>`, `<style>` and `<textarea>`
    pub fn inner_text_span(&self) -> Option<Span> {
        self.children.iter().find_map(|child| match child {
            TemplateNode::Text(span) => Some(*span),
            _ => None,
        })
    }

    pub fn attributes_json(&self) -> Value {
        let map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|attr| (attr.name.clone(), attr.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// `{#if}` with an optional `{:else}` / `{:else if}` branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfBlock {
    pub span: Span,
    pub expression: String,
    pub consequent: Vec<TemplateNode>,
    /// An `{:else if}` chain is a single nested `IfBlock` with `else_if` set
    pub alternate: Option<Vec<TemplateNode>>,
    pub else_if: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EachBlock {
    pub span: Span,
    pub expression: String,
    pub context: Option<String>,
    pub index: Option<String>,
    pub key: Option<String>,
    pub body: Vec<TemplateNode>,
    pub fallback: Option<Vec<TemplateNode>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwaitBlock {
    pub span: Span,
    pub expression: String,
    pub value: Option<String>,
    pub error: Option<String>,
    pub pending: Vec<TemplateNode>,
    pub then: Vec<TemplateNode>,
    pub catch: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlock {
    pub span: Span,
    pub expression: String,
    pub body: Vec<TemplateNode>,
}

/// Construct the reader does not model; raw kind and head are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherNode {
    pub span: Span,
    pub kind: String,
    pub head: String,
    pub children: Vec<TemplateNode>,
}

/// Parsed component markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Fragment { span: Span, children: Vec<TemplateNode> },
    Element(ElementNode),
    Component(ElementNode),
    If(IfBlock),
    Each(EachBlock),
    Await(AwaitBlock),
    Key(KeyBlock),
    Text(Span),
    /// Mustache tag `{expr}`
    Expression { span: Span, expression: String },
    Comment(Span),
    Other(OtherNode),
}

/// Coarse classification stored on template chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Element,
    Component,
    ControlBlock,
    Text,
    Fragment,
    Other,
}

impl NodeCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Component => "component",
            Self::ControlBlock => "control-block",
            Self::Text => "text",
            Self::Fragment => "fragment",
            Self::Other => "other",
        }
    }
}

impl TemplateNode {
    pub const fn span(&self) -> Span {
        match self {
            Self::Fragment { span, .. } | Self::Expression { span, .. } => *span,
            Self::Element(el) | Self::Component(el) => el.span,
            Self::If(block) => block.span,
            Self::Each(block) => block.span,
            Self::Await(block) => block.span,
            Self::Key(block) => block.span,
            Self::Text(span) | Self::Comment(span) => *span,
            Self::Other(other) => other.span,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Self::Fragment { .. } => "fragment",
            Self::Element(_) => "element",
            Self::Component(_) => "component",
            Self::If(_) => "if-block",
            Self::Each(_) => "each-block",
            Self::Await(_) => "await-block",
            Self::Key(_) => "key-block",
            Self::Text(_) => "text",
            Self::Expression { .. } => "expression",
            Self::Comment(_) => "comment",
            Self::Other(other) => &other.kind,
        }
    }

    pub const fn category(&self) -> NodeCategory {
        match self {
            Self::Fragment { .. } => NodeCategory::Fragment,
            Self::Element(_) => NodeCategory::Element,
            Self::Component(_) => NodeCategory::Component,
            Self::If(_) | Self::Each(_) | Self::Await(_) | Self::Key(_) => {
                NodeCategory::ControlBlock
            }
            Self::Text(_) | Self::Comment(_) => NodeCategory::Text,
            Self::Expression { .. } | Self::Other(_) => NodeCategory::Other,
        }
    }

    /// Every child-bearing field of the node, with its name
    pub fn child_groups(&self) -> Vec<(&'static str, &[TemplateNode])> {
        match self {
            Self::Fragment { children, .. } => vec![("children", children.as_slice())],
            Self::Element(el) | Self::Component(el) => vec![("children", el.children.as_slice())],
            Self::If(block) => {
                let mut groups = vec![("consequent", block.consequent.as_slice())];
                if let Some(alternate) = &block.alternate {
                    groups.push(("alternate", alternate.as_slice()));
                }
                groups
            }
            Self::Each(block) => {
                let mut groups = vec![("body", block.body.as_slice())];
                if let Some(fallback) = &block.fallback {
                    groups.push(("fallback", fallback.as_slice()));
                }
                groups
            }
            Self::Await(block) => vec![
                ("pending", block.pending.as_slice()),
                ("then", block.then.as_slice()),
                ("catch", block.catch.as_slice()),
            ],
            Self::Key(block) => vec![("body", block.body.as_slice())],
            Self::Other(other) => vec![("children", other.children.as_slice())],
            Self::Text(_) | Self::Expression { .. } | Self::Comment(_) => Vec::new(),
        }
    }

    /// Direct children in document order
    pub fn children(&self) -> impl Iterator<Item = &TemplateNode> + '_ {
        self.child_groups()
            .into_iter()
            .flat_map(|(_, nodes)| nodes.iter())
    }

    pub fn has_children(&self) -> bool {
        self.children().next().is_some()
    }

    /// Visit this node and all descendants, parents first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TemplateNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Sorted names of components used anywhere below this node
    pub fn component_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for child in self.children() {
            child.walk(&mut |node| {
                if let Self::Component(el) = node {
                    names.insert(el.name.clone());
                }
            });
        }
        names
    }

    /// A `<slot>` element or `slot=` attribute anywhere in the subtree
    pub fn has_slot(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if let Self::Element(el) | Self::Component(el) = node {
                if el.name == "slot" || el.attribute("slot").is_some() {
                    found = true;
                }
            }
        });
        found
    }

    /// A `bind:` directive anywhere in the subtree
    pub fn has_binding(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if let Self::Element(el) | Self::Component(el) = node {
                if el.attributes.iter().any(Attribute::is_binding) {
                    found = true;
                }
            }
        });
        found
    }

    /// Element named `name` (script, style, ...), if this is one
    pub fn as_element_named(&self, name: &str) -> Option<&ElementNode> {
        match self {
            Self::Element(el) if el.name.eq_ignore_ascii_case(name) => Some(el),
            _ => None,
        }
    }
}

/// Tags parsed as components rather than elements
pub fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        || name.contains('.')
        || name == "svelte:component"
        || name == "svelte:self"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn component_names_come_from_every_branch() {
        let src = "{#if a}<Alpha/>{:else}<ui.Beta/>{/if}{#await p}<Gamma/>{:then v}<Alpha/>{/await}";
        let nodes = parse_template(src).unwrap();
        let root = TemplateNode::Fragment {
            span: Span::new(0, src.len()),
            children: nodes,
        };
        let names: Vec<_> = root.component_names().into_iter().collect();
        assert_eq!(names, vec!["Alpha", "Gamma", "ui.Beta"]);
    }

    #[test]
    fn child_groups_name_block_fields() {
        let nodes = parse_template("{#each items as item}<li/>{:else}<p/>{/each}").unwrap();
        let groups: Vec<_> = nodes[0]
            .child_groups()
            .into_iter()
            .map(|(name, nodes)| (name, nodes.len()))
            .collect();
        assert_eq!(groups, vec![("body", 1), ("fallback", 1)]);
        assert_eq!(nodes[0].category(), NodeCategory::ControlBlock);
    }

    #[test]
    fn component_name_rule() {
        assert!(is_component_name("Button"));
        assert!(is_component_name("Icons.Close"));
        assert!(is_component_name("svelte:self"));
        assert!(!is_component_name("div"));
        assert!(!is_component_name("svelte:head"));
    }

    #[test]
    fn slot_and_binding_detection() {
        let nodes = parse_template("<div><slot/><input bind:value={name}/></div>").unwrap();
        assert!(nodes[0].has_slot());
        assert!(nodes[0].has_binding());
        let plain = parse_template("<p>hi</p>").unwrap();
        assert!(!plain[0].has_slot());
        assert!(!plain[0].has_binding());
    }
}

use super::{
    is_component_name, Attribute, AttributeValue, AwaitBlock, EachBlock, ElementNode, IfBlock,
    KeyBlock, OtherNode, Span, TemplateNode,
};
use crate::error::{ChunkerError, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is not markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Parse component markup into top-level nodes.
///
/// `<script>` and `<style>` come back as elements whose only child is their
/// raw text. Elements close implicitly at an ancestor's close tag, a block
/// boundary or end of input; unbalanced blocks are a syntax error.
pub fn parse_template(src: &str) -> Result<Vec<TemplateNode>> {
    let mut reader = Reader {
        src,
        pos: 0,
        open: Vec::new(),
    };

    let (nodes, stop) = reader.parse_nodes()?;
    match stop {
        Stop::Eof | Stop::CloseTag { .. } => Ok(nodes),
        Stop::Branch { head, start, .. } => Err(ChunkerError::template(
            start,
            format!("{{:{head}}} outside of a block"),
        )),
        Stop::CloseBlock { name, start, .. } => Err(ChunkerError::template(
            start,
            format!("{{/{name}}} without matching {{#{name}}}"),
        )),
    }
}

/// Token that ends a node list. Never consumed by the list itself.
#[derive(Debug)]
enum Stop {
    Eof,
    CloseTag {
        name: String,
        start: usize,
        end: usize,
    },
    /// `{:else}`, `{:then x}`, ... with the text after the colon
    Branch {
        head: String,
        start: usize,
        end: usize,
    },
    CloseBlock {
        name: String,
        start: usize,
        end: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AwaitSection {
    Pending,
    Then,
    Catch,
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    /// Open element names; `None` marks a block body, which close tags cannot cross
    open: Vec<Option<String>>,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn is_open(&self, name: &str) -> bool {
        self.open
            .iter()
            .rev()
            .map_while(Option::as_deref)
            .any(|open| open.eq_ignore_ascii_case(name))
    }

    fn parse_nodes(&mut self) -> Result<(Vec<TemplateNode>, Stop)> {
        let mut nodes = Vec::new();

        loop {
            if self.at_end() {
                return Ok((nodes, Stop::Eof));
            }
            let start = self.pos;
            let rest = self.rest();

            if rest.starts_with("<!--") {
                let end = rest[4..]
                    .find("-->")
                    .map_or(self.src.len(), |idx| start + 4 + idx + 3);
                self.pos = end;
                nodes.push(TemplateNode::Comment(Span::new(start, end)));
            } else if rest.starts_with("</") {
                let name = read_tag_name(&rest[2..]);
                let end = rest.find('>').map_or(self.src.len(), |idx| start + idx + 1);
                if !name.is_empty() && self.is_open(&name) {
                    return Ok((nodes, Stop::CloseTag { name, start, end }));
                }
                log::trace!("Ignoring stray </{name}> at byte {start}");
                self.pos = end;
            } else if rest.starts_with("<!") {
                let end = rest.find('>').map_or(self.src.len(), |idx| start + idx + 1);
                self.pos = end;
                nodes.push(TemplateNode::Other(OtherNode {
                    span: Span::new(start, end),
                    kind: "doctype".to_string(),
                    head: self.src[start..end].to_string(),
                    children: Vec::new(),
                }));
            } else if rest.starts_with('<')
                && rest[1..].chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            {
                let node = self.parse_element()?;
                nodes.push(node);
            } else if rest.starts_with('{') {
                match rest[1..].chars().next() {
                    Some('#') => {
                        let node = self.parse_block()?;
                        nodes.push(node);
                    }
                    Some(':') => {
                        let (inner, end) = self.peek_braced()?;
                        return Ok((
                            nodes,
                            Stop::Branch {
                                head: inner[1..].trim().to_string(),
                                start,
                                end,
                            },
                        ));
                    }
                    Some('/') => {
                        let (inner, end) = self.peek_braced()?;
                        return Ok((
                            nodes,
                            Stop::CloseBlock {
                                name: inner[1..].trim().to_string(),
                                start,
                                end,
                            },
                        ));
                    }
                    Some('@') => {
                        let (inner, end) = self.peek_braced()?;
                        self.pos = end;
                        let (word, head) = split_word(&inner[1..]);
                        nodes.push(TemplateNode::Other(OtherNode {
                            span: Span::new(start, end),
                            kind: format!("@{word}"),
                            head: head.to_string(),
                            children: Vec::new(),
                        }));
                    }
                    _ => {
                        let (inner, end) = self.peek_braced()?;
                        self.pos = end;
                        nodes.push(TemplateNode::Expression {
                            span: Span::new(start, end),
                            expression: inner.trim().to_string(),
                        });
                    }
                }
            } else {
                let len = rest
                    .char_indices()
                    .skip(1)
                    .find(|&(_, c)| c == '<' || c == '{')
                    .map_or(rest.len(), |(idx, _)| idx);
                self.pos = start + len;
                push_text(&mut nodes, Span::new(start, self.pos));
            }
        }
    }

    fn parse_element(&mut self) -> Result<TemplateNode> {
        let start = self.pos;
        let name = read_tag_name(&self.rest()[1..]);
        self.pos += 1 + name.len();

        let attributes = self.parse_attributes(start, &name)?;

        let self_closing = self.rest().starts_with("/>");
        self.pos += if self_closing { 2 } else { 1 };

        let lower = name.to_ascii_lowercase();
        let mut children = Vec::new();
        let end;

        if self_closing || VOID_ELEMENTS.contains(&lower.as_str()) {
            end = self.pos;
        } else if RAW_TEXT_ELEMENTS.contains(&lower.as_str()) {
            let content_start = self.pos;
            let closing = format!("</{lower}");
            let content_end = self
                .rest()
                .to_ascii_lowercase()
                .find(&closing)
                .map_or(self.src.len(), |idx| content_start + idx);
            if content_end > content_start {
                children.push(TemplateNode::Text(Span::new(content_start, content_end)));
            }
            self.pos = content_end;
            end = self
                .rest()
                .find('>')
                .map_or(self.src.len(), |idx| self.pos + idx + 1);
            self.pos = end;
        } else {
            self.open.push(Some(name.clone()));
            let parsed = self.parse_nodes();
            self.open.pop();
            let (nodes, stop) = parsed?;
            children = nodes;

            end = match stop {
                Stop::CloseTag {
                    name: closing,
                    end,
                    ..
                } if closing.eq_ignore_ascii_case(&name) => {
                    self.pos = end;
                    end
                }
                // Implicitly closed; the stop token belongs to an enclosing scope
                _ => self.pos,
            };
        }

        let element = ElementNode {
            span: Span::new(start, end),
            attributes,
            children,
            self_closing,
            name,
        };
        Ok(if is_component_name(&element.name) {
            TemplateNode::Component(element)
        } else {
            TemplateNode::Element(element)
        })
    }

    fn parse_attributes(&mut self, tag_start: usize, tag: &str) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(ChunkerError::template(
                    tag_start,
                    format!("unterminated <{tag}> tag"),
                ));
            }
            if rest.starts_with('>') || rest.starts_with("/>") {
                return Ok(attributes);
            }

            if rest.starts_with('{') {
                // `{name}` shorthand or `{...spread}`
                let (inner, end) = self.peek_braced()?;
                self.pos = end;
                attributes.push(Attribute {
                    name: inner.trim().to_string(),
                    value: AttributeValue::Expression(inner.trim().to_string()),
                });
                continue;
            }

            let name_len = rest
                .char_indices()
                .find(|&(idx, c)| {
                    c.is_whitespace()
                        || c == '='
                        || c == '>'
                        || (c == '/' && rest[idx + 1..].starts_with('>'))
                })
                .map_or(rest.len(), |(idx, _)| idx);
            if name_len == 0 {
                // stray character such as a lone '/'
                self.pos += rest.chars().next().map_or(1, char::len_utf8);
                continue;
            }
            let name = rest[..name_len].to_string();
            self.pos += name_len;

            self.skip_whitespace();
            if self.peek() != Some('=') {
                attributes.push(Attribute {
                    name,
                    value: AttributeValue::Flag,
                });
                continue;
            }
            self.pos += 1;
            self.skip_whitespace();

            let value = match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    let value_start = self.pos + 1;
                    let value_end = self.src[value_start..]
                        .find(quote)
                        .map(|idx| value_start + idx)
                        .ok_or_else(|| {
                            ChunkerError::template(
                                self.pos,
                                format!("unterminated value for attribute {name}"),
                            )
                        })?;
                    self.pos = value_end + 1;
                    let raw = &self.src[value_start..value_end];
                    match whole_expression(raw) {
                        Some(expr) => AttributeValue::Expression(expr.trim().to_string()),
                        None => AttributeValue::Text(raw.to_string()),
                    }
                }
                Some('{') => {
                    let (inner, end) = self.peek_braced()?;
                    self.pos = end;
                    AttributeValue::Expression(inner.trim().to_string())
                }
                _ => {
                    let rest = self.rest();
                    let len = rest
                        .char_indices()
                        .find(|&(idx, c)| {
                            c.is_whitespace()
                                || c == '>'
                                || (c == '/' && rest[idx + 1..].starts_with('>'))
                        })
                        .map_or(rest.len(), |(idx, _)| idx);
                    self.pos += len;
                    AttributeValue::Text(rest[..len].to_string())
                }
            };
            attributes.push(Attribute { name, value });
        }
    }

    /// Read the `{...}` at the cursor without moving it.
    /// Returns the inner text and the offset just past the closing brace.
    fn peek_braced(&self) -> Result<(&'a str, usize)> {
        let start = self.pos;
        let end = braced_end(self.src, start)
            .ok_or_else(|| ChunkerError::template(start, "unclosed '{'"))?;
        Ok((&self.src[start + 1..end - 1], end))
    }

    fn parse_body(&mut self) -> Result<(Vec<TemplateNode>, Stop)> {
        self.open.push(None);
        let parsed = self.parse_nodes();
        self.open.pop();
        parsed
    }

    fn parse_block(&mut self) -> Result<TemplateNode> {
        let start = self.pos;
        let (inner, end) = self.peek_braced()?;
        self.pos = end;
        let (kind, head) = split_word(&inner[1..]);

        Ok(match kind {
            "if" => TemplateNode::If(self.parse_if(start, head, false)?),
            "each" => TemplateNode::Each(self.parse_each(start, head)?),
            "await" => TemplateNode::Await(self.parse_await(start, head)?),
            "key" => {
                let (body, stop) = self.parse_body()?;
                let end = self.expect_close(stop, "key", start)?;
                TemplateNode::Key(KeyBlock {
                    span: Span::new(start, end),
                    expression: head.to_string(),
                    body,
                })
            }
            _ => {
                let (children, stop) = self.parse_body()?;
                let end = self.expect_close(stop, kind, start)?;
                TemplateNode::Other(OtherNode {
                    span: Span::new(start, end),
                    kind: format!("{kind}-block"),
                    head: head.to_string(),
                    children,
                })
            }
        })
    }

    fn parse_if(&mut self, start: usize, expression: &str, else_if: bool) -> Result<IfBlock> {
        let (consequent, stop) = self.parse_body()?;

        let Stop::Branch {
            head,
            start: branch_start,
            end: branch_end,
        } = stop
        else {
            let end = self.expect_close(stop, "if", start)?;
            return Ok(IfBlock {
                span: Span::new(start, end),
                expression: expression.to_string(),
                consequent,
                alternate: None,
                else_if,
            });
        };

        let (word, rest) = split_word(&head);
        if word != "else" {
            return Err(ChunkerError::template(
                branch_start,
                format!("{{:{word}}} is not valid inside {{#if}}"),
            ));
        }
        self.pos = branch_end;

        let (branch, condition) = split_word(rest);
        if branch == "if" {
            // the nested block consumes the closing {/if}
            let nested = self.parse_if(branch_start, condition, true)?;
            return Ok(IfBlock {
                span: Span::new(start, nested.span.end),
                expression: expression.to_string(),
                consequent,
                alternate: Some(vec![TemplateNode::If(nested)]),
                else_if,
            });
        }

        let (alternate, stop) = self.parse_body()?;
        let end = self.expect_close(stop, "if", start)?;
        Ok(IfBlock {
            span: Span::new(start, end),
            expression: expression.to_string(),
            consequent,
            alternate: Some(alternate),
            else_if,
        })
    }

    fn parse_each(&mut self, start: usize, head: &str) -> Result<EachBlock> {
        let (expression, context, index, key) = parse_each_head(head);

        let (body, stop) = self.parse_body()?;
        let (fallback, stop) = match stop {
            Stop::Branch {
                head,
                start: branch_start,
                end,
            } => {
                if head != "else" {
                    return Err(ChunkerError::template(
                        branch_start,
                        format!("{{:{head}}} is not valid inside {{#each}}"),
                    ));
                }
                self.pos = end;
                let (fallback, stop) = self.parse_body()?;
                (Some(fallback), stop)
            }
            other => (None, other),
        };
        let end = self.expect_close(stop, "each", start)?;

        Ok(EachBlock {
            span: Span::new(start, end),
            expression,
            context,
            index,
            key,
            body,
            fallback,
        })
    }

    fn parse_await(&mut self, start: usize, head: &str) -> Result<AwaitBlock> {
        let mut block = AwaitBlock {
            span: Span::new(start, start),
            expression: head.to_string(),
            value: None,
            error: None,
            pending: Vec::new(),
            then: Vec::new(),
            catch: Vec::new(),
        };

        // `{#await promise then value}` / `{#await promise catch error}` shorthand
        let mut section = AwaitSection::Pending;
        if let Some((expr, value)) = split_keyword(head, "then") {
            block.expression = expr.to_string();
            block.value = non_empty(value);
            section = AwaitSection::Then;
        } else if let Some((expr, error)) = split_keyword(head, "catch") {
            block.expression = expr.to_string();
            block.error = non_empty(error);
            section = AwaitSection::Catch;
        }

        loop {
            let (nodes, stop) = self.parse_body()?;
            match section {
                AwaitSection::Pending => block.pending = nodes,
                AwaitSection::Then => block.then = nodes,
                AwaitSection::Catch => block.catch = nodes,
            }

            match stop {
                Stop::Branch {
                    head,
                    start: branch_start,
                    end,
                } => {
                    let (word, binding) = split_word(&head);
                    match word {
                        "then" => {
                            section = AwaitSection::Then;
                            block.value = non_empty(binding);
                        }
                        "catch" => {
                            section = AwaitSection::Catch;
                            block.error = non_empty(binding);
                        }
                        _ => {
                            return Err(ChunkerError::template(
                                branch_start,
                                format!("{{:{word}}} is not valid inside {{#await}}"),
                            ))
                        }
                    }
                    self.pos = end;
                }
                other => {
                    let end = self.expect_close(other, "await", start)?;
                    block.span = Span::new(start, end);
                    return Ok(block);
                }
            }
        }
    }

    /// Consume the `{/name}` that must end a block body
    fn expect_close(&mut self, stop: Stop, name: &str, open_start: usize) -> Result<usize> {
        match stop {
            Stop::CloseBlock {
                name: closing, end, ..
            } if closing == name => {
                self.pos = end;
                Ok(end)
            }
            Stop::CloseBlock {
                name: closing,
                start,
                ..
            } => Err(ChunkerError::template(
                start,
                format!("expected {{/{name}}}, found {{/{closing}}}"),
            )),
            Stop::Branch { head, start, .. } => Err(ChunkerError::template(
                start,
                format!("unexpected {{:{head}}} inside {{#{name}}}"),
            )),
            Stop::CloseTag {
                name: tag, start, ..
            } => Err(ChunkerError::template(
                start,
                format!("unexpected </{tag}> inside {{#{name}}}"),
            )),
            Stop::Eof => Err(ChunkerError::template(
                open_start,
                format!("unclosed {{#{name}}} block"),
            )),
        }
    }
}

fn read_tag_name(s: &str) -> String {
    s.chars()
        .take_while(|&c| c.is_alphanumeric() || matches!(c, '-' | ':' | '.' | '_'))
        .collect()
}

fn push_text(nodes: &mut Vec<TemplateNode>, span: Span) {
    if let Some(TemplateNode::Text(prev)) = nodes.last_mut() {
        if prev.end == span.start {
            prev.end = span.end;
            return;
        }
    }
    nodes.push(TemplateNode::Text(span));
}

/// Offset just past the `}` matching the `{` at `start`
fn braced_end(src: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in src[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Inner expression when a quoted attribute value is exactly one `{...}`
fn whole_expression(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let offset = raw.len() - raw.trim_start().len();
    let end = braced_end(raw, offset)?;
    (end == offset + trimmed.len()).then(|| &raw[offset + 1..end - 1])
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim()),
        None => (s, ""),
    }
}

/// Split `expr keyword rest` on the last whitespace-delimited `keyword`
fn split_keyword<'s>(s: &'s str, keyword: &str) -> Option<(&'s str, &'s str)> {
    let mut search_end = s.len();
    while let Some(idx) = s[..search_end].rfind(keyword) {
        let before_ok = idx > 0 && s[..idx].ends_with(char::is_whitespace);
        let after = &s[idx + keyword.len()..];
        let after_ok = after.is_empty() || after.starts_with(char::is_whitespace);
        if before_ok && after_ok {
            return Some((s[..idx].trim(), after.trim()));
        }
        search_end = idx;
    }
    None
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `items as item, i (item.id)` into expression, context, index and key
fn parse_each_head(head: &str) -> (String, Option<String>, Option<String>, Option<String>) {
    let Some((expression, binding)) = split_keyword(head, "as") else {
        return (head.trim().to_string(), None, None, None);
    };

    let mut binding = binding.trim();
    let mut key = None;
    if binding.ends_with(')') {
        let mut depth = 0i32;
        for (idx, c) in binding.char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth -= 1;
                    if depth == 0 {
                        key = non_empty(&binding[idx + 1..binding.len() - 1]);
                        binding = binding[..idx].trim();
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    // the index follows the last top-level comma; destructured contexts nest theirs
    let mut depth = 0i32;
    let mut split_at = None;
    for (idx, c) in binding.char_indices() {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            ',' if depth == 0 => split_at = Some(idx),
            _ => {}
        }
    }
    let (context, index) = match split_at {
        Some(idx) => (&binding[..idx], non_empty(&binding[idx + 1..])),
        None => (binding, None),
    };

    (expression.to_string(), non_empty(context), index, key)
}

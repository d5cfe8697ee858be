use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::language::Dialect;
use crate::lines::LineIndex;
use crate::types::{Construct, ConstructKind, Modifiers};
use tree_sitter::{Node, Parser};

/// Extracts top-level constructs from TypeScript/JavaScript modules
pub struct AstAnalyzer {
    parser: Parser,
    dialect: Dialect,
    include_non_function_variables: bool,
    include_imports: bool,
    max_imports: usize,
}

impl AstAnalyzer {
    /// Create new analyzer for a dialect
    pub fn new(config: &ChunkerConfig, dialect: Dialect) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.tree_sitter_language())
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self {
            parser,
            dialect,
            include_non_function_variables: config.include_non_function_variables,
            include_imports: config.include_imports,
            max_imports: config.max_imports_per_chunk,
        })
    }

    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse a whole module and return its constructs in source order
    pub fn extract(&mut self, content: &str) -> Result<Vec<Construct>> {
        self.extract_with_offset(content, 0)
    }

    /// Same as [`Self::extract`] for text embedded in a larger file
    /// starting `line_offset` lines below the file's first line
    pub fn extract_with_offset(
        &mut self,
        content: &str,
        line_offset: usize,
    ) -> Result<Vec<Construct>> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))?;
        let root = tree.root_node();

        if let Some(bad) = first_error(root) {
            return Err(ChunkerError::parse(format!(
                "{} syntax error at line {}, column {}",
                self.dialect.as_str(),
                bad.start_position().row + 1 + line_offset,
                bad.start_position().column + 1
            )));
        }

        let imports = if self.include_imports {
            collect_imports(content, root)
        } else {
            Vec::new()
        };

        let pass = Pass {
            content,
            lines: LineIndex::new(content),
            line_offset,
            imports,
            include_non_function_variables: self.include_non_function_variables,
            max_imports: self.max_imports,
        };

        let mut constructs = Vec::new();
        let mut cursor = root.walk();
        let statements: Vec<_> = root.named_children(&mut cursor).collect();
        for statement in statements {
            pass.visit(statement, None, &mut constructs);
        }

        log::debug!(
            "Extracted {} constructs from {} source",
            constructs.len(),
            self.dialect.as_str()
        );
        Ok(constructs)
    }
}

/// Whole-source construct used when the grammar rejects a file
pub fn opaque_construct(content: &str, line_offset: usize) -> Construct {
    let lines = LineIndex::new(content);
    Construct {
        kind: ConstructKind::Opaque,
        name: "anonymous".to_string(),
        start_line: 1 + line_offset,
        end_line: lines.line_count().max(1) + line_offset,
        content: content.to_string(),
        modifiers: Modifiers::default(),
        parent: None,
        context_imports: Vec::new(),
    }
}

/// An `export` statement wrapping the declaration being visited
#[derive(Clone, Copy)]
struct ExportScope<'t> {
    outer: Node<'t>,
    default: bool,
}

struct Import {
    text: String,
    identifiers: Vec<String>,
}

/// State of one extraction pass over one file
struct Pass<'a> {
    content: &'a str,
    lines: LineIndex,
    line_offset: usize,
    imports: Vec<Import>,
    include_non_function_variables: bool,
    max_imports: usize,
}

impl Pass<'_> {
    fn visit(&self, node: Node, export: Option<ExportScope>, out: &mut Vec<Construct>) {
        let range = export.map_or(node, |scope| scope.outer);

        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                out.push(self.function(node, range, export));
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.class(node, range, export, out);
            }
            "interface_declaration" => {
                out.push(self.interface(node, range, export, "interface"));
            }
            "type_alias_declaration" => out.push(self.interface(node, range, export, "type")),
            "enum_declaration" => out.push(self.interface(node, range, export, "enum")),
            "lexical_declaration" | "variable_declaration" => {
                self.variables(node, export, out);
            }
            "export_statement" => self.export(node, out),
            "ambient_declaration" => {
                let mut cursor = node.walk();
                let inner: Vec<_> = node.named_children(&mut cursor).collect();
                for child in inner {
                    self.visit(child, export, out);
                }
            }
            _ => {}
        }
    }

    fn function(
        &self,
        node: Node,
        range: Node,
        export: Option<ExportScope>,
    ) -> Construct {
        let name = self
            .field_text(node, "name")
            .unwrap_or_else(|| "anonymous".to_string());

        let modifiers = Modifiers {
            is_async: has_token(node, "async"),
            is_generator: node.kind().starts_with("generator") || has_token(node, "*"),
            is_arrow_function: node.kind() == "arrow_function",
            ..export_modifiers(export)
        };

        self.construct(ConstructKind::Function, name, range, modifiers, None)
    }

    fn class(&self, node: Node, range: Node, export: Option<ExportScope>, out: &mut Vec<Construct>) {
        let class_name = self
            .field_text(node, "name")
            .unwrap_or_else(|| "anonymous".to_string());

        let modifiers = Modifiers {
            is_abstract: node.kind() == "abstract_class_declaration",
            ..export_modifiers(export)
        };
        out.push(self.construct(
            ConstructKind::Class,
            class_name.clone(),
            range,
            modifiers,
            None,
        ));

        // Methods are extracted as standalone functions named `Class.method`
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let members: Vec<_> = body.named_children(&mut cursor).collect();
        for member in members {
            if member.kind() != "method_definition" {
                continue;
            }
            let method_name = self
                .field_text(member, "name")
                .unwrap_or_else(|| "anonymous".to_string());
            let modifiers = Modifiers {
                is_async: has_token(member, "async"),
                is_generator: has_token(member, "*"),
                is_static: has_token(member, "static"),
                ..export_modifiers(export)
            };
            out.push(self.construct(
                ConstructKind::Function,
                format!("{class_name}.{method_name}"),
                member,
                modifiers,
                Some(class_name.clone()),
            ));
        }
    }

    fn interface(
        &self,
        node: Node,
        range: Node,
        export: Option<ExportScope>,
        declaration_kind: &str,
    ) -> Construct {
        let name = self
            .field_text(node, "name")
            .unwrap_or_else(|| "anonymous".to_string());
        let modifiers = Modifiers {
            declaration_kind: Some(declaration_kind.to_string()),
            ..export_modifiers(export)
        };
        self.construct(ConstructKind::Interface, name, range, modifiers, None)
    }

    fn variables(&self, node: Node, export: Option<ExportScope>, out: &mut Vec<Construct>) {
        let is_const = has_token(node, "const");

        let mut cursor = node.walk();
        let declarators: Vec<_> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "variable_declarator")
            .collect();
        let single = declarators.len() == 1;

        for declarator in declarators {
            // One declarator: the whole statement (keyword, export) is the construct
            let range = if single {
                export.map_or(node, |scope| scope.outer)
            } else {
                declarator
            };
            let name = self
                .field_text(declarator, "name")
                .unwrap_or_else(|| "anonymous".to_string());
            let value = declarator.child_by_field_name("value");

            match value.map(|v| v.kind()) {
                Some("arrow_function" | "function_expression" | "function" | "generator_function") => {
                    let Some(value) = value else { continue };
                    let modifiers = Modifiers {
                        is_async: has_token(value, "async"),
                        is_generator: value.kind() == "generator_function" || has_token(value, "*"),
                        is_arrow_function: value.kind() == "arrow_function",
                        is_const,
                        ..export_modifiers(export)
                    };
                    out.push(self.construct(ConstructKind::Function, name, range, modifiers, None));
                }
                _ if self.include_non_function_variables => {
                    let modifiers = Modifiers {
                        is_const,
                        ..export_modifiers(export)
                    };
                    out.push(self.construct(ConstructKind::Variable, name, range, modifiers, None));
                }
                _ => {}
            }
        }
    }

    fn export(&self, node: Node, out: &mut Vec<Construct>) {
        let scope = ExportScope {
            outer: node,
            default: has_token(node, "default"),
        };

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.visit(declaration, Some(scope), out);
            return;
        }

        if let Some(value) = node.child_by_field_name("value") {
            match value.kind() {
                "arrow_function" | "function_expression" | "function" | "generator_function" => {
                    out.push(self.function(value, node, Some(scope)));
                }
                "class" => self.class(value, node, Some(scope), out),
                _ => out.push(self.construct(
                    ConstructKind::Export,
                    "default".to_string(),
                    node,
                    export_modifiers(Some(scope)),
                    None,
                )),
            }
            return;
        }

        // `export { a, b }`, `export * from '...'`
        let mut names = Vec::new();
        collect_export_names(self.content, node, &mut names);
        let name = if !names.is_empty() {
            names.join(", ")
        } else if has_token(node, "*") {
            "*".to_string()
        } else {
            "anonymous".to_string()
        };
        out.push(self.construct(
            ConstructKind::Export,
            name,
            node,
            export_modifiers(Some(scope)),
            None,
        ));
    }

    fn construct(
        &self,
        kind: ConstructKind,
        name: String,
        range: Node,
        modifiers: Modifiers,
        parent: Option<String>,
    ) -> Construct {
        let start_row = range.start_position().row;
        let end = range.end_position();
        let end_row = if end.column == 0 && end.row > start_row {
            end.row - 1
        } else {
            end.row
        };

        let content = self
            .lines
            .slice_rows(self.content, start_row, end_row)
            .to_string();
        let context_imports = self.relevant_imports(&content);

        Construct {
            kind,
            name,
            start_line: start_row + 1 + self.line_offset,
            end_line: end_row + 1 + self.line_offset,
            content,
            modifiers,
            parent,
            context_imports,
        }
    }

    /// Filter imports to only those relevant to this construct
    fn relevant_imports(&self, code: &str) -> Vec<String> {
        let mut relevant = Vec::new();

        for import in &self.imports {
            if relevant.len() >= self.max_imports {
                break;
            }
            if import
                .identifiers
                .iter()
                .any(|ident| mentions_identifier(code, ident))
            {
                relevant.push(import.text.clone());
            }
        }

        relevant
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|child| self.content[child.byte_range()].to_string())
    }
}

fn export_modifiers(export: Option<ExportScope>) -> Modifiers {
    Modifiers {
        exported: export.is_some(),
        is_default_export: export.is_some_and(|scope| scope.default),
        ..Modifiers::default()
    }
}

/// Check for an anonymous keyword token such as `async` or `static`
fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn collect_export_names(content: &str, node: Node, names: &mut Vec<String>) {
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    for child in children {
        if child.kind() == "export_specifier" {
            let target = child
                .child_by_field_name("alias")
                .or_else(|| child.child_by_field_name("name"));
            if let Some(target) = target {
                names.push(content[target.byte_range()].to_string());
            }
        } else {
            collect_export_names(content, child, names);
        }
    }
}

/// Extract top-level import statements with the local names they bind
fn collect_imports(content: &str, root: Node) -> Vec<Import> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    let statements: Vec<_> = root.named_children(&mut cursor).collect();

    for statement in statements {
        if statement.kind() != "import_statement" {
            continue;
        }

        let text = content[statement.byte_range()]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim_end_matches(';').to_string();

        let mut identifiers = Vec::new();
        collect_identifiers(content, statement, &mut identifiers);
        if !text.is_empty() && !identifiers.is_empty() {
            imports.push(Import { text, identifiers });
        }
    }

    imports.truncate(20);
    imports
}

fn collect_identifiers(content: &str, node: Node, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    for child in children {
        match child.kind() {
            "identifier" => out.push(content[child.byte_range()].to_string()),
            // the module path string is not a binding
            "string" => {}
            _ => collect_identifiers(content, child, out),
        }
    }
}

/// Whole-word occurrence of an identifier
fn mentions_identifier(code: &str, ident: &str) -> bool {
    if ident.is_empty() {
        return false;
    }
    let is_ident_char = |c: char| c.is_alphanumeric() || c == '_' || c == '$';

    code.match_indices(ident).any(|(idx, _)| {
        let before = code[..idx].chars().next_back();
        let after = code[idx + ident.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(code: &str) -> Vec<Construct> {
        let config = ChunkerConfig::default();
        let mut analyzer = AstAnalyzer::new(&config, Dialect::TypeScript).unwrap();
        analyzer.extract(code).unwrap()
    }

    #[test]
    fn arrow_function_is_one_function_construct() {
        let constructs = extract("const add = (a, b) => a + b;\n");
        assert_eq!(constructs.len(), 1);
        let add = &constructs[0];
        assert_eq!(add.kind, ConstructKind::Function);
        assert_eq!(add.name, "add");
        assert!(add.modifiers.is_arrow_function);
        assert!(add.modifiers.is_const);
        assert_eq!(add.content, "const add = (a, b) => a + b;");
    }

    #[test]
    fn skips_non_function_variables_by_default() {
        let code = "const LIMIT = 10;\nlet cache = new Map();\nconst f = function () {};\n";
        let constructs = extract(code);
        assert_eq!(constructs.len(), 1);
        assert_eq!(constructs[0].name, "f");
        assert!(!constructs[0].modifiers.is_arrow_function);

        let config = ChunkerConfig {
            include_non_function_variables: true,
            ..Default::default()
        };
        let mut analyzer = AstAnalyzer::new(&config, Dialect::TypeScript).unwrap();
        let all = analyzer.extract(code).unwrap();
        let kinds: Vec<_> = all.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstructKind::Variable,
                ConstructKind::Variable,
                ConstructKind::Function
            ]
        );
    }

    #[test]
    fn class_methods_become_functions() {
        let code = r#"
export class Cart {
    items: string[] = [];

    async load(id: string) {
        return id;
    }

    static empty() {
        return new Cart();
    }
}
"#;
        let constructs = extract(code);
        let names: Vec<_> = constructs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cart", "Cart.load", "Cart.empty"]);

        let load = &constructs[1];
        assert_eq!(load.kind, ConstructKind::Function);
        assert!(load.modifiers.is_async);
        assert!(load.modifiers.exported);
        assert_eq!(load.parent.as_deref(), Some("Cart"));
        assert_eq!(load.start_line, 5);
        assert_eq!(load.end_line, 7);
        assert!(constructs[2].modifiers.is_static);
        assert!(constructs[0].content.starts_with("export class Cart"));
    }

    #[test]
    fn interfaces_types_and_generators() {
        let code = r#"interface User { id: string }
type Id = string;
export async function* stream() {}
"#;
        let constructs = extract(code);
        assert_eq!(constructs.len(), 3);
        assert_eq!(constructs[0].kind, ConstructKind::Interface);
        assert_eq!(
            constructs[0].modifiers.declaration_kind.as_deref(),
            Some("interface")
        );
        assert_eq!(constructs[1].modifiers.declaration_kind.as_deref(), Some("type"));
        let stream = &constructs[2];
        assert!(stream.modifiers.is_async);
        assert!(stream.modifiers.is_generator);
        assert!(stream.modifiers.exported);
    }

    #[test]
    fn default_and_named_exports() {
        let code = "function a() {}\nexport { a };\nexport default () => 1;\n";
        let constructs = extract(code);
        assert_eq!(constructs.len(), 3);
        assert_eq!(constructs[1].kind, ConstructKind::Export);
        assert_eq!(constructs[1].name, "a");
        let default = &constructs[2];
        assert_eq!(default.kind, ConstructKind::Function);
        assert_eq!(default.name, "anonymous");
        assert!(default.modifiers.is_default_export);
        assert!(default.modifiers.is_arrow_function);
    }

    #[test]
    fn syntax_errors_are_reported() {
        let config = ChunkerConfig::default();
        let mut analyzer = AstAnalyzer::new(&config, Dialect::TypeScript).unwrap();
        let err = analyzer.extract("function (((\n").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn attaches_relevant_imports() {
        let code = r#"import { writable } from 'svelte/store';
import { goto } from '$app/navigation';

export const createStore = () => writable(0);
"#;
        let constructs = extract(code);
        assert_eq!(constructs.len(), 1);
        assert_eq!(
            constructs[0].context_imports,
            vec!["import { writable } from 'svelte/store'".to_string()]
        );
    }

    #[test]
    fn line_offset_shifts_lines_only() {
        let config = ChunkerConfig::default();
        let mut analyzer = AstAnalyzer::new(&config, Dialect::JavaScript).unwrap();
        let constructs = analyzer
            .extract_with_offset("\nfunction hi() {\n  return 1;\n}\n", 10)
            .unwrap();
        assert_eq!(constructs[0].start_line, 12);
        assert_eq!(constructs[0].end_line, 14);
        assert_eq!(constructs[0].content, "function hi() {\n  return 1;\n}");
    }

    #[test]
    fn opaque_construct_spans_whole_source() {
        let construct = opaque_construct("a\nb\n", 0);
        assert_eq!(construct.kind, ConstructKind::Opaque);
        assert_eq!(construct.start_line, 1);
        assert_eq!(construct.end_line, 2);
        assert_eq!(construct.content, "a\nb\n");
    }

    #[test]
    fn identifier_matching_is_whole_word() {
        assert!(mentions_identifier("goto('/')", "goto"));
        assert!(!mentions_identifier("gotoPage()", "goto"));
        assert!(!mentions_identifier("$goto", "goto"));
    }
}

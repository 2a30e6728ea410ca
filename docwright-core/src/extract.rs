//! Structural extraction of Python source with tree-sitter.
//!
//! The whole syntax tree is walked in pre-order, so every definition at any
//! nesting depth is reported, in the order it appears in the source. Methods
//! therefore show up both as functions and as names on their class.

use tracing::{debug, error};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::contract::{ClassMetadata, ExtractedEntities, FunctionSignature};
use crate::error::ParseError;

/// Parse `source` and extract every function signature and class.
pub fn extract(source: &str) -> Result<ExtractedEntities, ParseError> {
    let tree = parse(source)?;
    let bytes = source.as_bytes();

    let mut entities = ExtractedEntities::default();
    for node in pre_order(&tree) {
        match node.kind() {
            "function_definition" => {
                if let Some(signature) = function_signature(node, bytes) {
                    entities.functions.push(signature);
                }
            }
            "class_definition" => {
                if let Some(metadata) = class_metadata(node, bytes) {
                    entities.classes.push(metadata);
                }
            }
            _ => {}
        }
    }

    debug!(
        functions = entities.functions.len(),
        classes = entities.classes.len(),
        "Extracted entities from source"
    );
    Ok(entities)
}

fn parse(source: &str) -> Result<Tree, ParseError> {
    let language: Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| ParseError {
        message: format!("failed to load Python grammar: {e}"),
        line: 1,
        column: 1,
    })?;

    let tree = parser.parse(source, None).ok_or_else(|| ParseError {
        message: "parser produced no syntax tree".to_string(),
        line: 1,
        column: 1,
    })?;

    if tree.root_node().has_error() {
        let err = first_syntax_error(&tree, source.as_bytes());
        error!(line = err.line, column = err.column, message = %err.message, "Source failed to parse");
        return Err(err);
    }
    Ok(tree)
}

fn first_syntax_error(tree: &Tree, source: &[u8]) -> ParseError {
    let offending = pre_order(tree)
        .into_iter()
        .find(|n| n.is_error() || n.is_missing())
        .unwrap_or_else(|| tree.root_node());

    let message = if offending.is_missing() {
        format!("missing `{}`", offending.kind())
    } else {
        let snippet: String = offending
            .utf8_text(source)
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(40)
            .collect();
        if snippet.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near `{snippet}`")
        }
    };

    let position = offending.start_position();
    ParseError {
        message,
        line: position.row + 1,
        column: position.column + 1,
    }
}

fn pre_order(tree: &Tree) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = tree.walk();
    'walk: loop {
        nodes.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    nodes
}

fn text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn function_signature(node: Node<'_>, source: &[u8]) -> Option<FunctionSignature> {
    let name = text(node.child_by_field_name("name")?, source);
    if name.is_empty() {
        return None;
    }
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| parameter_names(params, source))
        .unwrap_or_default();
    let return_annotation = node
        .child_by_field_name("return_type")
        .map(|ret| text(ret, source).to_string());

    Some(FunctionSignature {
        name: name.to_string(),
        parameters,
        return_annotation,
        source: text(node, source).to_string(),
    })
}

/// Plain, typed, defaulted and keyword-only identifiers. Splats and the bare
/// `*` / `/` separators are not parameters.
fn parameter_names(params: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter_map(|param| {
            let ident = match param.kind() {
                "identifier" => Some(param),
                "default_parameter" | "typed_default_parameter" => {
                    param.child_by_field_name("name")
                }
                "typed_parameter" => param.named_child(0),
                _ => None,
            }?;
            (ident.kind() == "identifier").then(|| text(ident, source).to_string())
        })
        .collect()
}

fn class_metadata(node: Node<'_>, source: &[u8]) -> Option<ClassMetadata> {
    let name = text(node.child_by_field_name("name")?, source);
    if name.is_empty() {
        return None;
    }
    let body = node.child_by_field_name("body");

    Some(ClassMetadata {
        name: name.to_string(),
        methods: body.map(|b| direct_methods(b, source)).unwrap_or_default(),
        docstring: body.and_then(|b| docstring(b, source)),
        source: text(node, source).to_string(),
    })
}

fn direct_methods(body: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .filter_map(|stmt| {
            let def = match stmt.kind() {
                "function_definition" => stmt,
                "decorated_definition" => stmt.child_by_field_name("definition")?,
                _ => return None,
            };
            if def.kind() != "function_definition" {
                return None;
            }
            def.child_by_field_name("name")
                .map(|n| text(n, source).to_string())
        })
        .collect()
}

fn docstring(body: Node<'_>, source: &[u8]) -> Option<String> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != "string" {
        return None;
    }
    strip_string_literal(text(literal, source)).map(clean_docstring)
}

/// Strip prefix and quotes from a string literal. Byte and f-strings are not
/// docstrings.
fn strip_string_literal(literal: &str) -> Option<&str> {
    let quote_at = literal.find(['"', '\''])?;
    let prefix = literal[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let body = &literal[quote_at..];
    ["\"\"\"", "'''", "\"", "'"].iter().find_map(|quote| {
        (body.len() >= 2 * quote.len() && body.starts_with(quote) && body.ends_with(quote))
            .then(|| &body[quote.len()..body.len() - quote.len()])
    })
}

/// Indentation cleanup in the manner of Python's `inspect.cleandoc`.
fn clean_docstring(raw: &str) -> String {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim()
            } else {
                line.get(margin..).unwrap_or_else(|| line.trim_start()).trim_end()
            }
        })
        .collect();

    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    let leading_blank = cleaned.iter().take_while(|l| l.is_empty()).count();
    cleaned[leading_blank..].join("\n")
}

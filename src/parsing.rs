//! Wrapper method body parsing
//!
//! Parses wrapper-layer method source with tree-sitter and lowers the
//! concrete syntax tree into the crate's own expression AST
//! ([`crate::ast`]). The lowering is lossy on purpose: only the shapes the
//! template matchers care about are modeled, everything else becomes
//! `Unknown`. A body that fails to parse entirely yields `None` so the
//! classifier can degrade that one mapping instead of aborting the run.

use tracing::debug;
use tree_sitter::Node;

use crate::ast::{BoolOpKind, CompareOp, Expr, Literal, MethodBody, Stmt};

/// Parse a wrapper method body into the matcher AST.
///
/// The source may be a full `def name(...):` definition (the body block is
/// extracted) or a bare statement sequence. Returns `None` when nothing
/// parseable remains.
pub fn parse_method_body(source: &str) -> Option<MethodBody> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;

    let tree = parser.parse(source, None)?;
    let root = tree.root_node();

    // Prefer the body of the first function definition; fall back to
    // top-level statements for bare bodies.
    let stmts = match find_function_body(root) {
        Some(body) => lower_block(body, source),
        None => lower_block(root, source),
    };

    if stmts.is_empty() || stmts.iter().all(|s| matches!(s, Stmt::Unknown)) {
        debug!("method body produced no parseable statements");
        return None;
    }

    Some(MethodBody { stmts })
}

/// Locate the body block of the first function definition, if any
fn find_function_body(root: Node) -> Option<Node> {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "function_definition" {
            return child.child_by_field_name("body");
        }
        // Methods arrive indented under a class stub sometimes
        if child.kind() == "class_definition" {
            if let Some(class_body) = child.child_by_field_name("body") {
                let mut inner = class_body.walk();
                for member in class_body.named_children(&mut inner) {
                    if member.kind() == "function_definition" {
                        return member.child_by_field_name("body");
                    }
                }
            }
        }
    }
    None
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn lower_block(block: Node, source: &str) -> Vec<Stmt> {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|n| !matches!(n.kind(), "comment"))
        .map(|n| lower_stmt(n, source))
        .collect()
}

fn lower_stmt(node: Node, source: &str) -> Stmt {
    match node.kind() {
        "expression_statement" => {
            let Some(inner) = node.named_child(0) else {
                return Stmt::Unknown;
            };
            match inner.kind() {
                "assignment" => lower_assignment(inner, source),
                "augmented_assignment" => lower_assignment(inner, source),
                _ => Stmt::Expr(lower_expr(inner, source)),
            }
        }
        "if_statement" => lower_if(node, source),
        "for_statement" => {
            let var = node
                .child_by_field_name("left")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            let iter = node
                .child_by_field_name("right")
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            let body = node
                .child_by_field_name("body")
                .map(|b| lower_block(b, source))
                .unwrap_or_default();
            Stmt::For { var, iter, body }
        }
        "return_statement" => {
            let value = node.named_child(0).map(|n| lower_expr(n, source));
            Stmt::Return(value)
        }
        "try_statement" => {
            let body = node
                .child_by_field_name("body")
                .map(|b| lower_block(b, source))
                .unwrap_or_default();
            let mut handler_body = Vec::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(child.kind(), "except_clause" | "finally_clause") {
                    let mut inner = child.walk();
                    for part in child.named_children(&mut inner) {
                        if part.kind() == "block" {
                            handler_body.extend(lower_block(part, source));
                        }
                    }
                }
            }
            Stmt::Try { body, handler_body }
        }
        _ => Stmt::Unknown,
    }
}

fn lower_assignment(node: Node, source: &str) -> Stmt {
    let target = node
        .child_by_field_name("left")
        .map(|n| lower_expr(n, source))
        .unwrap_or(Expr::Unknown);
    let value = node
        .child_by_field_name("right")
        .map(|n| lower_expr(n, source))
        .unwrap_or(Expr::Unknown);
    Stmt::Assign { target, value }
}

fn lower_if(node: Node, source: &str) -> Stmt {
    let test = node
        .child_by_field_name("condition")
        .map(|n| lower_expr(n, source))
        .unwrap_or(Expr::Unknown);
    let then_body = node
        .child_by_field_name("consequence")
        .map(|b| lower_block(b, source))
        .unwrap_or_default();

    // elif chains lower into nested If statements in the else body
    let mut else_body = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "elif_clause" => {
                let elif_test = child
                    .child_by_field_name("condition")
                    .map(|n| lower_expr(n, source))
                    .unwrap_or(Expr::Unknown);
                let elif_body = child
                    .child_by_field_name("consequence")
                    .map(|b| lower_block(b, source))
                    .unwrap_or_default();
                else_body.push(Stmt::If {
                    test: elif_test,
                    then_body: elif_body,
                    else_body: Vec::new(),
                });
            }
            "else_clause" => {
                if let Some(body) = child.child_by_field_name("body") {
                    else_body.extend(lower_block(body, source));
                }
            }
            _ => {}
        }
    }

    Stmt::If {
        test,
        then_body,
        else_body,
    }
}

fn lower_expr(node: Node, source: &str) -> Expr {
    match node.kind() {
        "identifier" => Expr::Name(node_text(node, source).to_string()),
        "attribute" => {
            let object = node
                .child_by_field_name("object")
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            let attr = node
                .child_by_field_name("attribute")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            Expr::Attribute {
                object: Box::new(object),
                attr,
            }
        }
        "call" => lower_call(node, source),
        "subscript" => {
            let object = node
                .child_by_field_name("value")
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            let index = node
                .child_by_field_name("subscript")
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            Expr::Subscript {
                object: Box::new(object),
                index: Box::new(index),
            }
        }
        "boolean_operator" => {
            let op = match node
                .child_by_field_name("operator")
                .map(|n| node_text(n, source))
            {
                Some("or") => BoolOpKind::Or,
                _ => BoolOpKind::And,
            };
            let left = node
                .child_by_field_name("left")
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            let right = node
                .child_by_field_name("right")
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            Expr::BoolOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        "not_operator" => {
            let inner = node
                .child_by_field_name("argument")
                .or_else(|| node.named_child(0))
                .map(|n| lower_expr(n, source))
                .unwrap_or(Expr::Unknown);
            Expr::Not(Box::new(inner))
        }
        "conditional_expression" => {
            // Layout: <then> if <test> else <otherwise>
            let mut cursor = node.walk();
            let parts: Vec<Node> = node.named_children(&mut cursor).collect();
            if parts.len() == 3 {
                Expr::Conditional {
                    then: Box::new(lower_expr(parts[0], source)),
                    test: Box::new(lower_expr(parts[1], source)),
                    otherwise: Box::new(lower_expr(parts[2], source)),
                }
            } else {
                Expr::Unknown
            }
        }
        "comparison_operator" => lower_comparison(node, source),
        "parenthesized_expression" | "await" => node
            .named_child(0)
            .map(|n| lower_expr(n, source))
            .unwrap_or(Expr::Unknown),
        "string" => Expr::Literal(Literal::Str(string_content(node, source))),
        "integer" => node_text(node, source)
            .parse::<i64>()
            .map(|v| Expr::Literal(Literal::Int(v)))
            .unwrap_or(Expr::Unknown),
        "float" => node_text(node, source)
            .parse::<f64>()
            .map(|v| Expr::Literal(Literal::Float(v)))
            .unwrap_or(Expr::Unknown),
        "true" => Expr::Literal(Literal::Bool(true)),
        "false" => Expr::Literal(Literal::Bool(false)),
        "none" => Expr::Literal(Literal::None),
        _ => Expr::Unknown,
    }
}

fn lower_call(node: Node, source: &str) -> Expr {
    let callee = node
        .child_by_field_name("function")
        .map(|n| lower_expr(n, source))
        .unwrap_or(Expr::Unknown);

    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    if let Some(arg_list) = node.child_by_field_name("arguments") {
        let mut cursor = arg_list.walk();
        for arg in arg_list.named_children(&mut cursor) {
            if arg.kind() == "keyword_argument" {
                let name = arg
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                let value = arg
                    .child_by_field_name("value")
                    .map(|n| lower_expr(n, source))
                    .unwrap_or(Expr::Unknown);
                kwargs.push((name, value));
            } else if arg.kind() != "comment" {
                args.push(lower_expr(arg, source));
            }
        }
    }

    Expr::Call {
        callee: Box::new(callee),
        args,
        kwargs,
    }
}

fn lower_comparison(node: Node, source: &str) -> Expr {
    let mut cursor = node.walk();
    let operands: Vec<Node> = node.named_children(&mut cursor).collect();
    if operands.len() != 2 {
        return Expr::Unknown;
    }

    // Operator tokens are unnamed children between the operands
    let mut has_is = false;
    let mut has_not = false;
    let mut has_eq = false;
    let mut has_neq = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !child.is_named() {
            match node_text(child, source) {
                "is" => has_is = true,
                "not" => has_not = true,
                "is not" => {
                    has_is = true;
                    has_not = true;
                }
                "==" => has_eq = true,
                "!=" => has_neq = true,
                _ => {}
            }
        }
    }
    let op = if has_is && has_not {
        CompareOp::IsNot
    } else if has_is {
        CompareOp::Is
    } else if has_eq {
        CompareOp::Eq
    } else if has_neq {
        CompareOp::NotEq
    } else {
        CompareOp::Other
    };

    Expr::Compare {
        op,
        left: Box::new(lower_expr(operands[0], source)),
        right: Box::new(lower_expr(operands[1], source)),
    }
}

/// Extract the text of a string literal without its quotes
fn string_content(node: Node, source: &str) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string_content" {
            return node_text(child, source).to_string();
        }
    }
    // Empty string literals have no content node
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::walk_stmts;

    fn parse(src: &str) -> MethodBody {
        parse_method_body(src).expect("body should parse")
    }

    #[test]
    fn test_parse_full_definition() {
        let body = parse("def GetSenses(self, entry):\n    return entry.SensesOS\n");
        assert_eq!(body.stmts.len(), 1);
        match &body.stmts[0] {
            Stmt::Return(Some(Expr::Attribute { attr, .. })) => assert_eq!(attr, "SensesOS"),
            other => panic!("unexpected lowering: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_statements() {
        let body = parse("gloss = sense.Gloss.get_String(ws)\nreturn gloss\n");
        assert_eq!(body.stmts.len(), 2);
        assert!(matches!(body.stmts[0], Stmt::Assign { .. }));
    }

    #[test]
    fn test_lower_call_with_kwargs() {
        let body = parse("factory.Create(form, ws=ws)\n");
        match &body.stmts[0] {
            Stmt::Expr(Expr::Call { args, kwargs, .. }) => {
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs.len(), 1);
                assert_eq!(kwargs[0].0, "ws");
            }
            other => panic!("unexpected lowering: {:?}", other),
        }
    }

    #[test]
    fn test_lower_if_with_none_check() {
        let body = parse(
            "def f(self, ws=None):\n    if ws is None:\n        ws = self.project.DefaultAnalysisWritingSystem\n    return ws\n",
        );
        match &body.stmts[0] {
            Stmt::If { test, .. } => match test {
                Expr::Compare { op, left, .. } => {
                    assert_eq!(*op, CompareOp::Is);
                    assert_eq!(**left, Expr::Name("ws".into()));
                }
                other => panic!("unexpected test: {:?}", other),
            },
            other => panic!("unexpected stmt: {:?}", other),
        }
    }

    #[test]
    fn test_lower_not_preserves_mention() {
        let body = parse("if not ws:\n    ws = default_ws\n");
        match &body.stmts[0] {
            Stmt::If { test, .. } => assert!(test.mentions_name("ws")),
            other => panic!("unexpected stmt: {:?}", other),
        }
    }

    #[test]
    fn test_lower_or_fallback() {
        let body = parse("return sense.Gloss.get_String(ws).Text or \"\"\n");
        match &body.stmts[0] {
            Stmt::Return(Some(Expr::BoolOp { op, right, .. })) => {
                assert_eq!(*op, BoolOpKind::Or);
                assert_eq!(**right, Expr::Literal(Literal::Str(String::new())));
            }
            other => panic!("unexpected stmt: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_body_is_none() {
        assert!(parse_method_body("").is_none());
        assert!(parse_method_body("   \n").is_none());
    }

    #[test]
    fn test_try_except_flattens_handlers() {
        let body = parse(
            "try:\n    x = repo.GetObject(guid)\nexcept KeyError:\n    x = None\nreturn x\n",
        );
        let mut calls = 0;
        walk_stmts(&body.stmts, &mut |e| {
            if matches!(e, Expr::Call { .. }) {
                calls += 1;
            }
        });
        assert_eq!(calls, 1);
        assert!(matches!(body.stmts[0], Stmt::Try { .. }));
    }
}

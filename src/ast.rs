//! Immutable expression-tree representation of wrapper method bodies
//!
//! The call-mapping classifier matches against this tagged-variant AST via
//! structural templates, never against raw source text. The tree is built
//! once per method body by [`crate::parsing`] and not mutated afterwards.

use serde::{Deserialize, Serialize};

/// Literal values that matter to the template matchers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

/// Comparison operators distinguished by the matchers
///
/// Only identity checks matter for template matching (`ws is None`); every
/// other operator collapses to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Is,
    IsNot,
    Eq,
    NotEq,
    Other,
}

/// Short-circuit boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOpKind {
    And,
    Or,
}

/// An expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// A bare identifier
    Name(String),

    /// Attribute access: `object.attr`
    Attribute { object: Box<Expr>, attr: String },

    /// Call: `callee(args, name=value, ...)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },

    /// Subscript: `object[index]`
    Subscript { object: Box<Expr>, index: Box<Expr> },

    /// Short-circuit boolean operator: `left and/or right`
    BoolOp {
        op: BoolOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Negation: `not value`
    Not(Box<Expr>),

    /// Conditional expression: `then if test else otherwise`
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Comparison: `left <op> right`
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Literal(Literal),

    /// Anything the lowering pass does not model
    Unknown,
}

/// A statement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Expr(Expr),

    /// Assignment; the target is a `Name` or an `Attribute` (property write)
    Assign { target: Expr, value: Expr },

    If {
        test: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },

    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },

    Return(Option<Expr>),

    /// try/except; all handler bodies are flattened together
    Try {
        body: Vec<Stmt>,
        handler_body: Vec<Stmt>,
    },

    Unknown,
}

/// A parsed wrapper method body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    pub stmts: Vec<Stmt>,
}

impl Expr {
    /// Flatten an attribute chain into its segments, innermost first.
    ///
    /// `a.b.c` yields `["a", "b", "c"]`. A chain rooted in a call or
    /// subscript yields only the segments after that root; the root's own
    /// callee chain is visited separately by the walker.
    pub fn attribute_chain(&self) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = self;
        loop {
            match current {
                Expr::Attribute { object, attr } => {
                    segments.push(attr.as_str());
                    current = object;
                }
                Expr::Name(name) => {
                    segments.push(name.as_str());
                    break;
                }
                _ => break,
            }
        }
        segments.reverse();
        segments
    }

    /// The final attribute segment, if this is an attribute access
    pub fn attr_name(&self) -> Option<&str> {
        match self {
            Expr::Attribute { attr, .. } => Some(attr.as_str()),
            _ => None,
        }
    }

    /// True if any `Name` node in this expression equals `name`
    pub fn mentions_name(&self, name: &str) -> bool {
        let mut found = false;
        walk_expr(self, &mut |e| {
            if let Expr::Name(n) = e {
                if n == name {
                    found = true;
                }
            }
        });
        found
    }
}

/// Visit every expression in a statement list, depth-first
pub fn walk_stmts<'a, F>(stmts: &'a [Stmt], f: &mut F)
where
    F: FnMut(&'a Expr),
{
    for stmt in stmts {
        match stmt {
            Stmt::Expr(e) => walk_expr(e, f),
            Stmt::Assign { target, value } => {
                walk_expr(target, f);
                walk_expr(value, f);
            }
            Stmt::If {
                test,
                then_body,
                else_body,
            } => {
                walk_expr(test, f);
                walk_stmts(then_body, f);
                walk_stmts(else_body, f);
            }
            Stmt::For { iter, body, .. } => {
                walk_expr(iter, f);
                walk_stmts(body, f);
            }
            Stmt::Return(Some(e)) => walk_expr(e, f),
            Stmt::Return(None) => {}
            Stmt::Try { body, handler_body } => {
                walk_stmts(body, f);
                walk_stmts(handler_body, f);
            }
            Stmt::Unknown => {}
        }
    }
}

/// Visit every sub-expression of an expression, depth-first, parent first
pub fn walk_expr<'a, F>(expr: &'a Expr, f: &mut F)
where
    F: FnMut(&'a Expr),
{
    f(expr);
    match expr {
        Expr::Attribute { object, .. } => walk_expr(object, f),
        Expr::Call {
            callee,
            args,
            kwargs,
        } => {
            walk_expr(callee, f);
            for arg in args {
                walk_expr(arg, f);
            }
            for (_, v) in kwargs {
                walk_expr(v, f);
            }
        }
        Expr::Subscript { object, index } => {
            walk_expr(object, f);
            walk_expr(index, f);
        }
        Expr::BoolOp { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Not(inner) => walk_expr(inner, f),
        Expr::Conditional {
            test,
            then,
            otherwise,
        } => {
            walk_expr(test, f);
            walk_expr(then, f);
            walk_expr(otherwise, f);
        }
        Expr::Compare { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Name(_) | Expr::Literal(_) | Expr::Unknown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(object: Expr, name: &str) -> Expr {
        Expr::Attribute {
            object: Box::new(object),
            attr: name.to_string(),
        }
    }

    #[test]
    fn test_attribute_chain() {
        let chain = attr(attr(Expr::Name("sense".into()), "Gloss"), "Text");
        assert_eq!(chain.attribute_chain(), vec!["sense", "Gloss", "Text"]);
        assert_eq!(chain.attr_name(), Some("Text"));
    }

    #[test]
    fn test_attribute_chain_rooted_in_call() {
        // factory().Create -> only segments after the call root
        let call = Expr::Call {
            callee: Box::new(Expr::Name("factory".into())),
            args: vec![],
            kwargs: vec![],
        };
        let chain = attr(call, "Create");
        assert_eq!(chain.attribute_chain(), vec!["Create"]);
    }

    #[test]
    fn test_mentions_name() {
        let expr = Expr::Call {
            callee: Box::new(attr(Expr::Name("obj".into()), "get_String")),
            args: vec![Expr::Name("ws".into())],
            kwargs: vec![],
        };
        assert!(expr.mentions_name("ws"));
        assert!(expr.mentions_name("obj"));
        assert!(!expr.mentions_name("gloss"));
    }

    #[test]
    fn test_walk_counts_calls() {
        let body = vec![
            Stmt::Assign {
                target: Expr::Name("x".into()),
                value: Expr::Call {
                    callee: Box::new(Expr::Name("f".into())),
                    args: vec![Expr::Call {
                        callee: Box::new(Expr::Name("g".into())),
                        args: vec![],
                        kwargs: vec![],
                    }],
                    kwargs: vec![],
                },
            },
            Stmt::Return(Some(Expr::Name("x".into()))),
        ];
        let mut calls = 0;
        walk_stmts(&body, &mut |e| {
            if matches!(e, Expr::Call { .. }) {
                calls += 1;
            }
        });
        assert_eq!(calls, 2);
    }
}

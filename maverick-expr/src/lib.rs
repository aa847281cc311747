//! ABOUTME: Expression engine for Maverick's `${{ ... }}` template grammar (C2)
//! ABOUTME: Hand-written recursive-descent parser + tree-walking evaluator

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod template;
pub mod value;

pub use ast::Expr;
pub use error::{ExprError, Result};
pub use eval::ExprContext;
pub use value::{display_string, is_truthy, type_name};

use serde_json::Value;

/// Evaluate a template string: if `s` is exactly `${{ expr }}`, returns
/// the raw typed value; otherwise stringifies each embedded expression and
/// splices it into the surrounding literal text.
pub fn evaluate_template(s: &str, ctx: &dyn ExprContext) -> Result<Value> {
    let parts = template::split(s)?;
    if template::is_pure_expression(&parts) {
        let template::Part::Expr(src) = parts[0] else {
            unreachable!("is_pure_expression guarantees a single Expr part")
        };
        let expr = parser::parse(src)?;
        return eval::evaluate(&expr, ctx);
    }

    let mut out = String::new();
    for part in parts {
        match part {
            template::Part::Text(text) => out.push_str(text),
            template::Part::Expr(src) => {
                let expr = parser::parse(src)?;
                let value = eval::evaluate(&expr, ctx)?;
                out.push_str(&eval::stringify(&value));
            }
        }
    }
    Ok(Value::String(out))
}

/// Evaluate a bare expression string (no `${{ }}` wrapper) to a raw value.
/// Used for fields that are always expressions (`for_each`, `retry` is not,
/// but `when`/branch `when` strings are parsed this way before the strict
/// boolean check).
pub fn evaluate_expr(src: &str, ctx: &dyn ExprContext) -> Result<Value> {
    let expr = parser::parse(src)?;
    eval::evaluate(&expr, ctx)
}

/// Evaluate a bare expression string in strict-boolean mode (`when`, branch
/// `options[].when`): non-boolean results are `PredicateMustBeBoolean`.
pub fn evaluate_predicate(src: &str, ctx: &dyn ExprContext) -> Result<bool> {
    let expr = parser::parse(src)?;
    eval::evaluate_predicate_strict(&expr, ctx)
}

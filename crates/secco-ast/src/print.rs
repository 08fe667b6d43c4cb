//! Canonical, Lisp-like printing of expressions.
//!
//! This is the single source of truth for how a subexpression is rendered in
//! diagnostics and in the test oracles of spec §8 — it is a printer, not a
//! pretty-printer: no line wrapping, no indentation, one canonical spelling
//! per node.

use crate::expr::{ArgPart, Expression};
use std::fmt::Write as _;

/// Render `expr` in canonical form.
pub fn canonical_string(expr: &Expression) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expression) {
    match expr {
        Expression::NumericLiteral(v) => {
            let _ = write!(out, "{v}");
        }
        Expression::BooleanLiteral(b) => {
            out.push_str(if *b { "true" } else { "false" });
        }
        Expression::Variable(name) => out.push_str(name),
        Expression::Call(name, args) => {
            out.push('(');
            out.push_str(name);
            for a in args {
                out.push(' ');
                write_expr(out, a);
            }
            out.push(')');
        }
        Expression::Argument { index, part } => {
            let suffix = match part {
                ArgPart::Full => "",
                ArgPart::Hi => ".hi",
                ArgPart::Low => ".low",
            };
            let _ = write!(out, "arg{index}{suffix}");
        }
        Expression::Arithmetic { op, left, right } => {
            out.push('(');
            let _ = write!(out, "{op}");
            out.push(' ');
            write_expr(out, left);
            out.push(' ');
            write_expr(out, right);
            out.push(')');
        }
        Expression::BinaryNegation(operand) => {
            out.push_str("(binnot ");
            write_expr(out, operand);
            out.push(')');
        }
        Expression::Comparison { op, left, right } => {
            out.push('(');
            let _ = write!(out, "{op}");
            out.push(' ');
            write_expr(out, left);
            out.push(' ');
            write_expr(out, right);
            out.push(')');
        }
        Expression::Inclusion {
            positive,
            left,
            rights,
        } => {
            out.push('(');
            out.push_str(if *positive { "in" } else { "notin" });
            out.push(' ');
            write_expr(out, left);
            for r in rights {
                out.push(' ');
                write_expr(out, r);
            }
            out.push(')');
        }
        Expression::Negation(operand) => {
            out.push_str("(not ");
            write_expr(out, operand);
            out.push(')');
        }
        Expression::And(left, right) => {
            out.push_str("(and ");
            write_expr(out, left);
            out.push(' ');
            write_expr(out, right);
            out.push(')');
        }
        Expression::Or(left, right) => {
            out.push_str("(or ");
            write_expr(out, left);
            out.push(' ');
            write_expr(out, right);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithmeticOp, ComparisonOp};

    #[test]
    fn prints_numeric_literal() {
        assert_eq!(canonical_string(&Expression::NumericLiteral(42)), "42");
    }

    #[test]
    fn prints_argument() {
        assert_eq!(canonical_string(&Expression::arg(3)), "arg3");
    }

    #[test]
    fn prints_variable() {
        assert_eq!(
            canonical_string(&Expression::Variable("foo".to_string())),
            "foo"
        );
    }

    #[test]
    fn prints_call() {
        let e = Expression::Call(
            "foo".to_string(),
            vec![Expression::arithmetic(
                ArithmeticOp::ShiftRight,
                Expression::NumericLiteral(84),
                Expression::NumericLiteral(2),
            )],
        );
        assert_eq!(canonical_string(&e), "(foo (rsh 84 2))");
    }

    #[test]
    fn prints_comparison_and_inclusion() {
        let cmp = Expression::comparison(
            ComparisonOp::Eql,
            Expression::arg(2),
            Expression::NumericLiteral(10),
        );
        assert_eq!(canonical_string(&cmp), "(eq arg2 10)");

        let inc = Expression::Inclusion {
            positive: true,
            left: Box::new(Expression::arg(0)),
            rights: vec![Expression::NumericLiteral(42), Expression::NumericLiteral(168)],
        };
        assert_eq!(canonical_string(&inc), "(in arg0 42 168)");
    }
}

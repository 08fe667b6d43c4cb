//! Pure constant folding and boolean propagation.
//!
//! `simplify` never fails and never raises a precondition diagnostic — an
//! unresolved `Variable`/`Call` or an otherwise-irreducible subexpression is
//! left in the tree as a residual node; it is the code generator's job to
//! reject what it can't compile. The only observable side effect this pass
//! has is the fold warnings it can optionally report (`simplify_with_diagnostics`)
//! when constant-folding a division or modulo by zero.

use secco_ast::{ArithmeticOp, Expression, canonical_string};

/// A fold-time edge case worth surfacing to the caller. Raised without
/// syscall context because the simplifier doesn't carry one; the driver
/// attaches the enclosing rule's syscall id when promoting this to a
/// [`secco_ast::Diagnostic`].
#[derive(Debug, Clone, PartialEq)]
pub enum FoldWarning {
    DivisionByZero { expr: String },
    ModuloByZero { expr: String },
}

/// Simplify `expr`, discarding any fold warnings.
pub fn simplify(expr: Expression) -> Expression {
    let mut warnings = Vec::new();
    simplify_with_diagnostics(expr, &mut warnings)
}

/// Simplify `expr`, appending a [`FoldWarning`] to `warnings` for every
/// divide/modulo-by-zero constant fold encountered.
pub fn simplify_with_diagnostics(expr: Expression, warnings: &mut Vec<FoldWarning>) -> Expression {
    match expr {
        Expression::NumericLiteral(_) | Expression::BooleanLiteral(_) | Expression::Variable(_) => expr,

        Expression::Argument { .. } => expr,

        Expression::Call(name, args) => Expression::Call(
            name,
            args.into_iter()
                .map(|a| simplify_with_diagnostics(a, warnings))
                .collect(),
        ),

        Expression::Arithmetic { op, left, right } => {
            let left = simplify_with_diagnostics(*left, warnings);
            let right = simplify_with_diagnostics(*right, warnings);
            fold_arithmetic(op, left, right, warnings)
        }

        Expression::BinaryNegation(operand) => {
            let operand = simplify_with_diagnostics(*operand, warnings);
            match operand.as_numeric_literal() {
                Some(v) => Expression::NumericLiteral((!v) & 0xFFFF_FFFF),
                None => Expression::BinaryNegation(Box::new(operand)),
            }
        }

        Expression::Comparison { op, left, right } => {
            let left = simplify_with_diagnostics(*left, warnings);
            let right = simplify_with_diagnostics(*right, warnings);
            match (left.as_numeric_literal(), right.as_numeric_literal()) {
                (Some(l), Some(r)) => Expression::BooleanLiteral(op.eval(l, r)),
                _ => Expression::comparison(op, left, right),
            }
        }

        Expression::Inclusion { positive, left, rights } => {
            let left = simplify_with_diagnostics(*left, warnings);
            let rights: Vec<Expression> = rights
                .into_iter()
                .map(|r| simplify_with_diagnostics(r, warnings))
                .collect();
            fold_inclusion(positive, left, rights)
        }

        Expression::Negation(operand) => {
            let operand = simplify_with_diagnostics(*operand, warnings);
            fold_negation(operand)
        }

        Expression::And(left, right) => {
            let left = simplify_with_diagnostics(*left, warnings);
            let right = simplify_with_diagnostics(*right, warnings);
            fold_and(left, right)
        }

        Expression::Or(left, right) => {
            let left = simplify_with_diagnostics(*left, warnings);
            let right = simplify_with_diagnostics(*right, warnings);
            fold_or(left, right)
        }
    }
}

fn fold_arithmetic(op: ArithmeticOp, left: Expression, right: Expression, warnings: &mut Vec<FoldWarning>) -> Expression {
    match (left.as_numeric_literal(), right.as_numeric_literal()) {
        (Some(l), Some(r)) => {
            if r == 0 && op.is_zero_divisor_sensitive() {
                let expr = canonical_string(&Expression::arithmetic(op, Expression::NumericLiteral(l), Expression::NumericLiteral(r)));
                warnings.push(match op {
                    ArithmeticOp::Div => FoldWarning::DivisionByZero { expr },
                    _ => FoldWarning::ModuloByZero { expr },
                });
            }
            Expression::NumericLiteral(op.eval(l, r))
        }
        (Some(_), None) if op.is_commutative() => Expression::arithmetic(op, right, left),
        _ => Expression::arithmetic(op, left, right),
    }
}

/// `true` iff `value` equals the literal carried by `rhs`, used to test
/// inclusion-set membership.
fn literal_eq(value: u64, rhs: &Expression) -> Option<bool> {
    rhs.as_numeric_literal().map(|r| r == value)
}

fn fold_inclusion(positive: bool, left: Expression, rights: Vec<Expression>) -> Expression {
    let result = if let Some(lv) = left.as_numeric_literal() {
        // Any literal right that matches decides the whole set membership.
        if rights.iter().any(|r| literal_eq(lv, r) == Some(true)) {
            Expression::BooleanLiteral(true)
        } else {
            // Literal rights that didn't match can never match (both sides are
            // now fixed values) and are dropped; an `Argument` right can't be
            // decided at compile time and is kept (oracle: `(in 4294967253 arg0)`).
            let residual: Vec<Expression> = rights.into_iter().filter(|r| r.as_numeric_literal().is_none()).collect();
            if residual.is_empty() {
                Expression::BooleanLiteral(false)
            } else {
                Expression::Inclusion {
                    positive: true,
                    left: Box::new(left),
                    rights: residual,
                }
            }
        }
    } else {
        Expression::Inclusion {
            positive: true,
            left: Box::new(left),
            rights,
        }
    };

    if positive {
        result
    } else {
        match result {
            Expression::BooleanLiteral(b) => Expression::BooleanLiteral(!b),
            Expression::Inclusion { left, rights, .. } => Expression::Inclusion {
                positive: false,
                left,
                rights,
            },
            other => Expression::Negation(Box::new(other)),
        }
    }
}

fn fold_negation(operand: Expression) -> Expression {
    match operand {
        Expression::BooleanLiteral(b) => Expression::BooleanLiteral(!b),
        Expression::Negation(inner) => *inner,
        other => Expression::Negation(Box::new(other)),
    }
}

fn fold_and(left: Expression, right: Expression) -> Expression {
    match (as_bool(&left), as_bool(&right)) {
        (Some(false), _) | (_, Some(false)) => Expression::BooleanLiteral(false),
        (Some(true), _) => right,
        (_, Some(true)) => left,
        _ => Expression::and(left, right),
    }
}

fn fold_or(left: Expression, right: Expression) -> Expression {
    match (as_bool(&left), as_bool(&right)) {
        (Some(true), _) | (_, Some(true)) => Expression::BooleanLiteral(true),
        (Some(false), _) => right,
        (_, Some(false)) => left,
        _ => Expression::or(left, right),
    }
}

fn as_bool(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::BooleanLiteral(b) => Some(*b),
        _ => None,
    }
}

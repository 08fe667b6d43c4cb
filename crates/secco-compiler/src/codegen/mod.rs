//! The code generator: walks a simplified [`Expression`] and threads its
//! truth value through two jump targets using [`InstructionBuffer`]'s
//! primitives.
//!
//! The traversal carries its state as an immutable [`EmitCtx`] value passed
//! by recursion rather than the mutable `jt`/`jf`/`negated` fields a
//! visitor-object translation of this problem would reach for — each
//! recursive call computes the child's context and hands it down, never
//! mutates a shared field and restores it afterward.

mod comparison;
mod error;
mod inclusion;

use secco_ast::{ArithmeticOp, Expression, canonical_string};

use crate::emit::{InstructionBuffer, Label};
pub(crate) use error::CodegenError;

/// The two jump targets a boolean subexpression's evaluation threads
/// through, plus the ambient negation and top-level state a leaf needs to
/// interpret them.
///
/// `jt`/`jf` name where to go when the subexpression is decided true/false
/// — always `Label::Match`, `Label::Fallthrough`, or (mid-comparison)
/// `Label::Offset` of a later instruction in the same fragment, per §4.2's
/// "every conditional instruction's two branch slots must resolve to one of
/// [MATCH/NO_MATCH] or a point further down the current syscall fragment."
///
/// `negated` is set once by a `Negation` node and left untouched by `And`/
/// `Or` as it recurses into their children — mirroring the source this is
/// grounded on, which does the same assignment-not-toggle and leaves
/// conjunction/disjunction's own structure alone. Double negation is never
/// seen here: the simplifier collapses it before the tree reaches this
/// module.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmitCtx {
    pub(crate) jf: Label,
    pub(crate) jt: Label,
    pub(crate) negated: bool,
    pub(crate) top_level: bool,
}

impl EmitCtx {
    /// The context a rule's root expression is compiled under: true jumps to
    /// the shared `MATCH` epilogue, false falls through to the next rule.
    pub(crate) fn top_level() -> Self {
        EmitCtx {
            jf: Label::Fallthrough,
            jt: Label::Match,
            negated: false,
            top_level: true,
        }
    }

    fn child(self, jf: Label, jt: Label) -> Self {
        EmitCtx {
            jf,
            jt,
            negated: self.negated,
            top_level: false,
        }
    }

    /// `(jt, jf)` with the negation already folded in, so a leaf comparison
    /// can route its decided outcomes without itself reasoning about
    /// `negated`. See [`comparison`] and [`inclusion`] for why this swap
    /// happens once per comparison/inclusion node rather than being threaded
    /// instruction by instruction: a multi-instruction 64-bit comparison has
    /// internal structural tests (e.g. "are the high halves equal") whose
    /// own sense must never be inverted by an enclosing negation.
    pub(crate) fn resolve_negation(self) -> (Label, Label) {
        if self.negated { (self.jf, self.jt) } else { (self.jt, self.jf) }
    }
}

/// Which syntactic shape a comparison/inclusion operand has, per §4.3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Argument(u8),
    Literal,
    Other,
}

pub(crate) fn classify(expr: &Expression) -> Shape {
    match expr {
        Expression::Argument { index, .. } => Shape::Argument(*index),
        Expression::NumericLiteral(_) => Shape::Literal,
        _ => Shape::Other,
    }
}

pub(crate) fn strict_dir(op: secco_ast::ComparisonOp) -> secco_ast::ComparisonOp {
    use secco_ast::ComparisonOp::*;
    match op {
        Lt | Lte => Lt,
        Gt | Gte => Gt,
        other => other,
    }
}

/// Emit `expr`'s boolean evaluation into `buf` under `ctx`.
pub(crate) fn emit_expr(buf: &mut InstructionBuffer, ctx: EmitCtx, expr: &Expression) -> Result<(), CodegenError> {
    match expr {
        Expression::BooleanLiteral(value) => {
            if !ctx.top_level {
                return Err(CodegenError::BooleanLiteralOutsideTopLevel(canonical_string(expr)));
            }
            let resolved = if *value { ctx.jt } else { ctx.jf };
            buf.jump_always(resolved);
            Ok(())
        }
        Expression::Negation(operand) => {
            let child_ctx = EmitCtx {
                negated: true,
                top_level: false,
                ..ctx
            };
            emit_expr(buf, child_ctx, operand)
        }
        Expression::And(left, right) => {
            // Left's true edge falls through into right; its false edge is
            // the ambient one. Right sees the ambient edges unchanged.
            let left_ctx = ctx.child(ctx.jf, Label::Fallthrough);
            emit_expr(buf, left_ctx, left)?;
            let right_ctx = ctx.child(ctx.jf, ctx.jt);
            emit_expr(buf, right_ctx, right)
        }
        Expression::Or(left, right) => {
            // Left's false edge falls through into right; its true edge is
            // the ambient one. Right sees the ambient edges unchanged.
            let left_ctx = ctx.child(Label::Fallthrough, ctx.jt);
            emit_expr(buf, left_ctx, left)?;
            let right_ctx = ctx.child(ctx.jf, ctx.jt);
            emit_expr(buf, right_ctx, right)
        }
        Expression::Comparison { op, left, right } => comparison::emit(buf, ctx, *op, left, right, expr),
        Expression::Inclusion {
            positive,
            left,
            rights,
        } => inclusion::emit(buf, ctx, *positive, left, rights, expr),

        Expression::Variable(_) => Err(CodegenError::UnresolvedVariable(canonical_string(expr))),
        Expression::Call(..) => Err(CodegenError::UnresolvedCall(canonical_string(expr))),
        Expression::NumericLiteral(_) | Expression::Argument { .. } | Expression::Arithmetic { .. } | Expression::BinaryNegation(_) => {
            Err(CodegenError::NumericLiteralAtTopLevel(canonical_string(expr)))
        }
    }
}

/// Materialize `expr`'s runtime value into the accumulator. Used for a
/// comparison/inclusion operand classified [`Shape::Other`] — per §4.3.3,
/// such an operand is always 32-bit.
pub(crate) fn emit_value(buf: &mut InstructionBuffer, expr: &Expression) -> Result<(), CodegenError> {
    match expr {
        Expression::NumericLiteral(v) => {
            let truncated = *v as u32;
            if *v > u64::from(u32::MAX) {
                return Err(CodegenError::OperandTooWide(canonical_string(expr)));
            }
            buf.load_immediate(truncated);
            Ok(())
        }
        Expression::Argument { index, part } => {
            let offset = match part {
                secco_ast::ArgPart::Full | secco_ast::ArgPart::Low => crate::argtable::lower_offset(*index),
                secco_ast::ArgPart::Hi => crate::argtable::upper_offset(*index),
            };
            buf.load_at(offset);
            Ok(())
        }
        Expression::Arithmetic { op, left, right } => {
            emit_value(buf, left)?;
            let k = right
                .as_numeric_literal()
                .ok_or_else(|| CodegenError::OperandTooWide(canonical_string(expr)))?;
            if k > u64::from(u32::MAX) {
                return Err(CodegenError::OperandTooWide(canonical_string(expr)));
            }
            buf.perform_arithmetic(*op, k as u32);
            Ok(())
        }
        Expression::BinaryNegation(operand) => {
            emit_value(buf, operand)?;
            buf.perform_arithmetic(ArithmeticOp::BitXor, 0xFFFF_FFFF);
            Ok(())
        }
        _ => Err(CodegenError::OperandTooWide(canonical_string(expr))),
    }
}

//! Lowers a `Comparison` into one or more conditional jumps, per §4.3.2 and
//! §4.3.3.
//!
//! A 64-bit comparison can't be a single BPF instruction (the accumulator is
//! 32 bits), so every shape below decomposes into a high-half test and a
//! low-half test chained by fall-through: equality chains two `EQL`s,
//! orderings chain a strict test, an equality test, and a final ordering
//! test on the low half (the same three-instruction shape libseccomp's
//! `ARG64` macros use), and `BIT` chains two bit-and-then-compare-to-zero
//! tests.
//!
//! Which operand carries the dynamic argument determines whether the other
//! half is loaded as an immediate (`jumpOnKComparison`) or materialized into
//! `X` (`jumpOnXComparison`); see `AcceptComparison`'s five-way dispatch in
//! the source this lowering is grounded on.

use secco_ast::{ComparisonOp, Expression, canonical_string};

use super::{CodegenError, EmitCtx, Shape, classify, emit_value, strict_dir};
use crate::argtable;
use crate::emit::{InstructionBuffer, Label};

pub(super) fn emit(
    buf: &mut InstructionBuffer,
    ctx: EmitCtx,
    op: ComparisonOp,
    left: &Expression,
    right: &Expression,
    whole: &Expression,
) -> Result<(), CodegenError> {
    let (jt, jf) = ctx.resolve_negation();

    match (classify(left), classify(right)) {
        (Shape::Argument(idx), Shape::Literal) => {
            let v = left_literal_value(right, whole)?;
            arg_vs_literal(buf, jf, jt, idx, op, v)
        }
        (Shape::Literal, Shape::Argument(idx)) => {
            let v = left_literal_value(left, whole)?;
            arg_vs_literal(buf, jf, jt, idx, op.mirrored(), v)
        }
        (Shape::Argument(l), Shape::Argument(r)) => arg_vs_arg(buf, jf, jt, l, op, r, whole),
        (Shape::Argument(idx), Shape::Other) => arg_vs_other(buf, jf, jt, idx, op, right, whole),
        (Shape::Other, Shape::Argument(idx)) => arg_vs_other(buf, jf, jt, idx, op.mirrored(), left, whole),
        (Shape::Other, Shape::Other) => other_vs_other(buf, jf, jt, op, left, right, whole),
        (Shape::Literal, Shape::Literal)
        | (Shape::Literal, Shape::Other)
        | (Shape::Other, Shape::Literal) => Err(CodegenError::UnreducedComparison(canonical_string(whole))),
    }
}

fn left_literal_value(literal: &Expression, whole: &Expression) -> Result<u64, CodegenError> {
    literal
        .as_numeric_literal()
        .ok_or_else(|| CodegenError::UnreducedComparison(canonical_string(whole)))
}

fn halves(v: u64) -> (u32, u32) {
    ((v >> 32) as u32, v as u32)
}

/// Argument's two halves against an immediate's two halves, via `loadAt` +
/// `jumpOnKComparison`. Mirrors `compareArgToLit`.
pub(super) fn arg_vs_literal(
    buf: &mut InstructionBuffer,
    jf: Label,
    jt: Label,
    idx: u8,
    op: ComparisonOp,
    literal: u64,
) -> Result<(), CodegenError> {
    let (hi_off, lo_off) = argtable::offsets(idx);
    let (hi_k, lo_k) = halves(literal);

    match op {
        ComparisonOp::Eql | ComparisonOp::Neql => {
            let decide_false_on_hi_mismatch = matches!(op, ComparisonOp::Eql);
            buf.load_at(hi_off);
            buf.jump_on_k_comparison(
                hi_k,
                ComparisonOp::Eql,
                if decide_false_on_hi_mismatch { jf } else { jt },
                Label::Fallthrough,
                false,
                true,
            );
            buf.load_at(lo_off);
            buf.jump_on_k_comparison(lo_k, op, jf, jt, false, false);
        }
        ComparisonOp::Lt | ComparisonOp::Lte | ComparisonOp::Gt | ComparisonOp::Gte => {
            buf.load_at(hi_off);
            buf.jump_on_k_comparison(hi_k, strict_dir(op), Label::Fallthrough, jt, false, true);
            buf.jump_on_k_comparison(hi_k, ComparisonOp::Eql, jf, Label::Fallthrough, false, true);
            buf.load_at(lo_off);
            buf.jump_on_k_comparison(lo_k, op, jf, jt, false, false);
        }
        ComparisonOp::Bit => {
            buf.load_at(hi_off);
            buf.perform_arithmetic(secco_ast::ArithmeticOp::BitAnd, hi_k);
            buf.jump_on_k_comparison(0, ComparisonOp::Neql, Label::Fallthrough, jt, false, true);
            buf.load_at(lo_off);
            buf.perform_arithmetic(secco_ast::ArithmeticOp::BitAnd, lo_k);
            buf.jump_on_k_comparison(0, ComparisonOp::Neql, jf, jt, false, false);
        }
    }
    Ok(())
}

/// Argument's two halves against another argument's two halves: the right
/// side is loaded into `X` a half at a time, the left into `A`, and compared
/// with `jumpOnXComparison`. Mirrors the `leftArg && rightArg` branch of
/// `AcceptComparison`.
fn arg_vs_arg(
    buf: &mut InstructionBuffer,
    jf: Label,
    jt: Label,
    left_idx: u8,
    op: ComparisonOp,
    right_idx: u8,
    whole: &Expression,
) -> Result<(), CodegenError> {
    let (l_hi, l_lo) = argtable::offsets(left_idx);
    let (r_hi, r_lo) = argtable::offsets(right_idx);

    match op {
        ComparisonOp::Eql | ComparisonOp::Neql => {
            let decide_false_on_hi_mismatch = matches!(op, ComparisonOp::Eql);
            buf.load_at(r_hi);
            buf.move_a_to_x();
            buf.load_at(l_hi);
            buf.jump_on_x_comparison(
                ComparisonOp::Eql,
                if decide_false_on_hi_mismatch { jf } else { jt },
                Label::Fallthrough,
                false,
            );
            buf.load_at(r_lo);
            buf.move_a_to_x();
            buf.load_at(l_lo);
            buf.jump_on_x_comparison(op, jf, jt, false);
        }
        ComparisonOp::Lt | ComparisonOp::Lte | ComparisonOp::Gt | ComparisonOp::Gte => {
            buf.load_at(r_hi);
            buf.move_a_to_x();
            buf.load_at(l_hi);
            buf.jump_on_x_comparison(strict_dir(op), Label::Fallthrough, jt, false);
            buf.jump_on_x_comparison(ComparisonOp::Eql, jf, Label::Fallthrough, false);
            buf.load_at(r_lo);
            buf.move_a_to_x();
            buf.load_at(l_lo);
            buf.jump_on_x_comparison(op, jf, jt, false);
        }
        ComparisonOp::Bit => {
            // Bit-and against a dynamic right-hand side needs an ALU-with-X
            // primitive; the emitter only exposes an immediate-operand ALU
            // op (`performArithmetic(op, k)`), so this shape can't be
            // lowered with the primitives this crate has.
            return Err(CodegenError::UnreducedComparison(canonical_string(whole)));
        }
    }
    Ok(())
}

/// Argument's two halves against a materialized 32-bit "other" value,
/// zero-extended to 64 bits: the high half is compared against the
/// immediate `0`, the low half against `X`. Mirrors `compareExpressionToArg`.
fn arg_vs_other(
    buf: &mut InstructionBuffer,
    jf: Label,
    jt: Label,
    idx: u8,
    op: ComparisonOp,
    other: &Expression,
    whole: &Expression,
) -> Result<(), CodegenError> {
    let (hi_off, lo_off) = argtable::offsets(idx);

    match op {
        ComparisonOp::Eql | ComparisonOp::Neql => {
            let decide_false_on_hi_mismatch = matches!(op, ComparisonOp::Eql);
            buf.load_at(hi_off);
            buf.jump_on_k_comparison(
                0,
                ComparisonOp::Eql,
                if decide_false_on_hi_mismatch { jf } else { jt },
                Label::Fallthrough,
                false,
                true,
            );
            emit_value(buf, other)?;
            buf.move_a_to_x();
            buf.load_at(lo_off);
            buf.jump_on_x_comparison(op, jf, jt, false);
        }
        ComparisonOp::Lt | ComparisonOp::Lte | ComparisonOp::Gt | ComparisonOp::Gte => {
            buf.load_at(hi_off);
            buf.jump_on_k_comparison(0, strict_dir(op), Label::Fallthrough, jt, false, true);
            buf.jump_on_k_comparison(0, ComparisonOp::Eql, jf, Label::Fallthrough, false, true);
            emit_value(buf, other)?;
            buf.move_a_to_x();
            buf.load_at(lo_off);
            buf.jump_on_x_comparison(op, jf, jt, false);
        }
        ComparisonOp::Bit => {
            // The zero-extended high half never contributes (`0 & x == 0`),
            // so only the low half matters — but that needs arg_lo & X,
            // another ALU-with-X the emitter doesn't expose.
            return Err(CodegenError::UnreducedComparison(canonical_string(whole)));
        }
    }
    Ok(())
}

/// Two non-argument, non-literal 32-bit values: materialize both and
/// compare with a single `jumpOnXComparison`. Mirrors `AcceptComparison`'s
/// catch-all branch.
fn other_vs_other(
    buf: &mut InstructionBuffer,
    jf: Label,
    jt: Label,
    op: ComparisonOp,
    left: &Expression,
    right: &Expression,
    whole: &Expression,
) -> Result<(), CodegenError> {
    if op == ComparisonOp::Bit {
        return Err(CodegenError::UnreducedComparison(canonical_string(whole)));
    }
    emit_value(buf, left)?;
    buf.move_a_to_x();
    emit_value(buf, right)?;
    buf.jump_on_x_comparison(op, jf, jt, false);
    Ok(())
}

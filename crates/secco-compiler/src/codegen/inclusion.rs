//! Lowers an `Inclusion` (set membership) into a chain of equality tests,
//! per §4.3.4: `left ∈ {r0, r1, ..., rn}` is a disjunction of `left == ri`,
//! so each member but the last routes its true edge straight to the
//! ambient "matched" terminal and its false edge into the next member's
//! check; the last member's both edges resolve to the ambient terminals
//! directly. `left ∉ {...}` is the same chain with the polarity folded in
//! once up front, the same way `EmitCtx::resolve_negation` does for a
//! plain comparison.
//!
//! By simplification time exactly one side of the node names a full
//! argument (the other supplies the membership set); which side doesn't
//! matter here since `Eql` is its own mirror.

use secco_ast::{ComparisonOp, Expression, canonical_string};

use super::comparison::arg_vs_literal;
use super::{CodegenError, EmitCtx};
use crate::emit::{InstructionBuffer, Label};

pub(super) fn emit(
    buf: &mut InstructionBuffer,
    ctx: EmitCtx,
    positive: bool,
    left: &Expression,
    rights: &[Expression],
    whole: &Expression,
) -> Result<(), CodegenError> {
    let effective = EmitCtx {
        negated: ctx.negated ^ !positive,
        ..ctx
    };
    let (jt, jf) = effective.resolve_negation();

    let members = membership_checks(left, rights, whole)?;
    let last = members.len() - 1;
    for (i, (idx, literal)) in members.into_iter().enumerate() {
        let member_jf = if i == last { jf } else { Label::Fallthrough };
        arg_vs_literal(buf, member_jf, jt, idx, ComparisonOp::Eql, literal)?;
    }
    Ok(())
}

/// Resolves `left ∈ rights` into `(argument index, literal)` pairs to test
/// for equality, whichever side carries the argument.
fn membership_checks(
    left: &Expression,
    rights: &[Expression],
    whole: &Expression,
) -> Result<Vec<(u8, u64)>, CodegenError> {
    if let Some(index) = left.as_full_argument() {
        rights
            .iter()
            .map(|r| {
                r.as_numeric_literal()
                    .map(|v| (index, v))
                    .ok_or_else(|| CodegenError::UnsupportedInclusionMember(canonical_string(r)))
            })
            .collect()
    } else if let Some(literal) = left.as_numeric_literal() {
        rights
            .iter()
            .map(|r| {
                r.as_full_argument()
                    .map(|index| (index, literal))
                    .ok_or_else(|| CodegenError::UnsupportedInclusionMember(canonical_string(r)))
            })
            .collect()
    } else {
        Err(CodegenError::InclusionRequiresArgument(canonical_string(whole)))
    }
}

//! A syscall-free mirror of [`secco_ast::Diagnostic`]'s precondition-violation
//! variants.
//!
//! The code generator doesn't know which rule it's compiling — that context
//! only exists in the driver's per-rule loop — so it raises this lighter
//! error instead and lets the driver attach the syscall id once it catches
//! one, the same division of labor [`crate::simplify::FoldWarning`] uses for
//! the simplifier's constant-folding diagnostics.

use secco_ast::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CodegenError {
    UnresolvedVariable(String),
    UnresolvedCall(String),
    BooleanLiteralOutsideTopLevel(String),
    NumericLiteralAtTopLevel(String),
    UnreducedComparison(String),
    InclusionRequiresArgument(String),
    UnsupportedInclusionMember(String),
    OperandTooWide(String),
}

impl CodegenError {
    pub(crate) fn into_diagnostic(self, syscall: u32) -> Diagnostic {
        match self {
            CodegenError::UnresolvedVariable(expr) => Diagnostic::UnresolvedVariable { syscall, expr },
            CodegenError::UnresolvedCall(expr) => Diagnostic::UnresolvedCall { syscall, expr },
            CodegenError::BooleanLiteralOutsideTopLevel(expr) => {
                Diagnostic::BooleanLiteralOutsideTopLevel { syscall, expr }
            }
            CodegenError::NumericLiteralAtTopLevel(expr) => Diagnostic::NumericLiteralAtTopLevel { syscall, expr },
            CodegenError::UnreducedComparison(expr) => Diagnostic::UnreducedComparison { syscall, expr },
            CodegenError::InclusionRequiresArgument(expr) => {
                Diagnostic::InclusionRequiresArgument { syscall, expr }
            }
            CodegenError::UnsupportedInclusionMember(expr) => {
                Diagnostic::UnsupportedInclusionMember { syscall, expr }
            }
            CodegenError::OperandTooWide(expr) => Diagnostic::OperandTooWide { syscall, expr },
        }
    }
}

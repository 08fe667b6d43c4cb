//! Compiles a simplified syscall-policy expression language into a linear
//! packet-filter instruction stream.
//!
//! ```
//! use secco::{Action, ComparisonOp, Expression, Policy, compile};
//!
//! let policy = Policy::new(Action::Kill)
//!     .with_rule(0, Expression::comparison(ComparisonOp::Eql, Expression::arg(0), Expression::NumericLiteral(1)));
//! let program = compile(&policy);
//! assert!(program.diagnostics.is_empty());
//! ```
//!
//! [`simplify`] is exposed separately for callers who want to inspect a
//! policy's folded form (e.g. for the canonical-string diagnostics this
//! crate prints) without going all the way to a compiled program.

pub use secco_ast::{Action, ArgPart, ArithmeticOp, ComparisonOp, Diagnostic, Expression, Policy, Rule, SockFilter};
pub use secco_compiler::{CompiledProgram, compile, simplify};

//! Simplification and code generation: turns a [`secco_ast::Policy`] into a
//! linear classic-BPF instruction stream.
//!
//! [`simplify`] folds constants and propagates booleans; [`compile`] runs it
//! per rule and lowers the result with the code generator in [`codegen`],
//! assembling every rule's fragment into one program in [`driver`].

mod argtable;
mod codegen;
mod driver;
mod emit;
mod peephole;
pub mod simplify;

pub use driver::{CompiledProgram, compile};
pub use simplify::simplify;

//! A post-resolve instruction-merging hook, reserved for a future pass that
//! collapses redundant loads (e.g. two `loadAt` of the same offset in a row,
//! which the per-operand comparison lowering in [`crate::codegen`] can
//! produce across adjacent rules). Not wired into [`crate::driver::compile`]
//! by default — see §9.1.
use secco_ast::SockFilter;

#[allow(dead_code)]
pub(crate) fn peephole(prog: &[SockFilter]) -> Vec<SockFilter> {
    prog.to_vec()
}

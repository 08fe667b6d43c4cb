//! The policy driver: turns a whole [`Policy`] into one flat classic-BPF
//! instruction stream, per §4.4.
//!
//! The generated program has a fixed shape: a dispatch prologue that loads
//! the syscall number once, branches into whichever rule's body matches it,
//! and falls back to the default action unconditionally if none do; the
//! rule bodies themselves (each followed by a trampoline back to the shared
//! default action, so a rule's own `NO_MATCH` edge can keep using the
//! simple "fall through to the next instruction" convention
//! [`crate::codegen`] already relies on); and a two-instruction epilogue —
//! the default action, then the shared `ALLOW` every rule's `MATCH` edge
//! targets.
//!
//! Nothing here can fail outright. A rule whose expression can't be
//! lowered, or whose body ends up too far from the epilogue to fit a
//! classic-BPF jump's eight-bit offset field, degrades to an unconditional
//! jump straight to the default action; the [`Diagnostic`] explaining why
//! is attached to the returned [`CompiledProgram`] instead of aborting the
//! compile.

use secco_ast::{Action, ComparisonOp, Diagnostic, Policy, SockFilter};
use tracing::{debug, instrument, warn};

use crate::argtable::SYSCALL_NR_OFFSET;
use crate::codegen::{self, EmitCtx};
use crate::emit::{InstructionBuffer, Instr, Label};
use crate::simplify::{FoldWarning, simplify_with_diagnostics};

const SECCOMP_RET_KILL: u32 = 0x8000_0000;
const SECCOMP_RET_TRAP: u32 = 0x0003_0000;
const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

/// The compiler's output: the flat instruction stream plus every diagnostic
/// raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    pub filters: Vec<SockFilter>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A rule's lowering result, before it's placed at a concrete offset.
enum RuleOutcome {
    Body(Vec<Instr>),
    /// The expression couldn't be lowered, or its body didn't fit once
    /// placed; either way the rule always resolves to `NO_MATCH`.
    Degraded,
}

impl RuleOutcome {
    fn len(&self) -> usize {
        match self {
            RuleOutcome::Body(instrs) => instrs.len(),
            RuleOutcome::Degraded => 0,
        }
    }

    fn instrs(&self) -> &[Instr] {
        match self {
            RuleOutcome::Body(instrs) => instrs,
            RuleOutcome::Degraded => &[],
        }
    }
}

/// Compile `policy` into a linear packet-filter instruction stream.
#[instrument(skip(policy), fields(rule_count = policy.rules.len()))]
pub fn compile(policy: &Policy) -> CompiledProgram {
    let mut diagnostics = Vec::new();
    let mut outcomes: Vec<RuleOutcome> = policy.rules.iter().map(|rule| lower_rule(rule, &mut diagnostics)).collect();

    // Each rebuild is cheap (rule bodies are already lowered; this loop only
    // ever re-runs the arithmetic layout and the final resolve), and every
    // iteration that fails permanently degrades one more rule, so it's
    // bounded by the rule count.
    for _ in 0..=policy.rules.len() {
        let layout = Layout::compute(&outcomes);
        let program = assemble(policy, &outcomes, &layout);

        match program.resolve() {
            Ok(filters) => return CompiledProgram { filters, diagnostics },
            Err((bad_index, distance)) => {
                let culprit = layout.attribute(bad_index);
                let rule = &policy.rules[culprit];
                warn!(syscall = rule.syscall, distance, "rule body does not fit an eight-bit jump offset, degrading to non-match");
                diagnostics.push(Diagnostic::JumpTooFar {
                    syscall: rule.syscall,
                    distance,
                });
                outcomes[culprit] = RuleOutcome::Degraded;
            }
        }
    }

    // Every rule degraded and the dispatch prologue alone still doesn't
    // fit (thousands of rules); return the best-effort program we can
    // still build without panicking.
    let layout = Layout::compute(&outcomes);
    let program = assemble(policy, &outcomes, &layout);
    CompiledProgram {
        filters: program.resolve().unwrap_or_default(),
        diagnostics,
    }
}

fn lower_rule(rule: &secco_ast::Rule, diagnostics: &mut Vec<Diagnostic>) -> RuleOutcome {
    let mut warnings = Vec::new();
    let simplified = simplify_with_diagnostics(rule.expr.clone(), &mut warnings);
    for warning in warnings {
        diagnostics.push(fold_warning_to_diagnostic(warning, rule.syscall));
    }

    let mut body = InstructionBuffer::new();
    match codegen::emit_expr(&mut body, EmitCtx::top_level(), &simplified) {
        Ok(()) => {
            debug!(syscall = rule.syscall, instructions = body.position(), "lowered rule");
            RuleOutcome::Body(body.into_instrs())
        }
        Err(err) => {
            warn!(syscall = rule.syscall, "rule expression could not be lowered, degrading to non-match");
            diagnostics.push(err.into_diagnostic(rule.syscall));
            RuleOutcome::Degraded
        }
    }
}

fn fold_warning_to_diagnostic(warning: FoldWarning, syscall: u32) -> Diagnostic {
    match warning {
        FoldWarning::DivisionByZero { expr } => Diagnostic::DivisionByZero { syscall, expr },
        FoldWarning::ModuloByZero { expr } => Diagnostic::ModuloByZero { syscall, expr },
    }
}

/// Where everything lands once rule lengths are known. One trampoline
/// instruction follows every body, win or lose, so a body's own internal
/// `Label::Fallthrough` edges always mean "the next instruction" regardless
/// of which rule comes after it in the program.
struct Layout {
    prologue_len: usize,
    body_starts: Vec<usize>,
    default_index: usize,
    match_index: usize,
}

impl Layout {
    fn compute(outcomes: &[RuleOutcome]) -> Layout {
        // one load + one dispatch check per rule + the fallthrough jump to
        // the default action when no check matches
        let prologue_len = 2 + outcomes.len();
        let mut body_starts = Vec::with_capacity(outcomes.len());
        let mut cursor = prologue_len;
        for outcome in outcomes {
            body_starts.push(cursor);
            cursor += outcome.len() + 1; // + trampoline
        }
        Layout {
            prologue_len,
            body_starts,
            default_index: cursor,
            match_index: cursor + 1,
        }
    }

    /// Maps a failing instruction's global index back to the rule it came
    /// from: index `1 + i` is rule `i`'s dispatch check, and anything at or
    /// past `body_starts[i]` but before the next rule's start belongs to
    /// rule `i`'s body. The dispatch prologue's own trailing unconditional
    /// jump (index `prologue_len - 1`) can never fail to resolve, so it's
    /// never the culprit in practice.
    fn attribute(&self, bad_index: usize) -> usize {
        if bad_index < self.prologue_len - 1 {
            bad_index.saturating_sub(1).min(self.body_starts.len().saturating_sub(1))
        } else {
            self.body_starts
                .iter()
                .rposition(|&start| start <= bad_index)
                .unwrap_or(self.body_starts.len().saturating_sub(1))
        }
    }
}

fn assemble(policy: &Policy, outcomes: &[RuleOutcome], layout: &Layout) -> InstructionBuffer {
    let mut program = InstructionBuffer::new();
    program.load_at(SYSCALL_NR_OFFSET);
    for (i, rule) in policy.rules.iter().enumerate() {
        program.jump_on_k_comparison(rule.syscall, ComparisonOp::Eql, Label::Fallthrough, Label::Offset(layout.body_starts[i]), false, false);
    }
    // no dispatch check matched: skip every rule body and hit the default
    // action directly, instead of falling into rule 0's body.
    program.jump_always(Label::Offset(layout.default_index));
    for outcome in outcomes {
        program.extend(outcome.instrs().to_vec());
        program.jump_always(Label::Offset(layout.default_index));
    }
    program.ret(encode_action(policy.default_action));
    program.set_match_target(layout.match_index);
    program.ret(encode_action(Action::Allow));
    program
}

fn encode_action(action: Action) -> u32 {
    match action {
        Action::Allow => SECCOMP_RET_ALLOW,
        Action::Kill => SECCOMP_RET_KILL,
        Action::Trap => SECCOMP_RET_TRAP,
        Action::Errno(errno) => SECCOMP_RET_ERRNO | (errno & 0xFFFF),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secco_ast::{ComparisonOp as Op, Expression};

    #[test]
    fn empty_policy_compiles_to_the_bare_epilogue() {
        let policy = Policy::new(Action::Kill);
        let program = compile(&policy);
        assert!(program.diagnostics.is_empty());
        // load nr, unconditional jump to default, default ret, allow ret
        assert_eq!(program.filters.len(), 4);
    }

    #[test]
    fn matching_rule_falls_through_to_allow() {
        let policy = Policy::new(Action::Kill).with_rule(0, Expression::BooleanLiteral(true));
        let program = compile(&policy);
        assert!(program.diagnostics.is_empty());
        assert!(!program.filters.is_empty());
    }

    #[test]
    fn unresolved_variable_degrades_its_rule_and_reports_a_diagnostic() {
        let policy = Policy::new(Action::Kill).with_rule(0, Expression::Variable("unbound".into()));
        let program = compile(&policy);
        assert_eq!(program.diagnostics.len(), 1);
        assert!(matches!(program.diagnostics[0], Diagnostic::UnresolvedVariable { syscall: 0, .. }));
    }

    #[test]
    fn division_by_zero_warning_is_attached_to_the_right_syscall() {
        let policy = Policy::new(Action::Kill).with_rule(
            9,
            Expression::comparison(
                Op::Eql,
                Expression::arithmetic(secco_ast::ArithmeticOp::Div, Expression::NumericLiteral(7), Expression::NumericLiteral(0)),
                Expression::NumericLiteral(7),
            ),
        );
        let program = compile(&policy);
        assert!(matches!(program.diagnostics[0], Diagnostic::DivisionByZero { syscall: 9, .. }));
    }

    #[test]
    fn multiple_rules_dispatch_on_distinct_syscalls() {
        let policy = Policy::new(Action::Errno(1))
            .with_rule(0, Expression::comparison(Op::Eql, Expression::arg(0), Expression::NumericLiteral(1)))
            .with_rule(1, Expression::BooleanLiteral(true))
            .with_rule(2, Expression::comparison(Op::Gt, Expression::arg(1), Expression::NumericLiteral(10)));
        let program = compile(&policy);
        assert!(program.diagnostics.is_empty());
        assert!(program.filters.len() > 5);
    }

    #[test]
    fn compile_is_safe_to_call_concurrently() {
        use std::sync::Arc;
        use std::thread;

        let policy = Arc::new(
            Policy::new(Action::Kill)
                .with_rule(0, Expression::comparison(Op::Eql, Expression::arg(0), Expression::NumericLiteral(42)))
                .with_rule(1, Expression::BooleanLiteral(true)),
        );
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = Arc::clone(&policy);
                thread::spawn(move || compile(&policy))
            })
            .collect();
        let first = handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>();
        for program in &first[1..] {
            assert_eq!(program, &first[0]);
        }
    }
}

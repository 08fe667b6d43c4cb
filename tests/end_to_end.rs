//! End-to-end coverage for the public API: build a [`Policy`], [`compile`]
//! it, and check the resulting filter program's shape and diagnostics.

use secco::{Action, ArithmeticOp, ComparisonOp, Diagnostic, Expression, Policy, compile, simplify};

#[test]
fn wide_64bit_equality_emits_exactly_two_conditional_jumps() {
    let policy = Policy::new(Action::Kill).with_rule(
        0,
        Expression::comparison(ComparisonOp::Eql, Expression::arg(0), Expression::NumericLiteral(0x1_0000_0001)),
    );
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());

    // classic BPF JMP class is 0x05; only the hi/lo equality pair should be
    // conditional (the prologue's dispatch check is the third).
    let conditional_jumps = program.filters.iter().filter(|f| f.code & 0x07 == 0x05 && f.code != 0x05).count();
    assert_eq!(conditional_jumps, 3, "two hi/lo jumps for the comparison plus one dispatch check");
}

#[test]
fn matching_syscall_with_true_expression_allows() {
    let policy = Policy::new(Action::Kill).with_rule(60, Expression::BooleanLiteral(true));
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());
    // load nr, dispatch check, dispatch fallback jump, body, trampoline, default ret, allow ret
    assert!(program.filters.len() >= 4);
}

#[test]
fn unmatched_syscall_falls_through_to_default_action() {
    let policy = Policy::new(Action::Errno(13)).with_rule(0, Expression::BooleanLiteral(true));
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());

    // a syscall absent from the policy should dispatch straight past every
    // rule body and land on the default action, not fall into rule 0's.
    let default_ret = trace(&program.filters, 99);
    assert_eq!(default_ret & 0xFFFF_0000, 0x0005_0000, "expected SECCOMP_RET_ERRNO");
    assert_eq!(default_ret & 0xFFFF, 13);

    // the one rule that does match should still allow.
    let matched_ret = trace(&program.filters, 0);
    assert_eq!(matched_ret, 0x7fff_0000, "expected SECCOMP_RET_ALLOW");
}

/// Walks a compiled filter program against a synthetic `seccomp_data` whose
/// only populated field is `nr`, just enough to drive the dispatch and jump
/// instructions this compiler ever emits (K-form comparisons only — nothing
/// here compares against `X`).
fn trace(filters: &[secco::SockFilter], nr: u32) -> u32 {
    let mut acc: u32 = 0;
    let mut pc: usize = 0;
    loop {
        let f = &filters[pc];
        match f.code & 0x07 {
            0x00 => {
                acc = if f.code & 0x20 != 0 { nr } else { f.k };
                pc += 1;
            }
            0x05 => {
                if f.code == 0x05 {
                    pc += 1 + f.k as usize;
                } else {
                    let taken = match f.code & 0xf0 {
                        0x10 => acc == f.k,
                        0x20 => acc > f.k,
                        0x30 => acc >= f.k,
                        0x40 => acc & f.k != 0,
                        other => panic!("unhandled jump op {other:#x}"),
                    };
                    pc += 1 + if taken { f.jt as usize } else { f.jf as usize };
                }
            }
            0x06 => return f.k,
            other => panic!("unhandled instruction class {other:#x}"),
        }
    }
}

#[test]
fn negated_inclusion_rejects_members_of_the_set() {
    let policy = Policy::new(Action::Kill).with_rule(
        1,
        Expression::Inclusion {
            positive: false,
            left: Box::new(Expression::arg(0)),
            rights: vec![Expression::NumericLiteral(1), Expression::NumericLiteral(2)],
        },
    );
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());
}

#[test]
fn conjunction_short_circuits_without_panicking() {
    let policy = Policy::new(Action::Kill).with_rule(
        2,
        Expression::and(
            Expression::comparison(ComparisonOp::Eql, Expression::arg(0), Expression::NumericLiteral(3)),
            Expression::comparison(ComparisonOp::Lt, Expression::arg(1), Expression::NumericLiteral(100)),
        ),
    );
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());
}

#[test]
fn folded_policy_still_compiles_after_simplify() {
    let expr = Expression::comparison(
        ComparisonOp::Eql,
        Expression::arithmetic(ArithmeticOp::Add, Expression::NumericLiteral(2), Expression::NumericLiteral(2)),
        Expression::arg(0),
    );
    let folded = simplify(expr);
    let policy = Policy::new(Action::Kill).with_rule(3, folded);
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());
}

#[test]
fn unresolved_call_degrades_its_rule_but_not_the_whole_policy() {
    let policy = Policy::new(Action::Kill)
        .with_rule(4, Expression::Call("unknown_macro".into(), vec![]))
        .with_rule(5, Expression::BooleanLiteral(true));
    let program = compile(&policy);
    assert_eq!(program.diagnostics.len(), 1);
    assert!(matches!(program.diagnostics[0], Diagnostic::UnresolvedCall { syscall: 4, .. }));
}

#[test]
fn many_rules_all_dispatch_independently() {
    let policy = (0..40u32).fold(Policy::new(Action::Kill), |policy, syscall| {
        policy.with_rule(syscall, Expression::comparison(ComparisonOp::Eql, Expression::arg(0), Expression::NumericLiteral(u64::from(syscall))))
    });
    let program = compile(&policy);
    assert!(program.diagnostics.is_empty());
    assert!(!program.filters.is_empty());
}

#[test]
fn compile_is_safe_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let policy = Arc::new(
        Policy::new(Action::Trap)
            .with_rule(0, Expression::comparison(ComparisonOp::Eql, Expression::arg(0), Expression::NumericLiteral(42)))
            .with_rule(1, Expression::comparison(ComparisonOp::Bit, Expression::arg(1), Expression::NumericLiteral(0x10))),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let policy = Arc::clone(&policy);
            thread::spawn(move || compile(&policy))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("worker panicked")).collect();
    for program in &results {
        assert_eq!(program, &results[0]);
    }
}

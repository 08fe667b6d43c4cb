//! Performance benchmarks for policy compilation.
//!
//! - Size-based: how compile time scales with rule count
//! - Shape-specific: comparison, inclusion, and nested boolean expressions
//! - Simplification: constant folding's own cost, isolated from codegen

use criterion::{Criterion, criterion_group, criterion_main};
use secco::{Action, ArithmeticOp, ComparisonOp, Expression, Policy, compile, simplify};
use std::hint::black_box;

fn arg_eq(index: u8, value: u64) -> Expression {
    Expression::comparison(ComparisonOp::Eql, Expression::arg(index), Expression::NumericLiteral(value))
}

fn policy_with_rules(count: u32) -> Policy {
    (0..count).fold(Policy::new(Action::Kill), |policy, syscall| {
        policy.with_rule(syscall, arg_eq(0, u64::from(syscall)))
    })
}

fn size_based_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/rule_count");

    for count in [1u32, 16, 64, 256] {
        let policy = policy_with_rules(count);
        group.bench_function(format!("{count}_rules"), |b| {
            b.iter(|| {
                let program = compile(black_box(&policy));
                black_box(program.filters.len())
            });
        });
    }

    group.finish();
}

fn shape_specific_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/shapes");

    let inclusion = Policy::new(Action::Kill).with_rule(
        0,
        Expression::Inclusion {
            positive: true,
            left: Box::new(Expression::arg(0)),
            rights: (0u64..32).map(Expression::NumericLiteral).collect(),
        },
    );
    group.bench_function("inclusion_32_members", |b| {
        b.iter(|| black_box(compile(black_box(&inclusion))));
    });

    let deep_and = Policy::new(Action::Kill).with_rule(
        0,
        (1u64..32).fold(arg_eq(0, 0), |acc, i| Expression::and(acc, arg_eq((i % 6) as u8, i))),
    );
    group.bench_function("deeply_nested_and", |b| {
        b.iter(|| black_box(compile(black_box(&deep_and))));
    });

    let wide_64bit = Policy::new(Action::Kill).with_rule(0, Expression::comparison(ComparisonOp::Gte, Expression::arg(0), Expression::NumericLiteral(1 << 40)));
    group.bench_function("64bit_ordering", |b| {
        b.iter(|| black_box(compile(black_box(&wide_64bit))));
    });

    group.finish();
}

fn simplification_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("simplify");

    let foldable = (1..64).fold(Expression::NumericLiteral(0), |acc, i| {
        Expression::arithmetic(ArithmeticOp::Add, acc, Expression::arithmetic(ArithmeticOp::Mul, Expression::NumericLiteral(i), Expression::NumericLiteral(2)))
    });
    group.bench_function("constant_fold_chain", |b| {
        b.iter(|| black_box(simplify(black_box(foldable.clone()))));
    });

    group.finish();
}

criterion_group!(benches, size_based_benchmarks, shape_specific_benchmarks, simplification_benchmarks);
criterion_main!(benches);

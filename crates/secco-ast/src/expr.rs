//! The expression algebra consumed by the simplifier and code generator.

use std::fmt;

/// Which 32-bit half of a syscall argument an [`Expression::Argument`] refers to.
///
/// After simplification every surviving `Argument` in the tree has part
/// `Full` — the code generator is the only place that introduces `Hi`/`Low`,
/// when it materializes a 64-bit comparison as a pair of 32-bit loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgPart {
    /// The full 64-bit argument (the only form a parsed/unified tree may contain).
    Full,
    /// The high 32 bits.
    Hi,
    /// The low 32 bits.
    Low,
}

/// Binary numeric operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl ArithmeticOp {
    /// Whether operand order doesn't change the result, so the simplifier is
    /// free to swap a left-hand literal to the right.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            ArithmeticOp::Add | ArithmeticOp::Mul | ArithmeticOp::BitAnd | ArithmeticOp::BitOr | ArithmeticOp::BitXor
        )
    }

    /// Evaluate `self` over two unsigned 64-bit operands per spec §4.1: wrapping
    /// on overflow for `+`, `-`, `*`; truncating division; native remainder;
    /// shift amount taken modulo 64.
    ///
    /// Division and modulo by zero return the documented sentinel (dividend,
    /// and 0 respectively) rather than panicking; the caller is responsible
    /// for raising the accompanying diagnostic.
    pub fn eval(self, left: u64, right: u64) -> u64 {
        match self {
            ArithmeticOp::Add => left.wrapping_add(right),
            ArithmeticOp::Sub => left.wrapping_sub(right),
            ArithmeticOp::Mul => left.wrapping_mul(right),
            ArithmeticOp::Div => {
                if right == 0 {
                    left
                } else {
                    left / right
                }
            }
            ArithmeticOp::Mod => {
                if right == 0 {
                    0
                } else {
                    left % right
                }
            }
            ArithmeticOp::BitAnd => left & right,
            ArithmeticOp::BitOr => left | right,
            ArithmeticOp::BitXor => left ^ right,
            ArithmeticOp::ShiftLeft => left.wrapping_shl((right % 64) as u32),
            ArithmeticOp::ShiftRight => left.wrapping_shr((right % 64) as u32),
        }
    }

    /// True iff evaluating `self` with a zero right-hand operand hits the
    /// divide/modulo-by-zero sentinel path.
    pub fn is_zero_divisor_sensitive(self) -> bool {
        matches!(self, ArithmeticOp::Div | ArithmeticOp::Mod)
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mult",
            ArithmeticOp::Div => "div",
            ArithmeticOp::Mod => "mod",
            ArithmeticOp::BitAnd => "binand",
            ArithmeticOp::BitOr => "binor",
            ArithmeticOp::BitXor => "binxor",
            ArithmeticOp::ShiftLeft => "lsh",
            ArithmeticOp::ShiftRight => "rsh",
        };
        f.write_str(s)
    }
}

/// Relational operators. `Bit` is "left bit-and right ≠ 0".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eql,
    Neql,
    Gt,
    Gte,
    Lt,
    Lte,
    Bit,
}

impl ComparisonOp {
    /// Evaluate `self` over two unsigned 64-bit operands. Orderings are unsigned.
    pub fn eval(self, left: u64, right: u64) -> bool {
        match self {
            ComparisonOp::Eql => left == right,
            ComparisonOp::Neql => left != right,
            ComparisonOp::Gt => left > right,
            ComparisonOp::Gte => left >= right,
            ComparisonOp::Lt => left < right,
            ComparisonOp::Lte => left <= right,
            ComparisonOp::Bit => (left & right) != 0,
        }
    }

    /// The operator obtained by swapping operand order (`a OP b` becomes `b OP' a`).
    pub fn mirrored(self) -> ComparisonOp {
        match self {
            ComparisonOp::Eql => ComparisonOp::Eql,
            ComparisonOp::Neql => ComparisonOp::Neql,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Gte => ComparisonOp::Lte,
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Lte => ComparisonOp::Gte,
            ComparisonOp::Bit => ComparisonOp::Bit,
        }
    }

    /// The operator obtained by logically negating the test (`!(a OP b)`).
    pub fn negated(self) -> ComparisonOp {
        match self {
            ComparisonOp::Eql => ComparisonOp::Neql,
            ComparisonOp::Neql => ComparisonOp::Eql,
            ComparisonOp::Gt => ComparisonOp::Lte,
            ComparisonOp::Gte => ComparisonOp::Lt,
            ComparisonOp::Lt => ComparisonOp::Gte,
            ComparisonOp::Lte => ComparisonOp::Gt,
            ComparisonOp::Bit => ComparisonOp::Bit, // negation is injected by the caller (`negated` ctx flag)
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Eql => "eq",
            ComparisonOp::Neql => "neq",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Gte => "gte",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Lte => "lte",
            ComparisonOp::Bit => "bit",
        };
        f.write_str(s)
    }
}

/// A node in the policy expression tree.
///
/// `Variable` and `Call` represent identifiers and macro calls that an
/// upstream resolution pass ("the unifier") is responsible for eliminating
/// before the tree reaches this crate; their presence past [`simplify`] is a
/// precondition violation (see `secco-compiler::simplify`).
///
/// [`simplify`]: ../secco_compiler/fn.simplify.html
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant unsigned 64-bit value.
    NumericLiteral(u64),
    /// A constant boolean value.
    BooleanLiteral(bool),
    /// An unresolved identifier. Never valid past the unifier.
    Variable(String),
    /// An unresolved macro call. Never valid past the unifier.
    Call(String, Vec<Expression>),
    /// A reference to one syscall argument, or a 32-bit half of it.
    Argument { index: u8, part: ArgPart },
    /// A binary arithmetic operation.
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// 32-bit bitwise complement.
    BinaryNegation(Box<Expression>),
    /// A relational comparison.
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// A set-membership test. The set is formed by `rights`; `left ∈ rights`
    /// if `positive`, `left ∉ rights` otherwise. `rights` is never empty.
    Inclusion {
        positive: bool,
        left: Box<Expression>,
        rights: Vec<Expression>,
    },
    /// Boolean negation.
    Negation(Box<Expression>),
    /// Short-circuit conjunction.
    And(Box<Expression>, Box<Expression>),
    /// Short-circuit disjunction.
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Convenience constructor: `Argument { index, part: Full }`.
    pub fn arg(index: u8) -> Expression {
        Expression::Argument {
            index,
            part: ArgPart::Full,
        }
    }

    /// Convenience constructor for [`Expression::Arithmetic`].
    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Expression {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Convenience constructor for [`Expression::Comparison`].
    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Expression {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Convenience constructor for [`Expression::And`].
    pub fn and(left: Expression, right: Expression) -> Expression {
        Expression::And(Box::new(left), Box::new(right))
    }

    /// Convenience constructor for [`Expression::Or`].
    pub fn or(left: Expression, right: Expression) -> Expression {
        Expression::Or(Box::new(left), Box::new(right))
    }

    /// Whether this node is a [`Expression::NumericLiteral`].
    pub fn as_numeric_literal(&self) -> Option<u64> {
        match self {
            Expression::NumericLiteral(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this node is a full-width [`Expression::Argument`].
    pub fn as_full_argument(&self) -> Option<u8> {
        match self {
            Expression::Argument {
                index,
                part: ArgPart::Full,
            } => Some(*index),
            _ => None,
        }
    }
}

//! The instruction buffer: an append-only sequence of [`Instr`] plus symbolic
//! jump bookkeeping, resolved to concrete [`SockFilter`]s in one pass.

use secco_ast::{ArithmeticOp, ComparisonOp, SockFilter};

use super::opcode::{
    AluOp, Instr, JumpOp, encode_alu, encode_jump_always, encode_jump_k, encode_jump_x,
    encode_load_abs, encode_load_imm, encode_ret, encode_tax,
};

/// A jump target that hasn't yet been resolved to an instruction offset.
///
/// `Match` is the one terminal every syscall fragment outside of this rule
/// shares (the `RET` that allows the syscall). `NO_MATCH` never needs its
/// own variant: rule fragments are laid out back to back, so "this syscall
/// doesn't match, try the next rule" is always exactly the instruction
/// immediately following the current one, which is what `Fallthrough`
/// names. `Offset` names a concrete instruction index, used when a fragment
/// needs to jump past itself (e.g. the short-circuit midpoint of a 64-bit
/// comparison chained from elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Match,
    Fallthrough,
    Offset(usize),
}

/// An append-only sequence of typed instructions with one floating
/// terminal (`MATCH`) that gets bound to a concrete instruction index once
/// the caller knows where its epilogue lands.
#[derive(Debug, Default)]
pub struct InstructionBuffer {
    instrs: Vec<Instr>,
    match_target: Option<usize>,
}

impl InstructionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain this buffer's raw instructions, for splicing a rule fragment
    /// built in isolation into the program-wide buffer.
    pub(crate) fn into_instrs(self) -> Vec<Instr> {
        self.instrs
    }

    /// Append another fragment's raw instructions. `Label::Fallthrough` and
    /// `Label::Offset` inside `other` stay correct under concatenation since
    /// they never encode an absolute position.
    pub(crate) fn extend(&mut self, other: Vec<Instr>) {
        self.instrs.extend(other);
    }

    /// The index the next emitted instruction will occupy.
    pub fn position(&self) -> usize {
        self.instrs.len()
    }

    /// Bind `Label::Match` to a concrete instruction index. Must be called
    /// before [`resolve`](Self::resolve) if any emitted jump targets it.
    pub fn set_match_target(&mut self, index: usize) {
        self.match_target = Some(index);
    }

    pub fn load_at(&mut self, offset: u32) {
        self.instrs.push(Instr::LoadAbs { offset });
    }

    pub fn load_immediate(&mut self, k: u32) {
        self.instrs.push(Instr::LoadImm { k });
    }

    pub fn move_a_to_x(&mut self) {
        self.instrs.push(Instr::Tax);
    }

    pub fn perform_arithmetic(&mut self, op: ArithmeticOp, k: u32) {
        self.instrs.push(Instr::Alu {
            op: alu_op_from(op),
            k,
        });
    }

    /// Emit a conditional branch comparing `A` against immediate `k`.
    ///
    /// `negated` flips the test's sense; `chained` has no bearing on the
    /// instruction emitted here — it only tells the caller (the code
    /// generator) whether to reuse the fall-through edge for a queued
    /// second comparison, so it is accepted and ignored by the buffer
    /// itself, matching how the generator threads it through rather than
    /// the primitive layer.
    pub fn jump_on_k_comparison(
        &mut self,
        k: u32,
        op: ComparisonOp,
        jf: Label,
        jt: Label,
        negated: bool,
        _chained: bool,
    ) {
        let (bpf_op, mut swap) = jump_op_from(op);
        if negated {
            swap = !swap;
        }
        let (jt, jf) = if swap { (jf, jt) } else { (jt, jf) };
        self.instrs.push(Instr::JumpK {
            op: bpf_op,
            k,
            jt,
            jf,
        });
    }

    /// Emit a conditional branch comparing `A` against `X`.
    pub fn jump_on_x_comparison(&mut self, op: ComparisonOp, jf: Label, jt: Label, negated: bool) {
        let (bpf_op, mut swap) = jump_op_from(op);
        if negated {
            swap = !swap;
        }
        let (jt, jf) = if swap { (jf, jt) } else { (jt, jf) };
        self.instrs.push(Instr::JumpX { op: bpf_op, jt, jf });
    }

    /// Emit an unconditional jump to `target`. A jump straight to the
    /// following instruction is a no-op and is dropped rather than emitted.
    pub fn jump_always(&mut self, target: Label) {
        if target != Label::Fallthrough {
            self.instrs.push(Instr::JumpAlways { target });
        }
    }

    /// Emit a terminal `RET k`.
    pub fn ret(&mut self, k: u32) {
        self.instrs.push(Instr::Ret { k });
    }

    /// Lower every symbolic label to a concrete forward distance and flatten
    /// to the wire quadruple. Returns `Err((instruction_index, distance))`
    /// for the first conditional jump whose resolved distance doesn't fit
    /// in a `u8`, so a caller juggling several fragments in one buffer (see
    /// [`crate::driver`]) can tell which one is responsible.
    pub fn resolve(&self) -> Result<Vec<SockFilter>, (usize, usize)> {
        let mut out = Vec::with_capacity(self.instrs.len());
        for (i, instr) in self.instrs.iter().enumerate() {
            let filter = match instr {
                Instr::LoadAbs { offset } => {
                    let (code, k) = encode_load_abs(*offset);
                    SockFilter::new(code, 0, 0, k)
                }
                Instr::LoadImm { k } => {
                    let (code, k) = encode_load_imm(*k);
                    SockFilter::new(code, 0, 0, k)
                }
                Instr::Tax => {
                    let (code, k) = encode_tax();
                    SockFilter::new(code, 0, 0, k)
                }
                Instr::Alu { op, k } => {
                    let (code, k) = encode_alu(*op, *k);
                    SockFilter::new(code, 0, 0, k)
                }
                Instr::JumpK { op, k, jt, jf } => {
                    let code = encode_jump_k(*op, *k);
                    let jt = self.distance(i, *jt).map_err(|d| (i, d))?;
                    let jf = self.distance(i, *jf).map_err(|d| (i, d))?;
                    SockFilter::new(code, jt, jf, *k)
                }
                Instr::JumpX { op, jt, jf } => {
                    let code = encode_jump_x(*op);
                    let jt = self.distance(i, *jt).map_err(|d| (i, d))?;
                    let jf = self.distance(i, *jf).map_err(|d| (i, d))?;
                    SockFilter::new(code, jt, jf, 0)
                }
                Instr::JumpAlways { target } => {
                    let code = encode_jump_always();
                    let target_idx = self.resolve_label(*target, i);
                    let distance = target_idx
                        .checked_sub(i + 1)
                        .expect("unconditional jump target is not forward of its instruction");
                    SockFilter::new(code, 0, 0, distance as u32)
                }
                Instr::Ret { k } => {
                    let (code, k) = encode_ret(*k);
                    SockFilter::new(code, 0, 0, k)
                }
            };
            out.push(filter);
        }
        Ok(out)
    }

    fn resolve_label(&self, label: Label, from: usize) -> usize {
        match label {
            Label::Match => self
                .match_target
                .expect("Label::Match resolved before its target was set"),
            Label::Fallthrough => from + 1,
            Label::Offset(idx) => idx,
        }
    }

    fn distance(&self, from: usize, label: Label) -> Result<u8, usize> {
        let target = self.resolve_label(label, from);
        let distance = target
            .checked_sub(from + 1)
            .expect("conditional jump target is not forward of its instruction");
        u8::try_from(distance).map_err(|_| distance)
    }
}

fn alu_op_from(op: ArithmeticOp) -> AluOp {
    match op {
        ArithmeticOp::Add => AluOp::Add,
        ArithmeticOp::Sub => AluOp::Sub,
        ArithmeticOp::Mul => AluOp::Mul,
        ArithmeticOp::Div => AluOp::Div,
        ArithmeticOp::Mod => AluOp::Mod,
        ArithmeticOp::BitAnd => AluOp::And,
        ArithmeticOp::BitOr => AluOp::Or,
        ArithmeticOp::BitXor => AluOp::Xor,
        ArithmeticOp::ShiftLeft => AluOp::ShiftLeft,
        ArithmeticOp::ShiftRight => AluOp::ShiftRight,
    }
}

/// Maps an AST comparison to `(bpf_op, swap_branches)`. Classic BPF only has
/// `JEQ`/`JGT`/`JGE`/`JSET`; `Neql`, `Lt`, and `Lte` are synthesized by
/// picking the complementary test and swapping the two branch targets.
fn jump_op_from(op: ComparisonOp) -> (JumpOp, bool) {
    match op {
        ComparisonOp::Eql => (JumpOp::Eq, false),
        ComparisonOp::Neql => (JumpOp::Eq, true),
        ComparisonOp::Gt => (JumpOp::Gt, false),
        ComparisonOp::Gte => (JumpOp::Ge, false),
        ComparisonOp::Lt => (JumpOp::Ge, true),
        ComparisonOp::Lte => (JumpOp::Gt, true),
        ComparisonOp::Bit => (JumpOp::Set, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_instructions_resolve_with_zero_offsets() {
        let mut buf = InstructionBuffer::new();
        buf.load_at(0);
        buf.move_a_to_x();
        buf.ret(0);
        let filters = buf.resolve().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0].jt, 0);
        assert_eq!(filters[0].jf, 0);
    }

    #[test]
    fn jump_distance_is_forward_from_the_following_instruction() {
        let mut buf = InstructionBuffer::new();
        buf.jump_on_k_comparison(42, ComparisonOp::Eql, Label::Offset(3), Label::Offset(1), false, false);
        buf.load_at(0); // index 1 (jt target)
        buf.jump_always(Label::Offset(3));
        buf.ret(0); // index 3 (jf target)
        let filters = buf.resolve().unwrap();
        assert_eq!(filters[0].jt, 0); // index 1 - (0+1) = 0
        assert_eq!(filters[0].jf, 2); // index 3 - (0+1) = 2
    }

    #[test]
    fn neql_synthesized_by_swapping_eq_branches() {
        let mut buf = InstructionBuffer::new();
        buf.jump_on_k_comparison(42, ComparisonOp::Neql, Label::Offset(2), Label::Offset(1), false, false);
        buf.ret(0);
        buf.ret(1);
        let filters = buf.resolve().unwrap();
        // JMP | JEQ | K = 0x05 | 0x10 | 0x00
        assert_eq!(filters[0].code, 0x15);
        // swapped: jt becomes the original jf target and vice versa
        assert_eq!(filters[0].jt, 1); // Offset(2) - 1
        assert_eq!(filters[0].jf, 0); // Offset(1) - 1
    }

    #[test]
    fn too_far_jump_is_reported_as_an_error() {
        let mut buf = InstructionBuffer::new();
        buf.jump_on_k_comparison(0, ComparisonOp::Eql, Label::Offset(300), Label::Fallthrough, false, false);
        for _ in 0..299 {
            buf.ret(0);
        }
        assert!(buf.resolve().is_err());
    }

    #[test]
    fn fallthrough_jump_always_emits_nothing() {
        let mut buf = InstructionBuffer::new();
        buf.load_at(0);
        buf.jump_always(Label::Fallthrough);
        buf.ret(0);
        let filters = buf.resolve().unwrap();
        assert_eq!(filters.len(), 2);
    }
}

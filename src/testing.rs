//! A small concrete `Reg`/instruction harness used by this crate's own
//! tests. Gated behind the `testing_hooks` feature; downstream consumers of
//! the allocator never need it, since they bring their own instruction and
//! register types.

use crate::hooks::RegMapping;
use crate::reg::{OpMode, Reg, RegUse, VReg};
use smallvec::SmallVec;

/// The two register classes exercised by the test suite.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TestClass {
    /// General-purpose integer registers.
    Int,
    /// Floating-point registers.
    Float,
}

/// The register handle used by test instructions: either a virtual register
/// or one of a small fixed set of real registers, each tagged with its
/// class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TestReg {
    /// A virtual register of the given class.
    Virtual(VReg, TestClass),
    /// Real register `n` of the given class.
    Real(u8, TestClass),
}

impl TestReg {
    /// Build a virtual register handle.
    pub fn v(index: u32, class: TestClass) -> Self {
        TestReg::Virtual(VReg::new(index as usize), class)
    }

    /// Build a real register handle.
    pub fn r(index: u8, class: TestClass) -> Self {
        TestReg::Real(index, class)
    }
}

impl Reg for TestReg {
    type Class = TestClass;

    fn is_virtual(self) -> bool {
        matches!(self, TestReg::Virtual(..))
    }

    fn class(self) -> TestClass {
        match self {
            TestReg::Virtual(_, c) | TestReg::Real(_, c) => c,
        }
    }

    fn vreg(self) -> VReg {
        match self {
            TestReg::Virtual(v, _) => v,
            TestReg::Real(..) => panic!("vreg() called on a real register handle"),
        }
    }
}

/// A minimal three-address instruction set: enough to exercise moves,
/// binary ops, read-modify-write ops, and the spill/restore instructions
/// the allocator itself generates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestInsn {
    /// `dst := src`.
    Move { dst: TestReg, src: TestReg },
    /// `dst := src1 OP src2`.
    Binary { dst: TestReg, src1: TestReg, src2: TestReg },
    /// `dst := dst OP src` (reads and writes `dst` in one instruction).
    Modify { dst: TestReg, src: TestReg },
    /// A spill store, as produced by [`gen_spill`].
    Spill { rreg: TestReg, offset: u32 },
    /// A spill load, as produced by [`gen_restore`].
    Restore { rreg: TestReg, offset: u32 },
}

/// `reg_usage` hook: reports every register operand of `insn`.
pub fn reg_usage(insn: &TestInsn, out: &mut SmallVec<[RegUse<TestReg>; 4]>) {
    match *insn {
        TestInsn::Move { dst, src } => {
            out.push(RegUse::new(src, OpMode::Read));
            out.push(RegUse::new(dst, OpMode::Write));
        }
        TestInsn::Binary { dst, src1, src2 } => {
            out.push(RegUse::new(src1, OpMode::Read));
            out.push(RegUse::new(src2, OpMode::Read));
            out.push(RegUse::new(dst, OpMode::Write));
        }
        TestInsn::Modify { dst, src } => {
            out.push(RegUse::new(src, OpMode::Read));
            out.push(RegUse::new(dst, OpMode::Modify));
        }
        TestInsn::Spill { rreg, .. } => out.push(RegUse::new(rreg, OpMode::Read)),
        TestInsn::Restore { rreg, .. } => out.push(RegUse::new(rreg, OpMode::Write)),
    }
}

/// `is_move` hook: flags `Move` instructions for Stage 4.
pub fn is_move(insn: &TestInsn) -> Option<(TestReg, TestReg)> {
    match *insn {
        TestInsn::Move { dst, src } => Some((src, dst)),
        _ => None,
    }
}

/// `map_regs` hook: rewrites every vreg operand in place.
pub fn map_regs(insn: &mut TestInsn, mapping: &RegMapping<TestReg>) {
    fn rewrite(r: &mut TestReg, mapping: &RegMapping<TestReg>) {
        if r.is_virtual() {
            if let Some(rreg) = mapping.get(r.vreg()) {
                *r = rreg;
            }
        }
    }
    match insn {
        TestInsn::Move { dst, src } => {
            rewrite(dst, mapping);
            rewrite(src, mapping);
        }
        TestInsn::Binary { dst, src1, src2 } => {
            rewrite(dst, mapping);
            rewrite(src1, mapping);
            rewrite(src2, mapping);
        }
        TestInsn::Modify { dst, src } => {
            rewrite(dst, mapping);
            rewrite(src, mapping);
        }
        TestInsn::Spill { .. } | TestInsn::Restore { .. } => {}
    }
}

/// `gen_spill` hook: a store of `rreg` to its spill slot.
pub fn gen_spill(rreg: TestReg, offset: u32) -> TestInsn {
    TestInsn::Spill { rreg, offset }
}

/// `gen_restore` hook: a load of `rreg` from its spill slot.
pub fn gen_restore(rreg: TestReg, offset: u32) -> TestInsn {
    TestInsn::Restore { rreg, offset }
}

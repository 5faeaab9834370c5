//! The external interface (spec §6): the five callbacks the allocator
//! trusts, bundled as a struct-of-function-pointers parameter (spec §9,
//! "Polymorphism") rather than as a trait object hierarchy, since the
//! instruction type and register-handle type are the caller's concern, not
//! an inheritance relationship the allocator needs to model.
//!
//! Every callback here is trusted (spec §5): none may retain allocator-
//! internal state past its own return, and none may assume anything about
//! reentrancy.

use crate::reg::{Reg, RegUse, VReg};
use smallvec::SmallVec;

/// A substitution mapping built for a single instruction: every vreg
/// operand the instruction touches, mapped to the real register now bound
/// to it (spec §4.5 step (g)).
#[derive(Clone, Debug, Default)]
pub struct RegMapping<R> {
    pairs: SmallVec<[(VReg, R); 4]>,
}

impl<R: Reg> RegMapping<R> {
    pub(crate) fn clear(&mut self) {
        self.pairs.clear();
    }

    pub(crate) fn insert(&mut self, v: VReg, r: R) {
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| *k == v) {
            slot.1 = r;
        } else {
            self.pairs.push((v, r));
        }
    }

    /// Look up the real register a vreg was mapped to for this
    /// instruction, if it was touched at all.
    pub fn get(&self, v: VReg) -> Option<R> {
        self.pairs.iter().find(|(k, _)| *k == v).map(|(_, r)| *r)
    }

    /// Iterate over all `(vreg, rreg)` pairs recorded for this instruction.
    pub fn iter(&self) -> impl Iterator<Item = (VReg, R)> + '_ {
        self.pairs.iter().copied()
    }
}

/// The five capabilities the allocator needs from its caller (spec §6).
pub struct Hooks<'a, I, R: Reg> {
    /// `(insn) -> Option<(src, dst)>` — flags reg-reg moves for Stage 4's
    /// optional preference computation.
    pub is_move: &'a mut dyn FnMut(&I) -> Option<(R, R)>,
    /// `(insn) -> uses appended to the out-vector` — every register the
    /// instruction reads, writes, or modifies.
    pub reg_usage: &'a mut dyn FnMut(&I, &mut SmallVec<[RegUse<R>; 4]>),
    /// `(insn, substitution) -> ()` — rewrites the instruction's vreg
    /// operands to the real registers the substitution names.
    pub map_regs: &'a mut dyn FnMut(&mut I, &RegMapping<R>),
    /// `(rreg, byte_offset) -> insn` — produces a store to the spill slot.
    pub gen_spill: &'a mut dyn FnMut(R, u32) -> I,
    /// `(rreg, byte_offset) -> insn` — produces a load from the spill slot.
    pub gen_restore: &'a mut dyn FnMut(R, u32) -> I,
}

/// Tunables that used to be compile-time constants in the source this
/// allocator is modeled on (spec §6: "The slot table is bounded at
/// compile-time by a constant `S`"). Exposed as runtime configuration
/// instead, since a fixed constant would tie this crate to one frame
/// layout and this allocator is explicitly target-independent.
#[derive(Clone, Copy, Debug)]
pub struct AllocatorConfig {
    /// Width in bytes of one spill slot (spec §3: "Slots are 8 bytes").
    pub slot_size_bytes: u32,
    /// Upper bound on the number of spill slots. Exceeding it during
    /// Stage 3 is `AllocError::OutOfSpillSlots`.
    pub max_spill_slots: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            slot_size_bytes: 8,
            max_spill_slots: 4096,
        }
    }
}

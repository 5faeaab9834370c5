//! Stage 1: vreg liveness summariser.
//!
//! A single linear scan over the instruction vector that records, for every
//! virtual register that is ever touched, the half-open range
//! `[live_after, dead_before)` during which it is live (spec §4.1).

use crate::reg::{OpMode, Reg, RegUse, VReg};
use crate::result::{AllocError, AllocResult};
use cranelift_entity::SecondaryMap;
use smallvec::SmallVec;

/// Everything the allocator knows about one virtual register once Stage 1
/// (and later Stage 3/4) have run. Read-only from Stage 2 onward.
#[derive(Clone, Debug)]
pub struct VRegInfo<R: Reg> {
    /// Index of the instruction after which this vreg first becomes live.
    /// `None` if the vreg is never referenced.
    pub live_after: Option<u32>,
    /// Half-open end: index of the instruction before which this vreg is
    /// last live.
    pub dead_before: Option<u32>,
    /// Byte offset of this vreg's home spill slot, assigned in Stage 3.
    pub spill_offset: u32,
    /// Width in bytes of the home slot.
    pub spill_size: u32,
    /// Optional preferred real register, set in Stage 4.
    pub preferred: Option<R>,
    /// The register class this vreg was first seen with. Not part of the
    /// source's table, but needed to check §3 invariant 4 (`class(rreg) ==
    /// class(vreg)`) independent of any one instruction's operand list.
    pub class: Option<<R as Reg>::Class>,
}

impl<R: Reg> Default for VRegInfo<R> {
    fn default() -> Self {
        Self {
            live_after: None,
            dead_before: None,
            spill_offset: 0,
            spill_size: 0,
            preferred: None,
            class: None,
        }
    }
}

impl<R: Reg> VRegInfo<R> {
    /// Is this vreg ever read or written by the instruction stream?
    pub fn is_used(&self) -> bool {
        self.live_after.is_some()
    }
}

/// Scan `insns` once and build a `VRegInfo` table sized to `num_vregs`.
///
/// `vreg_sizes` gives the byte width of each vreg's value, used later by
/// Stage 3 to reserve multi-slot homes for wide (e.g. 128-bit) values; a
/// missing entry (an index at or beyond `vreg_sizes.len()`) defaults to
/// `default_size`.
pub fn compute_vreg_liveness<I, R>(
    insns: &[I],
    num_vregs: usize,
    vreg_sizes: &[u32],
    default_size: u32,
    mut reg_usage: impl FnMut(&I, &mut SmallVec<[RegUse<R>; 4]>),
) -> AllocResult<SecondaryMap<VReg, VRegInfo<R>>>
where
    R: Reg,
{
    let mut table: SecondaryMap<VReg, VRegInfo<R>> = SecondaryMap::new();
    table.resize(num_vregs);

    let mut uses: SmallVec<[RegUse<R>; 4]> = SmallVec::new();
    for (i, insn) in insns.iter().enumerate() {
        let i = i as u32;
        uses.clear();
        reg_usage(insn, &mut uses);

        for u in &uses {
            if !u.reg.is_virtual() {
                continue;
            }
            let v = u.reg.vreg();
            if v.index() >= num_vregs {
                return Err(AllocError::MalformedInput {
                    inst: i as usize,
                    reason: format!("vreg {} referenced is outside [0, {})", v.index(), num_vregs),
                });
            }

            let info = &mut table[v];
            match info.class {
                Some(c) if c != u.reg.class() => {
                    return Err(AllocError::MalformedInput {
                        inst: i as usize,
                        reason: format!("vreg {} used with two different register classes", v.index()),
                    });
                }
                Some(_) => {}
                None => info.class = Some(u.reg.class()),
            }
            match u.mode {
                OpMode::Read => {
                    if info.live_after.is_none() {
                        return Err(AllocError::MalformedInput {
                            inst: i as usize,
                            reason: format!("vreg {} read before any write", v.index()),
                        });
                    }
                    // `i + 1`, not `i`: the read needs `v` resident *at* `i`,
                    // so the half-open range must include `i`. Stage 5 expires
                    // a binding at the top of the iteration whose index equals
                    // `dead_before`; expiring at `i` itself would free the
                    // register before that same iteration reads it.
                    info.dead_before = Some(i + 1);
                }
                OpMode::Modify => {
                    if info.live_after.is_none() {
                        return Err(AllocError::MalformedInput {
                            inst: i as usize,
                            reason: format!("vreg {} modified before any write", v.index()),
                        });
                    }
                    info.dead_before = Some(i + 1);
                }
                OpMode::Write => {
                    if info.live_after.is_none() {
                        info.live_after = Some(i);
                    }
                    info.dead_before = Some(i + 1);
                }
            }
        }
    }

    for v in 0..num_vregs {
        let vreg = VReg::new(v);
        let size = vreg_sizes.get(v).copied().unwrap_or(default_size);
        table[vreg].spill_size = size;
    }

    Ok(table)
}

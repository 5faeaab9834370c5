//! Stage 4: preference computation (optional).
//!
//! A no-op implementation is conformant (spec §4.4); this one records a
//! cheap, sound hint: when a reg-reg move copies a fixed real register into
//! a vreg, prefer allocating that vreg to the same real register, which
//! turns the move into a no-op for Stage 5 to elide... except Stage 5 in
//! this crate does not elide moves (that would be coalescing proper, a
//! Non-goal); the hint only steers *eviction-free* allocation toward the
//! register that already holds the right value, which is enough to avoid
//! the restore-then-move pattern in the common case of a move out of a
//! fixed ABI register.

use crate::liveness::VRegInfo;
use crate::reg::{Reg, VReg};
use crate::result::{AllocError, AllocResult};
use cranelift_entity::SecondaryMap;

/// Walk `insns`, asking `is_move` which ones are register-to-register
/// copies, and fill in `VRegInfo::preferred` where a real register is
/// copied directly into a vreg.
///
/// A move between operands of different classes is nonsensical (spec §7
/// lists "register-class mismatch on a move" as a `MalformedInput` cause),
/// so such a move is rejected rather than silently ignored.
pub fn compute_preferences<I, R>(
    insns: &[I],
    table: &mut SecondaryMap<VReg, VRegInfo<R>>,
    mut is_move: impl FnMut(&I) -> Option<(R, R)>,
) -> AllocResult<()>
where
    R: Reg,
{
    for (i, insn) in insns.iter().enumerate() {
        if let Some((src, dst)) = is_move(insn) {
            if src.class() != dst.class() {
                return Err(AllocError::MalformedInput {
                    inst: i,
                    reason: "move between operands of different register classes".to_string(),
                });
            }
            if !src.is_virtual() && dst.is_virtual() {
                let dst = dst.vreg();
                if table[dst].preferred.is_none() {
                    table[dst].preferred = Some(src);
                }
            }
        }
    }
    Ok(())
}

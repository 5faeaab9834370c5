//! Stage 2: real-register hard-range collector.
//!
//! Scans the instruction vector once more, this time for operands that name
//! an *allocatable* real register directly (e.g. a hardware divide that
//! clobbers a fixed register). Each maximal span during which such a
//! register is architecturally pinned down becomes one `RRegInterval` (spec
//! §4.2). Registers outside the allocatable set — stack pointer, frame
//! pointer, and the like — are invisible to this pass.

use crate::reg::{OpMode, Reg, RegUse};
use crate::result::{AllocError, AllocResult};
use smallvec::SmallVec;

/// A maximal span during which a specific allocatable real register is
/// reserved by instruction semantics, independent of vreg allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RRegInterval<R> {
    /// The real register this interval pins down.
    pub rreg: R,
    /// Index of the instruction after which the reservation begins.
    pub live_after: u32,
    /// Half-open end: index of the instruction before which the
    /// reservation is over.
    pub dead_before: u32,
}

struct Scratch<R> {
    rreg: R,
    live_after: u32,
    dead_before: u32,
}

/// Scan `insns` for allocatable real-register operands and collect the
/// hard ranges they impose.
///
/// `allocatable` is the `R[0..K)` array; an operand whose handle doesn't
/// appear in it (by equality) is ignored entirely, per spec §4.2.
pub fn collect_hard_ranges<I, R>(
    insns: &[I],
    allocatable: &[R],
    mut reg_usage: impl FnMut(&I, &mut SmallVec<[RegUse<R>; 4]>),
) -> AllocResult<Vec<RRegInterval<R>>>
where
    R: Reg,
{
    let mut scratch: Vec<Option<Scratch<R>>> = (0..allocatable.len()).map(|_| None).collect();
    let mut out = Vec::new();
    let mut uses: SmallVec<[RegUse<R>; 4]> = SmallVec::new();

    for (i, insn) in insns.iter().enumerate() {
        let i = i as u32;
        uses.clear();
        reg_usage(insn, &mut uses);

        for u in &uses {
            if u.reg.is_virtual() {
                continue;
            }
            let idx = match allocatable.iter().position(|&r| r == u.reg) {
                Some(idx) => idx,
                None => continue,
            };

            match u.mode {
                OpMode::Write => {
                    if let Some(prev) = scratch[idx].take() {
                        out.push(RRegInterval {
                            rreg: prev.rreg,
                            live_after: prev.live_after,
                            dead_before: prev.dead_before,
                        });
                    }
                    scratch[idx] = Some(Scratch {
                        rreg: u.reg,
                        live_after: i,
                        dead_before: i + 1,
                    });
                }
                // `i + 1`, not `i`, for the same reason as the vreg liveness
                // summariser: the read needs `r` reserved through instruction
                // `i` itself.
                OpMode::Read => match &mut scratch[idx] {
                    Some(s) => s.dead_before = i + 1,
                    None => {
                        return Err(AllocError::MalformedInput {
                            inst: i as usize,
                            reason: "real register read before any write".to_string(),
                        })
                    }
                },
                OpMode::Modify => match &mut scratch[idx] {
                    Some(s) => s.dead_before = i + 1,
                    None => {
                        return Err(AllocError::MalformedInput {
                            inst: i as usize,
                            reason: "real register modified before any write".to_string(),
                        })
                    }
                },
            }
        }
    }

    for s in scratch.into_iter().flatten() {
        out.push(RRegInterval {
            rreg: s.rreg,
            live_after: s.live_after,
            dead_before: s.dead_before,
        });
    }

    Ok(out)
}
